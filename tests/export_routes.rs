use chrono::{TimeZone, Utc};
use route_ingest::objects::MemoryObjectStore;
use route_ingest::store::{DocPath, DocumentStore, MemoryStore, Value};
use route_ingest::{
    sorted_rows, Exporter, IngestError, Ingestor, Settings, UploadEvent, CANONICAL_FIELDS,
};
use std::sync::Arc;

const UPLOADS: &str = "uploads";

/// Every third row has no current reading.
fn route_rows(count: usize) -> String {
    let mut lines = vec![CANONICAL_FIELDS.join(";")];
    for i in 0..count {
        let mut fields = vec![String::new(); CANONICAL_FIELDS.len()];
        fields[1] = format!("{:03}", i + 1);
        fields[12] = "C1".to_string();
        fields[13] = "sin novedad".to_string();
        fields[14] = if i % 3 == 2 { String::new() } else { format!("{}", 500 + i) };
        fields[20] = "2024-05-01 10:00".to_string();
        fields[24] = "520".to_string();
        lines.push(fields.join(";"));
    }
    lines.join("\n")
}

async fn ingested() -> anyhow::Result<(Arc<MemoryStore>, Arc<MemoryObjectStore>, Exporter)> {
    let documents = Arc::new(MemoryStore::new());
    let objects = Arc::new(MemoryObjectStore::new("https://storage.googleapis.com"));
    // Twelve rows so lexicographic key order ("10" < "2") differs from row order.
    objects.insert(UPLOADS, "ClienteA/Zona1/ruta7.csv", route_rows(12)).await;
    Ingestor::new(documents.clone(), objects.clone())
        .ingest(&UploadEvent::new(UPLOADS, "ClienteA/Zona1/ruta7.csv"))
        .await?;

    let settings = Settings {
        export_bucket: "exports".to_string(),
        ..Settings::default()
    };
    let exporter = Exporter::new(documents.clone(), objects.clone(), &settings);
    Ok((documents, objects, exporter))
}

#[tokio::test]
async fn rows_are_read_back_in_numeric_order() -> anyhow::Result<()> {
    let (documents, _, _) = ingested().await?;
    let rows = sorted_rows(&*documents, &DocPath::root("Rutas", "ruta7")).await?;
    let ids: Vec<&str> = rows.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(
        ids,
        ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11"]
    );
    assert_eq!(rows[10].fields["orden"], Value::from("11"));
    Ok(())
}

#[tokio::test]
async fn on_demand_export_writes_completed_rows() -> anyhow::Result<()> {
    let (documents, objects, exporter) = ingested().await?;
    let now = Utc.with_ymd_and_hms(2025, 8, 11, 12, 45, 0).unwrap();

    let summary = exporter
        .export_route_at("ClienteA", "Zona1", "ruta7", now)
        .await?;
    assert_eq!(summary.filename, "ClienteA/Zona1/ruta7_2025-08-11_12-45-00.csv");
    assert_eq!(summary.total_rows, 12);
    assert_eq!(summary.completed_rows, 8);
    assert!((summary.completion_percentage - 200.0 / 3.0).abs() < 1e-9);
    assert_eq!(
        summary.url.as_deref(),
        Some("https://storage.googleapis.com/exports/ClienteA/Zona1/ruta7_2025-08-11_12-45-00.csv")
    );
    assert!(objects.is_public("exports", &summary.filename).await);

    let object = objects.get("exports", &summary.filename).await.unwrap();
    let content = String::from_utf8(object.data.to_vec())?;
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 9);

    let header: Vec<&str> = lines[0].split(';').collect();
    let mut sorted = header.clone();
    sorted.sort_unstable();
    assert_eq!(header, sorted);
    assert!(header.contains(&"controlado"));
    assert!(header.contains(&"fechaToma"));
    assert!(header.contains(&"novedad"));
    assert!(header.contains(&"imagenUrl"));
    assert!(!header.contains(&"altura"));
    assert!(!header.contains(&"controles"));

    let orden = header.iter().position(|h| *h == "orden").unwrap();
    let exported: Vec<&str> = lines[1..]
        .iter()
        .map(|line| line.split(';').nth(orden).unwrap_or_default())
        .collect();
    assert_eq!(exported, ["1", "2", "4", "5", "7", "8", "10", "11"]);

    let route = documents.get(&DocPath::root("Rutas", "ruta7")).await?.unwrap();
    assert_eq!(
        route["completado"],
        Value::Double(summary.completion_percentage)
    );
    Ok(())
}

#[tokio::test]
async fn missing_route_is_not_found() -> anyhow::Result<()> {
    let (_, _, exporter) = ingested().await?;
    let result = exporter.export_route("ClienteA", "Zona1", "nope").await;
    assert!(matches!(result, Err(IngestError::RouteNotFound(id)) if id == "nope"));
    Ok(())
}

#[tokio::test]
async fn export_all_writes_every_row_per_route() -> anyhow::Result<()> {
    let (_, objects, exporter) = ingested().await?;

    let files = exporter.export_all_routes().await?;
    assert_eq!(files, ["ClienteA/Zona1/ruta7.csv"]);
    assert!(!objects.is_public("exports", &files[0]).await);

    let object = objects.get("exports", &files[0]).await.unwrap();
    let content = String::from_utf8(object.data.to_vec())?;
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 13);
    assert_eq!(lines[0], CANONICAL_FIELDS.join(","));
    assert!(lines[11].starts_with(",11,"));
    Ok(())
}

#[tokio::test]
async fn shorter_reupload_drops_stale_rows_from_exports() -> anyhow::Result<()> {
    let (documents, objects, exporter) = ingested().await?;
    objects.insert(UPLOADS, "ClienteA/Zona1/ruta7.csv", route_rows(5)).await;
    Ingestor::new(documents.clone(), objects.clone())
        .ingest(&UploadEvent::new(UPLOADS, "ClienteA/Zona1/ruta7.csv"))
        .await?;

    // Rows 5..12 of the first upload are still stored.
    let stored = sorted_rows(&*documents, &DocPath::root("Rutas", "ruta7")).await?;
    assert_eq!(stored.len(), 12);

    let summary = exporter.export_route("ClienteA", "Zona1", "ruta7").await?;
    assert_eq!(summary.total_rows, 5);
    assert_eq!(summary.completed_rows, 4);
    assert!((summary.completion_percentage - 80.0).abs() < 1e-9);

    let files = exporter.export_all_routes().await?;
    let object = objects.get("exports", &files[0]).await.unwrap();
    let content = String::from_utf8(object.data.to_vec())?;
    assert_eq!(content.lines().count(), 6);
    assert_eq!(objects.list("exports").await.len(), 2);
    Ok(())
}
