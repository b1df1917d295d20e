use crate::config::Settings;
use crate::objects::ObjectStore;
use crate::schema::{collections, route_fields, CANONICAL_FIELDS, CURRENT_READING};
use crate::store::{CollectionPath, DocPath, Document, DocumentStore, Fields, StoreError, Value};
use crate::{IngestError, IngestResult};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use csv_async::AsyncWriterBuilder;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

const IMAGE_URL: &str = "imagenUrl";

/// Rows of a route ordered by their numeric key.
///
/// Keys are stored as strings, so the store lists `10` before `2`; keys that
/// are not numbers are skipped.
pub async fn sorted_rows(
    store: &dyn DocumentStore,
    route: &DocPath,
) -> Result<Vec<Document>, StoreError> {
    let mut keyed: Vec<(u64, Document)> = store
        .list(&route.collection(collections::ROUTE_ROWS))
        .await?
        .into_iter()
        .filter_map(|doc| match doc.id.parse::<u64>() {
            Ok(ordinal) => Some((ordinal, doc)),
            Err(_) => {
                warn!(route = %route, key = %doc.id, "skipping row with non-numeric key");
                None
            }
        })
        .collect();
    keyed.sort_by_key(|(ordinal, _)| *ordinal);
    Ok(keyed.into_iter().map(|(_, doc)| doc).collect())
}

/// Rows of the latest ingestion.
///
/// Re-uploading a shorter file leaves rows beyond the new `filas` count in the
/// store; they are no longer part of the route.
fn current_rows(rows: Vec<Document>, route: &Fields) -> Vec<Document> {
    let Some(Value::Integer(count)) = route.get(route_fields::ROW_COUNT) else {
        return rows;
    };
    let count = u64::try_from(*count).unwrap_or(0);
    rows.into_iter()
        .filter(|doc| doc.id.parse::<u64>().is_ok_and(|ordinal| ordinal < count))
        .collect()
}

fn is_completed(fields: &Fields) -> bool {
    fields
        .get(CURRENT_READING)
        .is_some_and(|value| !value.is_blank())
}

/// Field names as the download format expects them.
fn export_record(fields: &Fields) -> BTreeMap<String, String> {
    let mut record = BTreeMap::new();
    for (name, value) in fields {
        let name = match name.as_str() {
            "controles" => "controlado",
            "fecha_hora_lectura" => "fechaToma",
            "novedades" => "novedad",
            "altura" => continue,
            other => other,
        };
        record.insert(name.to_string(), value.to_string());
    }
    record.entry(IMAGE_URL.to_string()).or_default();
    record
}

/// Canonical fields first, in file order, then anything else sorted.
fn canonical_columns(fields: &Fields) -> Vec<String> {
    let mut columns: Vec<String> = CANONICAL_FIELDS
        .iter()
        .filter(|name| fields.contains_key(**name))
        .map(|name| name.to_string())
        .collect();
    columns.extend(
        fields
            .keys()
            .filter(|name| !CANONICAL_FIELDS.contains(&name.as_str()))
            .cloned(),
    );
    columns
}

async fn render_csv(
    delimiter: u8,
    columns: &[String],
    records: &[Vec<String>],
) -> IngestResult<Vec<u8>> {
    let mut out = Vec::new();
    if records.is_empty() {
        return Ok(out);
    }
    {
        let mut writer = AsyncWriterBuilder::new()
            .delimiter(delimiter)
            .create_writer(&mut out);
        writer.write_record(columns).await?;
        for record in records {
            writer.write_record(record).await?;
        }
        writer.flush().await?;
    }
    Ok(out)
}

/// Result of an on-demand route export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummary {
    pub filename: String,
    #[serde(rename = "total_documentos")]
    pub total_rows: usize,
    #[serde(rename = "documentos_completados")]
    pub completed_rows: usize,
    #[serde(rename = "porcentaje_completado")]
    pub completion_percentage: f64,
    pub timestamp: String,
    pub url: Option<String>,
}

/// Writes routes back out as CSV files.
pub struct Exporter {
    documents: Arc<dyn DocumentStore>,
    objects: Arc<dyn ObjectStore>,
    export_bucket: String,
}

impl Exporter {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
        settings: &Settings,
    ) -> Self {
        Self {
            documents,
            objects,
            export_bucket: settings.export_bucket.clone(),
        }
    }

    pub fn export_bucket(&self) -> &str {
        &self.export_bucket
    }

    pub async fn export_route(
        &self,
        client: &str,
        locality: &str,
        route_id: &str,
    ) -> IngestResult<ExportSummary> {
        self.export_route_at(client, locality, route_id, Utc::now())
            .await
    }

    /// Export the completed rows of one route into a public, timestamped file
    /// and store the route's completion percentage.
    pub async fn export_route_at(
        &self,
        client: &str,
        locality: &str,
        route_id: &str,
        now: DateTime<Utc>,
    ) -> IngestResult<ExportSummary> {
        let route = DocPath::root(collections::ROUTES, route_id);
        let Some(route_doc) = self.documents.get(&route).await? else {
            return Err(IngestError::RouteNotFound(route_id.to_string()));
        };

        let rows = current_rows(
            sorted_rows(self.documents.as_ref(), &route).await?,
            &route_doc,
        );
        let total_rows = rows.len();
        let mut columns: Option<Vec<String>> = None;
        let mut records = Vec::new();
        for doc in rows.iter().filter(|doc| is_completed(&doc.fields)) {
            let record = export_record(&doc.fields);
            let names = columns.get_or_insert_with(|| record.keys().cloned().collect());
            records.push(
                names
                    .iter()
                    .map(|name| record.get(name).cloned().unwrap_or_default())
                    .collect::<Vec<String>>(),
            );
        }
        let completed_rows = records.len();

        let timestamp = now.format("%Y-%m-%d_%H-%M-%S").to_string();
        let filename = format!("{client}/{locality}/{route_id}_{timestamp}.csv");
        let content = render_csv(b';', columns.as_deref().unwrap_or_default(), &records).await?;
        let url = self
            .objects
            .write_object(
                &self.export_bucket,
                &filename,
                Bytes::from(content),
                "text/csv",
                true,
            )
            .await?;

        let completion_percentage = if total_rows > 0 {
            completed_rows as f64 / total_rows as f64 * 100.0
        } else {
            0.0
        };
        let mut fields = Fields::new();
        fields.insert(
            route_fields::COMPLETION.to_string(),
            Value::Double(completion_percentage),
        );
        self.documents.upsert_merge(&route, fields).await?;

        info!(
            route = %route,
            file = %filename,
            total_rows,
            completed_rows,
            completion_percentage,
            "exported route"
        );
        Ok(ExportSummary {
            filename,
            total_rows,
            completed_rows,
            completion_percentage,
            timestamp,
            url,
        })
    }

    /// Export every route with rows to `{client}/{locality}/{route}.csv`.
    /// Returns the written file names.
    pub async fn export_all_routes(&self) -> IngestResult<Vec<String>> {
        let routes_collection = CollectionPath::root(collections::ROUTES);
        let routes = self.documents.list(&routes_collection).await?;
        let mut written = Vec::new();

        for route in routes {
            let route_path = routes_collection.doc(&route.id);
            let rows = current_rows(
                sorted_rows(self.documents.as_ref(), &route_path).await?,
                &route.fields,
            );
            let Some(first) = rows.first() else {
                continue;
            };

            let parent = |field: &str| {
                route
                    .fields
                    .get(field)
                    .and_then(Value::as_reference)
                    .map(|r| r.id.clone())
            };
            let filename = match (parent(route_fields::CLIENT), parent(route_fields::LOCALITY)) {
                (Some(client), Some(locality)) => format!("{client}/{locality}/{}.csv", route.id),
                _ => format!("{}.csv", route.id),
            };

            let columns = canonical_columns(&first.fields);
            let records: Vec<Vec<String>> = rows
                .iter()
                .map(|doc| {
                    columns
                        .iter()
                        .map(|name| {
                            doc.fields
                                .get(name)
                                .map(ToString::to_string)
                                .unwrap_or_default()
                        })
                        .collect()
                })
                .collect();
            let content = render_csv(b',', &columns, &records).await?;
            self.objects
                .write_object(
                    &self.export_bucket,
                    &filename,
                    Bytes::from(content),
                    "text/csv",
                    false,
                )
                .await?;
            info!(route = %route_path, file = %filename, rows = rows.len(), "exported route rows");
            written.push(filename);
        }
        Ok(written)
    }
}
