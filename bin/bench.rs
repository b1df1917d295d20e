use bytes::Bytes;
use clap::{Arg, ArgAction, Command};
use crc32fast::Hasher as Crc32;
use futures::TryStreamExt;
use route_ingest::objects::MemoryObjectStore;
use route_ingest::store::{Document, MemoryStore};
use route_ingest::{
    decode_text, decompress, detect_delimiter, first_line, init_tracing, normalize_row,
    sorted_rows, Ingestor, ObjectMeta, RouteTarget, RowReader, Settings, UploadEvent,
    CANONICAL_FIELDS,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

const BUCKET: &str = "bench";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new("bench")
        .arg(Arg::new("path").long("path").required(true).value_parser(clap::value_parser!(PathBuf)))
        .arg(Arg::new("name").long("name").help("Object path to ingest as (default bench/local/<file name>)"))
        .arg(Arg::new("verify").long("verify").help("Re-read stored rows in key order and compare a CRC32 with the normalized source").action(ArgAction::SetTrue))
        .args(Settings::args())
        .get_matches();

    init_tracing();
    let settings = Settings::from_matches(&matches);
    let path = matches.get_one::<PathBuf>("path").unwrap();
    let name = match matches.get_one::<String>("name") {
        Some(name) => name.clone(),
        None => format!(
            "bench/local/{}",
            path.file_name().and_then(|s| s.to_str()).unwrap_or("route.csv")
        ),
    };

    let data = Bytes::from(tokio::fs::read(path).await?);
    let objects = Arc::new(MemoryObjectStore::new(settings.public_base_url.clone()));
    objects.insert(BUCKET, &name, data.clone()).await;
    let documents = Arc::new(MemoryStore::new());
    let ingestor = Ingestor::new(documents.clone(), objects).with_settings(&settings);

    let start = Instant::now();
    let rows = ingestor.ingest(&UploadEvent::new(BUCKET, name.clone())).await?;
    let elapsed = start.elapsed().as_secs_f64();
    let rps = (rows as f64) / elapsed;
    println!(
        "source={} rows={} concurrency={}\nelapsed={:.3}s rows/sec={:.0}",
        path.display(),
        rows,
        settings.write_concurrency,
        elapsed,
        rps
    );

    if matches.get_flag("verify") {
        let (source_rows, source_crc) = source_checksum(data, &name).await?;
        let route = RouteTarget::from_object_path(&name)?.route_path();
        let stored = sorted_rows(&*documents, &route).await?;
        let stored_crc = stored_checksum(&stored);
        if source_rows != stored.len() || source_crc != stored_crc {
            anyhow::bail!(
                "verification failed: source rows={source_rows} crc=0x{source_crc:08x}, stored rows={} crc=0x{stored_crc:08x}",
                stored.len()
            );
        }
        println!("verified rows={} crc=0x{stored_crc:08x}", stored.len());
    }
    Ok(())
}

fn update(crc: &mut Crc32, fi: usize, field: &str) {
    if fi > 0 {
        crc.update(&[0x1f]);
    }
    crc.update(field.as_bytes());
}

/// CRC32 over the normalized source rows, fields separated by '\x1f' (unit separator).
async fn source_checksum(data: Bytes, name: &str) -> anyhow::Result<(usize, u32)> {
    let raw = decompress(data, &ObjectMeta::from_name(name)).await?;
    let decoded = decode_text(&raw);
    let delimiter = detect_delimiter(first_line(&decoded.text))?;
    let mut rows = Box::pin(RowReader::from_text(decoded.text, delimiter).await?.into_stream());

    let mut crc = Crc32::new();
    let mut count = 0usize;
    while let Some(row) = rows.try_next().await? {
        let fields = normalize_row(&row);
        for (fi, name) in CANONICAL_FIELDS.iter().enumerate() {
            let value = fields.get(*name).map(ToString::to_string).unwrap_or_default();
            update(&mut crc, fi, &value);
        }
        count += 1;
    }
    Ok((count, crc.finalize()))
}

fn stored_checksum(rows: &[Document]) -> u32 {
    let mut crc = Crc32::new();
    for doc in rows {
        for (fi, name) in CANONICAL_FIELDS.iter().enumerate() {
            let value = doc.fields.get(*name).map(ToString::to_string).unwrap_or_default();
            update(&mut crc, fi, &value);
        }
    }
    crc.finalize()
}
