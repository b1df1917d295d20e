use clap::{Arg, Command};
use route_ingest::objects::LocalObjectStore;
use route_ingest::store::MemoryStore;
use route_ingest::{init_tracing, route_status, Ingestor, RouteTarget, Settings, UploadEvent};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new("ingest")
        .about("Load one uploaded object into the route hierarchy")
        .arg(Arg::new("root").long("root").required(true).value_parser(clap::value_parser!(PathBuf)).help("Directory holding one sub-directory per bucket"))
        .arg(Arg::new("bucket").long("bucket").required(true))
        .arg(Arg::new("name").long("name").required(true).help("Object path: <client>/<locality>/<file>"))
        .arg(Arg::new("db").long("db").default_value("routes.json").value_parser(clap::value_parser!(PathBuf)).help("JSON snapshot of the document store"))
        .args(Settings::args())
        .get_matches();

    init_tracing();
    let settings = Settings::from_matches(&matches);
    let root = matches.get_one::<PathBuf>("root").unwrap();
    let db = matches.get_one::<PathBuf>("db").unwrap();
    let event = UploadEvent::new(
        matches.get_one::<String>("bucket").unwrap(),
        matches.get_one::<String>("name").unwrap(),
    );

    let documents = Arc::new(MemoryStore::load(db).await?);
    let objects = Arc::new(LocalObjectStore::new(root, settings.public_base_url.clone()));
    let ingestor = Ingestor::new(documents.clone(), objects).with_settings(&settings);

    let outcome = ingestor.ingest(&event).await;
    // Failures are recorded on the route, keep them.
    documents.save(db).await?;
    let rows = outcome?;

    let route = RouteTarget::from_object_path(&event.name)?.route_path();
    let status = route_status(&*documents, &route).await?;
    println!(
        "source={}/{} route={} rows={} status={}",
        event.bucket,
        event.name,
        route,
        rows,
        status.map(|s| s.to_string()).unwrap_or_default()
    );
    Ok(())
}
