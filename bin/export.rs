use clap::{Arg, ArgAction, ArgGroup, Command};
use route_ingest::objects::LocalObjectStore;
use route_ingest::store::MemoryStore;
use route_ingest::{init_tracing, Exporter, Settings};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new("export")
        .about("Export routes back to CSV")
        .arg(Arg::new("root").long("root").required(true).value_parser(clap::value_parser!(PathBuf)).help("Directory holding one sub-directory per bucket"))
        .arg(Arg::new("db").long("db").default_value("routes.json").value_parser(clap::value_parser!(PathBuf)).help("JSON snapshot of the document store"))
        .arg(Arg::new("client").long("client").requires_all(["locality", "route"]))
        .arg(Arg::new("locality").long("locality"))
        .arg(Arg::new("route").long("route"))
        .arg(Arg::new("all").long("all").help("Export every route with rows").action(ArgAction::SetTrue))
        .group(ArgGroup::new("mode").args(["client", "all"]).required(true))
        .args(Settings::args())
        .get_matches();

    init_tracing();
    let settings = Settings::from_matches(&matches);
    let root = matches.get_one::<PathBuf>("root").unwrap();
    let db = matches.get_one::<PathBuf>("db").unwrap();

    let documents = Arc::new(MemoryStore::load(db).await?);
    let objects = Arc::new(LocalObjectStore::new(root, settings.public_base_url.clone()));
    let exporter = Exporter::new(documents.clone(), objects, &settings);

    if matches.get_flag("all") {
        let files = exporter.export_all_routes().await?;
        for file in &files {
            println!("{}/{}", exporter.export_bucket(), file);
        }
        println!("exported={}", files.len());
        return Ok(());
    }

    let summary = exporter
        .export_route(
            matches.get_one::<String>("client").unwrap(),
            matches.get_one::<String>("locality").unwrap(),
            matches.get_one::<String>("route").unwrap(),
        )
        .await?;
    // The completion percentage was stored on the route.
    documents.save(db).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
