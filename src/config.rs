//! Runtime settings shared by the binaries, resolved from flags with
//! environment fallbacks.

use clap::{Arg, ArgMatches};
use tracing_subscriber::EnvFilter;

pub const DEFAULT_EXPORT_BUCKET: &str = "testados-rutas-exportadas";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "https://storage.googleapis.com";
pub const DEFAULT_WRITE_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Bucket receiving exported CSV files.
    pub export_bucket: String,
    /// Maximum outstanding row writes per ingestion.
    pub write_concurrency: usize,
    /// Prefix of public object URLs.
    pub public_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            export_bucket: DEFAULT_EXPORT_BUCKET.to_string(),
            write_concurrency: DEFAULT_WRITE_CONCURRENCY,
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
        }
    }
}

impl Settings {
    /// Flags understood by [`Settings::from_matches`].
    pub fn args() -> [Arg; 3] {
        [
            Arg::new("export-bucket")
                .long("export-bucket")
                .env("EXPORT_BUCKET_NAME")
                .default_value(DEFAULT_EXPORT_BUCKET)
                .help("Bucket receiving exported CSV files"),
            Arg::new("write-concurrency")
                .long("write-concurrency")
                .env("ROUTE_INGEST_WRITE_CONCURRENCY")
                .value_parser(clap::value_parser!(u16).range(1..))
                .default_value("16")
                .help("Maximum outstanding row writes per ingestion"),
            Arg::new("public-base-url")
                .long("public-base-url")
                .env("ROUTE_INGEST_PUBLIC_BASE_URL")
                .default_value(DEFAULT_PUBLIC_BASE_URL)
                .help("Prefix of public object URLs"),
        ]
    }

    pub fn from_matches(matches: &ArgMatches) -> Self {
        let defaults = Self::default();
        Self {
            export_bucket: matches
                .get_one::<String>("export-bucket")
                .cloned()
                .unwrap_or(defaults.export_bucket),
            write_concurrency: matches
                .get_one::<u16>("write-concurrency")
                .map(|n| usize::from(*n))
                .unwrap_or(defaults.write_concurrency),
            public_base_url: matches
                .get_one::<String>("public-base-url")
                .cloned()
                .unwrap_or(defaults.public_base_url),
        }
    }
}

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
