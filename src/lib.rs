//! Meter-reading route ingestion.
//!
//! Uploaded CSV objects (`<client>/<locality>/<route>.csv`, optionally gzip or
//! zstd compressed) are decoded, reconciled against the canonical field list
//! and written into a document hierarchy:
//!
//! - `Clientes/{client}/Localidades/{locality}` holds the set of route references
//! - `Rutas/{route}` links back to its client and locality and tracks status
//! - `Rutas/{route}/RutaRecorrido/{ordinal}` holds one normalized reading per row
//!
//! Routes can later be exported back to CSV (see [`Exporter`]).
#![cfg_attr(docsrs, feature(doc_cfg))]
//
pub mod config;
mod delimiter;
mod encoding;
mod export;
mod hierarchy;
mod io;
mod normalize;
pub mod objects;
mod pipeline;
pub mod schema;
mod status;
pub mod store;

pub use crate::config::{init_tracing, Settings};
pub use crate::delimiter::{detect_delimiter, first_line, Delimiter};
pub use crate::encoding::{decode_text, default_candidates, DecodedText, EncodingResolver};
pub use crate::export::{sorted_rows, ExportSummary, Exporter};
pub use crate::hierarchy::{HierarchyWriter, RouteTarget};
pub use crate::io::{decompress, strip_compression_suffix, Compression, ObjectMeta};
pub use crate::normalize::{normalize_field, normalize_row, normalize_value};
pub use crate::pipeline::{Ingestor, UploadEvent};
pub use crate::schema::{RowReader, SourceRow, CANONICAL_FIELDS};
pub use crate::status::{route_status, RouteStatus, StatusTracker};

use thiserror::Error;

/// Error type returned by the ingestion and export pipelines.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unknown delimiter: first line contains neither ';' nor ','")]
    UnknownDelimiter,
    #[error("Invalid path structure: expected <client>/<locality>/<file>, got '{0}'")]
    InvalidPathStructure(String),
    #[error("Failed to write {target}: {source}")]
    RowWrite {
        target: String,
        #[source]
        source: store::StoreError,
    },
    #[error("Route not found: {0}")]
    RouteNotFound(String),
    #[error(transparent)]
    Store(#[from] store::StoreError),
    #[error(transparent)]
    Object(#[from] objects::ObjectError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv_async::Error),
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;
