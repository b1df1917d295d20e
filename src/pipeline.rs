use crate::config::Settings;
use crate::delimiter::{detect_delimiter, first_line};
use crate::encoding::EncodingResolver;
use crate::hierarchy::{HierarchyWriter, RouteTarget};
use crate::io::decompress;
use crate::objects::ObjectStore;
use crate::schema::RowReader;
use crate::status::StatusTracker;
use crate::store::DocumentStore;
use crate::IngestResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Object-created notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadEvent {
    pub bucket: String,
    pub name: String,
}

impl UploadEvent {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
        }
    }
}

/// Handles upload events: one independent, stateless run per object.
pub struct Ingestor {
    documents: Arc<dyn DocumentStore>,
    objects: Arc<dyn ObjectStore>,
    resolver: EncodingResolver,
    write_concurrency: usize,
}

impl Ingestor {
    pub fn new(documents: Arc<dyn DocumentStore>, objects: Arc<dyn ObjectStore>) -> Self {
        Self {
            documents,
            objects,
            resolver: EncodingResolver::default(),
            write_concurrency: Settings::default().write_concurrency,
        }
    }

    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.write_concurrency = settings.write_concurrency.max(1);
        self
    }

    pub fn with_write_concurrency(mut self, concurrency: usize) -> Self {
        self.write_concurrency = concurrency.max(1);
        self
    }

    /// Replace the default candidate encodings.
    pub fn with_encoding_resolver(mut self, resolver: EncodingResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Load one uploaded object. Returns the number of rows written.
    ///
    /// Path, delimiter and header problems fail before anything is written.
    /// Failures while writing are recorded on the route and then returned.
    pub async fn ingest(&self, event: &UploadEvent) -> IngestResult<usize> {
        let started = Instant::now();
        let target = RouteTarget::from_object_path(&event.name)?;

        let object = self
            .objects
            .read_object(&event.bucket, &event.name)
            .await?;
        let raw = decompress(object.data, &object.meta).await?;
        let decoded = self.resolver.decode(&raw);
        if decoded.lossy {
            warn!(
                name = %event.name,
                encoding = decoded.encoding.name(),
                "object decoded with replacement characters"
            );
        }

        let delimiter = detect_delimiter(first_line(&decoded.text))?;
        let rows = RowReader::from_text(decoded.text, delimiter).await?;
        debug!(
            name = %event.name,
            %delimiter,
            header_skipped = rows.header_skipped(),
            "parsed object header"
        );

        let route = target.route_path();
        let writer = HierarchyWriter::new(self.documents.clone(), target)
            .with_concurrency(self.write_concurrency);
        let tracker = StatusTracker::new(self.documents.clone(), route.clone());
        let written = tracker.track(writer.write(rows.into_stream())).await?;

        info!(
            bucket = %event.bucket,
            name = %event.name,
            route = %route,
            rows = written,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "processed object"
        );
        Ok(written)
    }
}
