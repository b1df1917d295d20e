use crate::io::strip_compression_suffix;
use crate::normalize::normalize_row;
use crate::schema::{collections, route_fields, SourceRow, LOCALITY_ROUTES};
use crate::store::{CollectionPath, DocPath, DocumentStore, Fields, Value};
use crate::{IngestError, IngestResult};
use futures::{Stream, StreamExt, TryStreamExt};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Where an uploaded object lands in the document hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    pub client_id: String,
    pub locality_id: String,
    pub route_id: String,
}

impl RouteTarget {
    /// Derive identifiers from `<client>/<locality>/.../<file>`.
    pub fn from_object_path(object_path: &str) -> IngestResult<Self> {
        let invalid = || IngestError::InvalidPathStructure(object_path.to_string());

        let segments: Vec<&str> = object_path.split('/').collect();
        if segments.len() < 3 {
            return Err(invalid());
        }

        let file_name = strip_compression_suffix(segments[segments.len() - 1]);
        let route_id = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();

        let (client_id, locality_id) = (segments[0], segments[1]);
        if client_id.is_empty() || locality_id.is_empty() || route_id.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            client_id: client_id.to_string(),
            locality_id: locality_id.to_string(),
            route_id: route_id.to_string(),
        })
    }

    pub fn client_path(&self) -> DocPath {
        DocPath::root(collections::CLIENTS, &self.client_id)
    }

    pub fn locality_path(&self) -> DocPath {
        self.client_path()
            .child(collections::LOCALITIES, &self.locality_id)
    }

    pub fn route_path(&self) -> DocPath {
        DocPath::root(collections::ROUTES, &self.route_id)
    }

    pub fn rows_collection(&self) -> CollectionPath {
        self.route_path().collection(collections::ROUTE_ROWS)
    }
}

/// Writes a route, its parent links and its rows.
pub struct HierarchyWriter {
    store: Arc<dyn DocumentStore>,
    target: RouteTarget,
    concurrency: usize,
}

impl HierarchyWriter {
    pub fn new(store: Arc<dyn DocumentStore>, target: RouteTarget) -> Self {
        Self {
            store,
            target,
            concurrency: 16,
        }
    }

    /// Maximum outstanding row writes.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Point the route at its client and locality, and add it to the locality's route set.
    pub async fn link_parents(&self) -> IngestResult<()> {
        let route = self.target.route_path();
        let locality = self.target.locality_path();

        let mut links = Fields::new();
        links.insert(
            route_fields::CLIENT.to_string(),
            Value::Reference(self.target.client_path().to_ref()),
        );
        links.insert(
            route_fields::LOCALITY.to_string(),
            Value::Reference(locality.to_ref()),
        );
        self.store
            .upsert_merge(&route, links)
            .await
            .map_err(|source| IngestError::RowWrite {
                target: route.to_string(),
                source,
            })?;

        self.store
            .array_union_merge(&locality, LOCALITY_ROUTES, Value::Reference(route.to_ref()))
            .await
            .map_err(|source| IngestError::RowWrite {
                target: locality.to_string(),
                source,
            })?;
        debug!(route = %route, locality = %locality, "linked route to its parents");
        Ok(())
    }

    async fn write_row(&self, rows: &CollectionPath, row: SourceRow) -> IngestResult<()> {
        let key = row.ordinal.to_string();
        self.store
            .set_indexed(rows, &key, normalize_row(&row))
            .await
            .map_err(|source| IngestError::RowWrite {
                target: rows.doc(&key).to_string(),
                source,
            })
    }

    /// Normalize and write every row under its ordinal. Returns the number written.
    ///
    /// Up to `concurrency` writes are outstanding at once; the first failure
    /// stops the pass.
    pub async fn write_rows<S>(&self, rows: S) -> IngestResult<usize>
    where
        S: Stream<Item = IngestResult<SourceRow>>,
    {
        let collection = self.target.rows_collection();
        let collection = &collection;
        rows.map(|row| async move { self.write_row(collection, row?).await })
            .buffer_unordered(self.concurrency)
            .try_fold(0usize, |written, ()| async move { Ok(written + 1) })
            .await
    }

    /// Link the parents, then write the rows.
    pub async fn write<S>(&self, rows: S) -> IngestResult<usize>
    where
        S: Stream<Item = IngestResult<SourceRow>>,
    {
        self.link_parents().await?;
        self.write_rows(rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_come_from_the_path() {
        let target = RouteTarget::from_object_path("ClienteA/Zona1/ruta7.csv").unwrap();
        assert_eq!(target.client_id, "ClienteA");
        assert_eq!(target.locality_id, "Zona1");
        assert_eq!(target.route_id, "ruta7");
        assert_eq!(target.route_path().as_str(), "Rutas/ruta7");
        assert_eq!(
            target.locality_path().as_str(),
            "Clientes/ClienteA/Localidades/Zona1"
        );
        assert_eq!(
            target.rows_collection().as_str(),
            "Rutas/ruta7/RutaRecorrido"
        );
    }

    #[test]
    fn deeper_paths_and_compressed_names() {
        let target = RouteTarget::from_object_path("A/B/2024/ruta.9.csv.gz").unwrap();
        assert_eq!(target.client_id, "A");
        assert_eq!(target.locality_id, "B");
        assert_eq!(target.route_id, "ruta.9");
    }

    #[test]
    fn short_or_empty_paths_are_rejected() {
        for path in ["onlyfile.csv", "A/ruta.csv", "/A/ruta.csv", "A//ruta.csv", "A/B/"] {
            assert!(
                matches!(
                    RouteTarget::from_object_path(path),
                    Err(IngestError::InvalidPathStructure(_))
                ),
                "{path}"
            );
        }
    }
}
