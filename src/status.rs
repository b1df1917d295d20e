use crate::schema::route_fields;
use crate::store::{DocPath, DocumentStore, Fields, StoreError, Value};
use crate::{IngestError, IngestResult};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, warn};

/// Processing state stored on a route document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteStatus {
    Pending,
    Processing,
    Ok,
    Error,
}

impl RouteStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            RouteStatus::Pending => "pending",
            RouteStatus::Processing => "processing",
            RouteStatus::Ok => "ok",
            RouteStatus::Error => "error",
        }
    }
}

impl fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RouteStatus::Pending),
            "processing" => Ok(RouteStatus::Processing),
            "ok" => Ok(RouteStatus::Ok),
            "error" => Ok(RouteStatus::Error),
            other => Err(format!("unknown route status '{other}'")),
        }
    }
}

/// Status of a route, `None` when the route document does not exist.
/// A route without a status field is pending.
pub async fn route_status(
    store: &dyn DocumentStore,
    route: &DocPath,
) -> Result<Option<RouteStatus>, StoreError> {
    let Some(doc) = store.get(route).await? else {
        return Ok(None);
    };
    let status = doc
        .get(route_fields::STATUS)
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or(RouteStatus::Pending);
    Ok(Some(status))
}

/// Brackets the writes of one ingestion with status updates on the route.
pub struct StatusTracker {
    store: Arc<dyn DocumentStore>,
    route: DocPath,
}

impl StatusTracker {
    pub fn new(store: Arc<dyn DocumentStore>, route: DocPath) -> Self {
        Self { store, route }
    }

    async fn mark(&self, status: RouteStatus, mut fields: Fields) -> Result<(), StoreError> {
        fields.insert(
            route_fields::STATUS.to_string(),
            Value::String(status.as_str().to_string()),
        );
        fields.insert(route_fields::UPDATED_AT.to_string(), Value::ServerTimestamp);
        self.store.upsert_merge(&self.route, fields).await
    }

    /// Mark `processing`, run `work`, then mark `ok` with the row count or
    /// `error` with the failure message. The failure is returned unchanged.
    pub async fn track<F>(&self, work: F) -> IngestResult<usize>
    where
        F: Future<Output = IngestResult<usize>>,
    {
        self.mark(RouteStatus::Processing, Fields::new())
            .await
            .map_err(|source| IngestError::RowWrite {
                target: self.route.to_string(),
                source,
            })?;

        match work.await {
            Ok(rows) => {
                let mut fields = Fields::new();
                fields.insert(route_fields::ROW_COUNT.to_string(), Value::Integer(rows as i64));
                fields.insert(route_fields::ERROR.to_string(), Value::Null);
                self.mark(RouteStatus::Ok, fields)
                    .await
                    .map_err(|source| IngestError::RowWrite {
                        target: self.route.to_string(),
                        source,
                    })?;
                Ok(rows)
            }
            Err(err) => {
                let message = err.to_string();
                error!(route = %self.route, error = %message, "ingestion failed");
                let mut fields = Fields::new();
                fields.insert(route_fields::ERROR.to_string(), Value::String(message));
                if let Err(annotation) = self.mark(RouteStatus::Error, fields).await {
                    warn!(route = %self.route, error = %annotation, "could not record failure status");
                }
                Err(err)
            }
        }
    }
}
