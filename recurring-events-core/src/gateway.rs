pub mod base;
pub mod offline;
pub mod wordpress;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{EventId, MaterializedEvent, Result};

pub use base::*;

/// An event as it exists in the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub id: EventId,
    pub title: String,
    pub start_datetime: NaiveDateTime,
    pub end_datetime: Option<NaiveDateTime>,
}

/// Remote event store
///
/// Implementations must report authentication and authorization problems as
/// [`crate::Error::RemoteAuth`] so callers can tell them apart from failures
/// that only affect a single event.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Gateway name
    fn name(&self) -> &str;

    /// Look up an existing event by its title and start time
    async fn find(&self, title: &str, start: NaiveDateTime) -> Result<Option<EventId>>;

    /// Create a new event and return its identifier
    async fn create(&self, event: &MaterializedEvent) -> Result<EventId>;

    /// Overwrite an existing event
    async fn update(&self, id: EventId, event: &MaterializedEvent) -> Result<EventId>;

    /// Every event starting between `from` and `to`, both inclusive
    async fn list(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<RemoteEvent>>;
}
