//! Stand-in remote store for previewing a run without a site.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::{
    Error, EventId, MaterializedEvent, Result,
    gateway::{RemoteEvent, RemoteGateway},
};

/// Remote store that holds nothing and accepts no writes.
///
/// Every lookup misses, so a dry run against it reports each event as a
/// create. Writes fail with a fatal error.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineGateway;

fn refuse(operation: &str) -> Error {
    Error::Config(format!(
        "cannot {} events offline, set WORDPRESS_SERVER, WORDPRESS_USER and WORDPRESS_PASSWORD",
        operation
    ))
}

#[async_trait]
impl RemoteGateway for OfflineGateway {
    fn name(&self) -> &str {
        "offline"
    }

    async fn find(&self, _title: &str, _start: NaiveDateTime) -> Result<Option<EventId>> {
        Ok(None)
    }

    async fn create(&self, _event: &MaterializedEvent) -> Result<EventId> {
        Err(refuse("create"))
    }

    async fn update(&self, _id: EventId, _event: &MaterializedEvent) -> Result<EventId> {
        Err(refuse("update"))
    }

    async fn list(&self, _from: NaiveDate, _to: NaiveDate) -> Result<Vec<RemoteEvent>> {
        Ok(Vec::new())
    }
}
