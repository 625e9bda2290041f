//! Create-or-update planning against the remote store, and its execution.

use std::{collections::HashSet, fmt, time::Duration};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::{Error, EventId, MaterializedEvent, Result, gateway::RemoteGateway};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// The remote store already holds this event and update mode is off
    AlreadyExists(EventId),
    /// An identical event was planned earlier in the same run
    DuplicateInRun,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists(id) => write!(f, "already exists (id {})", id),
            Self::DuplicateInRun => write!(f, "duplicate of an earlier event in this run"),
        }
    }
}

/// Decision for one materialized event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Create {
        event: MaterializedEvent,
    },
    Update {
        id: EventId,
        event: MaterializedEvent,
    },
    Skip {
        reason: SkipReason,
        event: MaterializedEvent,
    },
}

impl Action {
    pub fn event(&self) -> &MaterializedEvent {
        match self {
            Self::Create { event } | Self::Update { event, .. } | Self::Skip { event, .. } => event,
        }
    }
}

/// Decides, event by event, whether to create, update or skip
#[derive(Debug, Default)]
pub struct Planner {
    update_mode: bool,
    seen: HashSet<(String, NaiveDateTime)>,
}

impl Planner {
    pub fn new(update_mode: bool) -> Self {
        Self {
            update_mode,
            seen: HashSet::new(),
        }
    }

    /// Look the event up remotely and decide what to do with it.
    ///
    /// Only events passed to [`Planner::record`] count as seen, so an event
    /// whose write failed is not treated as a duplicate later in the run.
    pub async fn decide<G>(&self, event: &MaterializedEvent, gateway: &G) -> Result<Action>
    where
        G: RemoteGateway + ?Sized,
    {
        if self.seen.contains(&(event.title.clone(), event.start_datetime)) {
            return Ok(Action::Skip {
                reason: SkipReason::DuplicateInRun,
                event: event.clone(),
            });
        }

        let existing = gateway.find(&event.title, event.start_datetime).await?;

        let event = event.clone();
        Ok(match existing {
            None => Action::Create { event },
            Some(id) if self.update_mode => Action::Update { id, event },
            Some(id) => Action::Skip {
                reason: SkipReason::AlreadyExists(id),
                event,
            },
        })
    }

    /// Mark the event as handled in this run
    pub fn record(&mut self, event: &MaterializedEvent) {
        let (title, start) = event.identity();
        self.seen.insert((title.to_string(), start));
    }

    /// Decide every event, in input order
    pub async fn plan<G>(&mut self, events: &[MaterializedEvent], gateway: &G) -> Result<Vec<Action>>
    where
        G: RemoteGateway + ?Sized,
    {
        let mut actions = Vec::with_capacity(events.len());
        for event in events {
            let action = self.decide(event, gateway).await?;
            self.record(event);
            actions.push(action);
        }
        Ok(actions)
    }
}

/// What to do after a failure that only affects one event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failed event
    #[default]
    Abort,
    /// Record the failure and carry on with the next event
    Continue,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub dry_run: bool,
    pub update_mode: bool,
    pub failure_policy: FailurePolicy,
    /// Pause after every remote write
    pub delay: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            update_mode: false,
            failure_policy: FailurePolicy::Abort,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
pub enum Status {
    WouldCreate,
    WouldUpdate(EventId),
    Created(EventId),
    Updated(EventId),
    Skipped(SkipReason),
    Failed(Error),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WouldCreate => write!(f, "would create"),
            Self::WouldUpdate(id) => write!(f, "would update {}", id),
            Self::Created(id) => write!(f, "created {}", id),
            Self::Updated(id) => write!(f, "updated {}", id),
            Self::Skipped(reason) => write!(f, "skipped: {}", reason),
            Self::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// One processed event
#[derive(Debug)]
pub struct Processed {
    pub event: MaterializedEvent,
    pub status: Status,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    /// Events in the order they were processed
    pub processed: Vec<Processed>,
    /// Events that were never reached
    pub remaining: Vec<MaterializedEvent>,
    /// Whether processing stopped before the end
    pub halted: bool,
}

impl SyncReport {
    pub fn failures(&self) -> impl Iterator<Item = &Processed> {
        self.processed
            .iter()
            .filter(|p| matches!(p.status, Status::Failed(_)))
    }

    /// The error that halted the run, if any
    pub fn fatal_error(&self) -> Option<&Error> {
        self.processed.iter().rev().find_map(|p| match &p.status {
            Status::Failed(e) if e.is_fatal() => Some(e),
            _ => None,
        })
    }

    pub fn count(&self, f: impl Fn(&Status) -> bool) -> usize {
        self.processed.iter().filter(|p| f(&p.status)).count()
    }

    pub fn is_success(&self) -> bool {
        !self.halted && self.failures().next().is_none()
    }
}

/// Runs the planner and applies each decision before moving on
pub struct Synchronizer<'a, G: RemoteGateway + ?Sized> {
    gateway: &'a G,
    options: SyncOptions,
}

impl<'a, G: RemoteGateway + ?Sized> Synchronizer<'a, G> {
    pub fn new(gateway: &'a G, options: SyncOptions) -> Self {
        Self { gateway, options }
    }

    async fn apply(&self, action: &Action) -> Result<Status> {
        Ok(match action {
            Action::Skip { reason, .. } => Status::Skipped(*reason),
            Action::Create { .. } if self.options.dry_run => Status::WouldCreate,
            Action::Update { id, .. } if self.options.dry_run => Status::WouldUpdate(*id),
            Action::Create { event } => Status::Created(self.gateway.create(event).await?),
            Action::Update { id, event } => Status::Updated(self.gateway.update(*id, event).await?),
        })
    }

    /// Process events one at a time, in order.
    ///
    /// A fatal error always stops the run. Other failures stop it only under
    /// [`FailurePolicy::Abort`]. Everything processed before the stop is kept
    /// in the report, so a later run resumes through the idempotent lookup.
    pub async fn run(&self, events: Vec<MaterializedEvent>) -> SyncReport {
        let mut planner = Planner::new(self.options.update_mode);
        let mut report = SyncReport::default();
        let mut queue = events.into_iter();

        while let Some(event) = queue.next() {
            let result = match planner.decide(&event, self.gateway).await {
                Ok(action) => {
                    let writes = !self.options.dry_run && !matches!(action, Action::Skip { .. });
                    let status = self.apply(&action).await;
                    if writes && !self.options.delay.is_zero() {
                        tokio::time::sleep(self.options.delay).await;
                    }
                    status
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(status) => {
                    planner.record(&event);
                    report.processed.push(Processed { event, status });
                }
                Err(e) => {
                    let stop =
                        e.is_fatal() || self.options.failure_policy == FailurePolicy::Abort;
                    tracing::warn!("{} at {}: {}", event.title, event.start_datetime, e);
                    report.processed.push(Processed {
                        event,
                        status: Status::Failed(e),
                    });
                    if stop {
                        report.halted = true;
                        report.remaining = queue.collect();
                        break;
                    }
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests;
