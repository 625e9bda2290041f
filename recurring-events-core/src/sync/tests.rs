use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tokio_test::block_on;

use super::*;
use crate::{
    EventTemplate,
    gateway::{RemoteEvent, offline::OfflineGateway},
    materialize::materialize,
};

/// Remote store held in memory
#[derive(Default)]
struct MemoryGateway {
    events: Mutex<Vec<RemoteEvent>>,
    /// Titles whose create call fails, with the error to return
    failing: Mutex<Vec<(String, fn() -> Error)>>,
    /// Titles whose next create call fails once
    failing_once: Mutex<Vec<String>>,
    /// Make every lookup fail
    lookup_error: Option<fn() -> Error>,
    calls: Mutex<Vec<String>>,
}

impl MemoryGateway {
    fn fail_create(&self, title: &str, error: fn() -> Error) {
        self.failing
            .lock()
            .unwrap()
            .push((title.to_string(), error));
    }

    fn fail_create_once(&self, title: &str) {
        self.failing_once.lock().unwrap().push(title.to_string());
    }

    fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteGateway for MemoryGateway {
    fn name(&self) -> &str {
        "memory"
    }

    async fn find(&self, title: &str, start: NaiveDateTime) -> Result<Option<EventId>> {
        self.calls.lock().unwrap().push(format!("find {}", title));
        if let Some(error) = self.lookup_error {
            return Err(error());
        }
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.title == title && e.start_datetime == start)
            .map(|e| e.id))
    }

    async fn create(&self, event: &MaterializedEvent) -> Result<EventId> {
        self.calls.lock().unwrap().push(format!("create {}", event.title));
        if let Some((_, error)) = self
            .failing
            .lock()
            .unwrap()
            .iter()
            .find(|(title, _)| *title == event.title)
        {
            return Err(error());
        }
        {
            let mut once = self.failing_once.lock().unwrap();
            if let Some(pos) = once.iter().position(|t| *t == event.title) {
                once.remove(pos);
                return Err(transient_error());
            }
        }

        let mut events = self.events.lock().unwrap();
        let id = EventId(1000 + events.len() as u64);
        events.push(RemoteEvent {
            id,
            title: event.title.clone(),
            start_datetime: event.start_datetime,
            end_datetime: Some(event.end_datetime),
        });
        Ok(id)
    }

    async fn update(&self, id: EventId, event: &MaterializedEvent) -> Result<EventId> {
        self.calls.lock().unwrap().push(format!("update {}", event.title));
        let mut events = self.events.lock().unwrap();
        let existing = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| Error::RemoteRejected {
                status: 404,
                message: "no such event".to_string(),
            })?;
        existing.end_datetime = Some(event.end_datetime);
        Ok(id)
    }

    async fn list(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<RemoteEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| (from..=to).contains(&e.start_datetime.date()))
            .cloned()
            .collect())
    }
}

fn template(key: &str, title: &str, start: (u32, u32), end: (u32, u32)) -> EventTemplate {
    EventTemplate {
        key: key.to_string(),
        title: title.to_string(),
        description: title.to_string(),
        excerpt: None,
        start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        tags: Vec::new(),
        categories: Vec::new(),
        image: None,
        venue: None,
        organiser: None,
    }
}

/// Morning and evening services on the first three Sundays of 2026
fn sunday_events() -> Vec<MaterializedEvent> {
    let morning = template("morning", "Holy Communion", (10, 0), (11, 15));
    let evening = template("evensong", "Evensong", (18, 30), (19, 45));
    let mut events = Vec::new();
    for day in [4, 11, 18] {
        let date = NaiveDate::from_ymd_opt(2026, 1, day).unwrap();
        events.push(materialize(&morning, date));
        events.push(materialize(&evening, date));
    }
    events
}

fn options(dry_run: bool, update_mode: bool) -> SyncOptions {
    SyncOptions {
        dry_run,
        update_mode,
        failure_policy: FailurePolicy::Abort,
        delay: Duration::ZERO,
    }
}

fn auth_error() -> Error {
    Error::RemoteAuth("rest_cannot_create".to_string())
}

fn transient_error() -> Error {
    Error::RemoteTransient("503 Service Unavailable".to_string())
}

#[test]
fn test_plan_creates_missing_events_in_order() {
    let gateway = MemoryGateway::default();
    let events = sunday_events();

    let actions = block_on(Planner::new(false).plan(&events, &gateway)).unwrap();

    assert_eq!(actions.len(), events.len());
    assert!(actions.iter().all(|a| matches!(a, Action::Create { .. })));
    assert!(
        actions
            .windows(2)
            .all(|pair| pair[0].event().start_datetime <= pair[1].event().start_datetime)
    );
    let titles: Vec<_> = actions.iter().map(|a| a.event().title.as_str()).collect();
    let expected: Vec<_> = events.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, expected);
}

#[test]
fn test_second_run_skips_everything() {
    let gateway = MemoryGateway::default();
    let events = sunday_events();

    let report = block_on(Synchronizer::new(&gateway, options(false, false)).run(events.clone()));
    assert!(report.is_success());
    assert_eq!(report.count(|s| matches!(s, Status::Created(_))), events.len());
    assert_eq!(gateway.len(), events.len());

    let actions = block_on(Planner::new(false).plan(&events, &gateway)).unwrap();
    assert!(actions.iter().all(|a| matches!(
        a,
        Action::Skip {
            reason: SkipReason::AlreadyExists(_),
            ..
        }
    )));

    // and a second live run leaves the store untouched
    let report = block_on(Synchronizer::new(&gateway, options(false, false)).run(events.clone()));
    assert_eq!(report.count(|s| matches!(s, Status::Skipped(_))), events.len());
    assert_eq!(gateway.len(), events.len());
}

#[test]
fn test_update_mode_updates_existing() {
    let gateway = MemoryGateway::default();
    let events = sunday_events();
    block_on(Synchronizer::new(&gateway, options(false, false)).run(events[..2].to_vec()));

    let actions = block_on(Planner::new(true).plan(&events, &gateway)).unwrap();
    match &actions[0] {
        Action::Update { id, event } => {
            assert_eq!(*id, EventId(1000));
            assert_eq!(event.title, events[0].title);
        }
        other => panic!("expected update, got {:?}", other),
    }
    assert!(matches!(actions[1], Action::Update { id: EventId(1001), .. }));
    assert!(actions[2..].iter().all(|a| matches!(a, Action::Create { .. })));

    let report = block_on(Synchronizer::new(&gateway, options(false, true)).run(events.clone()));
    assert_eq!(report.count(|s| matches!(s, Status::Updated(_))), 2);
    assert_eq!(report.count(|s| matches!(s, Status::Created(_))), 4);
    assert_eq!(gateway.len(), events.len());
}

#[test]
fn test_dry_run_matches_plan_without_writes() {
    let gateway = MemoryGateway::default();
    let events = sunday_events();
    block_on(Synchronizer::new(&gateway, options(false, false)).run(events[..1].to_vec()));
    let calls_before = gateway.calls().len();

    let actions = block_on(Planner::new(false).plan(&events, &gateway)).unwrap();
    let report = block_on(Synchronizer::new(&gateway, options(true, false)).run(events.clone()));

    assert!(report.is_success());
    assert_eq!(report.processed.len(), actions.len());
    for (processed, action) in report.processed.iter().zip(&actions) {
        assert_eq!(&processed.event, action.event());
        match (action, &processed.status) {
            (Action::Create { .. }, Status::WouldCreate) => {}
            (Action::Skip { reason: a, .. }, Status::Skipped(b)) => assert_eq!(a, b),
            (a, s) => panic!("dry run diverged from plan: {:?} vs {}", a, s),
        }
    }

    // only lookups happened
    let new_calls = &gateway.calls()[calls_before..];
    assert!(new_calls.iter().all(|c| c.starts_with("find ")));
    assert_eq!(gateway.len(), 1);
}

#[test]
fn test_dry_run_update_mode_reports_would_update() {
    let gateway = MemoryGateway::default();
    let events = sunday_events();
    block_on(Synchronizer::new(&gateway, options(false, false)).run(events[..1].to_vec()));

    let report = block_on(Synchronizer::new(&gateway, options(true, true)).run(events));
    assert!(matches!(report.processed[0].status, Status::WouldUpdate(EventId(1000))));
    assert!(matches!(report.processed[1].status, Status::WouldCreate));
}

#[test]
fn test_duplicate_in_run_is_skipped() {
    let gateway = MemoryGateway::default();
    let mut events = sunday_events();
    events.insert(1, events[0].clone());

    let actions = block_on(Planner::new(false).plan(&events, &gateway)).unwrap();
    assert!(matches!(actions[0], Action::Create { .. }));
    assert!(matches!(
        actions[1],
        Action::Skip {
            reason: SkipReason::DuplicateInRun,
            ..
        }
    ));

    let report = block_on(Synchronizer::new(&gateway, options(false, false)).run(events.clone()));
    assert!(report.is_success());
    assert_eq!(gateway.len(), events.len() - 1);
}

#[test]
fn test_auth_failure_halts_run() {
    let gateway = MemoryGateway::default();
    let events = sunday_events();
    gateway.fail_create(&events[2].title, auth_error);

    let mut opts = options(false, false);
    opts.failure_policy = FailurePolicy::Continue;
    let report = block_on(Synchronizer::new(&gateway, opts).run(events.clone()));

    assert!(report.halted);
    assert!(!report.is_success());
    assert_eq!(report.processed.len(), 3);
    assert_eq!(report.count(|s| matches!(s, Status::Created(_))), 2);
    assert!(matches!(report.fatal_error(), Some(Error::RemoteAuth(_))));
    assert_eq!(report.processed[2].event, events[2]);
    assert_eq!(report.remaining, events[3..].to_vec());
    // events created before the failure stay created
    assert_eq!(gateway.len(), 2);
}

#[test]
fn test_transient_failure_policy() {
    let events = sunday_events();

    // Continue: the failed event is recorded and the run goes on
    let gateway = MemoryGateway::default();
    gateway.fail_create(&events[1].title, transient_error);
    let mut opts = options(false, false);
    opts.failure_policy = FailurePolicy::Continue;
    let report = block_on(Synchronizer::new(&gateway, opts).run(events.clone()));

    assert!(!report.halted);
    assert_eq!(report.processed.len(), events.len());
    let failed: Vec<_> = report.failures().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].event.identity(), events[1].identity());
    assert!(report.fatal_error().is_none());
    assert_eq!(gateway.len(), events.len() - 1);

    // Abort: stop at the failed event
    let gateway = MemoryGateway::default();
    gateway.fail_create(&events[1].title, transient_error);
    let report = block_on(Synchronizer::new(&gateway, options(false, false)).run(events.clone()));

    assert!(report.halted);
    assert_eq!(report.processed.len(), 2);
    assert_eq!(report.remaining.len(), events.len() - 2);
    assert_eq!(gateway.len(), 1);
}

#[test]
fn test_resume_after_partial_failure() {
    let events = sunday_events();
    let gateway = MemoryGateway::default();
    gateway.fail_create(&events[3].title, transient_error);
    block_on(Synchronizer::new(&gateway, options(false, false)).run(events.clone()));
    assert_eq!(gateway.len(), 3);

    gateway.failing.lock().unwrap().clear();
    let report = block_on(Synchronizer::new(&gateway, options(false, false)).run(events.clone()));

    assert!(report.is_success());
    assert_eq!(report.count(|s| matches!(s, Status::Skipped(_))), 3);
    assert_eq!(report.count(|s| matches!(s, Status::Created(_))), 3);
    assert_eq!(gateway.len(), events.len());
}

#[test]
fn test_lookup_failure_is_reported() {
    let gateway = MemoryGateway {
        lookup_error: Some(auth_error),
        ..Default::default()
    };
    let events = sunday_events();

    assert!(matches!(
        block_on(Planner::new(false).plan(&events, &gateway)),
        Err(Error::RemoteAuth(_))
    ));

    let report = block_on(Synchronizer::new(&gateway, options(true, false)).run(events.clone()));
    assert!(report.halted);
    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.remaining.len(), events.len() - 1);
    assert_eq!(gateway.len(), 0);
}

#[test]
fn test_failed_create_is_retried_for_a_later_duplicate() {
    let gateway = MemoryGateway::default();
    let mut events = sunday_events();
    events.insert(1, events[0].clone());
    gateway.fail_create_once(&events[0].title);

    let mut opts = options(false, false);
    opts.failure_policy = FailurePolicy::Continue;
    let report = block_on(Synchronizer::new(&gateway, opts).run(events.clone()));

    assert!(matches!(report.processed[0].status, Status::Failed(Error::RemoteTransient(_))));
    assert!(matches!(report.processed[1].status, Status::Created(_)));
    assert_eq!(report.count(|s| matches!(s, Status::Skipped(_))), 0);
    assert_eq!(gateway.len(), events.len() - 1);
}

#[test]
fn test_offline_dry_run_would_create_everything() {
    let mut events = sunday_events();
    events.insert(1, events[0].clone());

    let actions = block_on(Planner::new(false).plan(&events, &OfflineGateway)).unwrap();
    assert!(matches!(actions[0], Action::Create { .. }));
    assert!(matches!(
        actions[1],
        Action::Skip {
            reason: SkipReason::DuplicateInRun,
            ..
        }
    ));

    let report = block_on(Synchronizer::new(&OfflineGateway, options(true, true)).run(events.clone()));
    assert!(report.is_success());
    assert_eq!(report.processed.len(), events.len());
    assert_eq!(report.count(|s| matches!(s, Status::WouldCreate)), events.len() - 1);
    assert!(matches!(
        report.processed[1].status,
        Status::Skipped(SkipReason::DuplicateInRun)
    ));

    // a live run has nowhere to write
    let report = block_on(Synchronizer::new(&OfflineGateway, options(false, false)).run(events));
    assert!(report.halted);
    assert!(matches!(report.fatal_error(), Some(Error::Config(_))));
}
