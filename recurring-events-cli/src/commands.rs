use std::{path::Path, path::PathBuf, time::Duration};

use anyhow::{Result, bail};
use chrono::{Local, NaiveDate, Weekday};
use recurring_events_core::{
    MaterializedEvent, RecurrenceRule, Schedule, Window,
    config::{Connection, load_schedule},
    gateway::{
        RemoteGateway, offline::OfflineGateway, wordpress::WordPressGateway,
        wordpress::normalize_title,
    },
    materialize::{materialize_all, ordinal},
    sync::{FailurePolicy, Planner, Status, SyncOptions, SyncReport, Synchronizer},
};

/// Parameters of the sync command
pub struct SyncParams {
    pub config: PathBuf,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub weeks: Option<u32>,
    pub days: Vec<Weekday>,
    pub events: Vec<String>,
    pub update: bool,
    pub dry_run: bool,
    pub keep_going: bool,
    pub delay: u64,
    pub offline: bool,
    pub json: bool,
}

fn window(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>, weeks: Option<u32>) -> Result<Window> {
    let start_date = start_date.unwrap_or_else(|| Local::now().date_naive());
    Ok(Window::new(start_date, end_date, weeks)?)
}

fn connect(schedule: &Schedule) -> Result<WordPressGateway> {
    let connection = Connection::from_env()?;
    let gateway = WordPressGateway::new(&connection, schedule.slugs.clone())?;
    tracing::debug!("Using {} at {}", gateway.description(), connection.server);
    Ok(gateway)
}

/// Gateway for a sync run. Dry runs fall back to offline planning when no
/// connection is configured.
fn sync_gateway(schedule: &Schedule, dry_run: bool, offline: bool) -> Result<Box<dyn RemoteGateway>> {
    if offline {
        return Ok(Box::new(OfflineGateway));
    }
    if dry_run && Connection::from_env().is_err() {
        tracing::warn!("No WordPress connection configured, planning offline");
        return Ok(Box::new(OfflineGateway));
    }
    Ok(Box::new(connect(schedule)?))
}

fn print_event_details(event: &MaterializedEvent) {
    println!("      key:        {}", event.key);
    println!("      excerpt:    {}", event.excerpt);
    println!("      desc:       {}", event.description);
    if !event.tags.is_empty() {
        println!("      tags:       {}", event.tags.join(", "));
    }
    if !event.categories.is_empty() {
        println!("      categories: {}", event.categories.join(", "));
    }
    if let Some(ref venue) = event.venue {
        println!("      venue:      {}", venue);
    }
    if let Some(ref organiser) = event.organiser {
        println!("      organiser:  {}", organiser);
    }
    if let Some(image) = event.image {
        println!("      image:      {}", image);
    }
}

fn print_report(report: &SyncReport, dry_run: bool) {
    for processed in &report.processed {
        let event = &processed.event;
        println!(
            "{:<24} {} - {}  {}",
            processed.status.to_string(),
            event.start_datetime.format("%Y-%m-%d %H:%M"),
            event.end_datetime.format("%H:%M"),
            event.title
        );
        if dry_run && matches!(processed.status, Status::WouldCreate | Status::WouldUpdate(_)) {
            print_event_details(event);
        }
    }

    let created = report.count(|s| matches!(s, Status::Created(_) | Status::WouldCreate));
    let updated = report.count(|s| matches!(s, Status::Updated(_) | Status::WouldUpdate(_)));
    let skipped = report.count(|s| matches!(s, Status::Skipped(_)));
    let failed = report.failures().count();
    let verb = if dry_run { "would be " } else { "" };
    println!(
        "✓ {} {}created, {} {}updated, {} skipped, {} failed",
        created, verb, updated, verb, skipped, failed
    );

    if !report.remaining.is_empty() {
        println!("✗ Stopped early, {} events not processed:", report.remaining.len());
        for event in &report.remaining {
            println!(
                "  {}  {}",
                event.start_datetime.format("%Y-%m-%d %H:%M"),
                event.title
            );
        }
    }
}

/// Sync command
pub async fn sync_command(params: SyncParams) -> Result<()> {
    let schedule = load_schedule(&params.config)?;
    let window = window(params.start_date, params.end_date, params.weeks)?
        .with_day_filter(params.days)
        .with_name_filter(params.events);

    tracing::info!(
        "Expanding events from {} to {} (update={}, dry_run={})",
        window.start_date(),
        window.end_date(),
        params.update,
        params.dry_run
    );
    let events = materialize_all(&schedule, &window)?;
    if events.is_empty() {
        println!("No events fall between {} and {}", window.start_date(), window.end_date());
        return Ok(());
    }
    println!(
        "{} events between {} and {}",
        events.len(),
        window.start_date(),
        window.end_date()
    );

    let gateway = sync_gateway(&schedule, params.dry_run, params.offline)?;
    if gateway.name() == "offline" {
        println!("Offline: existing events on the site are not checked");
    }

    if params.json {
        let actions = Planner::new(params.update)
            .plan(&events, gateway.as_ref())
            .await?;
        println!("{}", serde_json::to_string_pretty(&actions)?);
        return Ok(());
    }

    let options = SyncOptions {
        dry_run: params.dry_run,
        update_mode: params.update,
        failure_policy: if params.keep_going {
            FailurePolicy::Continue
        } else {
            FailurePolicy::Abort
        },
        delay: Duration::from_secs(params.delay),
    };
    let report = Synchronizer::new(gateway.as_ref(), options).run(events).await;
    print_report(&report, params.dry_run);

    if let Some(error) = report.fatal_error() {
        bail!("Run aborted: {}", error);
    }
    if !report.is_success() {
        bail!("{} events failed", report.failures().count());
    }
    Ok(())
}

/// List command
pub async fn list_command(
    config: PathBuf,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    weeks: Option<u32>,
) -> Result<()> {
    let schedule = load_schedule(&config)?;
    let window = window(start_date, end_date, weeks)?;
    let gateway = connect(&schedule)?;

    let events = gateway
        .list(window.start_date(), window.end_date())
        .await?;

    println!(
        "{} events on {} between {} and {}:",
        events.len(),
        gateway.name(),
        window.start_date(),
        window.end_date()
    );
    for event in events {
        println!(
            "  [{}] {}  {}",
            event.id,
            event.start_datetime.format("%Y-%m-%d %H:%M"),
            normalize_title(&event.title)
        );
    }

    Ok(())
}

/// Human form of a rule, e.g. `1st, 3rd Sun of the month`
fn describe_rule(rule: &RecurrenceRule) -> String {
    let days: Vec<String> = rule.days.iter().map(ToString::to_string).collect();
    if rule.nth_occurrences.is_empty() {
        return format!("every {}", days.join(", "));
    }
    let nth: Vec<String> = rule.nth_occurrences.iter().map(|n| ordinal(*n)).collect();
    format!("{} {} of the month", nth.join(", "), days.join(", "))
}

/// Templates command
pub fn templates_command(config: &Path) -> Result<()> {
    let schedule = load_schedule(config)?;

    if schedule.events.is_empty() {
        println!("No events configured in {}", config.display());
        return Ok(());
    }

    println!("Configured events:");
    for definition in &schedule.events {
        let template = &definition.template;
        let rule = &definition.rule;
        let state = if rule.disabled { " (disabled)" } else { "" };

        println!("  {} - {}{}", template.key, template.title, state);

        println!(
            "    {}, {} - {}",
            describe_rule(rule),
            template.start_time.format("%H:%M"),
            template.end_time.format("%H:%M")
        );
        if !rule.skip_months.is_empty() {
            let months: Vec<&str> = rule.skip_months.iter().map(|m| m.name()).collect();
            println!("    not in {}", months.join(", "));
        }
    }

    Ok(())
}
