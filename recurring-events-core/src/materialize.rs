use chrono::{Datelike, NaiveDate};

use crate::{
    Error, EventTemplate, MaterializedEvent, Result, Schedule, Window, expand::expand,
};

fn ordinal_suffix(last_digit: u32) -> &'static str {
    match last_digit {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// A number with its ordinal suffix, e.g. `3rd`
pub fn ordinal(n: u32) -> String {
    let suffix = if (11..=13).contains(&(n % 100)) {
        "th"
    } else {
        ordinal_suffix(n % 10)
    };
    format!("{}{}", n, suffix)
}

/// Long form of a date, e.g. `Sunday 4th January 2026`
pub fn long_date(date: NaiveDate) -> String {
    format!(
        "{} {} {}",
        date.format("%A"),
        ordinal(date.day()),
        date.format("%B %Y")
    )
}

/// Title of an event instance on a given date
pub fn dated_title(title: &str, date: NaiveDate) -> String {
    format!("{} – {}", title, long_date(date))
}

/// Combine a template with a date into a concrete event.
pub fn materialize(template: &EventTemplate, date: NaiveDate) -> MaterializedEvent {
    MaterializedEvent {
        key: template.key.clone(),
        title: dated_title(&template.title, date),
        description: template.description.clone(),
        excerpt: template.excerpt().to_string(),
        start_datetime: date.and_time(template.start_time),
        end_datetime: date.and_time(template.end_time),
        tags: template.tags.clone(),
        categories: template.categories.clone(),
        image: template.image,
        venue: template.venue.clone(),
        organiser: template.organiser.clone(),
    }
}

/// Expand and materialize every selected event in the schedule.
///
/// The result is ordered by start time; events starting together keep the
/// order of their template keys.
pub fn materialize_all(schedule: &Schedule, window: &Window) -> Result<Vec<MaterializedEvent>> {
    if let Some(names) = window.name_filter() {
        for name in names {
            if schedule.get(name).is_none() {
                return Err(Error::Config(format!("unknown event '{}'", name)));
            }
        }
    }

    let mut events = Vec::new();
    for definition in &schedule.events {
        let template = &definition.template;
        if !window.allows_template(&template.key) {
            continue;
        }

        let dates = expand(&definition.rule, window);
        tracing::debug!("{}: {} occurrences", template.key, dates.len());
        events.extend(dates.into_iter().map(|date| materialize(template, date)));
    }

    events.sort_by_key(|e| e.start_datetime);
    Ok(events)
}
