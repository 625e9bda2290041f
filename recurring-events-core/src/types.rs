use std::{collections::BTreeMap, fmt};

use chrono::{Days, Month, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Recurrence rule of an event template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    /// Weekdays the event falls on
    pub days: Vec<Weekday>,
    /// 1-indexed occurrences of the weekday within a month; empty means every week
    pub nth_occurrences: Vec<u32>,
    /// Months in which the event never happens
    pub skip_months: Vec<Month>,
    /// Disabled rules produce no dates
    pub disabled: bool,
}

impl RecurrenceRule {
    /// Every week on the given days
    pub fn weekly(days: impl IntoIterator<Item = Weekday>) -> Self {
        let mut rule = Self {
            days: Vec::new(),
            nth_occurrences: Vec::new(),
            skip_months: Vec::new(),
            disabled: false,
        };
        for day in days {
            if !rule.days.contains(&day) {
                rule.days.push(day);
            }
        }
        rule
    }

    /// Restrict the rule to the given occurrences within each month
    pub fn on_occurrences(mut self, nth: impl IntoIterator<Item = u32>) -> Self {
        self.nth_occurrences.extend(nth);
        self.nth_occurrences.sort_unstable();
        self.nth_occurrences.dedup();
        self
    }

    /// Exclude whole months
    pub fn skipping(mut self, months: impl IntoIterator<Item = Month>) -> Self {
        for month in months {
            if !self.skip_months.contains(&month) {
                self.skip_months.push(month);
            }
        }
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.nth_occurrences.contains(&0) {
            return Err(Error::Config(
                "nth occurrences must be 1 or greater".to_string(),
            ));
        }
        if self.days.is_empty() && !self.disabled {
            return Err(Error::Config(
                "at least one day is required for an enabled event".to_string(),
            ));
        }
        Ok(())
    }

    pub fn skips_month(&self, month: u32) -> bool {
        self.skip_months
            .iter()
            .any(|m| m.number_from_month() == month)
    }
}

/// Descriptive part of a configured event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTemplate {
    /// Unique key in the configuration
    pub key: String,
    pub title: String,
    pub description: String,
    /// Short form of the description, falls back to `description`
    pub excerpt: Option<String>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    /// Featured image reference
    pub image: Option<u64>,
    pub venue: Option<String>,
    pub organiser: Option<String>,
}

impl EventTemplate {
    pub fn excerpt(&self) -> &str {
        self.excerpt.as_deref().unwrap_or(&self.description)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_time >= self.end_time {
            return Err(Error::Config(format!(
                "event '{}' must start before it ends ({} >= {})",
                self.key, self.start_time, self.end_time
            )));
        }
        Ok(())
    }
}

/// A template together with the rule that schedules it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDefinition {
    pub template: EventTemplate,
    pub rule: RecurrenceRule,
}

/// Slug to numeric ID lookups used by the remote store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlugMaps {
    #[serde(default)]
    pub categories: BTreeMap<String, u64>,
    #[serde(default)]
    pub tags: BTreeMap<String, u64>,
    #[serde(default)]
    pub organisers: BTreeMap<String, u64>,
    #[serde(default)]
    pub venues: BTreeMap<String, u64>,
}

impl SlugMaps {
    pub fn category(&self, slug: &str) -> Result<u64> {
        lookup(&self.categories, "category", slug)
    }

    pub fn tag(&self, slug: &str) -> Result<u64> {
        lookup(&self.tags, "tag", slug)
    }

    pub fn organiser(&self, slug: &str) -> Result<u64> {
        lookup(&self.organisers, "organiser", slug)
    }

    pub fn venue(&self, slug: &str) -> Result<u64> {
        lookup(&self.venues, "venue", slug)
    }

    /// Check that every slug a template references resolves
    pub fn check_template(&self, template: &EventTemplate) -> Result<()> {
        for tag in &template.tags {
            self.tag(tag)?;
        }
        for category in &template.categories {
            self.category(category)?;
        }
        if let Some(ref venue) = template.venue {
            self.venue(venue)?;
        }
        if let Some(ref organiser) = template.organiser {
            self.organiser(organiser)?;
        }
        Ok(())
    }
}

fn lookup(map: &BTreeMap<String, u64>, kind: &str, slug: &str) -> Result<u64> {
    map.get(slug)
        .copied()
        .ok_or_else(|| Error::Config(format!("unknown {} '{}'", kind, slug)))
}

/// All configured events plus their slug maps
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    /// Ordered by template key
    pub events: Vec<EventDefinition>,
    pub slugs: SlugMaps,
}

impl Schedule {
    pub fn get(&self, key: &str) -> Option<&EventDefinition> {
        self.events.iter().find(|e| e.template.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(|e| e.template.key.as_str())
    }
}

/// A concrete, dated instance of a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializedEvent {
    /// Key of the template this instance came from
    pub key: String,
    pub title: String,
    pub description: String,
    pub excerpt: String,
    pub start_datetime: NaiveDateTime,
    pub end_datetime: NaiveDateTime,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub image: Option<u64>,
    pub venue: Option<String>,
    pub organiser: Option<String>,
}

impl MaterializedEvent {
    /// Natural identity used to reconcile with the remote store
    pub fn identity(&self) -> (&str, NaiveDateTime) {
        (&self.title, self.start_datetime)
    }
}

/// Identifier the remote store assigns to an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Date range and filters for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    start_date: NaiveDate,
    end_date: NaiveDate,
    day_filter: Option<Vec<Weekday>>,
    name_filter: Option<Vec<String>>,
}

impl Window {
    /// Build a window from a start date and exactly one of `end_date` / `weeks`
    pub fn new(start_date: NaiveDate, end_date: Option<NaiveDate>, weeks: Option<u32>) -> Result<Self> {
        let end_date = match (end_date, weeks) {
            (Some(_), Some(_)) => {
                return Err(Error::Window(
                    "end date and weeks are mutually exclusive".to_string(),
                ));
            }
            (None, None) => {
                return Err(Error::Window(
                    "either an end date or a number of weeks is required".to_string(),
                ));
            }
            (Some(end), None) => end,
            (None, Some(weeks)) => start_date
                .checked_add_days(Days::new(u64::from(weeks) * 7))
                .ok_or_else(|| Error::Window(format!("{} weeks is out of range", weeks)))?,
        };

        if end_date < start_date {
            return Err(Error::Window(format!(
                "end date {} is before start date {}",
                end_date, start_date
            )));
        }

        Ok(Self {
            start_date,
            end_date,
            day_filter: None,
            name_filter: None,
        })
    }

    /// Only expand these weekdays; an empty list means no filter
    pub fn with_day_filter(mut self, days: Vec<Weekday>) -> Self {
        self.day_filter = (!days.is_empty()).then_some(days);
        self
    }

    /// Only process these template keys; an empty list means no filter
    pub fn with_name_filter(mut self, names: Vec<String>) -> Self {
        self.name_filter = (!names.is_empty()).then_some(names);
        self
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn name_filter(&self) -> Option<&[String]> {
        self.name_filter.as_deref()
    }

    pub fn allows_day(&self, day: Weekday) -> bool {
        self.day_filter.as_ref().is_none_or(|days| days.contains(&day))
    }

    pub fn allows_template(&self, key: &str) -> bool {
        self.name_filter
            .as_ref()
            .is_none_or(|names| names.iter().any(|n| n == key))
    }

    /// Every calendar date in the window, inclusive
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end_date;
        self.start_date.iter_days().take_while(move |d| *d <= end)
    }

    /// Number of days covered
    pub fn len_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}
