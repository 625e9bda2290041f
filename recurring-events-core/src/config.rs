//! Loading of the event file and connection settings.
//!
//! The event file is YAML:
//!
//! ```yaml
//! categories: { communion: 12 }
//! tags: { communion: 31 }
//! organisers: { stmarys: 5 }
//! venues: { church: 7 }
//! defaults: { venue: church, organiser: stmarys }
//! events:
//!   morning_communion:
//!     title: Holy Communion (morning)
//!     description: "<p>Sunday morning Holy Communion Service</p>"
//!     days: [sunday]
//!     nth: [1, 3]
//!     skip_months: [august]
//!     start_time: "10:00"
//!     end_time: "11:15"
//!     tags: [communion]
//!     categories: [communion]
//!     image: 963
//! ```

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use chrono::{Month, NaiveTime, Weekday};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::{
    Error, EventDefinition, EventTemplate, RecurrenceRule, Result, Schedule, SlugMaps,
};

/// Environment variable naming the event file
pub const CONFIG_ENV: &str = "RECURRING_EVENTS_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "events.yaml";

/// JSON slug maps that override the event file, by environment variable
const SLUG_ENV_VARS: [(&str, SlugKind); 4] = [
    ("CATMAP", SlugKind::Categories),
    ("TAGMAP", SlugKind::Tags),
    ("ORGMAP", SlugKind::Organisers),
    ("VENUEMAP", SlugKind::Venues),
];

#[derive(Debug, Clone, Copy)]
enum SlugKind {
    Categories,
    Tags,
    Organisers,
    Venues,
}

#[derive(Debug, Default, Deserialize)]
struct Defaults {
    venue: Option<String>,
    organiser: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    title: String,
    description: String,
    excerpt: Option<String>,
    #[serde(default)]
    days: Vec<String>,
    #[serde(default)]
    nth: Vec<i64>,
    #[serde(default)]
    skip_months: Vec<String>,
    start_time: String,
    end_time: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    categories: Vec<String>,
    image: Option<u64>,
    venue: Option<String>,
    organiser: Option<String>,
    #[serde(default)]
    disabled: bool,
}

#[derive(Debug, Deserialize)]
struct RawSchedule {
    #[serde(default)]
    categories: BTreeMap<String, u64>,
    #[serde(default)]
    tags: BTreeMap<String, u64>,
    #[serde(default)]
    organisers: BTreeMap<String, u64>,
    #[serde(default)]
    venues: BTreeMap<String, u64>,
    #[serde(default)]
    defaults: Defaults,
    #[serde(default)]
    events: BTreeMap<String, RawEvent>,
}

impl RawSchedule {
    fn slugs_mut(&mut self, kind: SlugKind) -> &mut BTreeMap<String, u64> {
        match kind {
            SlugKind::Categories => &mut self.categories,
            SlugKind::Tags => &mut self.tags,
            SlugKind::Organisers => &mut self.organisers,
            SlugKind::Venues => &mut self.venues,
        }
    }

    /// Merge a JSON object of slug IDs over the file's map
    fn override_slugs(&mut self, var: &str, kind: SlugKind, json: &str) -> Result<()> {
        let overrides: BTreeMap<String, u64> = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("{} is not a JSON object of IDs: {}", var, e)))?;
        self.slugs_mut(kind).extend(overrides);
        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        for (var, kind) in SLUG_ENV_VARS {
            if let Ok(json) = std::env::var(var) {
                tracing::debug!("Using slug map from {}", var);
                self.override_slugs(var, kind, &json)?;
            }
        }
        Ok(())
    }

    fn into_schedule(self) -> Result<Schedule> {
        let slugs = SlugMaps {
            categories: self.categories,
            tags: self.tags,
            organisers: self.organisers,
            venues: self.venues,
        };

        let mut events = Vec::with_capacity(self.events.len());
        for (key, raw) in self.events {
            let definition = build_definition(key, raw, &self.defaults)?;
            slugs
                .check_template(&definition.template)
                .map_err(|e| in_event(&definition.template.key, e))?;
            events.push(definition);
        }

        Ok(Schedule { events, slugs })
    }
}

/// Prefix a configuration error with the event it belongs to
fn in_event(key: &str, error: Error) -> Error {
    match error {
        Error::Config(message) => Error::Config(format!("event '{}': {}", key, message)),
        other => other,
    }
}

fn build_definition(key: String, raw: RawEvent, defaults: &Defaults) -> Result<EventDefinition> {
    let context = |e: Error| in_event(&key, e);

    let days = raw
        .days
        .iter()
        .map(|d| parse_weekday(d))
        .collect::<Result<Vec<_>>>()
        .map_err(context)?;
    let skip_months = raw
        .skip_months
        .iter()
        .map(|m| parse_month(m))
        .collect::<Result<Vec<_>>>()
        .map_err(context)?;
    let nth = raw
        .nth
        .iter()
        .map(|n| {
            u32::try_from(*n)
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| Error::Config(format!("nth occurrence {} must be 1 or greater", n)))
        })
        .collect::<Result<Vec<_>>>()
        .map_err(context)?;

    let rule = RecurrenceRule::weekly(days)
        .on_occurrences(nth)
        .skipping(skip_months)
        .disabled(raw.disabled);
    rule.validate().map_err(context)?;

    let template = EventTemplate {
        title: raw.title,
        description: raw.description,
        excerpt: raw.excerpt,
        start_time: parse_time(&raw.start_time).map_err(context)?,
        end_time: parse_time(&raw.end_time).map_err(context)?,
        tags: raw.tags,
        categories: raw.categories,
        image: raw.image,
        venue: raw.venue.or_else(|| defaults.venue.clone()),
        organiser: raw.organiser.or_else(|| defaults.organiser.clone()),
        key,
    };
    template.validate()?;

    Ok(EventDefinition { template, rule })
}

/// Accepts `monday`, `Mon`, `SUN` ...
pub fn parse_weekday(value: &str) -> Result<Weekday> {
    value
        .trim()
        .parse::<Weekday>()
        .map_err(|_| Error::Config(format!("unknown day '{}'", value)))
}

/// Accepts `august`, `Aug` ...
pub fn parse_month(value: &str) -> Result<Month> {
    value
        .trim()
        .parse::<Month>()
        .map_err(|_| Error::Config(format!("unknown month '{}'", value)))
}

/// Wall-clock time as `HH:MM` or `HH:MM:SS`
pub fn parse_time(value: &str) -> Result<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| Error::Config(format!("invalid time '{}', expected HH:MM", value)))
}

/// Event file to use: explicit path, then `$RECURRING_EVENTS_CONFIG`, then `events.yaml`
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load and validate the event file, applying slug maps from the environment
pub fn load_schedule(path: &Path) -> Result<Schedule> {
    dotenvy::dotenv().ok();

    let settings = Config::builder()
        .add_source(File::from(path).format(FileFormat::Yaml))
        .build()?;
    let mut raw: RawSchedule = settings.try_deserialize()?;
    raw.apply_env_overrides()?;

    let schedule = raw.into_schedule()?;
    tracing::info!(
        "Loaded {} events from {}",
        schedule.events.len(),
        path.display()
    );
    Ok(schedule)
}

/// Parse and validate an event file held in memory
pub fn parse_schedule(yaml: &str) -> Result<Schedule> {
    let settings = Config::builder()
        .add_source(File::from_str(yaml, FileFormat::Yaml))
        .build()?;
    let raw: RawSchedule = settings.try_deserialize()?;
    raw.into_schedule()
}

/// WordPress endpoint and credentials
#[derive(Clone, Deserialize)]
pub struct Connection {
    /// URL of the events collection, e.g. `https://example.org/wp-json/tribe/events/v1/events`
    pub server: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("server", &self.server)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl Connection {
    /// Read `WORDPRESS_SERVER`, `WORDPRESS_USER` and `WORDPRESS_PASSWORD`,
    /// from the environment or a `.env` file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Config::builder()
            .add_source(Environment::with_prefix("WORDPRESS"))
            .build()?
            .try_deserialize::<Self>()
            .map_err(|e| {
                Error::Config(format!(
                    "WORDPRESS_SERVER, WORDPRESS_USER and WORDPRESS_PASSWORD must be set: {}",
                    e
                ))
            })
    }
}
