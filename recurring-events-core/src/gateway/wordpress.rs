//! Gateway for the WordPress "The Events Calendar" REST API
//! (`/wp-json/tribe/events/v1/events`).

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{
    EventId, MaterializedEvent, Result, SlugMaps,
    config::Connection,
    gateway::{BaseGateway, BaseGatewayBuilder, GatewayInfo, RemoteEvent, RemoteGateway},
};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const PAGE_SIZE: &str = "50";

/// One page of the events collection
#[derive(Debug, Deserialize)]
struct EventsPage {
    #[serde(default)]
    events: Vec<TribeEvent>,
    next_rest_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TribeEvent {
    id: u64,
    title: String,
    start_date: String,
    end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SavedEvent {
    id: u64,
}

/// Body sent when creating or updating an event
#[derive(Debug, Serialize)]
pub struct EventPayload<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub excerpt: &'a str,
    pub start_date: String,
    pub end_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer: Option<u64>,
    pub status: &'static str,
    pub show_map: bool,
    pub show_map_link: bool,
    pub tags: Vec<u64>,
    pub categories: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<u64>,
}

pub struct WordPressGateway {
    base: BaseGateway,
    endpoint: String,
    slugs: SlugMaps,
}

impl WordPressGateway {
    pub fn new(connection: &Connection, slugs: SlugMaps) -> Result<Self> {
        let base = BaseGatewayBuilder::new(GatewayInfo {
            name: "wordpress".to_string(),
            description: "WordPress The Events Calendar REST API".to_string(),
        })
        .basic_auth(&connection.user, &connection.password)?
        .build()?;

        Ok(Self {
            base,
            endpoint: connection.server.trim_end_matches('/').to_string(),
            slugs,
        })
    }

    pub fn description(&self) -> &str {
        &self.base.info.description
    }

    /// Build the request body, resolving slugs to numeric IDs
    pub fn payload<'a>(&self, event: &'a MaterializedEvent) -> Result<EventPayload<'a>> {
        let tags = event
            .tags
            .iter()
            .map(|t| self.slugs.tag(t))
            .collect::<Result<Vec<_>>>()?;
        let categories = event
            .categories
            .iter()
            .map(|c| self.slugs.category(c))
            .collect::<Result<Vec<_>>>()?;
        let venue = event
            .venue
            .as_deref()
            .map(|v| self.slugs.venue(v))
            .transpose()?;
        let organizer = event
            .organiser
            .as_deref()
            .map(|o| self.slugs.organiser(o))
            .transpose()?;

        Ok(EventPayload {
            title: &event.title,
            description: &event.description,
            excerpt: &event.excerpt,
            start_date: event.start_datetime.format(DATETIME_FORMAT).to_string(),
            end_date: event.end_datetime.format(DATETIME_FORMAT).to_string(),
            venue,
            organizer,
            status: "publish",
            show_map: true,
            show_map_link: true,
            tags,
            categories,
            image: event.image,
        })
    }

    async fn save(&self, url: &str, event: &MaterializedEvent) -> Result<EventId> {
        let payload = self.payload(event)?;
        let response = self
            .base
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.base.handle_error_req(e))?;
        let response = self.base.check(response).await?;
        let saved: SavedEvent = response
            .json()
            .await
            .map_err(|e| self.base.handle_error_req(e))?;
        Ok(EventId(saved.id))
    }
}

#[async_trait]
impl RemoteGateway for WordPressGateway {
    fn name(&self) -> &str {
        &self.base.info.name
    }

    async fn find(&self, title: &str, start: NaiveDateTime) -> Result<Option<EventId>> {
        let wanted = normalize_title(title);
        let existing = self.list(start.date(), start.date()).await?;
        let found = existing
            .into_iter()
            .find(|e| e.start_datetime == start && normalize_title(&e.title) == wanted)
            .map(|e| e.id);

        tracing::debug!("lookup '{}' at {}: {:?}", title, start, found);
        Ok(found)
    }

    async fn create(&self, event: &MaterializedEvent) -> Result<EventId> {
        let id = self.save(&self.endpoint, event).await?;
        tracing::info!("Created event {}: {}", id, event.title);
        Ok(id)
    }

    async fn update(&self, id: EventId, event: &MaterializedEvent) -> Result<EventId> {
        let url = format!("{}/{}", self.endpoint, id);
        let id = self.save(&url, event).await?;
        tracing::info!("Updated event {}: {}", id, event.title);
        Ok(id)
    }

    async fn list(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<RemoteEvent>> {
        let mut request = self.base.client.get(&self.endpoint).query(&[
            ("start_date", format!("{} 00:00:00", from)),
            ("end_date", format!("{} 23:59:59", to)),
            ("per_page", PAGE_SIZE.to_string()),
        ]);

        let mut events = Vec::new();
        loop {
            let response = request
                .send()
                .await
                .map_err(|e| self.base.handle_error_req(e))?;

            // The API answers 404 when the range holds no events
            if response.status() == StatusCode::NOT_FOUND {
                break;
            }

            let response = self.base.check(response).await?;
            let page: EventsPage = response
                .json()
                .await
                .map_err(|e| self.base.handle_error_req(e))?;

            for event in page.events {
                events.push(RemoteEvent {
                    id: EventId(event.id),
                    title: event.title,
                    start_datetime: NaiveDateTime::parse_from_str(
                        &event.start_date,
                        DATETIME_FORMAT,
                    )?,
                    end_datetime: event
                        .end_date
                        .as_deref()
                        .map(|d| NaiveDateTime::parse_from_str(d, DATETIME_FORMAT))
                        .transpose()?,
                });
            }

            match page.next_rest_url {
                Some(next) => request = self.base.client.get(next),
                None => break,
            }
        }

        tracing::debug!("{} remote events between {} and {}", events.len(), from, to);
        Ok(events)
    }
}

/// Compare-friendly form of a title as WordPress renders it: entities
/// decoded, typographic quotes and dashes folded, whitespace collapsed.
pub fn normalize_title(title: &str) -> String {
    let folded: String = html_escape::decode_html_entities(title)
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            '\u{00A0}' => ' ',
            c => c,
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
