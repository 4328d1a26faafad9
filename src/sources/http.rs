//! Sources backed by HTTP downloads.

use async_trait::async_trait;

use super::{AlertFeed, ScheduleSource, gtfs, realtime};
use crate::error::{AppError, Result};
use crate::models::{Alert, FeedsConfig, FormatConfig, TripRow};
use crate::utils::http::fetch_bytes;

/// Downloads the GTFS zip and parses its `trips.txt`.
pub struct HttpScheduleSource {
    client: reqwest::Client,
    url: String,
}

impl HttpScheduleSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn from_config(client: reqwest::Client, feeds: &FeedsConfig) -> Self {
        Self::new(client, &feeds.schedule_url)
    }
}

#[async_trait]
impl ScheduleSource for HttpScheduleSource {
    async fn fetch_trips(&self) -> Result<Vec<TripRow>> {
        log::info!("Fetching schedule from {}", self.url);
        let bytes = fetch_bytes(&self.client, &self.url)
            .await
            .map_err(|e| AppError::upstream("schedule", e))?;
        gtfs::parse_trips_archive(&bytes)
    }
}

/// Downloads and decodes the GTFS-Realtime alerts feed.
pub struct HttpAlertFeed {
    client: reqwest::Client,
    url: String,
    language: Option<String>,
}

impl HttpAlertFeed {
    pub fn new(client: reqwest::Client, url: impl Into<String>, language: Option<String>) -> Self {
        Self {
            client,
            url: url.into(),
            language,
        }
    }

    pub fn from_config(client: reqwest::Client, feeds: &FeedsConfig, format: &FormatConfig) -> Self {
        Self::new(client, &feeds.alerts_url, format.language.clone())
    }
}

#[async_trait]
impl AlertFeed for HttpAlertFeed {
    async fn fetch_alerts(&self) -> Result<Vec<Alert>> {
        log::info!("Fetching alerts from {}", self.url);
        let bytes = fetch_bytes(&self.client, &self.url)
            .await
            .map_err(|e| AppError::upstream("alerts", e))?;
        realtime::decode_alerts(&bytes, self.language.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::realtime::{FeedEntity, FeedMessage, GtfsAlert, TranslatedString, Translation};
    use prost::Message;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_alert_feed_over_http() {
        let body = FeedMessage {
            header: None,
            entity: vec![FeedEntity {
                id: Some("A1".into()),
                is_deleted: None,
                alert: Some(GtfsAlert {
                    header_text: Some(TranslatedString {
                        translation: vec![Translation {
                            text: Some("Delay".into()),
                            language: None,
                        }],
                    }),
                    ..Default::default()
                }),
            }],
        }
        .encode_to_vec();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alerts.pb"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;

        let feed = HttpAlertFeed::new(
            reqwest::Client::new(),
            format!("{}/alerts.pb", server.uri()),
            None,
        );
        let alerts = feed.fetch_alerts().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].header_text.as_deref(), Some("Delay"));
    }

    #[tokio::test]
    async fn test_http_failure_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HttpScheduleSource::new(
            reqwest::Client::new(),
            format!("{}/gtfs.zip", server.uri()),
        );
        let err = source.fetch_trips().await.unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("schedule"));
    }
}
