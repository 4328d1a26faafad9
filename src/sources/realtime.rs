//! GTFS-Realtime alert decoding.
//!
//! Only the subset of `gtfs-realtime.proto` needed for service alerts is
//! declared; unknown fields are skipped by the decoder.

use prost::Message;

use crate::error::Result;
use crate::models::{Alert, InformedEntity};

#[derive(Clone, PartialEq, Message)]
pub struct FeedMessage {
    #[prost(message, optional, tag = "1")]
    pub header: Option<FeedHeader>,
    #[prost(message, repeated, tag = "2")]
    pub entity: Vec<FeedEntity>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FeedHeader {
    #[prost(string, optional, tag = "1")]
    pub gtfs_realtime_version: Option<String>,
    #[prost(uint64, optional, tag = "3")]
    pub timestamp: Option<u64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FeedEntity {
    #[prost(string, optional, tag = "1")]
    pub id: Option<String>,
    #[prost(bool, optional, tag = "2")]
    pub is_deleted: Option<bool>,
    #[prost(message, optional, tag = "5")]
    pub alert: Option<GtfsAlert>,
}

#[derive(Clone, PartialEq, Message)]
pub struct GtfsAlert {
    #[prost(message, repeated, tag = "5")]
    pub informed_entity: Vec<EntitySelector>,
    #[prost(message, optional, tag = "8")]
    pub url: Option<TranslatedString>,
    #[prost(message, optional, tag = "10")]
    pub header_text: Option<TranslatedString>,
    #[prost(message, optional, tag = "11")]
    pub description_text: Option<TranslatedString>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EntitySelector {
    #[prost(string, optional, tag = "2")]
    pub route_id: Option<String>,
    #[prost(message, optional, tag = "4")]
    pub trip: Option<TripDescriptor>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TripDescriptor {
    #[prost(string, optional, tag = "1")]
    pub trip_id: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub route_id: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TranslatedString {
    #[prost(message, repeated, tag = "1")]
    pub translation: Vec<Translation>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Translation {
    #[prost(string, optional, tag = "1")]
    pub text: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub language: Option<String>,
}

impl TranslatedString {
    /// Pick the translation for `language`, falling back to the first one.
    fn pick(&self, language: Option<&str>) -> Option<String> {
        let preferred = language.and_then(|lang| {
            self.translation
                .iter()
                .find(|t| t.language.as_deref().is_some_and(|l| l.eq_ignore_ascii_case(lang)))
        });
        preferred
            .or_else(|| self.translation.first())
            .and_then(|t| t.text.clone())
    }
}

/// Decode a `FeedMessage` and return its alerts in feed order.
///
/// Entities without an alert, without an id, or flagged as deleted are
/// dropped.
pub fn decode_alerts(bytes: &[u8], language: Option<&str>) -> Result<Vec<Alert>> {
    let feed = FeedMessage::decode(bytes)?;
    let total = feed.entity.len();

    let alerts: Vec<Alert> = feed
        .entity
        .into_iter()
        .filter_map(|entity| convert(entity, language))
        .collect();

    log::info!("Decoded {} alerts from {} feed entities", alerts.len(), total);
    Ok(alerts)
}

fn convert(entity: FeedEntity, language: Option<&str>) -> Option<Alert> {
    if entity.is_deleted.unwrap_or(false) {
        return None;
    }
    let raw = entity.alert?;
    let Some(id) = entity.id.filter(|id| !id.is_empty()) else {
        log::warn!("Skipping alert entity without an id");
        return None;
    };

    let text = |field: &Option<TranslatedString>| field.as_ref().and_then(|t| t.pick(language));

    Some(Alert {
        id,
        header_text: text(&raw.header_text),
        description_text: text(&raw.description_text),
        url: text(&raw.url),
        informed_entities: raw
            .informed_entity
            .into_iter()
            .map(|selector| InformedEntity {
                trip_id: selector.trip.and_then(|trip| trip.trip_id),
            })
            .collect(),
    })
}
