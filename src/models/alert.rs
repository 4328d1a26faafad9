//! Real-time service alert data structure.

use serde::{Deserialize, Serialize};

/// A service alert decoded from the real-time feed.
///
/// Text fields hold the single locale variant chosen at decode time.
/// Fallbacks for absent fields are applied by the formatter, not here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Feed entity id, stable across runs for the same real-world event
    pub id: String,

    /// Short summary line
    #[serde(default)]
    pub header_text: Option<String>,

    /// Full description
    #[serde(default)]
    pub description_text: Option<String>,

    /// Link to more information
    #[serde(default)]
    pub url: Option<String>,

    /// Affected trips, in feed order
    #[serde(default)]
    pub informed_entities: Vec<InformedEntity>,
}

/// An entity selector attached to an alert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InformedEntity {
    #[serde(default)]
    pub trip_id: Option<String>,
}

impl InformedEntity {
    /// Selector referencing a single trip.
    pub fn trip(trip_id: impl Into<String>) -> Self {
        Self {
            trip_id: Some(trip_id.into()),
        }
    }
}

impl Alert {
    /// Create an alert with only an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, text: impl Into<String>) -> Self {
        self.header_text = Some(text.into());
        self
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        self.description_text = Some(text.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_entity(mut self, entity: InformedEntity) -> Self {
        self.informed_entities.push(entity);
        self
    }

    /// Trip ids referenced by this alert, in order, skipping tripless entities.
    pub fn trip_ids(&self) -> impl Iterator<Item = &str> {
        self.informed_entities
            .iter()
            .filter_map(|e| e.trip_id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trip_ids_skips_tripless_entities() {
        let alert = Alert::new("A1")
            .with_entity(InformedEntity::trip("T1"))
            .with_entity(InformedEntity::default())
            .with_entity(InformedEntity::trip("T2"));

        let ids: Vec<&str> = alert.trip_ids().collect();
        assert_eq!(ids, vec!["T1", "T2"]);
    }

    #[test]
    fn test_deserialize_minimal() {
        let alert: Alert = serde_json::from_str(r#"{"id": "A1"}"#).unwrap();
        assert_eq!(alert, Alert::new("A1"));
    }
}
