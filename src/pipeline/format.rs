//! Channel-specific rendering of alerts.
//!
//! An alert renders into four sections: the header line, the description,
//! the trip-context block and the link. Single-block channels get all four
//! in one post; threaded channels get header and description as the lead
//! and the rest as replies.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{Alert, FormatConfig, TripRecord};
use crate::pipeline::ScheduleIndex;
use crate::utils::text::LengthMetric;

/// Structural shape a destination accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// One post carrying everything
    SingleBlock,
    /// Lead post plus reply chain
    Threaded,
}

/// Shape and length limit of a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ChannelSpec {
    pub layout: Layout,
    pub metric: LengthMetric,
    pub max_length: Option<usize>,
}

impl ChannelSpec {
    /// Single post, limit counted in graphemes.
    pub const fn single_block(max_length: Option<usize>) -> Self {
        Self {
            layout: Layout::SingleBlock,
            metric: LengthMetric::Graphemes,
            max_length,
        }
    }

    /// Lead plus replies, limit counted in graphemes.
    pub const fn threaded(max_length: Option<usize>) -> Self {
        Self {
            layout: Layout::Threaded,
            metric: LengthMetric::Graphemes,
            max_length,
        }
    }

    pub const fn with_metric(self, metric: LengthMetric) -> Self {
        Self { metric, ..self }
    }
}

/// Rendered text for one channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormattedPayload {
    /// Single body or thread lead
    pub primary: String,
    /// Replies, in posting order (always empty for single-block channels)
    pub follow_ups: Vec<String>,
}

/// Payloads for one alert, keyed by the channel they were rendered for.
pub type PayloadSet = HashMap<ChannelSpec, FormattedPayload>;

/// Resolved sections of an alert, fallbacks applied.
struct Sections<'a> {
    header_line: String,
    description: &'a str,
    trip_lines: Vec<String>,
    link: String,
}

impl Sections<'_> {
    fn trip_block(&self) -> String {
        self.trip_lines.join("\n")
    }

    fn single_block(&self, description: &str) -> String {
        let trip_block = self.trip_block();
        [
            self.header_line.as_str(),
            description,
            trip_block.as_str(),
            self.link.as_str(),
        ]
        .join("\n\n")
        .trim_end()
        .to_string()
    }

    fn lead(&self, description: &str) -> String {
        format!("{}\n\n{}", self.header_line, description)
            .trim_end()
            .to_string()
    }
}

/// Pure renderer from alert + schedule context to channel payloads.
#[derive(Debug, Clone)]
pub struct ContentFormatter {
    header_fallback: String,
    description_fallback: String,
}

impl Default for ContentFormatter {
    fn default() -> Self {
        Self::new(&FormatConfig::default())
    }
}

impl ContentFormatter {
    pub fn new(config: &FormatConfig) -> Self {
        Self {
            header_fallback: config.header_fallback.clone(),
            description_fallback: config.description_fallback.clone(),
        }
    }

    /// Render an alert for one channel.
    pub fn format(
        &self,
        alert: &Alert,
        index: &ScheduleIndex,
        channel: &ChannelSpec,
    ) -> FormattedPayload {
        let sections = self.sections(alert, index);
        match channel.layout {
            Layout::SingleBlock => FormattedPayload {
                primary: fit(&sections, channel, Sections::single_block),
                follow_ups: Vec::new(),
            },
            Layout::Threaded => FormattedPayload {
                primary: fit(&sections, channel, Sections::lead),
                follow_ups: thread_replies(&sections, channel),
            },
        }
    }

    /// Render an alert once per distinct channel.
    pub fn format_all(
        &self,
        alert: &Alert,
        index: &ScheduleIndex,
        channels: impl IntoIterator<Item = ChannelSpec>,
    ) -> PayloadSet {
        let mut payloads = PayloadSet::new();
        for channel in channels {
            if !payloads.contains_key(&channel) {
                let payload = self.format(alert, index, &channel);
                payloads.insert(channel, payload);
            }
        }
        payloads
    }

    fn sections<'a>(&'a self, alert: &'a Alert, index: &ScheduleIndex) -> Sections<'a> {
        let header = non_empty(alert.header_text.as_deref()).unwrap_or(&self.header_fallback);
        let description =
            non_empty(alert.description_text.as_deref()).unwrap_or(&self.description_fallback);

        let trip_lines = alert
            .trip_ids()
            .filter_map(|trip_id| index.lookup(trip_id))
            .map(trip_line)
            .collect();

        let link = non_empty(alert.url.as_deref())
            .map(|url| format!("🔗 {url}"))
            .unwrap_or_default();

        Sections {
            header_line: format!("🚨 {header}"),
            description,
            trip_lines,
            link,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

fn trip_line(trip: &TripRecord) -> String {
    format!(
        "🛤️ {} 🚆 {} 📍 {}",
        trip.route_id, trip.trip_short_name, trip.trip_headsign
    )
}

/// Render with the full description, shortening the description first and
/// the whole text second when over the limit.
fn fit<'a>(
    sections: &Sections<'a>,
    channel: &ChannelSpec,
    render: impl Fn(&Sections<'a>, &str) -> String,
) -> String {
    let text = render(sections, sections.description);
    let Some(limit) = channel.max_length else {
        return text;
    };
    let metric = channel.metric;
    if metric.measure(&text) <= limit {
        return text;
    }

    // Everything but a one-unit description.
    let overhead = metric.measure(&render(sections, "x")).saturating_sub(1);
    let budget = limit.saturating_sub(overhead);
    let shortened = metric.truncate(sections.description, budget);
    metric.truncate(&render(sections, &shortened), limit)
}

/// Trip context and link as reply blocks, split at line boundaries.
fn thread_replies(sections: &Sections<'_>, channel: &ChannelSpec) -> Vec<String> {
    let body = [sections.trip_block(), sections.link.clone()]
        .join("\n\n")
        .trim()
        .to_string();
    if body.is_empty() {
        return Vec::new();
    }
    let Some(limit) = channel.max_length else {
        return vec![body];
    };
    let metric = channel.metric;
    if metric.measure(&body) <= limit {
        return vec![body];
    }

    let mut pieces: Vec<(&str, String)> = sections
        .trip_lines
        .iter()
        .map(|line| ("\n", metric.truncate(line, limit)))
        .collect();
    if !sections.link.is_empty() {
        pieces.push(("\n\n", metric.truncate(&sections.link, limit)));
    }

    let mut blocks = Vec::new();
    let mut current = String::new();
    for (separator, piece) in pieces {
        if current.is_empty() {
            current = piece;
            continue;
        }
        let candidate = format!("{current}{separator}{piece}");
        if metric.measure(&candidate) <= limit {
            current = candidate;
        } else {
            blocks.push(std::mem::replace(&mut current, piece));
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InformedEntity, TripRow};
    use crate::utils::text::grapheme_len;

    const SINGLE: ChannelSpec = ChannelSpec::single_block(None);
    const THREADED: ChannelSpec = ChannelSpec::threaded(None);

    fn index() -> ScheduleIndex {
        ScheduleIndex::build(vec![
            TripRow {
                trip_id: Some("T1".into()),
                route_id: Some("91".into()),
                trip_short_name: Some("227".into()),
                trip_headsign: Some("Union Station".into()),
            },
            TripRow {
                trip_id: Some("T2".into()),
                route_id: Some("VC".into()),
                trip_short_name: Some("210".into()),
                trip_headsign: Some("Lancaster".into()),
            },
        ])
    }

    fn delay_alert() -> Alert {
        Alert::new("A1")
            .with_header("Delay")
            .with_description("5 min late")
            .with_entity(InformedEntity::trip("T1"))
            .with_url("https://example.com/a1")
    }

    #[test]
    fn test_single_block_layout() {
        let payload = ContentFormatter::default().format(&delay_alert(), &index(), &SINGLE);
        assert_eq!(
            payload.primary,
            "🚨 Delay\n\n5 min late\n\n🛤️ 91 🚆 227 📍 Union Station\n\n🔗 https://example.com/a1"
        );
        assert!(payload.follow_ups.is_empty());
    }

    #[test]
    fn test_threaded_layout() {
        let payload = ContentFormatter::default().format(&delay_alert(), &index(), &THREADED);
        assert_eq!(payload.primary, "🚨 Delay\n\n5 min late");
        assert_eq!(
            payload.follow_ups,
            vec!["🛤️ 91 🚆 227 📍 Union Station\n\n🔗 https://example.com/a1"]
        );
    }

    #[test]
    fn test_all_fields_absent_uses_fallbacks() {
        let formatter = ContentFormatter::default();
        let alert = Alert::new("A1");

        let single = formatter.format(&alert, &index(), &SINGLE);
        assert_eq!(
            single.primary,
            "🚨 Service Alert\n\nNo additional details available"
        );
        assert!(!single.primary.contains('{'));

        let threaded = formatter.format(&alert, &index(), &THREADED);
        assert_eq!(
            threaded.primary,
            "🚨 Service Alert\n\nNo additional details available"
        );
        assert!(threaded.follow_ups.is_empty());
    }

    #[test]
    fn test_empty_strings_use_fallbacks() {
        let alert = Alert::new("A1").with_header("").with_description("").with_url("");
        let payload = ContentFormatter::default().format(&alert, &index(), &SINGLE);
        assert!(payload.primary.contains("Service Alert"));
        assert!(payload.primary.contains("No additional details available"));
        assert!(!payload.primary.contains("🔗"));
    }

    #[test]
    fn test_unknown_and_tripless_entities_are_skipped() {
        let alert = Alert::new("A1")
            .with_header("Delay")
            .with_entity(InformedEntity::trip("T9"))
            .with_entity(InformedEntity::default());

        let payload = ContentFormatter::default().format(&alert, &index(), &THREADED);
        assert!(payload.follow_ups.is_empty());

        let single = ContentFormatter::default().format(&alert, &index(), &SINGLE);
        assert!(!single.primary.contains("🛤️"));
    }

    #[test]
    fn test_trip_lines_keep_order_and_duplicates() {
        let alert = Alert::new("A1")
            .with_entity(InformedEntity::trip("T2"))
            .with_entity(InformedEntity::trip("T9"))
            .with_entity(InformedEntity::trip("T1"))
            .with_entity(InformedEntity::trip("T2"));

        let payload = ContentFormatter::default().format(&alert, &index(), &THREADED);
        assert_eq!(
            payload.follow_ups,
            vec![
                "🛤️ VC 🚆 210 📍 Lancaster\n🛤️ 91 🚆 227 📍 Union Station\n🛤️ VC 🚆 210 📍 Lancaster"
            ]
        );
    }

    #[test]
    fn test_link_only_follow_up() {
        let alert = Alert::new("A1").with_url("https://example.com");
        let payload = ContentFormatter::default().format(&alert, &index(), &THREADED);
        assert_eq!(payload.follow_ups, vec!["🔗 https://example.com"]);
    }

    #[test]
    fn test_empty_schedule_degrades_gracefully() {
        let payload =
            ContentFormatter::default().format(&delay_alert(), &ScheduleIndex::default(), &SINGLE);
        assert!(payload.primary.contains("Delay"));
        assert!(!payload.primary.contains("🛤️"));
        assert!(payload.primary.ends_with("🔗 https://example.com/a1"));
    }

    #[test]
    fn test_custom_fallbacks() {
        let config = FormatConfig {
            header_fallback: "Notice".into(),
            description_fallback: "See website".into(),
            language: None,
        };
        let payload = ContentFormatter::new(&config).format(&Alert::new("A1"), &index(), &SINGLE);
        assert_eq!(payload.primary, "🚨 Notice\n\nSee website");
    }

    #[test]
    fn test_single_block_shortens_description_to_limit() {
        let alert = delay_alert().with_description("word ".repeat(100));
        let channel = ChannelSpec::single_block(Some(120));
        let payload = ContentFormatter::default().format(&alert, &index(), &channel);

        assert!(grapheme_len(&payload.primary) <= 120);
        assert!(payload.primary.starts_with("🚨 Delay\n\nword"));
        assert!(payload.primary.contains('…'));
        assert!(payload.primary.ends_with("🔗 https://example.com/a1"));
    }

    #[test]
    fn test_threaded_lead_respects_limit() {
        let alert = delay_alert().with_description("x".repeat(500));
        let channel = ChannelSpec::threaded(Some(300));
        let payload = ContentFormatter::default().format(&alert, &index(), &channel);
        assert_eq!(grapheme_len(&payload.primary), 300);
        assert!(payload.primary.ends_with('…'));
    }

    #[test]
    fn test_long_trip_context_splits_into_replies() {
        let mut alert = delay_alert();
        for _ in 0..6 {
            alert = alert.with_entity(InformedEntity::trip("T1"));
        }
        let channel = ChannelSpec::threaded(Some(80));
        let payload = ContentFormatter::default().format(&alert, &index(), &channel);

        assert!(payload.follow_ups.len() > 1);
        for block in &payload.follow_ups {
            assert!(grapheme_len(block) <= 80, "block too long: {block}");
        }
        let joined = payload.follow_ups.join("\n");
        assert_eq!(joined.matches("Union Station").count(), 7);
        assert!(payload.follow_ups.last().unwrap().contains("🔗"));
    }

    #[test]
    fn test_weighted_single_block_fits_x_limit() {
        let alert = delay_alert().with_description("word ".repeat(100));
        let channel = ChannelSpec::single_block(Some(280)).with_metric(LengthMetric::Weighted);
        let payload = ContentFormatter::default().format(&alert, &index(), &channel);

        assert!(LengthMetric::Weighted.measure(&payload.primary) <= 280);
        assert!(payload.primary.starts_with("🚨 Delay\n\nword"));
        assert!(payload.primary.contains('…'));
        assert!(payload.primary.ends_with("🔗 https://example.com/a1"));
    }

    #[test]
    fn test_weighted_limit_is_tighter_than_graphemes() {
        let alert = delay_alert().with_description("word ".repeat(100));
        let plain = ChannelSpec::single_block(Some(280));
        let weighted = plain.with_metric(LengthMetric::Weighted);
        let payloads = ContentFormatter::default().format_all(&alert, &index(), [plain, weighted]);

        assert_eq!(payloads.len(), 2);
        assert_eq!(grapheme_len(&payloads[&plain].primary), 280);
        assert!(LengthMetric::Weighted.measure(&payloads[&plain].primary) > 280);
        assert!(LengthMetric::Weighted.measure(&payloads[&weighted].primary) <= 280);
    }

    #[test]
    fn test_format_all_renders_each_channel_once() {
        let payloads = ContentFormatter::default().format_all(
            &delay_alert(),
            &index(),
            vec![SINGLE, THREADED, SINGLE],
        );
        assert_eq!(payloads.len(), 2);
        assert!(payloads[&THREADED].follow_ups.len() == 1);
    }
}
