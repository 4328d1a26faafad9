// src/utils/text.rs

//! Text measurement for platform length limits.
//!
//! Bluesky counts extended grapheme clusters. X weights its count: Latin
//! text costs one unit per character, most other scripts and emoji cost
//! two, and every link costs a fixed 23 whatever its length.

use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

/// Marker appended to shortened text.
pub const ELLIPSIS: &str = "…";

/// Weight X charges for any link.
const URL_WEIGHT: usize = 23;

/// Code point ranges X counts as one unit.
const LIGHT_RANGES: [(u32, u32); 4] = [
    (0x0000, 0x10FF),
    (0x2000, 0x200D),
    (0x2010, 0x201F),
    (0x2032, 0x2037),
];

/// How a channel counts the length of a post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthMetric {
    /// One unit per extended grapheme cluster
    #[default]
    Graphemes,
    /// X's weighted count
    Weighted,
}

impl LengthMetric {
    /// Length of `text` under this metric.
    pub fn measure(self, text: &str) -> usize {
        match self {
            Self::Graphemes => grapheme_len(text),
            Self::Weighted => weighted_units(text).iter().map(|(_, w)| w).sum(),
        }
    }

    /// Shorten `text` to at most `max` units, ending in an ellipsis when cut.
    ///
    /// Links are kept whole or dropped, never cut.
    pub fn truncate(self, text: &str, max: usize) -> String {
        if self.measure(text) <= max {
            return text.to_string();
        }
        let ellipsis = self.measure(ELLIPSIS);
        if max < ellipsis {
            return String::new();
        }

        let budget = max - ellipsis;
        let mut kept = String::new();
        let mut used = 0;
        for (unit, weight) in self.units(text) {
            if used + weight > budget {
                break;
            }
            kept.push_str(unit);
            used += weight;
        }
        format!("{}{}", kept.trim_end(), ELLIPSIS)
    }

    fn units(self, text: &str) -> Vec<(&str, usize)> {
        match self {
            Self::Graphemes => text.graphemes(true).map(|g| (g, 1)).collect(),
            Self::Weighted => weighted_units(text),
        }
    }
}

/// Number of extended grapheme clusters in `text`.
pub fn grapheme_len(text: &str) -> usize {
    text.graphemes(true).count()
}

fn grapheme_weight(grapheme: &str) -> usize {
    let light = grapheme.chars().next().is_some_and(|c| {
        let cp = u32::from(c);
        LIGHT_RANGES.iter().any(|&(lo, hi)| (lo..=hi).contains(&cp))
    });
    // Emoji presentation selectors make a light base count as emoji.
    if light && !grapheme.contains('\u{FE0F}') { 1 } else { 2 }
}

fn url_start(text: &str) -> Option<usize> {
    ["https://", "http://"]
        .iter()
        .filter_map(|scheme| text.find(scheme))
        .min()
}

/// Split into weighted units: whole links, and graphemes elsewhere.
fn weighted_units(text: &str) -> Vec<(&str, usize)> {
    let mut units = Vec::new();
    let mut rest = text;
    while let Some(start) = url_start(rest) {
        units.extend(
            rest[..start]
                .graphemes(true)
                .map(|g| (g, grapheme_weight(g))),
        );
        let tail = &rest[start..];
        let end = tail.find(char::is_whitespace).unwrap_or(tail.len());
        units.push((&tail[..end], URL_WEIGHT));
        rest = &tail[end..];
    }
    units.extend(rest.graphemes(true).map(|g| (g, grapheme_weight(g))));
    units
}
