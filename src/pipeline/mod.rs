//! Alert pipeline stages.
//!
//! - `schedule_index`: trip lookup from the static schedule
//! - `detect`: content fingerprints and change classification
//! - `format`: per-channel rendering
//! - `publish`: fan-out to destinations
//! - `run`: one orchestrated pass over the feed

pub mod detect;
pub mod format;
pub mod publish;
pub mod run;
pub mod schedule_index;

pub use detect::{AlertStatus, ChangeDetector, Classification, Fingerprint};
pub use format::{ChannelSpec, ContentFormatter, FormattedPayload, Layout, PayloadSet};
pub use publish::{Delivery, PublishOutcome, Publisher};
pub use run::{AlertDisposition, AlertReport, Pipeline, RunReport};
pub use schedule_index::ScheduleIndex;
