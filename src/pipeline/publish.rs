//! Fan-out of rendered payloads to destinations.
//!
//! Every destination is attempted on its own; a failure is recorded in that
//! destination's outcome and never reaches the others. Threaded payloads
//! post the lead first and only then the replies, each replying to the
//! previous post.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use crate::destinations::{Destination, PublishError, PublishErrorKind, ThreadRef};
use crate::pipeline::{ChannelSpec, FormattedPayload, PayloadSet};

/// Result of one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Delivery {
    Delivered,
    Failed {
        kind: PublishErrorKind,
        message: String,
    },
    /// Not attempted because an earlier post in the thread failed
    Skipped,
}

impl Delivery {
    fn failed(error: &PublishError) -> Self {
        Self::Failed {
            kind: error.kind,
            message: error.message.clone(),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Per-destination result of publishing one alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    pub destination: String,
    pub lead: Delivery,
    pub follow_ups: Vec<Delivery>,
}

impl PublishOutcome {
    /// Lead and every follow-up delivered.
    pub fn success(&self) -> bool {
        self.lead.is_delivered() && self.follow_ups.iter().all(Delivery::is_delivered)
    }

    /// Kind of the first failure, if any.
    pub fn error_kind(&self) -> Option<PublishErrorKind> {
        std::iter::once(&self.lead)
            .chain(&self.follow_ups)
            .find_map(|delivery| match delivery {
                Delivery::Failed { kind, .. } => Some(*kind),
                _ => None,
            })
    }
}

/// Holds the configured destinations, in configuration order.
#[derive(Clone, Default)]
pub struct Publisher {
    destinations: Vec<Arc<dyn Destination>>,
}

impl Publisher {
    pub fn new(destinations: Vec<Arc<dyn Destination>>) -> Self {
        Self { destinations }
    }

    /// Channel specs the formatter has to render for.
    pub fn channels(&self) -> Vec<ChannelSpec> {
        self.destinations.iter().map(|d| d.channel()).collect()
    }

    pub fn destination_names(&self) -> Vec<&str> {
        self.destinations.iter().map(|d| d.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Publish one alert to every destination.
    ///
    /// Destinations run concurrently; outcomes come back in configuration
    /// order.
    pub async fn publish(&self, alert_id: &str, payloads: &PayloadSet) -> Vec<PublishOutcome> {
        join_all(self.destinations.iter().map(|destination| {
            let payload = payloads.get(&destination.channel());
            deliver(alert_id, destination.as_ref(), payload)
        }))
        .await
    }
}

async fn deliver(
    alert_id: &str,
    destination: &dyn Destination,
    payload: Option<&FormattedPayload>,
) -> PublishOutcome {
    let name = destination.name().to_string();

    let Some(payload) = payload else {
        log::error!("[{alert_id}] {name}: no payload rendered for its channel");
        return PublishOutcome {
            destination: name,
            lead: Delivery::failed(&PublishError::rejected("no payload rendered")),
            follow_ups: Vec::new(),
        };
    };

    let lead = match destination.post(&payload.primary).await {
        Ok(post) => post,
        Err(e) => {
            log::error!("[{alert_id}] {name}: post failed: {e}");
            return PublishOutcome {
                destination: name,
                lead: Delivery::failed(&e),
                follow_ups: vec![Delivery::Skipped; payload.follow_ups.len()],
            };
        }
    };
    log::info!("[{alert_id}] {name}: posted {}", lead.id);

    let mut follow_ups = Vec::with_capacity(payload.follow_ups.len());
    let mut parent = lead.clone();
    let mut broken = false;
    for (n, text) in payload.follow_ups.iter().enumerate() {
        if broken {
            follow_ups.push(Delivery::Skipped);
            continue;
        }
        let thread = ThreadRef {
            root: lead.clone(),
            parent: parent.clone(),
        };
        match destination.reply(text, &thread).await {
            Ok(post) => {
                log::debug!("[{alert_id}] {name}: reply {} posted {}", n + 1, post.id);
                parent = post;
                follow_ups.push(Delivery::Delivered);
            }
            Err(e) => {
                log::error!("[{alert_id}] {name}: reply {} failed: {e}", n + 1);
                follow_ups.push(Delivery::failed(&e));
                broken = true;
            }
        }
    }

    PublishOutcome {
        destination: name,
        lead: Delivery::Delivered,
        follow_ups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destinations::PostRef;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records calls; fails the posts whose 1-based index is listed.
    struct Scripted {
        name: String,
        channel: ChannelSpec,
        fail_on: Vec<usize>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(name: &str, channel: ChannelSpec, fail_on: Vec<usize>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                channel,
                fail_on,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn record(&self, entry: String) -> Result<PostRef, PublishError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(entry);
            let n = calls.len();
            if self.fail_on.contains(&n) {
                Err(PublishError::network("connection reset"))
            } else {
                Ok(PostRef {
                    id: format!("{}-{}", self.name, n),
                    cid: Some(format!("cid{n}")),
                })
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Destination for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        fn channel(&self) -> ChannelSpec {
            self.channel
        }

        async fn post(&self, text: &str) -> Result<PostRef, PublishError> {
            self.record(format!("post:{text}"))
        }

        async fn reply(&self, text: &str, thread: &ThreadRef) -> Result<PostRef, PublishError> {
            self.record(format!("reply:{}:{text}", thread.parent.id))
        }
    }

    const SINGLE: ChannelSpec = ChannelSpec::single_block(None);
    const THREADED: ChannelSpec = ChannelSpec::threaded(None);

    fn payloads(follow_ups: &[&str]) -> PayloadSet {
        let mut set = PayloadSet::new();
        set.insert(
            SINGLE,
            FormattedPayload {
                primary: "single".into(),
                follow_ups: Vec::new(),
            },
        );
        set.insert(
            THREADED,
            FormattedPayload {
                primary: "lead".into(),
                follow_ups: follow_ups.iter().map(|s| s.to_string()).collect(),
            },
        );
        set
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let failing = Scripted::new("failing", SINGLE, vec![1]);
        let working = Scripted::new("working", SINGLE, vec![]);
        let publisher = Publisher::new(vec![failing.clone(), working.clone()]);

        let outcomes = publisher.publish("A1", &payloads(&[])).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].destination, "failing");
        assert!(!outcomes[0].success());
        assert_eq!(outcomes[0].error_kind(), Some(PublishErrorKind::Network));
        assert_eq!(outcomes[1].destination, "working");
        assert!(outcomes[1].success());
        assert_eq!(working.calls(), vec!["post:single"]);
    }

    #[tokio::test]
    async fn test_thread_replies_chain() {
        let bsky = Scripted::new("bsky", THREADED, vec![]);
        let publisher = Publisher::new(vec![bsky.clone()]);

        let outcomes = publisher.publish("A1", &payloads(&["one", "two"])).await;

        assert!(outcomes[0].success());
        assert_eq!(
            bsky.calls(),
            vec!["post:lead", "reply:bsky-1:one", "reply:bsky-2:two"]
        );
    }

    #[tokio::test]
    async fn test_lead_failure_skips_follow_ups() {
        let bsky = Scripted::new("bsky", THREADED, vec![1]);
        let publisher = Publisher::new(vec![bsky.clone()]);

        let outcomes = publisher.publish("A1", &payloads(&["one", "two"])).await;

        assert!(matches!(outcomes[0].lead, Delivery::Failed { .. }));
        assert_eq!(
            outcomes[0].follow_ups,
            vec![Delivery::Skipped, Delivery::Skipped]
        );
        assert_eq!(bsky.calls(), vec!["post:lead"]);
    }

    #[tokio::test]
    async fn test_reply_failure_skips_rest() {
        let bsky = Scripted::new("bsky", THREADED, vec![2]);
        let publisher = Publisher::new(vec![bsky.clone()]);

        let outcomes = publisher.publish("A1", &payloads(&["one", "two"])).await;

        assert!(outcomes[0].lead.is_delivered());
        assert!(matches!(outcomes[0].follow_ups[0], Delivery::Failed { .. }));
        assert_eq!(outcomes[0].follow_ups[1], Delivery::Skipped);
        assert!(!outcomes[0].success());
        assert_eq!(bsky.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_payload_is_rejected() {
        let odd = Scripted::new("odd", ChannelSpec::single_block(Some(50)), vec![]);
        let publisher = Publisher::new(vec![odd.clone()]);

        let outcomes = publisher.publish("A1", &payloads(&[])).await;

        assert_eq!(outcomes[0].error_kind(), Some(PublishErrorKind::Rejected));
        assert!(odd.calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_follow_ups_posts_lead_only() {
        let bsky = Scripted::new("bsky", THREADED, vec![]);
        let publisher = Publisher::new(vec![bsky.clone()]);

        let outcomes = publisher.publish("A1", &payloads(&[])).await;
        assert!(outcomes[0].success());
        assert!(outcomes[0].follow_ups.is_empty());
        assert_eq!(bsky.calls(), vec!["post:lead"]);
    }
}
