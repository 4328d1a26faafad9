//! Destination that writes payloads to the log.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{Destination, PostRef, PublishError, ThreadRef};
use crate::pipeline::ChannelSpec;

/// Logs every post at info level. Never fails.
pub struct ConsoleDestination {
    name: String,
    channel: ChannelSpec,
    counter: AtomicUsize,
}

impl ConsoleDestination {
    pub fn new(name: impl Into<String>, channel: ChannelSpec) -> Self {
        Self {
            name: name.into(),
            channel,
            counter: AtomicUsize::new(0),
        }
    }

    fn next_ref(&self) -> PostRef {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        PostRef {
            id: format!("{}-{}", self.name, n),
            cid: Some(n.to_string()),
        }
    }
}

#[async_trait]
impl Destination for ConsoleDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel(&self) -> ChannelSpec {
        self.channel
    }

    async fn post(&self, text: &str) -> Result<PostRef, PublishError> {
        let post = self.next_ref();
        log::info!("[{}] post {}:\n{}", self.name, post.id, text);
        Ok(post)
    }

    async fn reply(&self, text: &str, thread: &ThreadRef) -> Result<PostRef, PublishError> {
        let post = self.next_ref();
        log::info!(
            "[{}] reply {} to {}:\n{}",
            self.name,
            post.id,
            thread.parent.id,
            text
        );
        Ok(post)
    }
}
