//! Publishing destinations.
//!
//! Each destination is a thin wire client behind the [`Destination`] trait.
//! The publisher only sees the trait, so failures stay local to the
//! destination that produced them.

pub mod bluesky;
pub mod console;
pub mod twitter;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::error::{AppError, Result};
use crate::models::DestinationConfig;
use crate::pipeline::ChannelSpec;
use crate::utils::text::LengthMetric;

pub use bluesky::BlueskyDestination;
pub use console::ConsoleDestination;
pub use twitter::TwitterDestination;

/// Reference to a published post, used to thread replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRef {
    /// Platform id or URI of the post
    pub id: String,
    /// Content hash where the platform requires one for replies
    pub cid: Option<String>,
}

impl PostRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cid: None,
        }
    }
}

/// Position of a reply inside a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRef {
    pub root: PostRef,
    pub parent: PostRef,
}

/// Broad class of a publish failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishErrorKind {
    /// Connection failure, timeout, rate limit or server error
    Network,
    /// Credentials rejected
    Auth,
    /// Payload or operation refused
    Rejected,
}

impl PublishErrorKind {
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network)
    }
}

/// A failed post. Recorded in the outcome, never propagated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct PublishError {
    pub kind: PublishErrorKind,
    pub message: String,
}

impl PublishError {
    pub fn new(kind: PublishErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PublishErrorKind::Network, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(PublishErrorKind::Auth, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(PublishErrorKind::Rejected, message)
    }

    /// Classify a non-success HTTP response.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let kind = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PublishErrorKind::Auth,
            StatusCode::TOO_MANY_REQUESTS => PublishErrorKind::Network,
            s if s.is_server_error() => PublishErrorKind::Network,
            _ => PublishErrorKind::Rejected,
        };
        Self::new(kind, format!("HTTP {}: {}", status.as_u16(), body.trim()))
    }
}

impl From<reqwest::Error> for PublishError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::rejected(e.to_string())
        } else {
            Self::network(e.to_string())
        }
    }
}

/// Turn a non-2xx response into a classified error.
pub(crate) async fn check_response(
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, PublishError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PublishError::from_status(status, &body))
}

/// An external publishing channel.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Name used in logs and outcomes.
    fn name(&self) -> &str;

    /// Shape and length limit of posts on this channel.
    fn channel(&self) -> ChannelSpec;

    /// Publish a top-level post.
    async fn post(&self, text: &str) -> std::result::Result<PostRef, PublishError>;

    /// Publish a reply inside a thread.
    async fn reply(
        &self,
        text: &str,
        thread: &ThreadRef,
    ) -> std::result::Result<PostRef, PublishError> {
        let _ = (text, thread);
        Err(PublishError::rejected(format!(
            "{} does not support replies",
            self.name()
        )))
    }
}

/// Build the configured destinations.
///
/// `secret` resolves the environment variable names found in the config.
pub fn build_all(
    configs: &[DestinationConfig],
    client: &reqwest::Client,
    secret: impl Fn(&str) -> Option<String>,
) -> Result<Vec<Arc<dyn Destination>>> {
    let require = |name: &str, var: &str| {
        secret(var).ok_or_else(|| {
            AppError::config(format!("{name}: credential variable {var} is not set"))
        })
    };

    configs
        .iter()
        .map(|config| -> Result<Arc<dyn Destination>> {
            Ok(match config {
                DestinationConfig::Twitter {
                    name,
                    endpoint,
                    token_env,
                    max_length,
                } => Arc::new(TwitterDestination::new(
                    client.clone(),
                    name,
                    endpoint,
                    require(name, token_env)?,
                    *max_length,
                )),
                DestinationConfig::Bluesky {
                    name,
                    service,
                    identifier,
                    password_env,
                    max_graphemes,
                } => Arc::new(BlueskyDestination::new(
                    client.clone(),
                    name,
                    service,
                    identifier,
                    require(name, password_env)?,
                    *max_graphemes,
                )),
                DestinationConfig::Log { name, threaded } => {
                    let channel = if *threaded {
                        ChannelSpec::threaded(None)
                    } else {
                        ChannelSpec::single_block(None)
                    };
                    Arc::new(ConsoleDestination::new(name, channel))
                }
            })
        })
        .collect()
}

/// Console stand-ins with the same names and channel shapes as the
/// configured destinations. Used for dry runs.
pub fn console_mirror(configs: &[DestinationConfig]) -> Vec<Arc<dyn Destination>> {
    configs
        .iter()
        .map(|config| -> Arc<dyn Destination> {
            let channel = match config {
                DestinationConfig::Twitter { max_length, .. } => {
                    ChannelSpec::single_block(Some(*max_length))
                        .with_metric(LengthMetric::Weighted)
                }
                DestinationConfig::Bluesky { max_graphemes, .. } => {
                    ChannelSpec::threaded(Some(*max_graphemes))
                }
                DestinationConfig::Log { threaded: true, .. } => ChannelSpec::threaded(None),
                DestinationConfig::Log { .. } => ChannelSpec::single_block(None),
            };
            Arc::new(ConsoleDestination::new(config.name(), channel))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Layout;

    #[test]
    fn test_status_classification() {
        let kind = |code: u16| {
            PublishError::from_status(StatusCode::from_u16(code).unwrap(), "").kind
        };
        assert_eq!(kind(401), PublishErrorKind::Auth);
        assert_eq!(kind(403), PublishErrorKind::Auth);
        assert_eq!(kind(429), PublishErrorKind::Network);
        assert_eq!(kind(503), PublishErrorKind::Network);
        assert_eq!(kind(400), PublishErrorKind::Rejected);
        assert_eq!(kind(422), PublishErrorKind::Rejected);
        assert!(PublishErrorKind::Network.is_transient());
        assert!(!PublishErrorKind::Auth.is_transient());
    }

    #[test]
    fn test_build_all_requires_credentials() {
        let configs = vec![DestinationConfig::Twitter {
            name: "twitter".into(),
            endpoint: "https://api.twitter.com".into(),
            token_env: "TWITTER_BEARER_TOKEN".into(),
            max_length: 280,
        }];
        let client = reqwest::Client::new();

        let missing = build_all(&configs, &client, |_| None);
        assert!(matches!(missing, Err(AppError::Config(_))));

        let built = build_all(&configs, &client, |_| Some("token".into())).unwrap();
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].name(), "twitter");
        assert_eq!(
            built[0].channel(),
            ChannelSpec::single_block(Some(280)).with_metric(LengthMetric::Weighted)
        );
    }

    #[test]
    fn test_console_mirror_keeps_shapes() {
        let configs = vec![
            DestinationConfig::Twitter {
                name: "x".into(),
                endpoint: "https://api.twitter.com".into(),
                token_env: "T".into(),
                max_length: 280,
            },
            DestinationConfig::Bluesky {
                name: "sky".into(),
                service: "https://bsky.social".into(),
                identifier: "bot".into(),
                password_env: "P".into(),
                max_graphemes: 300,
            },
        ];
        let mirror = console_mirror(&configs);
        assert_eq!(mirror[0].name(), "x");
        assert_eq!(mirror[0].channel().layout, Layout::SingleBlock);
        assert_eq!(mirror[0].channel().metric, LengthMetric::Weighted);
        assert_eq!(mirror[1].name(), "sky");
        assert_eq!(mirror[1].channel(), ChannelSpec::threaded(Some(300)));
    }
}
