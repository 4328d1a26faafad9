//! X (Twitter) API v2 client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Destination, PostRef, PublishError, check_response};
use crate::pipeline::ChannelSpec;
use crate::utils::text::LengthMetric;

#[derive(Debug, Deserialize)]
struct CreateTweetResponse {
    data: TweetData,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
}

/// Single-post destination using `POST /2/tweets` with a user bearer token.
pub struct TwitterDestination {
    client: reqwest::Client,
    name: String,
    endpoint: String,
    token: String,
    max_length: usize,
}

impl TwitterDestination {
    pub fn new(
        client: reqwest::Client,
        name: impl Into<String>,
        endpoint: &str,
        token: String,
        max_length: usize,
    ) -> Self {
        Self {
            client,
            name: name.into(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
            max_length,
        }
    }
}

#[async_trait]
impl Destination for TwitterDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel(&self) -> ChannelSpec {
        ChannelSpec::single_block(Some(self.max_length)).with_metric(LengthMetric::Weighted)
    }

    async fn post(&self, text: &str) -> Result<PostRef, PublishError> {
        let response = self
            .client
            .post(format!("{}/2/tweets", self.endpoint))
            .bearer_auth(&self.token)
            .json(&json!({ "text": text }))
            .send()
            .await?;

        let created: CreateTweetResponse = check_response(response).await?.json().await?;
        log::debug!("{}: created tweet {}", self.name, created.data.id);
        Ok(PostRef::new(created.data.id))
    }
}
