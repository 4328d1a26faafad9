//! Bluesky (AT Protocol) client.
//!
//! Logs in with an app password through `com.atproto.server.createSession`
//! and publishes `app.bsky.feed.post` records. The session is created on
//! first use and dropped when the server rejects it.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use super::{Destination, PostRef, PublishError, PublishErrorKind, ThreadRef, check_response};
use crate::pipeline::ChannelSpec;

const POST_COLLECTION: &str = "app.bsky.feed.post";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    did: String,
}

#[derive(Debug, Deserialize)]
struct CreateRecordResponse {
    uri: String,
    cid: String,
}

/// Thread-capable destination.
pub struct BlueskyDestination {
    client: reqwest::Client,
    name: String,
    service: String,
    identifier: String,
    password: String,
    max_graphemes: usize,
    session: Mutex<Option<Session>>,
}

impl BlueskyDestination {
    pub fn new(
        client: reqwest::Client,
        name: impl Into<String>,
        service: &str,
        identifier: impl Into<String>,
        password: String,
        max_graphemes: usize,
    ) -> Self {
        Self {
            client,
            name: name.into(),
            service: service.trim_end_matches('/').to_string(),
            identifier: identifier.into(),
            password,
            max_graphemes,
            session: Mutex::new(None),
        }
    }

    fn xrpc(&self, method: &str) -> String {
        format!("{}/xrpc/{}", self.service, method)
    }

    async fn session(&self) -> Result<Session, PublishError> {
        let mut cached = self.session.lock().await;
        if let Some(session) = cached.as_ref() {
            return Ok(session.clone());
        }

        let response = self
            .client
            .post(self.xrpc("com.atproto.server.createSession"))
            .json(&json!({
                "identifier": self.identifier,
                "password": self.password,
            }))
            .send()
            .await?;

        let session: Session = match check_response(response).await {
            Ok(response) => response.json().await?,
            // A refused login is always a credentials problem.
            Err(e) if e.kind == PublishErrorKind::Rejected => {
                return Err(PublishError::auth(e.message));
            }
            Err(e) => return Err(e),
        };

        log::debug!("{}: session created for {}", self.name, session.did);
        *cached = Some(session.clone());
        Ok(session)
    }

    async fn create_post(
        &self,
        text: &str,
        thread: Option<&ThreadRef>,
    ) -> Result<PostRef, PublishError> {
        let session = self.session().await?;

        let mut record = json!({
            "$type": POST_COLLECTION,
            "text": text,
            "createdAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        let facets = link_facets(text);
        if !facets.is_empty() {
            record["facets"] = Value::Array(facets);
        }
        if let Some(thread) = thread {
            record["reply"] = json!({
                "root": strong_ref(&thread.root)?,
                "parent": strong_ref(&thread.parent)?,
            });
        }

        let response = self
            .client
            .post(self.xrpc("com.atproto.repo.createRecord"))
            .bearer_auth(&session.access_jwt)
            .json(&json!({
                "repo": session.did,
                "collection": POST_COLLECTION,
                "record": record,
            }))
            .send()
            .await?;

        match check_response(response).await {
            Ok(response) => {
                let created: CreateRecordResponse = response.json().await?;
                Ok(PostRef {
                    id: created.uri,
                    cid: Some(created.cid),
                })
            }
            Err(e) => {
                if e.kind == PublishErrorKind::Auth || e.message.contains("ExpiredToken") {
                    self.session.lock().await.take();
                }
                Err(e)
            }
        }
    }
}

fn strong_ref(post: &PostRef) -> Result<Value, PublishError> {
    let cid = post
        .cid
        .as_deref()
        .ok_or_else(|| PublishError::rejected(format!("post {} has no cid", post.id)))?;
    Ok(json!({ "uri": post.id, "cid": cid }))
}

/// Link facets for every `http(s)://` URL in `text`.
///
/// Bluesky does not auto-link plain text; facet offsets are UTF-8 byte
/// offsets.
fn link_facets(text: &str) -> Vec<Value> {
    let mut facets = Vec::new();
    let mut from = 0;
    while let Some(found) = find_url_start(&text[from..]) {
        let start = from + found;
        let end = text[start..]
            .find(char::is_whitespace)
            .map_or(text.len(), |len| start + len);
        let uri = &text[start..end];
        facets.push(json!({
            "index": { "byteStart": start, "byteEnd": end },
            "features": [{ "$type": "app.bsky.richtext.facet#link", "uri": uri }],
        }));
        from = end;
    }
    facets
}

fn find_url_start(text: &str) -> Option<usize> {
    match (text.find("https://"), text.find("http://")) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

#[async_trait]
impl Destination for BlueskyDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel(&self) -> ChannelSpec {
        ChannelSpec::threaded(Some(self.max_graphemes))
    }

    async fn post(&self, text: &str) -> Result<PostRef, PublishError> {
        self.create_post(text, None).await
    }

    async fn reply(&self, text: &str, thread: &ThreadRef) -> Result<PostRef, PublishError> {
        self.create_post(text, Some(thread)).await
    }
}
