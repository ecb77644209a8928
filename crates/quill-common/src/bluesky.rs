//! Linking a post to a Bluesky thread.
//!
//! Replies to a Bluesky post can be shown under a blog post. The author pastes
//! the web URL of the announcement post (`https://bsky.app/profile/{handle}/post/{id}`);
//! we store the author DID plus the post id, resolving the handle through the
//! public AppView.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ApiError;

/// Default AppView used for handle resolution.
pub const DEFAULT_APPVIEW: &str = "https://public.api.bsky.app";

/// A resolved reference to a Bluesky post.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlueskyPostRef {
    pub did: String,
    pub cid: String,
}

/// Handle and post id pulled out of a post URL, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlueskyPostUrl {
    pub handle: String,
    pub cid: String,
}

#[derive(Deserialize)]
struct ResolveHandleOutput {
    did: String,
}

/// Parse `https://bsky.app/profile/{handle}/post/{cid}`.
///
/// Only the path shape is checked, so mirrors of the web client work too.
pub fn parse_post_url(url: &str) -> Result<BlueskyPostUrl, ApiError> {
    let parsed = Url::parse(url)?;
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.collect())
        .unwrap_or_default();

    match segments.as_slice() {
        ["profile", handle, "post", cid] if !handle.is_empty() && !cid.is_empty() => {
            Ok(BlueskyPostUrl {
                handle: (*handle).to_string(),
                cid: (*cid).to_string(),
            })
        }
        _ => Err(ApiError::InvalidUrl(format!(
            "{url} is not a Bluesky post URL (expected https://bsky.app/profile/{{handle}}/post/{{cid}})"
        ))),
    }
}

/// Resolve a handle to its DID via `com.atproto.identity.resolveHandle`.
pub async fn resolve_handle(
    http: &reqwest::Client,
    appview: &Url,
    handle: &str,
) -> Result<String, ApiError> {
    // Already a DID, nothing to look up.
    if handle.starts_with("did:") {
        return Ok(handle.to_string());
    }

    let mut endpoint = appview.join("/xrpc/com.atproto.identity.resolveHandle")?;
    endpoint.query_pairs_mut().append_pair("handle", handle);

    tracing::debug!(%handle, "resolving bluesky handle");
    let response = http.get(endpoint).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let output: ResolveHandleOutput = response.json().await?;
    Ok(output.did)
}

/// Parse a post URL and resolve its handle.
pub async fn convert_post_url(
    http: &reqwest::Client,
    appview: &Url,
    url: &str,
) -> Result<BlueskyPostRef, ApiError> {
    let parsed = parse_post_url(url)?;
    let did = resolve_handle(http, appview, &parsed.handle).await?;
    Ok(BlueskyPostRef {
        did,
        cid: parsed.cid,
    })
}
