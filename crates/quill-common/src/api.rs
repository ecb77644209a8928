//! Wire contract between the editor and the blog backend.
//!
//! The save endpoint takes a `SaveRequest` tagged with an `Intent` and answers
//! with a `SaveResponse`. The upload endpoint takes a single image and answers
//! with an `UploadResponse`.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::bluesky::BlueskyPostRef;
use crate::error::ApiError;

/// What the server should do with a save request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Inactivity-triggered write of a draft. Refused for published posts.
    Autosave,
    /// Explicit save of whatever fields are present.
    Save,
    Publish,
    Unpublish,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Autosave => "autosave",
            Intent::Save => "save",
            Intent::Publish => "publish",
            Intent::Unpublish => "unpublish",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a save request. Absent fields are left untouched by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub intent: Intent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Blank clears the stored value, absent leaves it alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bluesky_did: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bluesky_post_cid: Option<String>,
}

impl SaveRequest {
    /// A request carrying only the intent.
    pub fn new(intent: Intent) -> Self {
        Self {
            intent,
            title: None,
            body: None,
            slug: None,
            bluesky_did: None,
            bluesky_post_cid: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// Attach (or, with `None`, explicitly clear) the Bluesky thread link.
    pub fn with_bluesky(mut self, post: Option<&BlueskyPostRef>) -> Self {
        match post {
            Some(post) => {
                self.bluesky_did = Some(post.did.clone());
                self.bluesky_post_cid = Some(post.cid.clone());
            }
            None => {
                self.bluesky_did = Some(String::new());
                self.bluesky_post_cid = Some(String::new());
            }
        }
        self
    }
}

/// Answer from the save endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }

    /// Collapse into a `Result`, treating `success: false` or any `error` as a rejection.
    pub fn into_result(self) -> Result<Option<String>, ApiError> {
        match (self.success, self.error) {
            (true, None) => Ok(self.message),
            (_, Some(error)) => Err(ApiError::Rejected(error)),
            (false, None) => Err(ApiError::Rejected("unknown error".into())),
        }
    }
}

/// Answer from the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub file_name: String,
    pub url: String,
}

/// A file handed to the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    /// Original filename as the platform reported it. May be empty for pasted images.
    pub file_name: String,
    /// Declared MIME type.
    pub mime_type: String,
    pub data: Bytes,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Whether the declared type marks this as an image at all.
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The backend as the editor sees it.
///
/// Implementations are expected to be cheap to share; the editor session
/// holds one for its whole lifetime.
#[trait_variant::make(Send)]
pub trait BlogApi {
    /// Submit a save request for the given post.
    async fn save(&self, post_id: i64, request: SaveRequest) -> Result<SaveResponse, ApiError>;

    /// Upload one image, returning where it can be fetched from.
    async fn upload_image(&self, image: ImageFile) -> Result<UploadResponse, ApiError>;

    /// Turn a `bsky.app` post URL into the DID/CID pair used for reply threads.
    async fn resolve_bluesky_post(&self, url: &str) -> Result<BlueskyPostRef, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_request_skips_absent_fields() {
        let req = SaveRequest::new(Intent::Autosave).with_body("hello");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, serde_json::json!({ "intent": "autosave", "body": "hello" }));
    }

    #[test]
    fn test_save_request_bluesky_fields_are_camel_case() {
        let post = BlueskyPostRef {
            did: "did:plc:abc".into(),
            cid: "3kxyz".into(),
        };
        let req = SaveRequest::new(Intent::Save).with_bluesky(Some(&post));
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["blueskyDid"], "did:plc:abc");
        assert_eq!(json["blueskyPostCid"], "3kxyz");

        let cleared = SaveRequest::new(Intent::Save).with_bluesky(None);
        assert_eq!(cleared.bluesky_did.as_deref(), Some(""));
    }

    #[test]
    fn test_save_response_into_result() {
        assert_eq!(
            SaveResponse::ok("Draft saved").into_result().unwrap(),
            Some("Draft saved".to_string())
        );

        let err = SaveResponse::err("Cannot autosave a published post")
            .into_result()
            .unwrap_err();
        assert!(matches!(err, ApiError::Rejected(msg) if msg.contains("published")));

        let parsed: SaveResponse = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(parsed.into_result().is_err());
    }

    #[test]
    fn test_upload_response_uses_file_name_key() {
        let parsed: UploadResponse = serde_json::from_str(
            r#"{"success": true, "fileName": "1-ab.png", "url": "/api/images/1-ab.png"}"#,
        )
        .unwrap();
        assert_eq!(parsed.file_name, "1-ab.png");
    }

    #[test]
    fn test_intent_wire_names() {
        let parsed: Intent = serde_json::from_str("\"unpublish\"").unwrap();
        assert_eq!(parsed, Intent::Unpublish);
        assert_eq!(Intent::Autosave.to_string(), "autosave");
    }
}
