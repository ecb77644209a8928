//! Post storage and the save-intent rules.
//!
//! Posts live in memory for the lifetime of the process. Every write goes
//! through [`PostStore::apply`], which implements what each `Intent` is
//! allowed to change.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use quill_common::slug::{is_placeholder_slug, slugify};
use quill_common::{Intent, SaveRequest, SaveResponse};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ServerError;

const UNTITLED: &str = "Untitled Draft";
const DRAFT_SLUG_BASE: &str = "draft";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub body: String,
    /// Unix seconds. `None` while the post is a draft.
    pub published_date: Option<i64>,
    pub bluesky_did: Option<String>,
    pub bluesky_post_cid: Option<String>,
}

impl Post {
    pub fn is_published(&self) -> bool {
        self.published_date.is_some()
    }
}

#[derive(Debug)]
pub struct PostStore {
    posts: DashMap<i64, Post>,
    next_id: AtomicI64,
}

impl Default for PostStore {
    fn default() -> Self {
        Self {
            posts: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl PostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty draft with a `draft-{millis}` placeholder slug.
    pub fn create_draft(&self, now: DateTime<Utc>) -> Post {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let post = Post {
            id,
            slug: format!("{DRAFT_SLUG_BASE}-{}", now.timestamp_millis()),
            title: String::new(),
            body: String::new(),
            published_date: None,
            bluesky_did: None,
            bluesky_post_cid: None,
        };
        self.posts.insert(id, post.clone());
        debug!(id, slug = %post.slug, "created draft");
        post
    }

    pub fn get(&self, id: i64) -> Option<Post> {
        self.posts.get(&id).map(|p| p.value().clone())
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    fn slug_taken(&self, slug: &str, except: i64) -> bool {
        self.posts
            .iter()
            .any(|entry| entry.id != except && entry.slug == slug)
    }

    /// Slug for a draft that still has a placeholder: the title slugified,
    /// or `draft`, suffixed with the id when another post already uses it.
    fn generated_slug(&self, id: i64, title: Option<&str>) -> String {
        let base = title
            .map(slugify)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DRAFT_SLUG_BASE.to_string());
        if self.slug_taken(&base, id) {
            format!("{base}-{id}")
        } else {
            base
        }
    }

    /// Apply a save request to post `id`.
    ///
    /// Rule violations (autosaving a published post, publishing an incomplete
    /// one) come back as an unsuccessful `SaveResponse`; only a missing post
    /// is an error. The rules are checked and applied while the post's entry
    /// is locked, so concurrent requests for one post serialize.
    pub fn apply(
        &self,
        id: i64,
        request: SaveRequest,
        now: DateTime<Utc>,
    ) -> Result<SaveResponse, ServerError> {
        let intent = request.intent;

        // The collision scan reads every shard and must not run under the entry lock.
        let generated_slug = match (&intent, &request.body) {
            (Intent::Autosave, Some(_)) => Some(self.generated_slug(id, request.title.as_deref())),
            _ => None,
        };

        let mut post = self
            .posts
            .get_mut(&id)
            .ok_or_else(|| ServerError::NotFound(format!("post {id}")))?;

        let response = match intent {
            Intent::Autosave => {
                if post.is_published() {
                    return Ok(SaveResponse::err("Cannot autosave a published post"));
                }
                autosave(&mut post, request, generated_slug);
                SaveResponse::ok("Changes Saved")
            }
            Intent::Save => {
                apply_fields(&mut post, request);
                SaveResponse::ok("Draft saved")
            }
            Intent::Publish => {
                if post.slug.is_empty() || post.title.is_empty() || post.body.is_empty() {
                    return Ok(SaveResponse::err(
                        "Post must have a title, slug, and body to be published",
                    ));
                }
                post.published_date = Some(now.timestamp());
                SaveResponse::ok("Post published")
            }
            Intent::Unpublish => {
                post.published_date = None;
                SaveResponse::ok("Post unpublished")
            }
        };

        debug!(id, %intent, slug = %post.slug, "post updated");
        Ok(response)
    }
}

fn autosave(post: &mut Post, request: SaveRequest, generated_slug: Option<String>) {
    if let Some(body) = &request.body {
        if let Some(slug) = generated_slug.filter(|_| is_placeholder_slug(&post.slug)) {
            post.slug = slug;
        }
        if post.title.is_empty() {
            post.title = body
                .lines()
                .next()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .unwrap_or(UNTITLED)
                .to_string();
        }
    }
    apply_fields(post, request);
}

/// Copy the fields a request carries onto the post.
///
/// A blank slug is ignored, and a blank Bluesky field clears the stored value.
fn apply_fields(post: &mut Post, request: SaveRequest) {
    if let Some(title) = request.title {
        post.title = title;
    }
    if let Some(body) = request.body {
        post.body = body;
    }
    if let Some(slug) = request.slug.filter(|s| !s.is_empty()) {
        post.slug = slugify(&slug);
    }
    if let Some(did) = request.bluesky_did {
        post.bluesky_did = non_blank(did);
    }
    if let Some(cid) = request.bluesky_post_cid {
        post.bluesky_post_cid = non_blank(cid);
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn autosave(body: &str) -> SaveRequest {
        SaveRequest::new(Intent::Autosave).with_body(body)
    }

    #[test]
    fn test_create_draft() {
        let store = PostStore::new();
        let post = store.create_draft(now());
        assert_eq!(post.id, 1);
        assert_eq!(post.slug, "draft-1700000000000");
        assert!(!post.is_published());
        assert_eq!(store.create_draft(now()).id, 2);
    }

    #[test]
    fn test_missing_post() {
        let store = PostStore::new();
        let result = store.apply(9, autosave("x"), now());
        assert!(matches!(result, Err(ServerError::NotFound(_))));
    }

    #[test]
    fn test_autosave_names_untitled_draft() {
        let store = PostStore::new();
        let id = store.create_draft(now()).id;

        let response = store
            .apply(id, autosave("  My first post  \nbody text"), now())
            .unwrap();
        assert_eq!(response, SaveResponse::ok("Changes Saved"));

        let post = store.get(id).unwrap();
        assert_eq!(post.title, "My first post");
        assert_eq!(post.slug, "draft");
        assert_eq!(post.body, "  My first post  \nbody text");
    }

    #[test]
    fn test_autosave_empty_body_is_untitled() {
        let store = PostStore::new();
        let id = store.create_draft(now()).id;
        store.apply(id, autosave(""), now()).unwrap();
        assert_eq!(store.get(id).unwrap().title, UNTITLED);
    }

    #[test]
    fn test_autosave_slug_from_title_with_collision() {
        let store = PostStore::new();
        let first = store.create_draft(now()).id;
        let second = store.create_draft(now()).id;

        let request = autosave("body").with_title("Hello World");
        store.apply(first, request.clone(), now()).unwrap();
        store.apply(second, request, now()).unwrap();

        assert_eq!(store.get(first).unwrap().slug, "hello-world");
        assert_eq!(store.get(second).unwrap().slug, format!("hello-world-{second}"));
    }

    #[test]
    fn test_autosave_keeps_chosen_slug() {
        let store = PostStore::new();
        let id = store.create_draft(now()).id;
        store
            .apply(id, autosave("b").with_slug("My Custom Slug"), now())
            .unwrap();
        assert_eq!(store.get(id).unwrap().slug, "my-custom-slug");

        // No longer a placeholder: later autosaves leave it alone.
        store
            .apply(id, autosave("b2").with_title("Other"), now())
            .unwrap();
        assert_eq!(store.get(id).unwrap().slug, "my-custom-slug");
    }

    #[test]
    fn test_autosave_refused_once_published() {
        let store = PostStore::new();
        let id = store.create_draft(now()).id;
        store
            .apply(id, autosave("text").with_title("T"), now())
            .unwrap();
        store.apply(id, SaveRequest::new(Intent::Publish), now()).unwrap();

        let response = store.apply(id, autosave("changed"), now()).unwrap();
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Cannot autosave a published post"));
        assert_eq!(store.get(id).unwrap().body, "text");
    }

    #[test]
    fn test_publish_requires_complete_post() {
        let store = PostStore::new();
        let id = store.create_draft(now()).id;

        let response = store.apply(id, SaveRequest::new(Intent::Publish), now()).unwrap();
        assert!(!response.success);
        assert!(!store.get(id).unwrap().is_published());

        store
            .apply(
                id,
                SaveRequest::new(Intent::Save)
                    .with_title("T")
                    .with_body("B")
                    .with_slug("t"),
                now(),
            )
            .unwrap();
        let response = store.apply(id, SaveRequest::new(Intent::Publish), now()).unwrap();
        assert_eq!(response, SaveResponse::ok("Post published"));
        assert_eq!(store.get(id).unwrap().published_date, Some(1_700_000_000));

        let response = store
            .apply(id, SaveRequest::new(Intent::Unpublish), now())
            .unwrap();
        assert_eq!(response, SaveResponse::ok("Post unpublished"));
        assert!(!store.get(id).unwrap().is_published());
    }

    #[test]
    fn test_bluesky_fields_set_and_clear() {
        let store = PostStore::new();
        let id = store.create_draft(now()).id;
        let link = quill_common::BlueskyPostRef {
            did: "did:plc:abc".into(),
            cid: "3kxyz".into(),
        };

        store
            .apply(id, SaveRequest::new(Intent::Save).with_bluesky(Some(&link)), now())
            .unwrap();
        let post = store.get(id).unwrap();
        assert_eq!(post.bluesky_did.as_deref(), Some("did:plc:abc"));
        assert_eq!(post.bluesky_post_cid.as_deref(), Some("3kxyz"));

        // Absent fields leave the link alone.
        store
            .apply(id, SaveRequest::new(Intent::Save).with_title("t"), now())
            .unwrap();
        assert!(store.get(id).unwrap().bluesky_did.is_some());

        store
            .apply(id, SaveRequest::new(Intent::Save).with_bluesky(None), now())
            .unwrap();
        let post = store.get(id).unwrap();
        assert_eq!(post.bluesky_did, None);
        assert_eq!(post.bluesky_post_cid, None);
    }

    #[test]
    fn test_concurrent_autosave_never_undoes_publish() {
        let store = PostStore::new();
        let body = "words ".repeat(20_000);

        for _ in 0..200 {
            let id = store.create_draft(now()).id;
            let complete = SaveRequest::new(Intent::Save)
                .with_title("T")
                .with_slug("t")
                .with_body(body.as_str());
            store.apply(id, complete, now()).unwrap();

            let barrier = Barrier::new(2);
            let (autosaved, published) = thread::scope(|s| {
                let autosaver = s.spawn(|| {
                    barrier.wait();
                    store
                        .apply(id, autosave(&body).with_title("T2"), now())
                        .unwrap()
                });
                let publisher = s.spawn(|| {
                    barrier.wait();
                    store.apply(id, SaveRequest::new(Intent::Publish), now()).unwrap()
                });
                (autosaver.join().unwrap(), publisher.join().unwrap())
            });

            assert!(published.success);
            let post = store.get(id).unwrap();
            assert!(post.is_published());
            if autosaved.success {
                assert_eq!(post.title, "T2");
            } else {
                assert_eq!(post.title, "T");
                assert_eq!(
                    autosaved.error.as_deref(),
                    Some("Cannot autosave a published post")
                );
            }
        }
    }
}
