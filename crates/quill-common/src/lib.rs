//! quill-common: types and plumbing shared by the editor and the server.
//!
//! - `api` - the save/upload wire contract and the `BlogApi` trait
//! - `client` - reqwest-backed `BlogApi` implementation
//! - `upload` - image allow-list and size ceiling
//! - `bluesky` - post URL parsing and handle resolution
//! - `slug` - URL slug rules

pub mod api;
pub mod bluesky;
pub mod client;
pub mod error;
pub mod slug;
#[cfg(feature = "telemetry")]
pub mod telemetry;
pub mod upload;

pub use crate::api::{BlogApi, ImageFile, Intent, SaveRequest, SaveResponse, UploadResponse};
pub use crate::bluesky::BlueskyPostRef;
pub use crate::client::{ClientConfig, HttpBlogClient};
pub use crate::error::ApiError;
pub use crate::slug::slugify;
pub use crate::upload::{ALLOWED_IMAGE_TYPES, MAX_UPLOAD_BYTES, UploadRejection, validate_image};
