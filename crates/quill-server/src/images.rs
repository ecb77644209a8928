//! Filesystem-backed image storage.

use std::io;
use std::path::PathBuf;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use quill_common::upload::{effective_mime_type, extension_for};
use rand::Rng;
use tracing::{debug, info};

use crate::error::ServerError;

const NAME_SUFFIX_LEN: usize = 6;
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Debug)]
pub struct ImageStore {
    dir: PathBuf,
    /// Content types recorded at upload. Files from earlier runs are sniffed instead.
    content_types: DashMap<String, String>,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            content_types: DashMap::new(),
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Write an image under a fresh `{millis}-{random}.{ext}` name and return the name.
    pub async fn put(
        &self,
        original_name: &str,
        content_type: &str,
        data: Bytes,
        now: DateTime<Utc>,
    ) -> Result<String, ServerError> {
        let name = object_name(original_name, now);
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&name), &data).await?;
        self.content_types
            .insert(name.clone(), content_type.to_string());
        info!(%name, size = data.len(), content_type, "stored image");
        Ok(name)
    }

    /// Read an image back. `None` if no such object exists.
    pub async fn get(&self, name: &str) -> Result<Option<StoredImage>, ServerError> {
        if !is_object_name(name) {
            debug!(name, "rejected image name");
            return Ok(None);
        }

        let data = match tokio::fs::read(self.dir.join(name)).await {
            Ok(data) => Bytes::from(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let content_type = match self.content_types.get(name) {
            Some(ct) => ct.value().clone(),
            None => match effective_mime_type("", &data) {
                sniffed if sniffed.is_empty() => FALLBACK_CONTENT_TYPE.to_string(),
                sniffed => sniffed,
            },
        };
        Ok(Some(StoredImage { data, content_type }))
    }
}

/// A bare file name: no separators, no parent references.
fn is_object_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\'])
        && name != "."
        && name != ".."
}

fn object_name(original_name: &str, now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..NAME_SUFFIX_LEN)
        .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
        .collect();
    format!(
        "{}-{}.{}",
        now.timestamp_millis(),
        suffix,
        extension_for(original_name)
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_123).unwrap()
    }

    #[test]
    fn test_object_name_shape() {
        let name = object_name("holiday.photo.PNG", now());
        let (stem, ext) = name.rsplit_once('.').unwrap();
        assert_eq!(ext, "PNG");
        let (millis, suffix) = stem.split_once('-').unwrap();
        assert_eq!(millis, "1700000000123");
        assert_eq!(suffix.len(), NAME_SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| BASE36.contains(&b)));

        assert!(object_name("", now()).ends_with(".jpg"));
    }

    #[test]
    fn test_object_name_validation() {
        assert!(is_object_name("1700000000123-abc123.png"));
        assert!(!is_object_name(""));
        assert!(!is_object_name(".."));
        assert!(!is_object_name("../secret"));
        assert!(!is_object_name("a\\b.png"));
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("images"));

        let name = store
            .put("cat.gif", "image/gif", Bytes::from_static(b"GIF89a...."), now())
            .await
            .unwrap();
        let image = store.get(&name).await.unwrap().unwrap();
        assert_eq!(image.content_type, "image/gif");
        assert_eq!(&image.data[..], b"GIF89a....");

        assert_eq!(store.get("missing.png").await.unwrap(), None);
        assert_eq!(store.get("../images").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_content_type_sniffed_for_unknown_objects() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("old.png"),
            b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR",
        )
        .unwrap();

        let store = ImageStore::new(dir.path());
        let image = store.get("old.png").await.unwrap().unwrap();
        assert_eq!(image.content_type, "image/png");
    }
}
