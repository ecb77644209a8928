use std::sync::Arc;

use crate::config::Config;
use crate::images::ImageStore;
use crate::posts::PostStore;

pub struct AppStateInner {
    pub cfg: Config,
    pub posts: PostStore,
    pub images: ImageStore,
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

impl AppState {
    pub fn new(cfg: Config) -> Self {
        let images = ImageStore::new(cfg.storage.image_dir.clone());
        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                posts: PostStore::new(),
                images,
            }),
        }
    }

    pub fn cfg(&self) -> &Config {
        &self.inner.as_ref().cfg
    }

    pub fn posts(&self) -> &PostStore {
        &self.inner.as_ref().posts
    }

    pub fn images(&self) -> &ImageStore {
        &self.inner.as_ref().images
    }
}
