//! # Artifact Store
//!
//! Persistence contract for work units, plus an in-memory backend used for
//! ephemeral runs and tests.

use super::blog::{Blog, BlogId, BlogPatch};
use crate::error::{PipelineError, PipelineResult};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Durable record of every blog and its stage artifacts.
///
/// `update` must apply the whole patch atomically for one unit and refresh
/// `last_activity`. `list` returns units in creation order.
pub trait ArtifactStore: Send + Sync {
    fn create(&self, title: Option<String>) -> PipelineResult<Blog>;

    fn get(&self, id: BlogId) -> PipelineResult<Blog>;

    fn update(&self, id: BlogId, patch: BlogPatch) -> PipelineResult<Blog>;

    fn list(&self) -> PipelineResult<Vec<Blog>>;

    /// Administrative removal; the pipeline itself never deletes
    fn delete(&self, id: BlogId) -> PipelineResult<()>;
}

/// Process-local store backed by a map
#[derive(Default)]
pub struct MemoryArtifactStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    next_id: BlogId,
    blogs: BTreeMap<BlogId, Blog>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PipelineResult<std::sync::MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|e| PipelineError::Storage(anyhow::anyhow!("Lock error: {}", e)))
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn create(&self, title: Option<String>) -> PipelineResult<Blog> {
        let mut inner = self.lock()?;
        inner.next_id += 1;
        let blog = Blog::new(inner.next_id, title);
        inner.blogs.insert(blog.id, blog.clone());
        Ok(blog)
    }

    fn get(&self, id: BlogId) -> PipelineResult<Blog> {
        self.lock()?
            .blogs
            .get(&id)
            .cloned()
            .ok_or(PipelineError::NotFound(id))
    }

    fn update(&self, id: BlogId, patch: BlogPatch) -> PipelineResult<Blog> {
        let mut inner = self.lock()?;
        let blog = inner.blogs.get_mut(&id).ok_or(PipelineError::NotFound(id))?;
        blog.apply(patch)?;
        Ok(blog.clone())
    }

    fn list(&self) -> PipelineResult<Vec<Blog>> {
        Ok(self.lock()?.blogs.values().cloned().collect())
    }

    fn delete(&self, id: BlogId) -> PipelineResult<()> {
        self.lock()?
            .blogs
            .remove(&id)
            .map(|_| ())
            .ok_or(PipelineError::NotFound(id))
    }
}
