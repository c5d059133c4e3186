pub mod blog;
pub mod blog_store;
pub mod db;
pub mod store;

pub use blog::{Blog, BlogId, BlogPatch, SelectedTopic};
pub use blog_store::SqliteArtifactStore;
pub use db::PipelineDb;
pub use store::{ArtifactStore, MemoryArtifactStore};
