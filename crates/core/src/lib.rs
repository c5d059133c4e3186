//! # Inkflow Core
//!
//! Resumable blog content pipeline: topic generation, content planning,
//! drafting, editing and SEO optimization, with every stage artifact persisted
//! so a run can be paused, fail, or crash and pick up where it stopped.
//!
//! ## Architecture
//!
//! - `state/` - `Blog` work unit, `ArtifactStore` trait, SQLite and in-memory stores
//! - `pipeline/` - stage sequencer, step executor, run registry, coordinator, resume engine
//! - `agents/` - LLM stage functions and the `LlmStageRunner`
//! - `models` / `config` - provider selection and persisted settings
//!
//! ## Usage
//!
//! ```rust,ignore
//! use inkflow_core::agents::LlmStageRunner;
//! use inkflow_core::config::PipelineConfig;
//! use inkflow_core::pipeline::BlogPipeline;
//! use inkflow_core::state::{PipelineDb, SqliteArtifactStore};
//! use std::sync::Arc;
//!
//! let config = PipelineConfig::load(".inkflow/config.json")?;
//! let db = PipelineDb::open_at(&config.db_path)?;
//! let store = Arc::new(SqliteArtifactStore::new(&db));
//! let pipeline = BlogPipeline::new(store, Arc::new(LlmStageRunner::new(config)));
//!
//! let blog = pipeline.create(None)?;
//! pipeline.generate_topics(blog.id).await?;
//! pipeline.select_topic(blog.id, 1)?; // remaining stages start in the background
//! ```

pub mod agents;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod state;

pub use error::{PipelineError, PipelineResult};
