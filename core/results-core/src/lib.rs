//! # results-core
//!
//! Result lifecycle for WAVE conformance test sessions: decides when an API's
//! results are complete, writes each bundle once, renders reports, addresses
//! multi-session comparisons by content, and imports archives at startup.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Front ends can wrap with async if needed.
//! - **Thread-safe entry points**: Completion is serialized per session token,
//!   comparison regeneration per comparison key.
//! - **Injected collaborators**: Session registry, result store and renderer are
//!   traits; in-memory implementations ship for tests and embedding.
//! - **Late and duplicate submissions are normal**: they are outcomes, not errors.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use results_core::ResultsEngine;
//!
//! let engine = ResultsEngine::new(storage, registry, store, renderer);
//! engine.load_results()?;
//! let outcome = engine.record_result("abc123", "/dom/a.html", payload)?;
//! ```

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod fsutil;
pub mod locks;
pub mod normalize;
pub mod paths;
pub mod patterns;
pub mod reconcile;
pub mod registry;
pub mod render;
pub mod report;
pub mod storage;
pub mod store;
pub mod tracker;
pub mod types;
pub mod user_agent;

// Re-export commonly used items at crate root
pub use aggregate::{ApiResults, ResultAggregator};
pub use engine::ResultsEngine;
pub use error::{Result, ResultsError};
pub use normalize::normalize;
pub use paths::{comparison_key, ComparisonKey, JsonLocation, PathResolver};
pub use reconcile::{LoadOutcome, LoadSummary, ReconciliationLoader, SkipReason};
pub use registry::{MemorySessionRegistry, SessionRegistry};
pub use render::{MultiReportRequest, RecordingRenderer, ReportRenderer, SingleReportRequest};
pub use report::ReportCoordinator;
pub use storage::StorageConfig;
pub use store::{MemoryResultStore, ResultStore};
pub use tracker::{CompletionTracker, RecordOutcome};
pub use types::*;
