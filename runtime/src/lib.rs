//! # Spine Runtime
//!
//! The dispatcher and its pluggable in-process backend, on top of `spine-core`'s `Event`/`Organ`/
//! `Backend` contracts (`SPEC_FULL.md` §4.6, §4.4).
//!
//! ## Core components
//!
//! - [`spine::Spine`]: the single-writer dispatch loop — pulls one event at a time, routes it to
//!   matching organs in registration order, enqueues emitted events, and applies the configured
//!   failure-mode policies.
//! - [`in_memory_backend::InMemoryBackend`]: an in-process, optionally-bounded FIFO `Backend`.
//! - [`config::SpineConfig`]: the dispatcher's tunables, with a fluent builder.
//! - [`policy`]: `EnqueueFailureMode`/`HandlerFailureMode`, the failure-handling policies `Spine`
//!   consults.
//! - [`circuit_breaker::PullFailureBreaker`]: trips `run` after too many consecutive
//!   `Backend::pull` failures.
//! - [`retry`]: exponential-backoff retry, used by `EnqueueFailureMode::Retry`.
//! - [`stats::SpineStats`]: the counters accumulated over a dispatcher's lifetime.
//! - [`metrics`]: Prometheus metric registration and recorders.
//!
//! ## Example
//!
//! ```rust
//! use spine_runtime::config::SpineConfig;
//! use spine_runtime::in_memory_backend::InMemoryBackend;
//! use spine_runtime::spine::Spine;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(InMemoryBackend::unbounded());
//! let spine = Spine::new(Vec::new(), backend, SpineConfig::builder().max_steps(1).build())?;
//! let _ = spine.run(None).await;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod in_memory_backend;
pub mod metrics;
pub mod policy;
pub mod retry;
pub mod spine;
pub mod stats;

pub use circuit_breaker::PullFailureBreaker;
pub use config::{SpineConfig, SpineConfigBuilder};
pub use in_memory_backend::InMemoryBackend;
pub use policy::{EnqueueFailureMode, HandlerFailureMode};
pub use spine::{Spine, SpineError};
pub use stats::{SpineStats, SpineStatsSnapshot};
