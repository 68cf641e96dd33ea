//! Test and demo fixtures shared across `spine-runtime`, `spine-streams`, and the `demos/`
//! binaries.
//!
//! Three kinds of fixture live here, each generalized from an ad hoc type that would otherwise be
//! copy-pasted into every crate that needs one:
//!
//! - [`organs::ScriptedOrgan`] / [`organs::CountingOrgan`]: organs whose behavior (or recorded
//!   calls) is fixed up front, for asserting dispatch order and failure handling.
//! - [`backend::FlakyBackend`]: a [`spine_core::backend::Backend`] wrapper that fails its first
//!   few `pull`s, for exercising `Spine`'s circuit breaker without a real flaky transport.
//! - [`autostop::AutoStopBackend`]: a `Backend` that stops a bound `Spine` once its queue has
//!   drained and stayed idle — what each `demos/` binary runs against so `main` returns once its
//!   seeded batch of work is done, instead of running forever.

#![warn(missing_docs)]

pub mod autostop;
pub mod backend;
pub mod organs;

pub use autostop::AutoStopBackend;
pub use backend::FlakyBackend;
pub use organs::{CountingOrgan, ScriptedOrgan};
