//! # spine-core
//!
//! Core event, organ, and backend abstractions for the spine dispatcher: an in-process,
//! event-driven micro-framework. A [`Spine`](https://docs.rs/spine-runtime) (in the sibling
//! `spine-runtime` crate) pulls events from a [`backend::Backend`], routes each to every
//! [`organ::Organ`] whose [`organ::Organ::listens_to`] matches, and enqueues whatever follow-up
//! events those organs emit.
//!
//! ## Core concepts
//!
//! - [`event::Event`] — an immutable, validated message (UUIDv4 id, UTC timestamp, `event_type`,
//!   JSON payload).
//! - [`organ::Organ`] — a handler: an event-type subscription plus a `handle` operation.
//! - [`backend::Backend`] — the pluggable queue behind the dispatcher (enqueue/pull/ack/nack).
//! - [`failed_event_store::FailedEventStore`] — the bounded, in-process dead-letter sink.
//!
//! The dispatch loop itself, its failure-mode policies, and the `InMemoryBackend` live in
//! `spine-runtime`; the durable, consumer-group-based `StreamsBackend` lives in `spine-streams`.

pub mod backend;
pub mod event;
pub mod failed_event_store;
pub mod organ;

pub use backend::{Backend, BackendError, BackendFuture};
pub use event::{Event, ValidationError, MAX_PAYLOAD_BYTES};
pub use failed_event_store::{FailedEntry, FailedEventStore};
pub use organ::{HandlerError, HandlerOutcome, Organ};
