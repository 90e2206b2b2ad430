//! # Overview
//!
//! CTF filesystem plugins for trace-processing pipelines.
//!
//! Conceptually CTF data is organized as follows:
//! * Trace (schema from a `metadata` file, plus stream files)
//!   - One or more streams (timelines)
//!     * Series of packets, each carrying a series of events
//!
//! The [`source`] component discovers CTF trace directories under a root
//! path and publishes one output port per *logical* stream: a stream may
//! be split across several on-disk files, which are grouped by
//! `(stream class, stream instance ID)` and concatenated in
//! `timestamp_begin` order. Each port yields a notification sequence
//! matching `(PacketBegin Event* PacketEnd)*`.
//!
//! The [`sink`] component consumes such a notification stream and
//! rewrites it as one or more on-disk CTF traces. Schema elements (clock
//! classes, stream classes, event classes, streams) are mirrored lazily,
//! exactly once per input identity, so the output schema is a faithful
//! copy of the input schema.
//!
//! The CTF codecs themselves — the metadata grammar parser, the binary
//! event decoder and the byte/metadata emitter — are external
//! collaborators behind the traits in [`codec`].
#![deny(warnings, clippy::all)]

pub mod codec;
pub mod config;
pub mod error;
pub mod model;
pub mod prelude;
pub mod query;
pub mod sink;
pub mod source;
pub mod tracing;
pub mod types;
