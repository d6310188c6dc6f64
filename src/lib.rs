//! # Textmill
//!
//! A scatter-gather text-analytics pipeline: a source document is split into
//! sections, each section is transformed independently, and the partial
//! results are merged back into one report per job by a concurrent
//! aggregation engine that tolerates duplicate, reordered, and redelivered
//! messages.
//!
//! ## Usage
//!
//! ```bash
//! textmill run --input book.txt [--workers 4] [--output results]
//! ```
//!
//! ## Modules
//!
//! - `analysis` - Pure text algorithms: tokenization, top-N ranking, sentences
//! - `config` - Configuration with TOML file and environment overrides
//! - `engine` - The aggregation engine: registry, merge state, dispatch loop
//! - `messages` - Wire contracts and ingress validation
//! - `pipeline` - End-to-end orchestration over the in-memory broker
//! - `producer` - Document splitting and task dispatch
//! - `sink` - Final report persistence
//! - `transport` - Queue traits and the in-memory at-least-once broker
//! - `worker` - Per-section transformation and sentiment scoring
pub mod analysis;
pub mod config;
pub mod engine;
pub mod messages;
pub mod pipeline;
pub mod producer;
pub mod sink;
pub mod transport;
pub mod worker;
