//! Live-broker retrieval engine.
//!
//! [`KafkaSource`] resolves partition watermarks, translates fetch positions
//! into concrete offsets and fans out bounded-parallel consumers that feed a
//! shared [`loglens_core::MessageStream`]. The transport itself sits behind
//! the [`broker_api::BrokerApi`] seam so the engine can be exercised without
//! a running cluster.

pub mod broker_api;
mod client;
mod engine;


pub use client::KafkaSourceConfig;
pub use engine::KafkaSource;
