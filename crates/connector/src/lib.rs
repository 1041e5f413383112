//! tickbridge-connector: streaming ingestion-and-republish core
//!
//! This crate provides the components for holding a subscription to the
//! Polygon real-time crypto feed, normalizing inbound events, and
//! republishing them to the message bus keyed by trading pair.

pub mod bridge;
pub mod config;
pub mod error;
pub mod events;
pub mod message;
pub mod polygon;
pub mod record;
pub mod rest;
pub mod runner;
pub mod traits;

pub use bridge::{OverflowPolicy, PublishOutcome, PublisherBridge};
pub use config::Config;
pub use error::{ConfigError, ConnectorError, WriterError};
pub use events::RawFeedEvent;
pub use message::Message;
pub use polygon::PolygonConnector;
pub use record::NormalizedRecord;
pub use rest::PolygonRestClient;
pub use runner::Runner;
pub use traits::{Connector, Writer};
