//! tickbridge-middleware: broker transport abstractions
//!
//! Provides the trait-based `Transport` abstraction over the message bus,
//! a NATS implementation, and an in-memory implementation for testing.

pub mod error;
pub mod memory;
pub mod nats;
pub mod producer;
pub mod transport;

pub use error::TransportError;
pub use memory::InMemoryTransport;
pub use nats::{sanitize_subject_token, NatsTransport, SubjectBuilder};
pub use producer::ProducerHandle;
pub use transport::{Subscription, Transport, TransportMessage};
