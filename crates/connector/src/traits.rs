use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{ConnectorError, WriterError};
use crate::message::Message;

/// Connector trait for streaming data sources
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish connection to the data source
    async fn connect(&mut self) -> Result<(), ConnectorError>;

    /// Get receiver for incoming raw frames
    fn messages(&mut self) -> mpsc::Receiver<Vec<u8>>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), ConnectorError>;
}

/// Writer trait for output destinations
#[async_trait]
pub trait Writer: Send + Sync {
    /// Write one inbound frame to the destination
    async fn write(&mut self, msg: &Message) -> Result<(), WriterError>;

    /// Close and flush the writer
    async fn close(&mut self) -> Result<(), WriterError>;
}
