use tokio::select;
use tracing::{error, info, warn};

use crate::error::ConnectorError;
use crate::message::Message;
use crate::traits::{Connector, Writer};

/// Runner orchestrates the ingestion pipeline: it drives the connector's
/// receive channel and hands every frame to the writer, in order.
///
/// Writer failures are logged and isolated so one bad frame cannot halt
/// ingestion; a closed connector channel is fatal.
pub struct Runner<C: Connector, W: Writer> {
    feed_name: String,
    connector: C,
    writer: W,
}

impl<C: Connector, W: Writer> Runner<C, W> {
    pub fn new(feed_name: impl Into<String>, connector: C, writer: W) -> Self {
        Self {
            feed_name: feed_name.into(),
            connector,
            writer,
        }
    }

    /// Run the pipeline until cancelled or disconnected
    pub async fn run(
        &mut self,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> Result<(), ConnectorError> {
        self.connector.connect().await?;
        info!(feed = %self.feed_name, "Connected to data source");

        let mut rx = self.connector.messages();
        let mut shutdown = shutdown;

        loop {
            select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Shutdown signal received");
                        break;
                    }
                }
                msg = rx.recv() => {
                    match msg {
                        Some(data) => {
                            let message = Message::new(&self.feed_name, data);
                            if let Err(e) = self.writer.write(&message).await {
                                // Isolated: the stream continues past a bad frame
                                warn!(feed = %self.feed_name, error = %e, "Frame write failed, continuing");
                            }
                        }
                        None => {
                            error!("Connector disconnected unexpectedly");
                            return Err(ConnectorError::Disconnected("channel closed".to_string()));
                        }
                    }
                }
            }
        }

        // Cleanup: drain in-flight publishes, then drop the connection
        self.writer.close().await.ok();
        self.connector.close().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WriterError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct MockConnector {
        rx: Option<mpsc::Receiver<Vec<u8>>>,
    }

    impl MockConnector {
        fn new() -> (Self, mpsc::Sender<Vec<u8>>) {
            let (tx, rx) = mpsc::channel(10);
            (Self { rx: Some(rx) }, tx)
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(&mut self) -> Result<(), ConnectorError> {
            Ok(())
        }
        fn messages(&mut self) -> mpsc::Receiver<Vec<u8>> {
            self.rx.take().unwrap()
        }
        async fn close(&mut self) -> Result<(), ConnectorError> {
            Ok(())
        }
    }

    struct MockWriter {
        write_count: Arc<AtomicUsize>,
        fail_on: Option<usize>,
    }

    impl MockWriter {
        fn new(fail_on: Option<usize>) -> (Self, Arc<AtomicUsize>) {
            let count = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    write_count: Arc::clone(&count),
                    fail_on,
                },
                count,
            )
        }
    }

    #[async_trait]
    impl Writer for MockWriter {
        async fn write(&mut self, _msg: &Message) -> Result<(), WriterError> {
            let n = self.write_count.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(n) {
                return Err(WriterError::WriteFailed("injected".to_string()));
            }
            Ok(())
        }
        async fn close(&mut self) -> Result<(), WriterError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_runner_processes_messages() {
        let (connector, msg_tx) = MockConnector::new();
        let (writer, write_count) = MockWriter::new(None);

        let mut runner = Runner::new("test-feed", connector, writer);
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        let handle = tokio::spawn(async move { runner.run(shutdown_rx).await });

        msg_tx.send(b"[{\"ev\":\"status\",\"status\":\"connected\"}]".to_vec())
            .await
            .unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        assert!(write_count.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_runner_continues_past_writer_failure() {
        let (connector, msg_tx) = MockConnector::new();
        let (writer, write_count) = MockWriter::new(Some(1));

        let mut runner = Runner::new("test-feed", connector, writer);
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        let handle = tokio::spawn(async move { runner.run(shutdown_rx).await });

        for _ in 0..4 {
            msg_tx.send(b"{}".to_vec()).await.unwrap();
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        shutdown_tx.send(true).unwrap();
        // The failed second write must not abort the run
        handle.await.unwrap().unwrap();

        assert_eq!(write_count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_runner_errors_when_channel_closes() {
        let (connector, msg_tx) = MockConnector::new();
        let (writer, _count) = MockWriter::new(None);

        let mut runner = Runner::new("test-feed", connector, writer);
        let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        let handle = tokio::spawn(async move { runner.run(shutdown_rx).await });

        drop(msg_tx);
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(ConnectorError::Disconnected(_))));
    }
}
