//! Polygon crypto connector: Connector trait implementation.
//!
//! Spawns a receiver task that:
//! 1. Holds an authenticated connection to the Polygon crypto WS
//! 2. Forwards raw data frames to the MPSC channel in receipt order
//! 3. Reconnects with capped, jittered exponential backoff
//! 4. Re-issues the full subscription set after every reconnect
//!
//! A rejected API key is fatal: the receiver task exits and the channel
//! closes, which surfaces as a disconnect to the runner.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::websocket::{PolygonWebSocket, PolygonWsError};
use crate::error::ConnectorError;
use crate::traits::Connector;

const CHANNEL_CAPACITY: usize = 4096;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub struct PolygonConnector {
    api_key: String,
    /// WebSocket URL override (None = use default constant)
    ws_url: Option<String>,
    patterns: Vec<String>,
    tx: Option<mpsc::Sender<Vec<u8>>>,
    rx: Option<mpsc::Receiver<Vec<u8>>>,
}

impl PolygonConnector {
    pub fn new(api_key: impl Into<String>, ws_url: Option<String>) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            api_key: api_key.into(),
            ws_url,
            patterns: Vec::new(),
            tx: Some(tx),
            rx: Some(rx),
        }
    }

    /// Connector subscribed to aggregates for every crypto pair.
    pub fn all_crypto_aggregates(api_key: impl Into<String>, ws_url: Option<String>) -> Self {
        let mut connector = Self::new(api_key, ws_url);
        connector.patterns = vec!["XA.*".to_string()];
        connector
    }

    /// Connector subscribed to aggregates for an explicit list of pairs.
    pub fn crypto_pairs(
        api_key: impl Into<String>,
        ws_url: Option<String>,
        pairs: &[String],
    ) -> Self {
        let mut connector = Self::new(api_key, ws_url);
        connector.patterns = pairs.iter().map(|p| format!("XA.{}", p)).collect();
        connector
    }

    /// Connector subscribed to level-2 books for every crypto pair.
    pub fn all_level2(api_key: impl Into<String>, ws_url: Option<String>) -> Self {
        let mut connector = Self::new(api_key, ws_url);
        connector.patterns = vec!["XL2.*".to_string()];
        connector
    }

    /// Register topic patterns. Must be called before `connect()`; the
    /// subscription set is fixed once the receive loop is running.
    pub fn subscribe(&mut self, patterns: &[String]) -> Result<(), ConnectorError> {
        if self.tx.is_none() {
            return Err(ConnectorError::Configuration(
                "cannot change subscriptions after connect".to_string(),
            ));
        }
        for pattern in patterns {
            if !self.patterns.iter().any(|p| p == pattern) {
                self.patterns.push(pattern.clone());
            }
        }
        Ok(())
    }

    /// The registered subscription set.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Connect, authenticate, and apply the subscription set.
    async fn establish(
        api_key: &str,
        ws_url: Option<&str>,
        patterns: &[String],
    ) -> Result<PolygonWebSocket, PolygonWsError> {
        let mut ws = PolygonWebSocket::connect(ws_url).await?;
        ws.authenticate(api_key).await?;
        ws.subscribe(patterns).await?;
        Ok(ws)
    }

    fn spawn_receiver_task(
        mut ws: PolygonWebSocket,
        api_key: String,
        ws_url: Option<String>,
        patterns: Vec<String>,
        tx: mpsc::Sender<Vec<u8>>,
    ) {
        tokio::spawn(async move {
            let mut backoff = INITIAL_BACKOFF;
            loop {
                // Receive until the connection drops
                loop {
                    match ws.recv_raw().await {
                        Ok(text) => {
                            backoff = INITIAL_BACKOFF;
                            if tx.send(text.into_bytes()).await.is_err() {
                                warn!("Channel closed, exiting receiver");
                                return;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Polygon WS disconnected, reconnecting");
                            break;
                        }
                    }
                }

                // Reconnect with capped exponential backoff and ±20% jitter
                loop {
                    let jitter = rand::rng().random_range(0.8..1.2);
                    let delay = backoff.mul_f64(jitter);
                    info!(delay_ms = delay.as_millis() as u64, "Reconnecting after backoff");
                    tokio::time::sleep(delay).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);

                    match Self::establish(&api_key, ws_url.as_deref(), &patterns).await {
                        Ok(new_ws) => {
                            info!(patterns = ?patterns, "Reconnected and resubscribed");
                            ws = new_ws;
                            break;
                        }
                        Err(PolygonWsError::AuthRejected(detail)) => {
                            error!(detail = %detail, "API key rejected on reconnect, giving up");
                            return;
                        }
                        Err(e) => {
                            warn!(error = %e, "Reconnect attempt failed");
                        }
                    }
                }
            }
        });
    }
}

#[async_trait]
impl Connector for PolygonConnector {
    async fn connect(&mut self) -> Result<(), ConnectorError> {
        if self.patterns.is_empty() {
            return Err(ConnectorError::Configuration(
                "no subscription patterns registered".to_string(),
            ));
        }
        let tx = self
            .tx
            .take()
            .ok_or_else(|| ConnectorError::ConnectionFailed("Already connected".to_string()))?;

        // The first connection is made inline so auth and configuration
        // failures surface fatally at startup.
        let ws = Self::establish(&self.api_key, self.ws_url.as_deref(), &self.patterns)
            .await
            .map_err(|e| match e {
                PolygonWsError::AuthRejected(detail) => ConnectorError::AuthFailed(detail),
                other => ConnectorError::ConnectionFailed(other.to_string()),
            })?;

        info!(patterns = ?self.patterns, "Polygon connector started");

        Self::spawn_receiver_task(
            ws,
            self.api_key.clone(),
            self.ws_url.clone(),
            self.patterns.clone(),
            tx,
        );

        Ok(())
    }

    fn messages(&mut self) -> mpsc::Receiver<Vec<u8>> {
        self.rx
            .take()
            .expect("messages() called before connect() or called twice")
    }

    async fn close(&mut self) -> Result<(), ConnectorError> {
        self.tx = None;
        info!("Polygon connector closing");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_creation() {
        let connector = PolygonConnector::new("test-key", None);
        assert!(connector.tx.is_some());
        assert!(connector.rx.is_some());
        assert!(connector.patterns().is_empty());
    }

    #[test]
    fn test_named_entry_points_build_patterns() {
        let aggs = PolygonConnector::all_crypto_aggregates("k", None);
        assert_eq!(aggs.patterns(), ["XA.*"]);

        let pairs = PolygonConnector::crypto_pairs(
            "k",
            None,
            &["BTC-USD".to_string(), "ETH-USD".to_string()],
        );
        assert_eq!(pairs.patterns(), ["XA.BTC-USD", "XA.ETH-USD"]);

        let level2 = PolygonConnector::all_level2("k", None);
        assert_eq!(level2.patterns(), ["XL2.*"]);
    }

    #[test]
    fn test_subscribe_dedupes() {
        let mut connector = PolygonConnector::new("k", None);
        connector
            .subscribe(&["XA.*".to_string(), "XA.*".to_string(), "XT.*".to_string()])
            .unwrap();
        assert_eq!(connector.patterns(), ["XA.*", "XT.*"]);
    }

    #[test]
    fn test_subscribe_after_connect_rejected() {
        let mut connector = PolygonConnector::all_crypto_aggregates("k", None);
        // Simulate a running connector: tx is taken by connect()
        connector.tx = None;
        let result = connector.subscribe(&["XT.*".to_string()]);
        assert!(matches!(result, Err(ConnectorError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_connect_without_patterns_rejected() {
        let mut connector = PolygonConnector::new("k", None);
        let result = connector.connect().await;
        assert!(matches!(result, Err(ConnectorError::Configuration(_))));
    }

    #[test]
    fn test_connector_messages_takes_receiver() {
        let mut connector = PolygonConnector::all_crypto_aggregates("k", None);
        let _rx = connector.messages();
        assert!(connector.rx.is_none());
    }
}
