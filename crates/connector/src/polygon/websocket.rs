//! Polygon crypto WebSocket client.
//!
//! Connects to wss://socket.polygon.io/crypto and manages auth and
//! subscriptions. Protocol:
//! - Auth: {"action":"auth","params":"<api key>"} then a status event
//!   with "auth_success" or "auth_failed"
//! - Subscribe: {"action":"subscribe","params":"XA.*,XT.BTC-USD"}
//! - Data: each text frame is a JSON array of events tagged by "ev"

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async_with_config, tungstenite};
use tracing::{debug, info, warn};

use crate::events::{decode_batch, RawFeedEvent};

pub const POLYGON_CRYPTO_WS_URL: &str = "wss://socket.polygon.io/crypto";

const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024; // 4 MiB, XL2 frames are wide
const AUTH_TIMEOUT_SECS: u64 = 15;
const SUBSCRIBE_TIMEOUT_SECS: u64 = 15;
const READ_TIMEOUT_SECS: u64 = 90;

#[derive(Debug, thiserror::Error)]
pub enum PolygonWsError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Authentication rejected: {0}")]
    AuthRejected(String),
    #[error("Authentication timeout")]
    AuthTimeout,
    #[error("Subscribe timeout")]
    SubscribeTimeout,
    #[error("Subscribe rejected: {0}")]
    SubscribeRejected(String),
    #[error("Read timeout")]
    ReadTimeout,
}

pub struct PolygonWebSocket {
    ws: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
}

impl PolygonWebSocket {
    /// Connect to the Polygon crypto WebSocket endpoint.
    ///
    /// If `url` is provided, it overrides the default URL.
    pub async fn connect(url: Option<&str>) -> Result<Self, PolygonWsError> {
        let url = url.unwrap_or(POLYGON_CRYPTO_WS_URL);
        let config = tungstenite::protocol::WebSocketConfig {
            max_message_size: Some(MAX_MESSAGE_SIZE),
            ..Default::default()
        };

        info!(url = %url, "Connecting to Polygon WS");
        let (ws, _) = connect_async_with_config(url, Some(config), false).await?;
        info!("Connected to Polygon WS");

        Ok(Self { ws })
    }

    /// Authenticate with an API key and wait for the server's verdict.
    /// `auth_failed` is terminal; the caller must not retry with the
    /// same key.
    pub async fn authenticate(&mut self, api_key: &str) -> Result<(), PolygonWsError> {
        let msg = json!({"action": "auth", "params": api_key});
        self.ws
            .send(tungstenite::Message::Text(msg.to_string()))
            .await?;

        let verdict = timeout(Duration::from_secs(AUTH_TIMEOUT_SECS), async {
            loop {
                match self.next_statuses().await? {
                    Some(statuses) => {
                        for (status, message) in statuses {
                            match status.as_str() {
                                "auth_success" => {
                                    info!("Polygon WS authenticated");
                                    return Ok(());
                                }
                                "auth_failed" => {
                                    return Err(PolygonWsError::AuthRejected(
                                        message.unwrap_or_else(|| "no detail".to_string()),
                                    ));
                                }
                                // "connected" and friends arrive first
                                other => debug!(status = %other, "Pre-auth status"),
                            }
                        }
                    }
                    None => continue, // data or undecodable frame, keep waiting
                }
            }
        })
        .await;

        match verdict {
            Ok(result) => result,
            Err(_) => Err(PolygonWsError::AuthTimeout),
        }
    }

    /// Subscribe to topic patterns (e.g. "XA.*", "XA.BTC-USD", "XL2.*")
    /// and wait for the first subscription acknowledgment.
    pub async fn subscribe(&mut self, patterns: &[String]) -> Result<(), PolygonWsError> {
        let params = patterns.join(",");
        let msg = json!({"action": "subscribe", "params": params});

        debug!(patterns = %params, "Subscribing to Polygon channels");
        self.ws
            .send(tungstenite::Message::Text(msg.to_string()))
            .await?;

        let ack = timeout(Duration::from_secs(SUBSCRIBE_TIMEOUT_SECS), async {
            loop {
                match self.next_statuses().await? {
                    Some(statuses) => {
                        for (status, message) in statuses {
                            match status.as_str() {
                                "success" => {
                                    info!(patterns = %params, "Subscribed to Polygon channels");
                                    return Ok(());
                                }
                                "error" => {
                                    return Err(PolygonWsError::SubscribeRejected(
                                        message.unwrap_or_else(|| "no detail".to_string()),
                                    ));
                                }
                                other => debug!(status = %other, "Status during subscribe"),
                            }
                        }
                    }
                    None => continue, // data frames may already be flowing
                }
            }
        })
        .await;

        match ack {
            Ok(result) => result,
            Err(_) => Err(PolygonWsError::SubscribeTimeout),
        }
    }

    /// Receive the next raw text frame.
    pub async fn recv_raw(&mut self) -> Result<String, PolygonWsError> {
        loop {
            let msg = timeout(Duration::from_secs(READ_TIMEOUT_SECS), self.ws.next())
                .await
                .map_err(|_| PolygonWsError::ReadTimeout)?
                .ok_or(PolygonWsError::ConnectionClosed)?
                .map_err(PolygonWsError::WebSocket)?;

            match msg {
                tungstenite::Message::Text(text) => return Ok(text),
                tungstenite::Message::Ping(data) => {
                    self.ws.send(tungstenite::Message::Pong(data)).await?;
                }
                tungstenite::Message::Close(_) => return Err(PolygonWsError::ConnectionClosed),
                _ => {}
            }
        }
    }

    /// Close the connection.
    pub async fn close(&mut self) -> Result<(), PolygonWsError> {
        self.ws.close(None).await?;
        Ok(())
    }

    /// Receive one frame and extract its status events, if any.
    /// Returns None for data-only or undecodable frames.
    async fn next_statuses(
        &mut self,
    ) -> Result<Option<Vec<(String, Option<String>)>>, PolygonWsError> {
        let text = self.recv_raw().await?;
        let events = match decode_batch(text.as_bytes()) {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Undecodable frame during handshake");
                return Ok(None);
            }
        };

        let statuses: Vec<(String, Option<String>)> = events
            .into_iter()
            .filter_map(|event| match event {
                RawFeedEvent::Status { status, message } => Some((status, message)),
                _ => None,
            })
            .collect();

        if statuses.is_empty() {
            Ok(None)
        } else {
            Ok(Some(statuses))
        }
    }
}
