//! Inbound feed event decode.
//!
//! Polygon delivers each WebSocket text frame as a JSON array of event
//! objects tagged by `"ev"`. Wire field names are the short Polygon ones
//! (`o`, `h`, `l`, `c`, `v`, `vw`, `z`, `p`, `s`, `b`, `a`); the long
//! names are accepted as aliases so decoded fixtures read naturally.

use serde::Deserialize;
use tracing::warn;

/// One event received from the feed, tagged by kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "ev")]
pub enum RawFeedEvent {
    /// Per-pair aggregate bar (channel `XA`)
    #[serde(rename = "XA")]
    CryptoAggregate {
        pair: Option<String>,
        #[serde(default, alias = "o")]
        open: Option<f64>,
        #[serde(default, alias = "h")]
        high: Option<f64>,
        #[serde(default, alias = "l")]
        low: Option<f64>,
        #[serde(default, alias = "c")]
        close: Option<f64>,
        #[serde(default, alias = "v")]
        volume: Option<f64>,
        #[serde(default, alias = "vw")]
        vwap: Option<f64>,
        #[serde(default, alias = "z")]
        avg_trade_size: Option<f64>,
    },
    /// Single trade print (channel `XT`)
    #[serde(rename = "XT")]
    CryptoTrade {
        pair: Option<String>,
        #[serde(default, alias = "p")]
        price: Option<f64>,
        #[serde(default, alias = "s")]
        size: Option<f64>,
    },
    /// Level-2 book snapshot (channel `XL2`)
    #[serde(rename = "XL2")]
    CryptoLevel2 {
        pair: Option<String>,
        #[serde(default, alias = "b")]
        bids: Option<Vec<Vec<f64>>>,
        #[serde(default, alias = "a")]
        asks: Option<Vec<Vec<f64>>>,
    },
    /// Connection/auth/subscription control message
    #[serde(rename = "status")]
    Status {
        status: String,
        #[serde(default)]
        message: Option<String>,
    },
    /// Unknown event kind; skipped downstream
    #[serde(other)]
    Other,
}

impl RawFeedEvent {
    /// The event's trading pair, if it carries one.
    pub fn pair(&self) -> Option<&str> {
        match self {
            RawFeedEvent::CryptoAggregate { pair, .. }
            | RawFeedEvent::CryptoTrade { pair, .. }
            | RawFeedEvent::CryptoLevel2 { pair, .. } => pair.as_deref(),
            RawFeedEvent::Status { .. } | RawFeedEvent::Other => None,
        }
    }
}

/// Decode one inbound frame into its ordered event batch.
///
/// A frame that is not valid JSON fails as a whole; an element that is
/// valid JSON but not a decodable event is dropped with a warning, never
/// failing the rest of the batch.
pub fn decode_batch(data: &[u8]) -> Result<Vec<RawFeedEvent>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_slice(data)?;
    let elements = match value {
        serde_json::Value::Array(items) => items,
        single => vec![single],
    };

    let mut events = Vec::with_capacity(elements.len());
    for element in elements {
        match serde_json::from_value::<RawFeedEvent>(element) {
            Ok(event) => events.push(event),
            Err(e) => {
                warn!(error = %e, "Dropping undecodable feed event");
            }
        }
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_aggregate_wire_names() {
        let frame = br#"[{"ev":"XA","pair":"BTC-USD","o":100.0,"h":101.0,"l":99.0,"c":100.5,"v":10.0,"vw":100.2,"z":3.0,"s":1700000000000,"e":1700000060000}]"#;
        let events = decode_batch(frame).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            RawFeedEvent::CryptoAggregate {
                pair,
                open,
                close,
                vwap,
                avg_trade_size,
                ..
            } => {
                assert_eq!(pair.as_deref(), Some("BTC-USD"));
                assert_eq!(*open, Some(100.0));
                assert_eq!(*close, Some(100.5));
                assert_eq!(*vwap, Some(100.2));
                assert_eq!(*avg_trade_size, Some(3.0));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_decode_aggregate_long_names() {
        let frame = br#"[{"ev":"XA","pair":"BTC-USD","open":100,"high":101,"low":99,"close":100.5,"volume":10}]"#;
        let events = decode_batch(frame).unwrap();
        match &events[0] {
            RawFeedEvent::CryptoAggregate { high, low, volume, .. } => {
                assert_eq!(*high, Some(101.0));
                assert_eq!(*low, Some(99.0));
                assert_eq!(*volume, Some(10.0));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_decode_trade_and_level2() {
        let frame = br#"[
            {"ev":"XT","pair":"ETH-USD","p":3200.5,"s":0.25},
            {"ev":"XL2","pair":"ETH-USD","b":[[3200.0,1.0]],"a":[[3201.0,2.0]]}
        ]"#;
        let events = decode_batch(frame).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], RawFeedEvent::CryptoTrade { .. }));
        assert!(matches!(events[1], RawFeedEvent::CryptoLevel2 { .. }));
        assert_eq!(events[1].pair(), Some("ETH-USD"));
    }

    #[test]
    fn test_decode_status() {
        let frame = br#"[{"ev":"status","status":"auth_success","message":"authenticated"}]"#;
        let events = decode_batch(frame).unwrap();
        match &events[0] {
            RawFeedEvent::Status { status, message } => {
                assert_eq!(status, "auth_success");
                assert_eq!(message.as_deref(), Some("authenticated"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_kind_is_other() {
        let frame = br#"[{"ev":"Q","pair":"BTC-USD","bp":100.0}]"#;
        let events = decode_batch(frame).unwrap();
        assert!(matches!(events[0], RawFeedEvent::Other));
    }

    #[test]
    fn test_bad_element_dropped_rest_kept() {
        let frame = br#"[{"ev":"XA","pair":"BTC-USD","o":1.0}, 42, {"ev":"XT","pair":"ETH-USD","p":2.0}]"#;
        let events = decode_batch(frame).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_invalid_json_fails_frame() {
        assert!(decode_batch(b"not json").is_err());
    }

    #[test]
    fn test_single_object_frame() {
        let frame = br#"{"ev":"status","status":"connected"}"#;
        let events = decode_batch(frame).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_null_pair_decodes_as_none() {
        let frame = br#"[{"ev":"XA","pair":null,"o":100.0}]"#;
        let events = decode_batch(frame).unwrap();
        assert_eq!(events[0].pair(), None);
    }
}
