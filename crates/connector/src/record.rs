//! Normalized, broker-ready record.

use serde::{Deserialize, Serialize};

use crate::events::RawFeedEvent;

/// The canonical representation of one market event, keyed by pair.
///
/// Only the fixed allow-list of numeric attributes is carried; absent
/// source fields are omitted from the JSON encoding rather than encoded
/// as null, so downstream parsing stays permissive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub pair: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vwap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_trade_size: Option<f64>,
}

impl NormalizedRecord {
    /// Project an event onto the allow-list.
    ///
    /// Returns None when the event carries no usable pair (the record
    /// would be keyless) or is not a data event. Trade and level-2
    /// events carry none of the allow-listed attributes, so they reduce
    /// to a pair-only record.
    pub fn from_event(event: &RawFeedEvent) -> Option<Self> {
        let pair = event.pair()?.trim();
        if pair.is_empty() {
            return None;
        }

        let mut record = Self::keyed(pair);
        if let RawFeedEvent::CryptoAggregate {
            open,
            high,
            low,
            close,
            volume,
            vwap,
            avg_trade_size,
            ..
        } = event
        {
            record.open = *open;
            record.high = *high;
            record.low = *low;
            record.close = *close;
            record.volume = *volume;
            record.vwap = *vwap;
            record.avg_trade_size = *avg_trade_size;
        }
        Some(record)
    }

    fn keyed(pair: &str) -> Self {
        Self {
            pair: pair.to_string(),
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
            vwap: None,
            avg_trade_size: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::decode_batch;
    use serde_json::json;

    fn aggregate(pair: Option<&str>) -> RawFeedEvent {
        RawFeedEvent::CryptoAggregate {
            pair: pair.map(str::to_string),
            open: Some(100.0),
            high: Some(101.0),
            low: Some(99.0),
            close: Some(100.5),
            volume: Some(10.0),
            vwap: None,
            avg_trade_size: None,
        }
    }

    #[test]
    fn test_projection_keeps_present_fields_only() {
        let record = NormalizedRecord::from_event(&aggregate(Some("BTC-USD"))).unwrap();
        assert_eq!(record.pair, "BTC-USD");
        assert_eq!(record.open, Some(100.0));
        assert_eq!(record.vwap, None);

        let encoded = serde_json::to_value(&record).unwrap();
        assert_eq!(
            encoded,
            json!({
                "pair": "BTC-USD",
                "open": 100.0,
                "high": 101.0,
                "low": 99.0,
                "close": 100.5,
                "volume": 10.0
            })
        );
    }

    #[test]
    fn test_missing_pair_drops_event() {
        assert!(NormalizedRecord::from_event(&aggregate(None)).is_none());
    }

    #[test]
    fn test_empty_pair_drops_event() {
        assert!(NormalizedRecord::from_event(&aggregate(Some("  "))).is_none());
    }

    #[test]
    fn test_status_yields_no_record() {
        let event = RawFeedEvent::Status {
            status: "connected".to_string(),
            message: None,
        };
        assert!(NormalizedRecord::from_event(&event).is_none());
    }

    #[test]
    fn test_trade_reduces_to_pair_only_record() {
        let event = RawFeedEvent::CryptoTrade {
            pair: Some("ETH-USD".to_string()),
            price: Some(3200.5),
            size: Some(0.25),
        };
        let record = NormalizedRecord::from_event(&event).unwrap();
        assert_eq!(record.pair, "ETH-USD");
        assert_eq!(serde_json::to_value(&record).unwrap(), json!({"pair": "ETH-USD"}));
    }

    #[test]
    fn test_wire_round_trip() {
        let frame = br#"[{"ev":"XA","pair":"BTC-USD","o":100,"h":101,"l":99,"c":100.5,"v":10,"vw":100.2}]"#;
        let events = decode_batch(frame).unwrap();
        let record = NormalizedRecord::from_event(&events[0]).unwrap();

        let encoded = serde_json::to_vec(&record).unwrap();
        let decoded: NormalizedRecord = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.avg_trade_size, None);
    }
}
