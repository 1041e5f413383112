/// Message wraps one raw inbound frame with its source feed name.
/// Stores raw bytes; decoding happens at the writer boundary.
#[derive(Debug, Clone)]
pub struct Message {
    /// Feed name
    pub feed: String,
    /// Raw frame bytes
    pub data: Vec<u8>,
}

impl Message {
    #[inline]
    pub fn new(feed: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            feed: feed.into(),
            data,
        }
    }

    /// Create message from borrowed data (copies bytes).
    #[inline]
    pub fn from_slice(feed: impl Into<String>, data: &[u8]) -> Self {
        Self {
            feed: feed.into(),
            data: data.to_vec(),
        }
    }
}
