use std::sync::Arc;

use dashmap::DashMap;

/// Sanitize a string for use as a single NATS subject token.
///
/// NATS tokens must not contain `.`, `*`, `>`, or whitespace. Slashes and
/// dots are mapped to `-` (so "BTC/USD" and "BTC.USD" both key the same
/// way as "BTC-USD"); anything else non-alphanumeric except `-` and `_`
/// is dropped.
pub fn sanitize_subject_token(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter_map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => Some(c),
            '.' | '/' => Some('-'),
            _ => None,
        })
        .collect()
}

/// Helper for NATS subject formatting with a fixed topic prefix.
/// Caches formatted subjects to avoid repeated allocations in hot path.
pub struct SubjectBuilder {
    /// Pre-computed base prefix: "{topic}."
    base_prefix: Arc<str>,
    /// Pre-computed wildcard subject: "{topic}.>"
    wildcard: Arc<str>,
    /// Cache of key -> full record subject
    record_cache: DashMap<Arc<str>, Arc<str>>,
}

impl SubjectBuilder {
    /// Create a new SubjectBuilder rooted at the given logical topic,
    /// e.g. "ohlcv.realtime".
    pub fn new(topic: impl Into<String>) -> Self {
        let topic = topic.into();
        let base_prefix: Arc<str> = format!("{}.", topic).into();
        let wildcard: Arc<str> = format!("{}.>", topic).into();
        Self {
            base_prefix,
            wildcard,
            record_cache: DashMap::new(),
        }
    }

    /// Build subject for a record keyed by symbol: {topic}.{key}
    /// Cached - first call allocates, subsequent calls return Arc clone (cheap).
    #[inline]
    pub fn record(&self, key: &str) -> Arc<str> {
        // Fast path: check cache first
        if let Some(cached) = self.record_cache.get(key) {
            return Arc::clone(cached.value());
        }

        // Slow path: format and cache
        let key_arc: Arc<str> = key.into();
        let subject: Arc<str> = format!("{}{}", self.base_prefix, key).into();
        self.record_cache.insert(key_arc, Arc::clone(&subject));
        subject
    }

    /// Build wildcard subject covering every key: {topic}.>
    /// Pre-computed at construction time.
    #[inline]
    pub fn all(&self) -> &str {
        &self.wildcard
    }
}
