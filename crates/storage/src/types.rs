//! Common types used across storage operations.

use bytes::Bytes;

/// Key-value pair returned from prefix scans and batch lookups.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use idp_storage::KeyValue;
///
/// let kv = KeyValue::new("client:my-app", Bytes::from(r#"{"clientId":"my-app"}"#));
/// assert_eq!(kv.key, "client:my-app");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// The full document key (`{tag}:{id}`).
    pub key: String,

    /// The serialized document.
    pub value: Bytes,
}

impl KeyValue {
    /// Creates a new key-value pair.
    pub fn new(key: impl Into<String>, value: Bytes) -> Self {
        Self { key: key.into(), value }
    }
}
