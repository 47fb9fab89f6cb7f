//! Typed documents, namespaced keys and the pluggable serializer.
//!
//! A document key is the concatenation of a lower-case *type tag* and a
//! caller-supplied id: `client:my-app`. The tag doubles as a prefix-scan
//! selector, so "all clients" is simply every key starting with `client:`.
//!
//! Ids are not escaped. An id may itself contain `:`; callers are expected
//! to pick ids that do not make prefix scans ambiguous.

use std::fmt;

use serde::{Serialize, de::DeserializeOwned};

use crate::error::{StorageError, StorageResult};

/// Separator between type tag and id.
pub const KEY_SEPARATOR: char = ':';

/// Prefix for OAuth client documents.
pub const CLIENT_PREFIX: &str = "client:";
/// Prefix for API resource documents.
pub const API_RESOURCE_PREFIX: &str = "apiresource:";
/// Prefix for identity resource documents.
pub const IDENTITY_RESOURCE_PREFIX: &str = "identityresource:";
/// Prefix for persisted grant documents.
pub const PERSISTED_GRANT_PREFIX: &str = "persistedgrant:";
/// Prefix for user documents.
pub const USER_PREFIX: &str = "user:";

/// A value that can be stored in a document store.
///
/// `TYPE_TAG` must be lower-case and must not contain the key separator.
///
/// # Example
///
/// ```
/// use idp_storage::Document;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Note {
///     text: String,
/// }
///
/// impl Document for Note {
///     const TYPE_TAG: &'static str = "note";
/// }
/// ```
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Lower-case namespace for this entity kind.
    const TYPE_TAG: &'static str;

    /// Serialized names of fields holding lists of secrets.
    ///
    /// Audit snapshots mask the `value` of every element in these lists.
    const SECRET_FIELDS: &'static [&'static str] = &[];
}

/// Fully-qualified document key (`{tag}:{id}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey(String);

impl DocumentKey {
    /// Builds the key for document type `T` and the given id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if `id` is empty.
    pub fn new<T: Document>(id: &str) -> StorageResult<Self> {
        if id.is_empty() {
            return Err(StorageError::internal("document id must not be empty"));
        }
        Ok(Self(format!("{}{KEY_SEPARATOR}{id}", T::TYPE_TAG)))
    }

    /// Returns the scan prefix (`{tag}:`) for document type `T`.
    #[must_use]
    pub fn prefix<T: Document>() -> String {
        format!("{}{KEY_SEPARATOR}", T::TYPE_TAG)
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the id portion of the key (everything after the first separator).
    #[must_use]
    pub fn id(&self) -> &str {
        self.0.split_once(KEY_SEPARATOR).map_or("", |(_, id)| id)
    }

    /// Returns the type tag portion of the key.
    #[must_use]
    pub fn type_tag(&self) -> &str {
        self.0.split_once(KEY_SEPARATOR).map_or(self.0.as_str(), |(tag, _)| tag)
    }

    /// Consumes the key, returning the underlying string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Serializer used to turn typed documents into stored bytes.
pub trait Codec: Send + Sync + 'static {
    /// Encodes a value to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the value cannot be encoded.
    fn encode<T: Serialize>(&self, value: &T) -> StorageResult<Vec<u8>>;

    /// Decodes bytes back into a value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] on malformed input.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> StorageResult<T>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> StorageResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(StorageError::from)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> StorageResult<T> {
        serde_json::from_slice(bytes).map_err(StorageError::from)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        name: String,
    }

    impl Document for Widget {
        const TYPE_TAG: &'static str = "widget";
    }

    #[test]
    fn key_is_tag_colon_id() {
        let key = DocumentKey::new::<Widget>("w-1").unwrap();
        assert_eq!(key.as_str(), "widget:w-1");
        assert_eq!(key.type_tag(), "widget");
        assert_eq!(key.id(), "w-1");
        assert_eq!(DocumentKey::prefix::<Widget>(), "widget:");
    }

    #[test]
    fn id_may_contain_separator() {
        let key = DocumentKey::new::<Widget>("urn:example:1").unwrap();
        assert_eq!(key.as_str(), "widget:urn:example:1");
        assert_eq!(key.id(), "urn:example:1");
    }

    #[test]
    fn empty_id_is_rejected() {
        assert!(matches!(DocumentKey::new::<Widget>(""), Err(StorageError::Internal { .. })));
    }

    #[test]
    fn json_codec_reports_malformed_input() {
        let result: StorageResult<Widget> = JsonCodec.decode(b"{not json");
        assert!(matches!(result, Err(StorageError::Serialization { .. })));
    }
}
