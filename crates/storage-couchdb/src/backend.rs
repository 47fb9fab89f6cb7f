//! CouchDB-backed storage backend implementation.
//!
//! This module provides [`CouchDbBackend`], which implements the
//! [`StorageBackend`](idp_storage::StorageBackend) trait over CouchDB's HTTP
//! API. Every document is wrapped in an envelope:
//!
//! ```json
//! { "_id": "client:my-app", "_rev": "2-9af3…", "type": "client", "data": { … } }
//! ```
//!
//! `type` feeds the count views in `_design/counts`; `data` is the value
//! produced by the typed store's codec.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use idp_storage::{KEY_SEPARATOR, KeyValue, StorageBackend, StorageError, StorageResult};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::{
    config::CouchDbConfig,
    design::{DESIGN_NAME, view_for_prefix},
    error::{CouchDbError, Result},
};

/// Upper bound appended to a prefix to form an `_all_docs` range end key.
///
/// `_all_docs` orders ids by code point, so the highest scalar value keeps
/// ids with astral-plane characters after the prefix inside the range.
const RANGE_END: char = '\u{10ffff}';

/// Id namespace CouchDB reserves for design documents.
const DESIGN_PREFIX: &str = "_design/";

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(rename = "_id")]
    id: &'a str,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    rev: Option<&'a str>,
    #[serde(rename = "type")]
    doc_type: &'a str,
    data: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StoredDocument {
    #[serde(rename = "_id")]
    pub(crate) id: String,
    #[serde(rename = "_rev")]
    pub(crate) rev: String,
    #[serde(default)]
    data: Option<Value>,
}

impl StoredDocument {
    fn into_key_value(self) -> Result<KeyValue> {
        let value = serde_json::to_vec(&self.data.unwrap_or(Value::Null))?;
        Ok(KeyValue::new(self.id, Bytes::from(value)))
    }
}

#[derive(Deserialize)]
struct AllDocs {
    rows: Vec<AllDocsRow>,
}

#[derive(Deserialize)]
struct AllDocsRow {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    doc: Option<StoredDocument>,
}

impl AllDocsRow {
    fn is_design(&self) -> bool {
        self.id.as_deref().is_some_and(|id| id.starts_with(DESIGN_PREFIX))
    }
}

#[derive(Deserialize)]
struct ReducedView {
    rows: Vec<ReducedRow>,
}

#[derive(Deserialize)]
struct ReducedRow {
    value: u64,
}

#[derive(Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    reason: String,
}

/// CouchDB-backed implementation of [`StorageBackend`].
///
/// Updates and deletes read the current `_rev` and send it back, so a
/// concurrent writer makes the later request fail with
/// [`Conflict`](StorageError::Conflict) instead of silently winning.
///
/// # Thread Safety
///
/// `CouchDbBackend` is `Send + Sync` and cheap to clone. The underlying
/// `reqwest` client pools connections internally.
///
/// # Example
///
/// ```no_run
/// // Requires a running CouchDB server.
/// use idp_storage::{DocumentStore, TypedStore, entities::Client};
/// use idp_storage_couchdb::{CouchDbBackend, CouchDbConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = CouchDbConfig::builder()
///         .url("http://localhost:5984")
///         .database("idp")
///         .username("idp")
///         .password("secret")
///         .build()?;
///
///     let store = TypedStore::new(CouchDbBackend::new(config)?);
///     store.add("my-app", &Client::builder().client_id("my-app").build()).await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct CouchDbBackend {
    http: reqwest::Client,
    config: Arc<CouchDbConfig>,
}

impl std::fmt::Debug for CouchDbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CouchDbBackend")
            .field("url", &self.config.url.as_str())
            .field("database", &self.config.database)
            .finish_non_exhaustive()
    }
}

impl CouchDbBackend {
    /// Creates a backend for the configured server and database.
    ///
    /// No request is sent; the database may not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: CouchDbConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self { http, config: Arc::new(config) })
    }

    /// Returns the backend configuration.
    #[must_use]
    pub fn config(&self) -> &CouchDbConfig {
        &self.config
    }

    /// URL of `segments` below the database, e.g. `["_design", "counts"]`.
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.config.url.clone();
        url.path_segments_mut()
            .map_err(|()| CouchDbError::Url(format!("'{}' cannot be a base", self.config.url)))?
            .pop_if_empty()
            .push(&self.config.database)
            .extend(segments);
        Ok(url)
    }

    /// Starts a request authenticated as the application user, or as the
    /// server admin when `admin` is set.
    pub(crate) fn request(&self, method: Method, url: Url, admin: bool) -> RequestBuilder {
        let credentials =
            if admin { self.config.admin_credentials() } else { self.config.credentials() };
        let builder = self.http.request(method, url);
        match credentials {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }

    /// Fetches a raw document, or `None` on 404.
    pub(crate) async fn fetch<T>(&self, segments: &[&str], admin: bool) -> Result<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.request(Method::GET, self.url(segments)?, admin).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = expect_success(response, &segments.join("/")).await?;
        Ok(Some(response.json().await?))
    }

    async fn put_envelope(&self, key: &str, rev: Option<&str>, value: &[u8]) -> StorageResult<()> {
        let data: Value = serde_json::from_slice(value).map_err(|e| {
            StorageError::serialization_with_source("CouchDB documents must be JSON", e)
        })?;
        let doc_type = key.split_once(KEY_SEPARATOR).map_or(key, |(tag, _)| tag);
        let envelope = Envelope { id: key, rev, doc_type, data };

        let response = self
            .request(Method::PUT, self.url(&[key])?, false)
            .json(&envelope)
            .send()
            .await
            .map_err(CouchDbError::from)?;
        match response.status() {
            StatusCode::CONFLICT if rev.is_none() => Err(StorageError::already_exists(key)),
            StatusCode::CONFLICT => Err(StorageError::conflict(key)),
            _ => {
                expect_success(response, key).await?;
                Ok(())
            },
        }
    }

    async fn all_docs(&self, prefix: &str, include_docs: bool) -> Result<Vec<AllDocsRow>> {
        let start_key = serde_json::to_string(prefix)?;
        let end_key = serde_json::to_string(&format!("{prefix}{RANGE_END}"))?;
        let include_docs = if include_docs { "true" } else { "false" };
        let response = self
            .request(Method::GET, self.url(&["_all_docs"])?, false)
            .query(&[
                ("include_docs", include_docs),
                ("startkey", start_key.as_str()),
                ("endkey", end_key.as_str()),
            ])
            .send()
            .await?;
        let body: AllDocs = expect_success(response, "_all_docs").await?.json().await?;
        Ok(body.rows.into_iter().filter(|row| !row.is_design()).collect())
    }

    /// Counts through `_design/counts`. `None` if the design document is
    /// missing (e.g. the database was never bootstrapped).
    async fn count_view(&self, view: &str) -> Result<Option<u64>> {
        let url = self.url(&["_design", DESIGN_NAME, "_view", view])?;
        let response =
            self.request(Method::GET, url, false).query(&[("reduce", "true")]).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: ReducedView = expect_success(response, view).await?.json().await?;
        Ok(Some(body.rows.first().map_or(0, |row| row.value)))
    }
}

/// Passes successful responses through and turns the rest into
/// [`CouchDbError::Status`], keeping CouchDB's `error: reason`.
pub(crate) async fn expect_success(response: Response, target: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.json::<ErrorBody>().await.unwrap_or_default();
    Err(CouchDbError::status(status, target, format!("{}: {}", body.error, body.reason)))
}

#[async_trait]
impl StorageBackend for CouchDbBackend {
    async fn get(&self, key: &str) -> StorageResult<Option<Bytes>> {
        let doc: Option<StoredDocument> = self.fetch(&[key], false).await?;
        match doc {
            Some(doc) => Ok(Some(doc.into_key_value()?.value)),
            None => Ok(None),
        }
    }

    async fn get_many(&self, keys: &[String]) -> StorageResult<Vec<KeyValue>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .request(Method::POST, self.url(&["_all_docs"])?, false)
            .query(&[("include_docs", "true")])
            .json(&json!({ "keys": keys }))
            .send()
            .await
            .map_err(CouchDbError::from)?;
        let body: AllDocs = expect_success(response, "_all_docs")
            .await?
            .json()
            .await
            .map_err(CouchDbError::from)?;
        // Unknown ids come back as `{"key": …, "error": "not_found"}`,
        // deleted ones with `"doc": null`.
        Ok(body
            .rows
            .into_iter()
            .filter_map(|row| row.doc)
            .map(StoredDocument::into_key_value)
            .collect::<Result<_>>()?)
    }

    async fn get_by_prefix(&self, prefix: &str) -> StorageResult<Vec<KeyValue>> {
        Ok(self
            .all_docs(prefix, true)
            .await?
            .into_iter()
            .filter_map(|row| row.doc)
            .map(StoredDocument::into_key_value)
            .collect::<Result<_>>()?)
    }

    async fn count(&self, prefix: &str) -> StorageResult<u64> {
        if let Some(view) = view_for_prefix(prefix) {
            if let Some(count) = self.count_view(view).await? {
                return Ok(count);
            }
            tracing::debug!(prefix, "count view missing, falling back to range scan");
        }
        Ok(self.all_docs(prefix, false).await?.len() as u64)
    }

    async fn add(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.put_envelope(key, None, &value).await
    }

    async fn update(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let current: Option<StoredDocument> = self.fetch(&[key], false).await?;
        let Some(current) = current else {
            return Err(StorageError::not_found(key));
        };
        self.put_envelope(key, Some(&current.rev), &value).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let current: Option<StoredDocument> = self.fetch(&[key], false).await?;
        let Some(current) = current else {
            return Ok(());
        };
        let response = self
            .request(Method::DELETE, self.url(&[key])?, false)
            .query(&[("rev", current.rev.as_str())])
            .send()
            .await
            .map_err(CouchDbError::from)?;
        match response.status() {
            // Someone else deleted it between our read and our write.
            StatusCode::NOT_FOUND => Ok(()),
            StatusCode::CONFLICT => Err(StorageError::conflict(key)),
            _ => {
                expect_success(response, key).await?;
                Ok(())
            },
        }
    }

    async fn health_check(&self) -> StorageResult<()> {
        let response = self
            .request(Method::GET, self.config.url.clone(), false)
            .send()
            .await
            .map_err(CouchDbError::from)?;
        expect_success(response, "/").await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn backend(url: &str) -> CouchDbBackend {
        let config = CouchDbConfig::builder().url(url).database("idp").build().unwrap();
        CouchDbBackend::new(config).unwrap()
    }

    #[test]
    fn document_urls_keep_colons_and_escape_slashes() {
        let backend = backend("http://localhost:5984");
        assert_eq!(
            backend.url(&["client:a"]).unwrap().as_str(),
            "http://localhost:5984/idp/client:a"
        );
        assert_eq!(
            backend.url(&["client:a/b"]).unwrap().as_str(),
            "http://localhost:5984/idp/client:a%2Fb"
        );
        assert_eq!(
            backend.url(&["_design", "counts"]).unwrap().as_str(),
            "http://localhost:5984/idp/_design/counts"
        );
    }

    #[test]
    fn base_path_is_preserved() {
        let backend = backend("http://proxy.internal/couch/");
        assert_eq!(
            backend.url(&["_all_docs"]).unwrap().as_str(),
            "http://proxy.internal/couch/idp/_all_docs"
        );
    }

    #[test]
    fn envelope_omits_missing_revision() {
        let envelope =
            Envelope { id: "client:a", rev: None, doc_type: "client", data: json!({"x": 1}) };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json, json!({"_id": "client:a", "type": "client", "data": {"x": 1}}));
    }

    #[test]
    fn design_rows_are_recognised() {
        let row = AllDocsRow { id: Some("_design/counts".to_owned()), doc: None };
        assert!(row.is_design());
        let row = AllDocsRow { id: Some("client:a".to_owned()), doc: None };
        assert!(!row.is_design());
    }

    #[test]
    fn debug_hides_credentials() {
        let config = CouchDbConfig::builder()
            .url("http://localhost:5984")
            .database("idp")
            .username("app")
            .password("hunter2")
            .build()
            .unwrap();
        let backend = CouchDbBackend::new(config).unwrap();
        assert!(!format!("{backend:?}").contains("hunter2"));
    }
}
