//! Shared test utilities for CouchDB backend testing.
//!
//! [`FakeCouchDb`] is a stateful [`wiremock`] responder that speaks the
//! subset of the CouchDB HTTP API the backend uses: documents with
//! revisions, `_all_docs` range and key lookups, reduced views over
//! `_design/counts`, database creation and `_security`. It is feature-gated
//! behind `testutil` to keep it out of production builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! idp-storage-couchdb = { path = "../storage-couchdb", features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use idp_storage_couchdb::testutil::{create_test_backend, start_fake_couchdb};
//!
//! # async fn example() {
//! let (server, fake) = start_fake_couchdb().await;
//! let backend = create_test_backend(&server, "idp");
//! # }
//! ```

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use parking_lot::Mutex;
use serde_json::{Value, json};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate, matchers::any};

use crate::{backend::CouchDbBackend, config::CouchDbConfig};

/// Admin user configured by [`test_config`].
pub const ADMIN_USER: &str = "admin";
/// Service account configured by [`test_config`].
pub const SERVICE_ACCOUNT: &str = "idp-service";

#[derive(Default)]
struct FakeState {
    databases: HashSet<String>,
    /// `(database, id)` to `(revision number, body without _id/_rev)`.
    documents: BTreeMap<(String, String), (u64, Value)>,
    security: HashMap<String, Value>,
    requests: Vec<String>,
    outages: u32,
}

/// In-memory CouchDB stand-in. Clones share state.
#[derive(Clone, Default)]
pub struct FakeCouchDb {
    state: Arc<Mutex<FakeState>>,
}

impl FakeCouchDb {
    /// Answers the next `n` requests with `503 Service Unavailable`.
    pub fn fail_next(&self, n: u32) {
        self.state.lock().outages = n;
    }

    /// Marks `database` as created.
    pub fn create_database(&self, database: &str) {
        self.state.lock().databases.insert(database.to_owned());
    }

    /// Returns `true` if `database` was created.
    #[must_use]
    pub fn database_exists(&self, database: &str) -> bool {
        self.state.lock().databases.contains(database)
    }

    /// Returns the `_security` document of `database`.
    #[must_use]
    pub fn security(&self, database: &str) -> Option<Value> {
        self.state.lock().security.get(database).cloned()
    }

    /// Returns a stored document body (without `_id`/`_rev`).
    #[must_use]
    pub fn document(&self, database: &str, id: &str) -> Option<Value> {
        let key = (database.to_owned(), id.to_owned());
        self.state.lock().documents.get(&key).map(|(_, body)| body.clone())
    }

    /// Overwrites a document behind the backend's back, bumping its revision.
    pub fn replace_document(&self, database: &str, id: &str, body: Value) {
        let mut state = self.state.lock();
        let key = (database.to_owned(), id.to_owned());
        let next = state.documents.get(&key).map_or(1, |(rev, _)| rev + 1);
        state.documents.insert(key, (next, body));
    }

    /// Returns every request seen so far as `"METHOD /path"`.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().requests.clone()
    }

    /// Number of requests whose `"METHOD /path"` line equals `line`.
    #[must_use]
    pub fn count_requests(&self, line: &str) -> usize {
        self.state.lock().requests.iter().filter(|r| *r == line).count()
    }
}

impl Respond for FakeCouchDb {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut state = self.state.lock();
        let method = request.method.as_str();
        state.requests.push(format!("{method} {}", request.url.path()));
        if state.outages > 0 {
            state.outages -= 1;
            return error(503, "service_unavailable", "fake outage");
        }

        let decoded: Vec<String> = request
            .url
            .path_segments()
            .map(|s| {
                s.filter(|segment| !segment.is_empty())
                    .map(|segment| {
                        urlencoding::decode(segment)
                            .map_or_else(|_| segment.to_owned(), |d| d.into_owned())
                    })
                    .collect()
            })
            .unwrap_or_default();
        let segments: Vec<&str> = decoded.iter().map(String::as_str).collect();
        let query: HashMap<String, String> = request.url.query_pairs().into_owned().collect();
        let body = serde_json::from_slice::<Value>(&request.body).unwrap_or(Value::Null);

        match (method, segments.as_slice()) {
            ("GET", []) => ResponseTemplate::new(200)
                .set_body_json(json!({ "couchdb": "Welcome", "version": "3.3.3" })),
            ("HEAD", [db]) if state.databases.contains(*db) => ResponseTemplate::new(200),
            ("HEAD", [_]) => ResponseTemplate::new(404),
            ("PUT", [db]) => {
                if state.databases.insert((*db).to_owned()) {
                    ResponseTemplate::new(201).set_body_json(json!({ "ok": true }))
                } else {
                    error(412, "file_exists", "The database could not be created.")
                }
            },
            ("PUT", [db, "_security"]) => {
                state.security.insert((*db).to_owned(), body);
                ResponseTemplate::new(200).set_body_json(json!({ "ok": true }))
            },
            ("GET", [db, "_all_docs"]) => state.range(db, &query),
            ("POST", [db, "_all_docs"]) => state.lookup(db, &body),
            ("GET", [db, "_design", name, "_view", view]) => state.view(db, name, view),
            ("GET", [db, "_design", name]) => state.get(db, &format!("_design/{name}")),
            ("PUT", [db, "_design", name]) => state.put(db, &format!("_design/{name}"), body),
            ("GET", [db, id]) => state.get(db, id),
            ("PUT", [db, id]) => state.put(db, id, body),
            ("DELETE", [db, id]) => state.delete(db, id, query.get("rev").map(String::as_str)),
            _ => error(400, "bad_request", "unsupported by fake"),
        }
    }
}

impl FakeState {
    fn get(&self, db: &str, id: &str) -> ResponseTemplate {
        match self.documents.get(&(db.to_owned(), id.to_owned())) {
            Some((rev, body)) => {
                ResponseTemplate::new(200).set_body_json(with_meta(id, *rev, body))
            },
            None => error(404, "not_found", "missing"),
        }
    }

    fn put(&mut self, db: &str, id: &str, mut body: Value) -> ResponseTemplate {
        let given = body.get("_rev").and_then(Value::as_str).map(str::to_owned);
        if let Some(object) = body.as_object_mut() {
            object.remove("_id");
            object.remove("_rev");
        }
        let key = (db.to_owned(), id.to_owned());
        let next = match (self.documents.get(&key), given) {
            (None, None) => 1,
            (Some((rev, _)), Some(given)) if revision(*rev) == given => rev + 1,
            _ => return error(409, "conflict", "Document update conflict."),
        };
        self.documents.insert(key, (next, body));
        ResponseTemplate::new(201)
            .set_body_json(json!({ "ok": true, "id": id, "rev": revision(next) }))
    }

    fn delete(&mut self, db: &str, id: &str, rev: Option<&str>) -> ResponseTemplate {
        let key = (db.to_owned(), id.to_owned());
        match self.documents.get(&key) {
            None => error(404, "not_found", "deleted"),
            Some((current, _)) if Some(revision(*current).as_str()) != rev => {
                error(409, "conflict", "Document update conflict.")
            },
            Some(_) => {
                self.documents.remove(&key);
                ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "id": id }))
            },
        }
    }

    fn range(&self, db: &str, query: &HashMap<String, String>) -> ResponseTemplate {
        let decode = |name: &str| {
            query.get(name).and_then(|raw| serde_json::from_str::<String>(raw).ok())
        };
        let start = decode("startkey").unwrap_or_default();
        let end = decode("endkey").unwrap_or_else(|| "\u{10ffff}".to_owned());
        let include_docs = query.get("include_docs").is_some_and(|v| v == "true");

        let rows: Vec<Value> = self
            .documents
            .range((db.to_owned(), start)..=(db.to_owned(), end))
            .map(|((_, id), (rev, body))| row(id, *rev, body, include_docs))
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "total_rows": rows.len(), "rows": rows }))
    }

    fn lookup(&self, db: &str, body: &Value) -> ResponseTemplate {
        let keys = body.get("keys").and_then(Value::as_array).cloned().unwrap_or_default();
        let rows: Vec<Value> = keys
            .iter()
            .filter_map(Value::as_str)
            .map(|id| match self.documents.get(&(db.to_owned(), id.to_owned())) {
                Some((rev, body)) => row(id, *rev, body, true),
                None => json!({ "key": id, "error": "not_found" }),
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "rows": rows }))
    }

    fn view(&self, db: &str, design: &str, view: &str) -> ResponseTemplate {
        let design_key = (db.to_owned(), format!("_design/{design}"));
        let Some((_, design_body)) = self.documents.get(&design_key) else {
            return error(404, "not_found", "missing");
        };
        if design_body.pointer(&format!("/views/{view}")).is_none() {
            return error(404, "not_found", "missing_named_view");
        }
        let count = self
            .documents
            .iter()
            .filter(|((d, _), (_, body))| d == db && body.get("type") == Some(&json!(view)))
            .count();
        let rows = if count == 0 { json!([]) } else { json!([{ "key": null, "value": count }]) };
        ResponseTemplate::new(200).set_body_json(json!({ "rows": rows }))
    }
}

fn revision(n: u64) -> String {
    format!("{n}-fake")
}

fn with_meta(id: &str, rev: u64, body: &Value) -> Value {
    let mut doc = body.clone();
    if let Some(object) = doc.as_object_mut() {
        object.insert("_id".to_owned(), json!(id));
        object.insert("_rev".to_owned(), json!(revision(rev)));
    }
    doc
}

fn row(id: &str, rev: u64, body: &Value, include_docs: bool) -> Value {
    let mut row = json!({ "id": id, "key": id, "value": { "rev": revision(rev) } });
    if include_docs {
        row["doc"] = with_meta(id, rev, body);
    }
    row
}

fn error(status: u16, error: &str, reason: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({ "error": error, "reason": reason }))
}

/// Starts a mock server answering every request with a fresh [`FakeCouchDb`].
pub async fn start_fake_couchdb() -> (MockServer, FakeCouchDb) {
    let server = MockServer::start().await;
    let fake = FakeCouchDb::default();
    Mock::given(any()).respond_with(fake.clone()).mount(&server).await;
    (server, fake)
}

/// A configuration for `database` on `server` with application and admin
/// credentials and a service account.
///
/// # Panics
///
/// Panics if `database` is not a legal database name.
#[must_use]
pub fn test_config(server: &MockServer, database: &str) -> CouchDbConfig {
    CouchDbConfig::builder()
        .url(server.uri())
        .database(database)
        .username("idp")
        .password("idp-password")
        .admin_username(ADMIN_USER)
        .admin_password("admin-password")
        .service_account(SERVICE_ACCOUNT)
        .build()
        .expect("valid test config")
}

/// Creates a [`CouchDbBackend`] for `database` on `server`.
///
/// # Panics
///
/// Panics if backend creation fails.
#[must_use]
pub fn create_test_backend(server: &MockServer, database: &str) -> CouchDbBackend {
    CouchDbBackend::new(test_config(server, database)).expect("backend creation should succeed")
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use idp_storage::StorageBackend;

    use super::*;

    #[tokio::test]
    async fn fake_backend_is_functional() {
        let (server, fake) = start_fake_couchdb().await;
        let backend = create_test_backend(&server, "idp");

        backend.add("client:a", br#"{"clientId":"a"}"#.to_vec()).await.expect("add");
        let value = backend.get("client:a").await.expect("get");
        assert!(value.is_some());
        assert_eq!(fake.document("idp", "client:a").expect("stored")["type"], "client");
        assert_eq!(fake.count_requests("PUT /idp/client:a"), 1);
    }

    #[tokio::test]
    async fn outages_answer_service_unavailable() {
        let (server, fake) = start_fake_couchdb().await;
        let backend = create_test_backend(&server, "idp");
        fake.fail_next(1);

        assert!(backend.health_check().await.is_err());
        assert!(backend.health_check().await.is_ok());
    }
}
