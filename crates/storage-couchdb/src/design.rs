//! Fixed JSON payloads written during provisioning.
//!
//! The `_design/counts` document defines one map/reduce view per document
//! type. Each view emits the document id for envelopes whose `type` matches
//! and reduces with the built-in `_count`, so `count("client:")` is a single
//! view query instead of a range scan.

use idp_storage::{
    API_RESOURCE_PREFIX, CLIENT_PREFIX, IDENTITY_RESOURCE_PREFIX, PERSISTED_GRANT_PREFIX,
    USER_PREFIX,
};
use serde_json::{Map, Value, json};

/// Design document id, without the `_design/` namespace.
pub const DESIGN_NAME: &str = "counts";

/// Prefixes that have a count view.
pub const COUNTED_PREFIXES: [&str; 5] = [
    CLIENT_PREFIX,
    API_RESOURCE_PREFIX,
    IDENTITY_RESOURCE_PREFIX,
    PERSISTED_GRANT_PREFIX,
    USER_PREFIX,
];

/// Returns the view name for `prefix`, if the design document has one.
///
/// View names are the type tags, i.e. the prefix without its trailing `:`.
#[must_use]
pub fn view_for_prefix(prefix: &str) -> Option<&'static str> {
    COUNTED_PREFIXES
        .iter()
        .find(|counted| **counted == prefix)
        .and_then(|counted| counted.strip_suffix(':'))
}

/// The `_design/counts` body, without `_id` and `_rev`.
#[must_use]
pub fn counts_design() -> Value {
    let views: Map<String, Value> = COUNTED_PREFIXES
        .iter()
        .filter_map(|prefix| prefix.strip_suffix(':'))
        .map(|tag| {
            let map = format!(
                "function (doc) {{ if (doc.type === '{tag}') {{ emit(doc._id, null); }} }}"
            );
            (tag.to_owned(), json!({ "map": map, "reduce": "_count" }))
        })
        .collect();
    json!({ "language": "javascript", "views": views })
}

/// Returns `true` if a stored design document defines the same views.
///
/// `_id`, `_rev` and any other bookkeeping fields are ignored.
#[must_use]
pub fn design_matches(stored: &Value) -> bool {
    let wanted = counts_design();
    stored.get("language") == wanted.get("language") && stored.get("views") == wanted.get("views")
}

/// The `_security` body granting `service_account` member access.
///
/// Admin rights stay with the server admins (`_admin` role).
#[must_use]
pub fn security_document(service_account: &str) -> Value {
    json!({
        "admins": { "names": [], "roles": ["_admin"] },
        "members": { "names": [service_account], "roles": [] },
    })
}
