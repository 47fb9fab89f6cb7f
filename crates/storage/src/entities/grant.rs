use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;

/// A grant (refresh token, authorization code, consent, ...) persisted by the
/// protocol engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(rename_all = "camelCase")]
#[builder(on(String, into))]
pub struct PersistedGrant {
    /// Grant handle; also the document id.
    pub key: String,
    /// Grant kind, e.g. `refresh_token`.
    #[serde(rename = "type")]
    pub grant_type: String,
    /// Subject the grant was issued to.
    pub subject_id: String,
    /// Client the grant was issued to.
    pub client_id: String,
    /// Issue time.
    #[builder(default = Utc::now())]
    pub creation_time: DateTime<Utc>,
    /// Expiry time, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
    /// Serialized grant payload, opaque to the store.
    pub data: String,
}

impl Document for PersistedGrant {
    const TYPE_TAG: &'static str = "persistedgrant";
}

impl PersistedGrant {
    /// Returns `true` if the grant has an expiry in the past.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|exp| exp <= now)
    }
}
