use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Secret type used for client and API shared secrets.
pub const SHARED_SECRET: &str = "SharedSecret";

/// A hashed or plain secret attached to a client or API resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(rename_all = "camelCase")]
#[builder(on(String, into))]
pub struct Secret {
    /// Secret material (usually a hash).
    pub value: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When the secret stops being accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
    /// Secret kind.
    #[serde(rename = "type", default = "shared_secret")]
    #[builder(default = shared_secret())]
    pub secret_type: String,
}

impl Secret {
    /// Creates a shared secret with the given value.
    pub fn shared(value: impl Into<String>) -> Self {
        Self::builder().value(value).build()
    }
}

fn shared_secret() -> String {
    SHARED_SECRET.to_owned()
}
