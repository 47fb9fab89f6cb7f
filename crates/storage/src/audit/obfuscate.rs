//! Masking of secret values in audit snapshots.
//!
//! A snapshot is a `serde_json::Value` produced by serializing the entity, so
//! it shares nothing with the caller's value and masking it cannot leak back
//! into the stored document.

use serde_json::Value;

use crate::document::Document;

/// Replacement written over every secret value. Its length never depends on
/// the secret.
pub const OBFUSCATION_MARKER: &str = "********";

/// Serializes `entity` and masks the secret lists named by
/// [`Document::SECRET_FIELDS`].
///
/// # Errors
///
/// Returns the serializer error if `entity` cannot be represented as JSON.
pub fn obfuscated_snapshot<T: Document>(entity: &T) -> Result<Value, serde_json::Error> {
    let mut snapshot = serde_json::to_value(entity)?;
    mask_secret_lists(&mut snapshot, T::SECRET_FIELDS);
    Ok(snapshot)
}

/// Replaces the `value` of every object in the named top-level arrays with
/// [`OBFUSCATION_MARKER`]. Returns how many values were masked.
pub fn mask_secret_lists(snapshot: &mut Value, fields: &[&str]) -> usize {
    let Value::Object(map) = snapshot else {
        return 0;
    };

    let mut masked = 0;
    for field in fields {
        let Some(Value::Array(secrets)) = map.get_mut(*field) else {
            continue;
        };
        for secret in secrets {
            if let Some(value) = secret.get_mut("value") {
                *value = Value::String(OBFUSCATION_MARKER.to_owned());
                masked += 1;
            }
        }
    }
    masked
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::entities::{ApiResource, Client, Secret};

    #[test]
    fn masks_every_client_secret_and_nothing_else() {
        let client = Client::builder()
            .client_id("app")
            .client_name("App")
            .client_secrets(vec![Secret::shared("s3cr3t"), Secret::shared("a-much-longer-secret")])
            .allowed_scopes(vec!["openid".to_owned()])
            .build();

        let snapshot = obfuscated_snapshot(&client).unwrap();
        let mut expected = serde_json::to_value(&client).unwrap();
        for secret in expected["clientSecrets"].as_array_mut().unwrap() {
            secret["value"] = json!(OBFUSCATION_MARKER);
        }

        assert_eq!(snapshot, expected);
        assert_eq!(client.client_secrets[0].value, "s3cr3t");
    }

    #[test]
    fn masks_api_secrets() {
        let api = ApiResource::builder()
            .name("orders")
            .api_secrets(vec![Secret::shared("k")])
            .build();
        let snapshot = obfuscated_snapshot(&api).unwrap();
        assert_eq!(snapshot["apiSecrets"][0]["value"], OBFUSCATION_MARKER);
        assert_eq!(snapshot["name"], "orders");
    }

    #[test]
    fn counts_masked_values() {
        let mut value = json!({
            "clientSecrets": [{"value": "a"}, {"value": "b"}, {"description": "no value"}],
            "other": [{"value": "untouched"}]
        });
        assert_eq!(mask_secret_lists(&mut value, &["clientSecrets"]), 2);
        assert_eq!(value["other"][0]["value"], "untouched");
        assert_eq!(value["clientSecrets"][2], json!({"description": "no value"}));
    }

    #[test]
    fn non_object_snapshot_is_left_alone() {
        let mut value = json!(["clientSecrets"]);
        assert_eq!(mask_secret_lists(&mut value, &["clientSecrets"]), 0);
    }
}
