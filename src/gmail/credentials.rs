//! OAuth client credentials — robust decode of the provider JSON blob.
//!
//! The blob is pasted into a settings form and round-trips through
//! storage layers that may add escaping or a byte-order mark, so decoding
//! tries the text as-is, then backslash-unescaped, each with a leading
//! BOM stripped. Both the minimal `{client_id, client_secret}` shape and
//! the provider-exported `{"web": {...}}` / `{"installed": {...}}`
//! nesting are accepted.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::error::ConfigError;

const BOM: &str = "\u{feff}";

/// Parsed OAuth client identity.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    client_secret: SecretString,
}

impl ClientCredentials {
    /// Decode a credentials blob. The first candidate variant that
    /// parses to a JSON object with a usable id and secret wins.
    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        let trimmed = json.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidCredentials {
                reason: "credentials blob is empty".into(),
            });
        }

        let unescaped = strip_slashes(trimmed);
        let candidates = [trimmed, unescaped.as_str()];

        for candidate in candidates {
            let candidate = candidate.strip_prefix(BOM).unwrap_or(candidate);
            let Ok(value) = serde_json::from_str::<Value>(candidate) else {
                continue;
            };
            if let Some(creds) = Self::from_value(&value) {
                return Ok(creds);
            }
            // Parsed but no id/secret anywhere — later variants of the
            // same text will not do better.
            return Err(ConfigError::InvalidCredentials {
                reason: "no client_id/client_secret found".into(),
            });
        }

        Err(ConfigError::InvalidCredentials {
            reason: "not valid JSON in any accepted variant".into(),
        })
    }

    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let conf = obj
            .get("web")
            .or_else(|| obj.get("installed"))
            .and_then(Value::as_object)
            .unwrap_or(obj);

        let client_id = conf.get("client_id")?.as_str()?.trim();
        let client_secret = conf.get("client_secret")?.as_str()?.trim();
        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }

        Some(Self {
            client_id: client_id.to_string(),
            client_secret: SecretString::from(client_secret.to_string()),
        })
    }

    pub fn client_secret(&self) -> &str {
        self.client_secret.expose_secret()
    }
}

/// Remove one level of backslash escaping (storage-layer artifact).
fn strip_slashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_shape_parses() {
        let creds =
            ClientCredentials::parse(r#"{"client_id": "id-1", "client_secret": "s3cret"}"#)
                .unwrap();
        assert_eq!(creds.client_id, "id-1");
        assert_eq!(creds.client_secret(), "s3cret");
    }

    #[test]
    fn web_nested_shape_parses() {
        let blob = r#"{"web": {"client_id": "w-id", "client_secret": "w-secret",
                       "redirect_uris": ["http://localhost"]}}"#;
        let creds = ClientCredentials::parse(blob).unwrap();
        assert_eq!(creds.client_id, "w-id");
    }

    #[test]
    fn installed_nested_shape_parses() {
        let blob = r#"{"installed": {"client_id": "i-id", "client_secret": "i-secret"}}"#;
        let creds = ClientCredentials::parse(blob).unwrap();
        assert_eq!(creds.client_id, "i-id");
    }

    #[test]
    fn escaped_blob_parses_via_unslash_fallback() {
        let blob = r#"{\"client_id\": \"id-1\", \"client_secret\": \"s\"}"#;
        let creds = ClientCredentials::parse(blob).unwrap();
        assert_eq!(creds.client_id, "id-1");
    }

    #[test]
    fn bom_prefixed_blob_parses() {
        let blob = format!("\u{feff}{}", r#"{"client_id": "b", "client_secret": "s"}"#);
        let creds = ClientCredentials::parse(&blob).unwrap();
        assert_eq!(creds.client_id, "b");
    }

    #[test]
    fn empty_blob_is_config_error() {
        assert!(matches!(
            ClientCredentials::parse("   "),
            Err(ConfigError::InvalidCredentials { .. })
        ));
    }

    #[test]
    fn missing_secret_is_config_error() {
        assert!(matches!(
            ClientCredentials::parse(r#"{"client_id": "only-id"}"#),
            Err(ConfigError::InvalidCredentials { .. })
        ));
    }

    #[test]
    fn non_json_is_config_error() {
        assert!(ClientCredentials::parse("not json at all").is_err());
    }

    #[test]
    fn secret_is_not_in_debug_output() {
        let creds =
            ClientCredentials::parse(r#"{"client_id": "id", "client_secret": "hide-me"}"#)
                .unwrap();
        assert!(!format!("{creds:?}").contains("hide-me"));
    }
}
