//! Service shared-access-signature (SAS) generation.
//!
//! Tokens are signed locally with the account key, so generating a URL
//! never touches the network.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::form_urlencoded;

use crate::error::{Result, StorageError};

type HmacSha256 = Hmac<Sha256>;

/// Storage service version the string-to-sign layout below corresponds to.
pub const SAS_VERSION: &str = "2018-11-09";

/// Lifetime of a token when no expiry is given.
pub const DEFAULT_EXPIRY_MINUTES: i64 = 30;

/// Options for a single service SAS token.
///
/// Unset fields are left out of both the signature and the query string,
/// except `permissions`, `resource` and `expiry` which have defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SasOptions {
    /// Permission letters, e.g. "r" or "rw". Defaults to "r".
    pub permissions: Option<String>,
    /// Resource type, "b" for blob or "c" for container. Defaults to "b".
    pub resource: Option<String>,
    pub start: Option<DateTime<Utc>>,
    /// Defaults to thirty minutes from now.
    pub expiry: Option<DateTime<Utc>>,
    /// Stored access policy identifier
    pub identifier: Option<String>,
    pub ip_range: Option<String>,
    /// "https" or "https,http"
    pub protocol: Option<String>,
    pub snapshot_time: Option<String>,
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    pub content_type: Option<String>,
}

impl SasOptions {
    pub fn read_only() -> Self {
        Self {
            permissions: Some("r".to_string()),
            ..Default::default()
        }
    }

    pub fn expires_at(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }
}

/// Signs blob SAS tokens with an account's shared key.
#[derive(Clone)]
pub struct SharedAccessSignature {
    account_name: String,
    /// Keyed once at construction, cloned per signature
    mac: HmacSha256,
}

impl std::fmt::Debug for SharedAccessSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedAccessSignature")
            .field("account_name", &self.account_name)
            .finish_non_exhaustive()
    }
}

impl SharedAccessSignature {
    /// Create a signer from the account name and its base64 access key.
    pub fn new(account_name: &str, access_key: &str) -> Result<Self> {
        if account_name.is_empty() {
            return Err(StorageError::Credentials(
                "account name must not be empty".to_string(),
            ));
        }
        let key = STANDARD
            .decode(access_key.trim())
            .map_err(|e| StorageError::Credentials(format!("access key is not base64: {e}")))?;
        if key.is_empty() {
            return Err(StorageError::Credentials(
                "access key must not be empty".to_string(),
            ));
        }
        let mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| StorageError::Credentials(format!("access key rejected: {e}")))?;
        Ok(Self {
            account_name: account_name.to_string(),
            mac,
        })
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// Generate a form-encoded service SAS query string for `path`.
    ///
    /// `path` is `/<container>/<blob>`, unescaped.
    pub fn generate_service_sas_token(
        &self,
        path: &str,
        options: &SasOptions,
    ) -> String {
        let permissions = options.permissions.as_deref().unwrap_or("r");
        let resource = options.resource.as_deref().unwrap_or("b");
        let start = options.start.map(canonical_time);
        let expiry = canonical_time(
            options
                .expiry
                .unwrap_or_else(|| Utc::now() + Duration::minutes(DEFAULT_EXPIRY_MINUTES)),
        );

        let string_to_sign = [
            permissions,
            start.as_deref().unwrap_or(""),
            &expiry,
            &self.canonicalized_resource(path),
            options.identifier.as_deref().unwrap_or(""),
            options.ip_range.as_deref().unwrap_or(""),
            options.protocol.as_deref().unwrap_or(""),
            SAS_VERSION,
            resource,
            options.snapshot_time.as_deref().unwrap_or(""),
            options.cache_control.as_deref().unwrap_or(""),
            options.content_disposition.as_deref().unwrap_or(""),
            options.content_encoding.as_deref().unwrap_or(""),
            options.content_language.as_deref().unwrap_or(""),
            options.content_type.as_deref().unwrap_or(""),
        ]
        .join("\n");

        let signature = self.sign(&string_to_sign);

        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("sv", SAS_VERSION);
        query.append_pair("sr", resource);
        query.append_pair("sp", permissions);
        let optional = [
            ("st", start.as_deref()),
            ("se", Some(expiry.as_str())),
            ("sip", options.ip_range.as_deref()),
            ("spr", options.protocol.as_deref()),
            ("si", options.identifier.as_deref()),
            ("rscc", options.cache_control.as_deref()),
            ("rscd", options.content_disposition.as_deref()),
            ("rsce", options.content_encoding.as_deref()),
            ("rscl", options.content_language.as_deref()),
            ("rsct", options.content_type.as_deref()),
        ];
        for (key, value) in optional {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                query.append_pair(key, value);
            }
        }
        query.append_pair("sig", &signature);
        query.finish()
    }

    /// Base64 HMAC-SHA256 of `string_to_sign` under the account key.
    pub fn sign(&self, string_to_sign: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(string_to_sign.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }

    fn canonicalized_resource(&self, path: &str) -> String {
        let separator = if path.starts_with('/') { "" } else { "/" };
        format!("/blob/{}{}{}", self.account_name, separator, path)
    }
}

fn canonical_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    // "test-key" base64 encoded
    const KEY: &str = "dGVzdC1rZXk=";

    fn signer() -> SharedAccessSignature {
        SharedAccessSignature::new("acct", KEY).unwrap()
    }

    fn expiry() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap()
    }

    fn query_pairs(token: &str) -> Vec<(String, String)> {
        form_urlencoded::parse(token.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_rejects_non_base64_key() {
        let err = SharedAccessSignature::new("acct", "not base64!").unwrap_err();
        assert!(matches!(err, StorageError::Credentials(_)));
    }

    #[test]
    fn test_rejects_empty_account() {
        let err = SharedAccessSignature::new("", KEY).unwrap_err();
        assert!(matches!(err, StorageError::Credentials(_)));
    }

    #[test]
    fn test_cloned_signer_signs_identically() {
        let s = signer();
        let first = s.sign("payload");
        assert_eq!(s.clone().sign("payload"), first);
        assert_eq!(s.sign("payload"), first);
        assert_ne!(s.sign("other"), first);
    }

    #[test]
    fn test_token_fields() {
        let options = SasOptions {
            protocol: Some("https".to_string()),
            ..SasOptions::read_only().expires_at(expiry())
        };
        let token = signer().generate_service_sas_token("/uploads/a.txt", &options);
        let pairs = query_pairs(&token);

        assert_eq!(value(&pairs, "sv"), Some(SAS_VERSION));
        assert_eq!(value(&pairs, "sr"), Some("b"));
        assert_eq!(value(&pairs, "sp"), Some("r"));
        assert_eq!(value(&pairs, "se"), Some("2030-01-02T03:04:05Z"));
        assert_eq!(value(&pairs, "spr"), Some("https"));
        assert_eq!(value(&pairs, "st"), None);
        assert_eq!(value(&pairs, "rscd"), None);
        assert!(!value(&pairs, "sig").unwrap().is_empty());
    }

    #[test]
    fn test_signature_matches_independent_hmac() {
        let options = SasOptions {
            protocol: Some("https".to_string()),
            ..SasOptions::read_only().expires_at(expiry())
        };
        let token = signer().generate_service_sas_token("/uploads/a.txt", &options);
        let pairs = query_pairs(&token);

        let string_to_sign = "r\n\n2030-01-02T03:04:05Z\n/blob/acct/uploads/a.txt\n\n\nhttps\n2018-11-09\nb\n\n\n\n\n\n";
        let mut mac = HmacSha256::new_from_slice(b"test-key").unwrap();
        mac.update(string_to_sign.as_bytes());
        let expected = STANDARD.encode(mac.finalize().into_bytes());

        assert_eq!(value(&pairs, "sig"), Some(expected.as_str()));
    }

    #[test]
    fn test_deterministic_for_fixed_options() {
        let options = SasOptions::read_only().expires_at(expiry());
        let a = signer().generate_service_sas_token("/c/b", &options);
        let b = signer().generate_service_sas_token("/c/b", &options);
        assert_eq!(a, b);

        let other = signer().generate_service_sas_token("/c/other", &options);
        assert_ne!(a, other);
    }

    #[test]
    fn test_default_expiry_is_in_the_future() {
        let token = signer().generate_service_sas_token("/c/b", &SasOptions::default());
        let pairs = query_pairs(&token);
        let se = DateTime::parse_from_rfc3339(value(&pairs, "se").unwrap()).unwrap();
        let remaining = se.with_timezone(&Utc) - Utc::now();
        assert!(remaining > Duration::minutes(25));
        assert!(remaining <= Duration::minutes(DEFAULT_EXPIRY_MINUTES));
    }

    #[test]
    fn test_response_overrides_are_encoded() {
        let options = SasOptions {
            content_disposition: Some("attachment; filename=\"a b.txt\"".to_string()),
            content_type: Some("text/plain".to_string()),
            ..SasOptions::read_only().expires_at(expiry())
        };
        let token = signer().generate_service_sas_token("/c/b", &options);
        assert!(!token.contains(' '));

        let pairs = query_pairs(&token);
        assert_eq!(
            value(&pairs, "rscd"),
            Some("attachment; filename=\"a b.txt\"")
        );
        assert_eq!(value(&pairs, "rsct"), Some("text/plain"));
    }

    #[test]
    fn test_canonicalized_resource_adds_missing_slash() {
        let s = signer();
        assert_eq!(s.canonicalized_resource("c/b"), "/blob/acct/c/b");
        assert_eq!(s.canonicalized_resource("/c/b"), "/blob/acct/c/b");
    }
}
