//! Authorization strategies for CloudSight requests.
//!
//! CloudSight accepts either a plain API key (`CloudSight <key>`) or an
//! OAuth 1.0 HMAC-SHA1 signed header. Both implement [`Authorizer`] so the
//! client can hold either one.

use std::borrow::Cow;
use std::collections::BTreeMap;

use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::Method;
use sha1::{Digest, Sha1};

type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";

/// Produces the `Authorization` header value for a request.
pub trait Authorizer: Send + Sync {
    /// `params` are the form parameters that take part in the signature.
    /// Implementations only read them.
    fn authorize(
        &self,
        method: &Method,
        url: &str,
        params: Option<&BTreeMap<String, String>>,
    ) -> Result<String, AuthError>;
}

/// Pre-shared API key authorization.
pub struct SimpleAuth {
    key: String,
}

impl SimpleAuth {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Authorizer for SimpleAuth {
    fn authorize(
        &self,
        _method: &Method,
        _url: &str,
        _params: Option<&BTreeMap<String, String>>,
    ) -> Result<String, AuthError> {
        Ok(format!("CloudSight {}", self.key))
    }
}

/// OAuth 1.0 signing with a consumer key/secret pair and no token.
pub struct OAuth {
    key: String,
    secret: String,
}

impl OAuth {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// Build the header for an explicit nonce and timestamp.
    pub fn sign(
        &self,
        method: &Method,
        url: &str,
        params: Option<&BTreeMap<String, String>>,
        nonce: &str,
        timestamp: i64,
    ) -> Result<String, AuthError> {
        let mut oauth_params: BTreeMap<String, String> = BTreeMap::from([
            ("oauth_consumer_key".to_string(), self.key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), SIGNATURE_METHOD.to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
        ]);

        if let Some(params) = params {
            oauth_params.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let base_string = format!(
            "{}&{}&{}",
            method.as_str().to_uppercase(),
            percent_encode(url),
            percent_encode(&canonical_query(&oauth_params))
        );
        let signing_key = format!("{}&", percent_encode(&self.secret));

        let mut mac =
            HmacSha1::new_from_slice(signing_key.as_bytes()).map_err(|_| AuthError::InvalidKey)?;
        mac.update(base_string.as_bytes());
        let signature =
            base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());
        oauth_params.insert("oauth_signature".to_string(), signature);

        let header = encoded_pairs(
            oauth_params
                .iter()
                .filter(|(key, _)| key.starts_with("oauth_")),
        )
        .into_iter()
        .map(|(key, value)| format!("{}=\"{}\"", key, value))
        .collect::<Vec<_>>()
        .join(", ");

        Ok(format!("OAuth {}", header))
    }
}

impl Authorizer for OAuth {
    fn authorize(
        &self,
        method: &Method,
        url: &str,
        params: Option<&BTreeMap<String, String>>,
    ) -> Result<String, AuthError> {
        let timestamp = chrono::Utc::now().timestamp();
        self.sign(method, url, params, &generate_nonce(), timestamp)
    }
}

/// Hex SHA-1 digest of a random value.
pub fn generate_nonce() -> String {
    let seed: u64 = rand::random();
    Sha1::digest(seed.to_string().as_bytes())
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// RFC 3986 encoding: only `A-Z a-z 0-9 - . _ ~` pass through.
pub fn percent_encode(input: &str) -> Cow<'_, str> {
    urlencoding::encode(input)
}

/// Encoded `key=value` pairs sorted by key, then value, joined with `&`.
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    encoded_pairs(params.iter())
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

// Sorting happens after encoding, so `[` sorts as `%5B`.
fn encoded_pairs<'a>(
    params: impl Iterator<Item = (&'a String, &'a String)>,
) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = params
        .map(|(key, value)| {
            (
                percent_encode(key).into_owned(),
                percent_encode(value).into_owned(),
            )
        })
        .collect();
    pairs.sort();
    pairs
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid OAuth signing key")]
    InvalidKey,
}
