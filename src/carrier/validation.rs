//! Opt-in verification of inbound carrier webhooks.
//!
//! The carrier signs each webhook with HMAC-SHA1 keyed by the account's API
//! token, over the public URL it fetched plus, for form posts, the posted
//! parameter pairs in sorted order. Deployments opt in via
//! `CARRIER_VALIDATE_SIGNATURES`; the toggle lives inside the verifier, so a
//! disabled verifier accepts everything and the handlers never branch on
//! configuration.

use crate::carrier::params::{CallbackParams, StatusCallbackParams};
use crate::config::EngineConfig;
use base64::Engine;
use hmac::{Hmac, Mac};
use http::{header, HeaderMap, Method, Uri};
use sha1::Sha1;
use std::collections::HashMap;
use thiserror::Error;

type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_HEADER: &str = "X-Carrier-Signature";

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("signature is not valid base64")]
    MalformedSignature,
    #[error("could not key the verifier")]
    BadKey,
    #[error("signature does not match the request")]
    Mismatch,
}

#[derive(Clone, Debug)]
pub struct SignatureVerifier {
    api_token: Option<String>,
}

impl SignatureVerifier {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: Some(api_token.into()),
        }
    }

    /// Accepts every request without looking at it.
    pub fn disabled() -> Self {
        Self { api_token: None }
    }

    /// Verification only bites when the deployment opted in.
    pub fn from_config(config: &EngineConfig) -> Self {
        if config.validate_signatures {
            Self::new(config.api_token.clone())
        } else {
            Self::disabled()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_token.is_some()
    }

    /// Per-turn applet fetch. GETs carry the digits in the query string and
    /// are signed over the URL alone; form POSTs also cover the pairs.
    pub fn verify_callback(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        params: &CallbackParams,
    ) -> Result<(), SignatureError> {
        let pairs = (method == Method::POST).then(|| callback_pairs(params));
        self.verify(uri, headers, pairs)
    }

    /// Terminal status callbacks are always form POSTs.
    pub fn verify_status(
        &self,
        uri: &Uri,
        headers: &HeaderMap,
        params: &StatusCallbackParams,
    ) -> Result<(), SignatureError> {
        self.verify(uri, headers, Some(status_pairs(params)))
    }

    fn verify(
        &self,
        uri: &Uri,
        headers: &HeaderMap,
        pairs: Option<Vec<(&str, &str)>>,
    ) -> Result<(), SignatureError> {
        let Some(api_token) = &self.api_token else {
            return Ok(());
        };

        let host = headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .ok_or(SignatureError::MissingHeader("Host"))?;
        let claimed = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?;
        let claimed = base64::engine::general_purpose::STANDARD
            .decode(claimed)
            .map_err(|_| SignatureError::MalformedSignature)?;

        // The carrier signs the URL as it dialed it: scheme, our public
        // host, then the path and query exactly as fetched.
        let mut mac = HmacSha1::new_from_slice(api_token.as_bytes())
            .map_err(|_| SignatureError::BadKey)?;
        mac.update(b"https://");
        mac.update(host.as_bytes());
        mac.update(uri.path().as_bytes());
        if let Some(query) = uri.query() {
            mac.update(b"?");
            mac.update(query.as_bytes());
        }
        if let Some(mut pairs) = pairs {
            pairs.sort_unstable();
            for (name, value) in pairs {
                mac.update(name.as_bytes());
                mac.update(value.as_bytes());
            }
        }

        mac.verify_slice(&claimed)
            .map_err(|_| SignatureError::Mismatch)
    }
}

fn callback_pairs(params: &CallbackParams) -> Vec<(&str, &str)> {
    let named = [
        ("CallSid", params.call_sid.as_deref()),
        ("digits", params.digits.as_deref()),
        ("CustomField", params.custom_field.as_deref()),
        ("CallFrom", params.call_from.as_deref()),
        ("CallTo", params.call_to.as_deref()),
        ("CallStatus", params.call_status.as_deref()),
    ];
    collect_pairs(named, &params.extra)
}

fn status_pairs(params: &StatusCallbackParams) -> Vec<(&str, &str)> {
    let named = [
        ("CallSid", params.call_sid.as_deref()),
        ("Status", params.status.as_deref()),
        ("Duration", params.duration.as_deref()),
        ("RecordingUrl", params.recording_url.as_deref()),
        ("CustomField", params.custom_field.as_deref()),
    ];
    collect_pairs(named, &params.extra)
}

fn collect_pairs<'a, const N: usize>(
    named: [(&'a str, Option<&'a str>); N],
    extra: &'a HashMap<String, String>,
) -> Vec<(&'a str, &'a str)> {
    let mut pairs: Vec<(&str, &str)> = extra
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
    pairs.extend(
        named
            .into_iter()
            .filter_map(|(name, value)| value.map(|value| (name, value))),
    );
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "test_api_token";
    const HOST: &str = "voice.mangwale.in";

    fn sign(chunks: &[&str]) -> String {
        let mut mac = HmacSha1::new_from_slice(TOKEN.as_bytes()).unwrap();
        for chunk in chunks {
            mac.update(chunk.as_bytes());
        }
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }

    fn headers(signature: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HOST.parse().unwrap());
        if let Some(signature) = signature {
            headers.insert(SIGNATURE_HEADER, signature.parse().unwrap());
        }
        headers
    }

    fn status_params() -> StatusCallbackParams {
        StatusCallbackParams {
            call_sid: Some("abc123".into()),
            status: Some("completed".into()),
            duration: Some("35".into()),
            extra: HashMap::from([("Direction".to_string(), "outbound".to_string())]),
            ..Default::default()
        }
    }

    #[test]
    fn disabled_verifier_accepts_unsigned_requests() {
        let verifier = SignatureVerifier::disabled();
        let uri = Uri::from_static("/callback?CallSid=abc123&digits=1");

        let result = verifier.verify_callback(
            &Method::GET,
            &uri,
            &HeaderMap::new(),
            &CallbackParams::default(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn signed_applet_fetch_passes() {
        let verifier = SignatureVerifier::new(TOKEN);
        let uri = Uri::from_static("/ivr/callback?CallSid=abc123&digits=1");
        let signature = sign(&["https://voice.mangwale.in/ivr/callback?CallSid=abc123&digits=1"]);

        let result = verifier.verify_callback(
            &Method::GET,
            &uri,
            &headers(Some(&signature)),
            &CallbackParams::default(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn signed_status_post_covers_the_sorted_pairs() {
        let verifier = SignatureVerifier::new(TOKEN);
        let uri = Uri::from_static("/status");
        // CallSid < Direction < Duration < Status
        let signature = sign(&[
            "https://voice.mangwale.in/status",
            "CallSid",
            "abc123",
            "Direction",
            "outbound",
            "Duration",
            "35",
            "Status",
            "completed",
        ]);

        let result = verifier.verify_status(&uri, &headers(Some(&signature)), &status_params());
        assert!(result.is_ok());
    }

    #[test]
    fn tampered_status_params_mismatch() {
        let verifier = SignatureVerifier::new(TOKEN);
        let uri = Uri::from_static("/status");
        let signature = sign(&[
            "https://voice.mangwale.in/status",
            "CallSid",
            "abc123",
            "Direction",
            "outbound",
            "Duration",
            "35",
            "Status",
            "completed",
        ]);

        let mut tampered = status_params();
        tampered.duration = Some("9999".into());

        let result = verifier.verify_status(&uri, &headers(Some(&signature)), &tampered);
        assert!(matches!(result, Err(SignatureError::Mismatch)));
    }

    #[test]
    fn missing_headers_are_named() {
        let verifier = SignatureVerifier::new(TOKEN);
        let uri = Uri::from_static("/status");

        let result = verifier.verify_status(&uri, &headers(None), &status_params());
        assert!(matches!(
            result,
            Err(SignatureError::MissingHeader(SIGNATURE_HEADER))
        ));

        let result = verifier.verify_status(&uri, &HeaderMap::new(), &status_params());
        assert!(matches!(result, Err(SignatureError::MissingHeader("Host"))));
    }

    #[test]
    fn garbage_signature_is_malformed_not_mismatched() {
        let verifier = SignatureVerifier::new(TOKEN);
        let uri = Uri::from_static("/status");

        let result =
            verifier.verify_status(&uri, &headers(Some("!!not-base64!!")), &status_params());
        assert!(matches!(result, Err(SignatureError::MalformedSignature)));
    }
}
