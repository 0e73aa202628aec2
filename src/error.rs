use crate::carrier::validation::SignatureError;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExodialError {
    #[error("carrier rejected the call ({status}): {body}")]
    CarrierRejected {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("carrier refused our credentials ({status})")]
    AuthInvalid { status: reqwest::StatusCode },
    #[error("carrier unavailable: {0}")]
    CarrierUnavailable(String),
    #[error("CARRIER_ACCOUNT_SID not set")]
    MissingAccountSidEnvVar,
    #[error("CARRIER_API_KEY not set")]
    MissingApiKeyEnvVar,
    #[error("CARRIER_API_TOKEN not set")]
    MissingApiTokenEnvVar,
    #[error("CARRIER_CALLER_ID not set")]
    MissingCallerIdEnvVar,
    #[error("CARRIER_APP_ID not set")]
    MissingAppIdEnvVar,
    #[error("CALLBACK_BASE_URL not set")]
    MissingCallbackBaseEnvVar,
    #[error("UPSTREAM_OUTCOME_URL not set")]
    MissingUpstreamUrlEnvVar,
    #[error("unrecognized DIALECT value: {0}")]
    UnknownDialect(String),
    #[error("invalid url in configuration: {0}")]
    InvalidConfigUrl(String),
    #[error("http error")]
    Request(#[from] reqwest::Error),
    #[error("json error")]
    Json(#[from] serde_json::Error),
    #[error("XML writing error: {0}")]
    Xml(#[from] xml::writer::Error),
    #[error("UTF-8 encoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("signature validation error: {0}")]
    Signature(#[from] SignatureError),
}

/// Error body the carrier returns alongside 4xx responses.
#[derive(Deserialize, Debug)]
pub struct CarrierApiError {
    #[serde(rename = "RestException")]
    pub exception: CarrierRestException,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct CarrierRestException {
    pub status: i32,
    pub message: String,
}
