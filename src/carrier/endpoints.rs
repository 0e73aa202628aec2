//! Carrier REST endpoints
//!
//! Each endpoint names its path, method and response body; the client owns
//! auth and the base URL.

use crate::Result;
use reqwest::{Method, Response, Url};
pub use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const FROM: &str = "From";
pub const CALLER_ID: &str = "CallerId";
pub const URL: &str = "Url";
pub const CUSTOM_FIELD: &str = "CustomField";
pub const STATUS_CALLBACK: &str = "StatusCallback";
pub const CALL_TYPE: &str = "CallType";
pub const TIME_LIMIT: &str = "TimeLimit";
pub const TIME_OUT: &str = "TimeOut";

#[derive(Debug)]
pub enum RequestBody {
    Empty,
    Form(HashMap<String, String>),
    Json(serde_json::Value),
}

#[allow(async_fn_in_trait)]
pub trait CarrierEndpoint {
    const PATH: &'static str;

    const METHOD: Method;

    type ResponseBody;

    fn path_params(&self) -> Vec<(&'static str, &str)> {
        vec![]
    }

    fn request_body(&self) -> Result<RequestBody> {
        Ok(RequestBody::Empty)
    }

    async fn response_body(self, resp: Response) -> Result<Self::ResponseBody>;

    fn url(&self, base_url: &Url) -> Url {
        let mut url = base_url.clone();

        let mut path = Self::PATH.to_string();

        for (placeholder, id) in self.path_params() {
            path = path.replace(placeholder, id);
        }

        url.set_path(&path);

        url
    }
}

/// Connects the callee to the dashboard-configured applet.
#[derive(Clone, Debug)]
pub struct ConnectCall {
    pub account_sid: String,
    pub body: ConnectCallBody,
}

impl ConnectCall {
    pub fn new(account_sid: impl Into<String>, body: ConnectCallBody) -> Self {
        Self {
            account_sid: account_sid.into(),
            body,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConnectCallBody {
    pub params: HashMap<String, String>,
}

impl ConnectCallBody {
    pub fn new(
        from: impl Into<String>,
        caller_id: impl Into<String>,
        applet_url: impl Into<String>,
    ) -> Self {
        let mut params = HashMap::new();
        params.insert(FROM.to_string(), from.into());
        params.insert(CALLER_ID.to_string(), caller_id.into());
        params.insert(URL.to_string(), applet_url.into());
        Self { params }
    }

    pub fn with_custom_field(mut self, custom_field: impl Into<String>) -> Self {
        self.params
            .insert(CUSTOM_FIELD.to_string(), custom_field.into());
        self
    }

    pub fn with_status_callback(mut self, status_callback: impl Into<String>) -> Self {
        self.params
            .insert(STATUS_CALLBACK.to_string(), status_callback.into());
        self
    }

    pub fn with_call_type(mut self, call_type: impl Into<String>) -> Self {
        self.params.insert(CALL_TYPE.to_string(), call_type.into());
        self
    }

    /// Seconds the whole call may last before the carrier cuts it.
    pub fn with_time_limit(mut self, time_limit: u32) -> Self {
        self.params
            .insert(TIME_LIMIT.to_string(), time_limit.to_string());
        self
    }

    /// Seconds to ring before giving up on the callee.
    pub fn with_timeout(mut self, timeout: u32) -> Self {
        self.params.insert(TIME_OUT.to_string(), timeout.to_string());
        self
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ConnectCallResponse {
    #[serde(rename = "Call")]
    pub call: CallDetails,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallDetails {
    /// The unique string the carrier created to identify this call.
    pub sid: String,
    pub account_sid: Option<String>,
    pub to: Option<String>,
    pub from: Option<String>,
    pub status: Option<String>,
    pub date_created: Option<String>,
    pub date_updated: Option<String>,
    pub direction: Option<String>,
    pub uri: Option<String>,
}

impl CarrierEndpoint for ConnectCall {
    const PATH: &'static str = "/v1/Accounts/{AccountSid}/Calls/connect.json";
    const METHOD: Method = Method::POST;
    type ResponseBody = ConnectCallResponse;

    fn path_params(&self) -> Vec<(&'static str, &str)> {
        vec![("{AccountSid}", &self.account_sid)]
    }

    fn request_body(&self) -> Result<RequestBody> {
        Ok(RequestBody::Form(self.body.params.clone()))
    }

    async fn response_body(self, resp: Response) -> Result<Self::ResponseBody> {
        Ok(resp.json().await?)
    }
}
