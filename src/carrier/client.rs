use crate::carrier::endpoints::{CarrierEndpoint, ConnectCall, ConnectCallBody, RequestBody};
use crate::config::EngineConfig;
use crate::correlation::Correlation;
use crate::error::{CarrierApiError, ExodialError};
use crate::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

/// Seconds to ring the callee before the carrier gives up.
const RING_TIMEOUT_SECS: u32 = 30;
/// Hard cap on call length; these menus run well under two minutes.
const CALL_TIME_LIMIT_SECS: u32 = 300;

/// One request per invocation, no retries; idempotency is the initiator's job.
#[derive(Clone, Debug)]
pub struct CarrierClient {
    inner: reqwest::Client,
    account_sid: String,
    api_key: String,
    api_token: String,
    caller_id: String,
    applet_url: String,
    status_url: String,
    base_url: Url,
}

impl CarrierClient {
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            inner,
            account_sid: config.account_sid.clone(),
            api_key: config.api_key.clone(),
            api_token: config.api_token.clone(),
            caller_id: config.caller_id.clone(),
            applet_url: config.applet_url(),
            status_url: config.status_url(),
            base_url: config.carrier_base_url.clone(),
        })
    }

    pub fn account_sid(&self) -> &str {
        &self.account_sid
    }

    pub async fn hit<E: CarrierEndpoint>(&self, endpoint: E) -> Result<E::ResponseBody> {
        let mut builder = self
            .inner
            .request(E::METHOD, endpoint.url(&self.base_url))
            .basic_auth(&self.api_key, Some(&self.api_token));

        builder = match endpoint.request_body()? {
            RequestBody::Empty => builder,
            RequestBody::Form(params) => builder.form(&params),
            RequestBody::Json(value) => builder.json(&value),
        };

        let resp = builder
            .send()
            .await
            .map_err(|e| ExodialError::CarrierUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(ExodialError::AuthInvalid { status });
            }
            let body = resp.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(ExodialError::CarrierUnavailable(format!(
                    "{status}: {body}"
                )));
            }
            if let Ok(parsed) = serde_json::from_str::<CarrierApiError>(&body) {
                tracing::warn!(
                    code = parsed.exception.status,
                    message = %parsed.exception.message,
                    "carrier rejected the request"
                );
            }
            return Err(ExodialError::CarrierRejected { status, body });
        }

        E::response_body(endpoint, resp).await
    }
}

/// What the initiator hands to whatever places the call.
#[derive(Clone, Debug)]
pub struct PlaceCall {
    /// E.164 digits; a leading `+` is tolerated and stripped.
    pub phone: String,
    pub correlation: Correlation,
}

/// Seam between the initiator and the carrier, so initiation logic can be
/// exercised without the network.
#[async_trait]
pub trait CallPlacer: Send + Sync {
    /// Returns the CallSid the carrier assigned.
    async fn place(&self, req: PlaceCall) -> Result<String>;
}

#[async_trait]
impl CallPlacer for CarrierClient {
    async fn place(&self, req: PlaceCall) -> Result<String> {
        let phone = req.phone.trim_start_matches('+').to_string();
        let custom_field = req.correlation.encode()?;

        let body = ConnectCallBody::new(phone, self.caller_id.clone(), self.applet_url.clone())
            .with_custom_field(custom_field)
            .with_status_callback(self.status_url.clone())
            .with_call_type("trans")
            .with_timeout(RING_TIMEOUT_SECS)
            .with_time_limit(CALL_TIME_LIMIT_SECS);

        let endpoint = ConnectCall::new(self.account_sid.clone(), body);
        let resp = self.hit(endpoint).await?;

        tracing::info!(
            call_sid = %resp.call.sid,
            order_id = req.correlation.order_id,
            "carrier accepted outbound call"
        );
        Ok(resp.call.sid)
    }
}
