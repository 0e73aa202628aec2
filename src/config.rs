use crate::encoder::Dialect;
use crate::error::ExodialError;
use crate::session::state::Language;
use crate::Result;
use std::time::Duration;
use url::Url;

const DEFAULT_CARRIER_BASE_URL: &str = "https://api.exotel.com";
const DEFAULT_APPLET_BASE_URL: &str = "https://my.exotel.com";

/// Everything the engine reads from the environment, resolved once at boot.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub account_sid: String,
    pub api_key: String,
    pub api_token: String,
    pub caller_id: String,
    pub app_id: String,
    pub carrier_base_url: Url,
    pub applet_base_url: Url,
    pub callback_base_url: String,
    pub upstream_outcome_url: String,
    pub live_ttl: Duration,
    pub reported_ttl: Duration,
    pub dialect: Dialect,
    pub default_language: Language,
    pub default_prep_minutes: u32,
    pub validate_signatures: bool,
    pub port: u16,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let carrier_base_url = std::env::var("CARRIER_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_CARRIER_BASE_URL.to_string());
        let applet_base_url = std::env::var("CARRIER_APPLET_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_APPLET_BASE_URL.to_string());

        Ok(Self {
            account_sid: std::env::var("CARRIER_ACCOUNT_SID")
                .map_err(|_| ExodialError::MissingAccountSidEnvVar)?,
            api_key: std::env::var("CARRIER_API_KEY")
                .map_err(|_| ExodialError::MissingApiKeyEnvVar)?,
            api_token: std::env::var("CARRIER_API_TOKEN")
                .map_err(|_| ExodialError::MissingApiTokenEnvVar)?,
            caller_id: std::env::var("CARRIER_CALLER_ID")
                .map_err(|_| ExodialError::MissingCallerIdEnvVar)?,
            app_id: std::env::var("CARRIER_APP_ID")
                .map_err(|_| ExodialError::MissingAppIdEnvVar)?,
            carrier_base_url: Url::parse(&carrier_base_url)
                .map_err(|_| ExodialError::InvalidConfigUrl(carrier_base_url))?,
            applet_base_url: Url::parse(&applet_base_url)
                .map_err(|_| ExodialError::InvalidConfigUrl(applet_base_url))?,
            callback_base_url: std::env::var("CALLBACK_BASE_URL")
                .map_err(|_| ExodialError::MissingCallbackBaseEnvVar)?,
            upstream_outcome_url: std::env::var("UPSTREAM_OUTCOME_URL")
                .map_err(|_| ExodialError::MissingUpstreamUrlEnvVar)?,
            live_ttl: Duration::from_secs(env_u64("SESSION_LIVE_TTL_SECONDS", 900)),
            reported_ttl: Duration::from_secs(env_u64("SESSION_REPORTED_TTL_SECONDS", 60)),
            dialect: match std::env::var("DIALECT").as_deref() {
                Ok("json") => Dialect::Json,
                Ok("xml") | Err(_) => Dialect::Xml,
                Ok(other) => return Err(ExodialError::UnknownDialect(other.to_string())),
            },
            default_language: std::env::var("DEFAULT_LANGUAGE")
                .ok()
                .and_then(|code| Language::from_code(&code))
                .unwrap_or(Language::Hi),
            default_prep_minutes: env_u64("DEFAULT_PREP_MINUTES", 30) as u32,
            validate_signatures: std::env::var("CARRIER_VALIDATE_SIGNATURES")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            port: env_u64("PORT", 8080) as u16,
        })
    }

    /// Absolute URL the carrier re-fetches on every keypress.
    pub fn callback_url(&self) -> String {
        format!("{}/callback", self.callback_base_url.trim_end_matches('/'))
    }

    /// Absolute URL the carrier posts terminal statuses to.
    pub fn status_url(&self) -> String {
        format!("{}/status", self.callback_base_url.trim_end_matches('/'))
    }

    /// The dashboard-configured applet the outbound call is parked on.
    pub fn applet_url(&self) -> String {
        format!(
            "{}/{}/exoml/start_voice/{}",
            self.applet_base_url.as_str().trim_end_matches('/'),
            self.account_sid,
            self.app_id
        )
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}
