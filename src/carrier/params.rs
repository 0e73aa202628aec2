//! Parameters the carrier sends us on applet fetches and status callbacks.

use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use strum::{Display, EnumString};

/// Statuses the carrier reports for a call leg.
#[derive(Clone, Copy, Debug, Deserialize, Display, EnumString, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CarrierCallStatus {
    Queued,
    Ringing,
    InProgress,
    Completed,
    Failed,
    Busy,
    NoAnswer,
    Canceled,
}

/// Query (GET) or form (POST) fields on every per-turn applet fetch.
///
/// Everything is optional: the handler must answer with a playable reply no
/// matter how mangled the request is.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallbackParams {
    #[serde(default)]
    pub call_sid: Option<String>,
    /// The carrier sends this one lowercase, sometimes wrapped in quotes.
    #[serde(default, rename = "digits")]
    pub digits: Option<String>,
    #[serde(default)]
    pub custom_field: Option<String>,
    #[serde(default)]
    pub call_from: Option<String>,
    #[serde(default)]
    pub call_to: Option<String>,
    #[serde(default)]
    pub call_status: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

/// Form fields on the terminal status callback.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusCallbackParams {
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub recording_url: Option<String>,
    #[serde(default)]
    pub custom_field: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

impl StatusCallbackParams {
    /// Lenient: an unknown status string maps to `None` rather than a reject.
    pub fn call_status(&self) -> Option<CarrierCallStatus> {
        self.status
            .as_deref()
            .and_then(|s| CarrierCallStatus::from_str(s.trim()).ok())
    }

    pub fn duration_seconds(&self) -> Option<u32> {
        self.duration.as_deref().and_then(|d| d.trim().parse().ok())
    }
}
