//! One record per outstanding call, keyed by the carrier-assigned CallSid.

use crate::correlation::Correlation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

#[derive(Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CallKind {
    VendorOrderConfirmation,
    RiderAssignment,
}

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Language {
    Hi,
    En,
    Mr,
}

impl Language {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "hi" => Some(Self::Hi),
            "en" => Some(Self::En),
            "mr" => Some(Self::Mr),
            _ => None,
        }
    }

    /// BCP-47 tag the carrier's TTS understands; advisory only.
    pub fn voice_hint(self) -> &'static str {
        match self {
            Self::Hi => "hi-IN",
            Self::En => "en-IN",
            Self::Mr => "mr-IN",
        }
    }
}

/// The node of the menu the call currently occupies. Distinct from the
/// carrier's lifecycle status.
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LogicalState {
    Greeting,
    PrepTimeInquiry,
    RejectionReason,
    GoodbyeAccepted,
    GoodbyeRejected,
    GoodbyeNoResponse,
}

impl LogicalState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::GoodbyeAccepted | Self::GoodbyeRejected | Self::GoodbyeNoResponse
        )
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Lifecycle {
    Initiated,
    Ringing,
    Answered,
    InProgress,
    Completed,
    Failed,
    Busy,
    NoAnswer,
    Cancelled,
}

impl Lifecycle {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Busy | Self::NoAnswer | Self::Cancelled
        )
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Outcome {
    Accepted,
    Rejected,
    NoResponse,
}

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RejectionReason {
    ItemsUnavailable,
    TooBusy,
    ClosingTime,
    Other,
}

impl RejectionReason {
    pub fn from_digit(digit: char) -> Option<Self> {
        match digit {
            '1' => Some(Self::ItemsUnavailable),
            '2' => Some(Self::TooBusy),
            '3' => Some(Self::ClosingTime),
            '4' => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
}

/// Frozen snapshot captured at initiation; the composer reads it, nothing
/// writes it.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct OrderPayload {
    pub order_id: u64,
    #[serde(default)]
    pub order_amount: Option<f64>,
    #[serde(default)]
    pub order_items: Vec<OrderItem>,
}

/// Slots captured during the call. Each slot is write-once; later writes are
/// dropped so a re-delivered digit cannot overwrite a committed answer.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Collected {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prep_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectionReason>,
}

impl Collected {
    pub fn set_accepted(&mut self, accepted: bool) {
        if self.accepted.is_none() {
            self.accepted = Some(accepted);
        }
    }

    pub fn set_prep_minutes(&mut self, minutes: u32) {
        if self.prep_minutes.is_none() {
            self.prep_minutes = Some(minutes);
        }
    }

    pub fn set_reason(&mut self, reason: RejectionReason) {
        if self.reason.is_none() {
            self.reason = Some(reason);
        }
    }
}

/// Last digit we committed a transition for, kept to absorb carrier
/// re-deliveries of the same request.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct LastInput {
    pub digit: String,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CallState {
    pub call_sid: String,
    pub kind: CallKind,
    pub order_id: u64,
    pub vendor_id: Option<String>,
    pub rider_id: Option<String>,
    pub callee_phone: Option<String>,
    pub callee_name: Option<String>,
    pub payload: OrderPayload,
    pub language: Language,
    pub logical_state: LogicalState,
    pub collected: Collected,
    pub attempts: HashMap<LogicalState, u32>,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub last_interaction_at: DateTime<Utc>,
    pub terminal_at: Option<DateTime<Utc>>,
    pub outcome: Option<Outcome>,
    pub reported: bool,
    /// Set once the first applet fetch has played the greeting; later empty
    /// fetches are gather timeouts, not the initial prompt.
    pub greeted: bool,
    pub last_input: Option<LastInput>,
    pub duration_seconds: Option<u32>,
    pub recording_url: Option<String>,
}

impl CallState {
    pub fn new(
        call_sid: impl Into<String>,
        kind: CallKind,
        language: Language,
        payload: OrderPayload,
        now: DateTime<Utc>,
    ) -> Self {
        let order_id = payload.order_id;
        Self {
            call_sid: call_sid.into(),
            kind,
            order_id,
            vendor_id: None,
            rider_id: None,
            callee_phone: None,
            callee_name: None,
            payload,
            language,
            logical_state: LogicalState::Greeting,
            collected: Collected::default(),
            attempts: HashMap::new(),
            lifecycle: Lifecycle::Initiated,
            created_at: now,
            last_interaction_at: now,
            terminal_at: None,
            outcome: None,
            reported: false,
            greeted: false,
            last_input: None,
            duration_seconds: None,
            recording_url: None,
        }
    }

    /// Seeded from a round-tripped CustomField when a callback arrives for a
    /// call we have no record of (restart, or status racing ahead).
    pub fn from_correlation(
        call_sid: impl Into<String>,
        correlation: &Correlation,
        now: DateTime<Utc>,
    ) -> Self {
        let payload = OrderPayload {
            order_id: correlation.order_id,
            ..OrderPayload::default()
        };
        let mut state = Self::new(call_sid, correlation.kind, correlation.language, payload, now);
        state.vendor_id = correlation.vendor_id.clone();
        state.rider_id = correlation.rider_id.clone();
        state.callee_name = correlation.callee_name.clone();
        state
    }

    pub fn correlation(&self) -> Correlation {
        Correlation {
            kind: self.kind,
            order_id: self.order_id,
            vendor_id: self.vendor_id.clone(),
            rider_id: self.rider_id.clone(),
            callee_name: self.callee_name.clone(),
            language: self.language,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.lifecycle.is_terminal()
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_interaction_at = now;
    }

    pub fn attempts_for(&self, state: LogicalState) -> u32 {
        self.attempts.get(&state).copied().unwrap_or(0)
    }

    pub fn bump_attempts(&mut self, state: LogicalState) -> u32 {
        let count = self.attempts.entry(state).or_insert(0);
        *count += 1;
        *count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collected_slots_are_write_once() {
        let mut collected = Collected::default();
        collected.set_prep_minutes(30);
        collected.set_prep_minutes(45);
        assert_eq!(collected.prep_minutes, Some(30));

        collected.set_accepted(true);
        collected.set_accepted(false);
        assert_eq!(collected.accepted, Some(true));
    }

    #[test]
    fn rejection_reasons_map_menu_digits() {
        assert_eq!(
            RejectionReason::from_digit('2'),
            Some(RejectionReason::TooBusy)
        );
        assert_eq!(RejectionReason::from_digit('9'), None);
    }

    #[test]
    fn correlation_round_trips_through_state() {
        let correlation = Correlation {
            kind: CallKind::VendorOrderConfirmation,
            order_id: 7,
            vendor_id: Some("V9".into()),
            rider_id: None,
            callee_name: None,
            language: Language::Mr,
        };
        let state = CallState::from_correlation("sid1", &correlation, Utc::now());
        assert_eq!(state.correlation(), correlation);
        assert_eq!(state.logical_state, LogicalState::Greeting);
        assert_eq!(state.payload.order_id, 7);
    }

    #[test]
    fn lifecycle_terminality() {
        assert!(Lifecycle::NoAnswer.is_terminal());
        assert!(!Lifecycle::InProgress.is_terminal());
        assert!(LogicalState::GoodbyeRejected.is_terminal());
        assert!(!LogicalState::PrepTimeInquiry.is_terminal());
    }
}
