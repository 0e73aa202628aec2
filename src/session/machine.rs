//! Transition engine for the keypress menus.
//!
//! Pure against the record it is handed: the handler decodes the carrier's
//! request into an [`Event`], the machine mutates the [`CallState`] and says
//! what kind of turn this was. No I/O, no clock reads.

use crate::session::state::{
    CallKind, CallState, LastInput, Lifecycle, LogicalState, Outcome, RejectionReason,
};
use chrono::{DateTime, TimeDelta, Utc};

/// Replays of the same prompt before we give up on the callee.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// A re-delivered digit arrives this close to the transition it duplicates.
/// A human cannot hear the next prompt and answer it that fast.
pub const REDELIVERY_WINDOW_MS: i64 = 2_000;

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// First fetch after the callee answers; composes the current prompt.
    Enter,
    /// A DTMF buffer, quote-stripped by the handler.
    Digit(String),
    /// Empty buffer, or the finish key alone.
    Timeout,
}

/// What happened to the record this turn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Turn {
    /// Entered or advanced into the current state; play its prompt.
    Advanced,
    /// Input absent or unusable; same prompt again, attempt recorded.
    Replayed,
    /// A terminal transition committed with this outcome.
    Terminal(Outcome),
    /// Already-handled input re-delivered; reply unchanged, nothing mutated.
    Duplicate,
}

#[derive(Clone, Copy, Debug)]
pub struct Machine {
    pub max_attempts: u32,
    pub default_prep_minutes: u32,
}

impl Default for Machine {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            default_prep_minutes: 30,
        }
    }
}

impl Machine {
    pub fn new(max_attempts: u32, default_prep_minutes: u32) -> Self {
        Self {
            max_attempts,
            default_prep_minutes,
        }
    }

    /// Commits at most one transition, before any reply is encoded.
    pub fn apply(&self, state: &mut CallState, event: Event, now: DateTime<Utc>) -> Turn {
        if state.is_terminal() || state.logical_state.is_terminal() {
            // Immutable except `reported`; replay the terminal prompt.
            return Turn::Duplicate;
        }

        state.touch(now);
        if matches!(
            state.lifecycle,
            Lifecycle::Initiated | Lifecycle::Ringing | Lifecycle::Answered
        ) {
            state.lifecycle = Lifecycle::InProgress;
        }

        match event {
            Event::Enter => {
                if state.greeted {
                    return Turn::Replayed;
                }
                state.greeted = true;
                Turn::Advanced
            }
            Event::Timeout => self.on_timeout(state, now),
            Event::Digit(raw) => {
                if let Some(LastInput { digit, at }) = &state.last_input {
                    let age = now.signed_duration_since(*at);
                    if *digit == raw
                        && age >= TimeDelta::zero()
                        && age <= TimeDelta::milliseconds(REDELIVERY_WINDOW_MS)
                    {
                        return Turn::Duplicate;
                    }
                }
                state.last_input = Some(LastInput {
                    digit: raw.clone(),
                    at: now,
                });

                let mut chars = raw.chars();
                let digit = match (chars.next(), chars.next()) {
                    (Some(d), None) => d,
                    // multi-digit buffers are ruled out by max_digits=1
                    _ => return self.retry_or_give_up(state, now),
                };

                match state.logical_state {
                    LogicalState::Greeting => self.on_greeting(state, digit, now),
                    LogicalState::PrepTimeInquiry => self.on_prep_time(state, digit, now),
                    LogicalState::RejectionReason => self.on_rejection_reason(state, digit, now),
                    _ => Turn::Duplicate,
                }
            }
        }
    }

    fn on_timeout(&self, state: &mut CallState, now: DateTime<Utc>) -> Turn {
        match state.logical_state {
            LogicalState::Greeting => self.retry_or_give_up(state, now),
            LogicalState::PrepTimeInquiry => {
                state.collected.set_prep_minutes(self.default_prep_minutes);
                commit_terminal(state, LogicalState::GoodbyeAccepted, Outcome::Accepted, now)
            }
            LogicalState::RejectionReason => {
                state.collected.set_reason(RejectionReason::Other);
                commit_terminal(state, LogicalState::GoodbyeRejected, Outcome::Rejected, now)
            }
            _ => Turn::Duplicate,
        }
    }

    fn on_greeting(&self, state: &mut CallState, digit: char, now: DateTime<Utc>) -> Turn {
        match digit {
            '1' => {
                state.collected.set_accepted(true);
                match state.kind {
                    CallKind::VendorOrderConfirmation => {
                        state.logical_state = LogicalState::PrepTimeInquiry;
                        Turn::Advanced
                    }
                    // riders have no prep time to collect
                    CallKind::RiderAssignment => commit_terminal(
                        state,
                        LogicalState::GoodbyeAccepted,
                        Outcome::Accepted,
                        now,
                    ),
                }
            }
            '0' => {
                state.collected.set_accepted(false);
                match state.kind {
                    CallKind::VendorOrderConfirmation => {
                        state.logical_state = LogicalState::RejectionReason;
                        Turn::Advanced
                    }
                    CallKind::RiderAssignment => commit_terminal(
                        state,
                        LogicalState::GoodbyeRejected,
                        Outcome::Rejected,
                        now,
                    ),
                }
            }
            _ => self.retry_or_give_up(state, now),
        }
    }

    fn on_prep_time(&self, state: &mut CallState, digit: char, now: DateTime<Utc>) -> Turn {
        let minutes = match digit {
            '1' => 15,
            '2' => 30,
            '3' => 45,
            _ => return self.retry_or_give_up(state, now),
        };
        state.collected.set_prep_minutes(minutes);
        commit_terminal(state, LogicalState::GoodbyeAccepted, Outcome::Accepted, now)
    }

    fn on_rejection_reason(&self, state: &mut CallState, digit: char, now: DateTime<Utc>) -> Turn {
        match RejectionReason::from_digit(digit) {
            Some(reason) => {
                state.collected.set_reason(reason);
                commit_terminal(state, LogicalState::GoodbyeRejected, Outcome::Rejected, now)
            }
            None => self.retry_or_give_up(state, now),
        }
    }

    /// Per-state retry budget; exhausting it forces the no-response goodbye.
    fn retry_or_give_up(&self, state: &mut CallState, now: DateTime<Utc>) -> Turn {
        let attempts = state.bump_attempts(state.logical_state);
        if attempts >= self.max_attempts {
            commit_terminal(
                state,
                LogicalState::GoodbyeNoResponse,
                Outcome::NoResponse,
                now,
            )
        } else {
            Turn::Replayed
        }
    }
}

fn commit_terminal(
    state: &mut CallState,
    logical: LogicalState,
    outcome: Outcome,
    now: DateTime<Utc>,
) -> Turn {
    state.logical_state = logical;
    state.outcome = Some(outcome);
    state.terminal_at = Some(now);
    Turn::Terminal(outcome)
}
