//! Stateless mapping from a call's logical position to the next prompt.

use crate::prompt::{locale, InputSpec, Prompt};
use crate::session::state::{CallKind, CallState, Language, LogicalState};

const GREETING_TIMEOUT_SECS: u32 = 10;
const PREP_TIME_TIMEOUT_SECS: u32 = 15;
const REJECTION_TIMEOUT_SECS: u32 = 10;
const FINISH_KEY: &str = "#";

#[derive(Clone, Copy, Debug)]
pub struct Composer {
    pub default_prep_minutes: u32,
}

impl Composer {
    pub fn new(default_prep_minutes: u32) -> Self {
        Self {
            default_prep_minutes,
        }
    }

    /// Pure over `(logical_state, language, payload, collected, attempts)`.
    pub fn compose(&self, state: &CallState) -> Prompt {
        let language = state.language;
        let voice = language.voice_hint();

        match state.logical_state {
            LogicalState::Greeting => {
                let greeting = match state.kind {
                    CallKind::VendorOrderConfirmation => {
                        let items = locale::items_summary(language, &state.payload.order_items);
                        locale::vendor_greeting(
                            language,
                            state.callee_name.as_deref(),
                            state.payload.order_id,
                            state.payload.order_amount,
                            items.as_deref(),
                        )
                    }
                    CallKind::RiderAssignment => locale::rider_greeting(
                        language,
                        state.callee_name.as_deref(),
                        state.payload.order_id,
                    ),
                };
                let text = self.with_retry_preamble(state, greeting);
                Prompt::gather(text, voice, menu_input(GREETING_TIMEOUT_SECS))
                    .with_repeat(Prompt::terminal(locale::no_input_retry(language), voice))
            }
            LogicalState::PrepTimeInquiry => {
                let text = self.with_retry_preamble(state, locale::prep_time_menu(language));
                Prompt::gather(text, voice, menu_input(PREP_TIME_TIMEOUT_SECS))
                    .with_repeat(Prompt::terminal(locale::no_input_retry(language), voice))
            }
            LogicalState::RejectionReason => {
                let text = self.with_retry_preamble(state, locale::rejection_menu(language));
                Prompt::gather(text, voice, menu_input(REJECTION_TIMEOUT_SECS))
                    .with_repeat(Prompt::terminal(locale::no_input_retry(language), voice))
            }
            LogicalState::GoodbyeAccepted => {
                let text = match state.kind {
                    CallKind::VendorOrderConfirmation => locale::goodbye_accepted(
                        language,
                        state
                            .collected
                            .prep_minutes
                            .unwrap_or(self.default_prep_minutes),
                    ),
                    CallKind::RiderAssignment => locale::goodbye_rider_accepted(language),
                };
                Prompt::terminal(text, voice)
            }
            LogicalState::GoodbyeRejected => {
                Prompt::terminal(locale::goodbye_rejected(language), voice)
            }
            LogicalState::GoodbyeNoResponse => {
                Prompt::terminal(locale::goodbye_no_response(language), voice)
            }
        }
    }

    /// Short localized apology, played before hanging up when composing or
    /// encoding the real reply failed.
    pub fn apology(&self, language: Language) -> Prompt {
        Prompt::terminal(locale::apology(language), language.voice_hint())
    }

    /// Keeps the call alive when the session lock could not be taken in
    /// time: a short gather so the carrier fetches us again.
    pub fn retry_shortly(&self, language: Language) -> Prompt {
        Prompt::gather(
            locale::retry_shortly(language),
            language.voice_hint(),
            InputSpec {
                max_digits: 1,
                finish_on_key: FINISH_KEY.to_string(),
                timeout_seconds: 5,
            },
        )
    }

    fn with_retry_preamble(&self, state: &CallState, menu: String) -> String {
        if state.attempts_for(state.logical_state) > 0 {
            format!("{} {}", locale::no_input_retry(state.language), menu)
        } else {
            menu
        }
    }
}

fn menu_input(timeout_seconds: u32) -> InputSpec {
    InputSpec {
        max_digits: 1,
        finish_on_key: FINISH_KEY.to_string(),
        timeout_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::state::{Language, OrderItem, OrderPayload};
    use chrono::Utc;

    fn vendor_call(language: Language) -> CallState {
        let mut state = CallState::new(
            "sid1",
            CallKind::VendorOrderConfirmation,
            language,
            OrderPayload {
                order_id: 12345,
                order_amount: Some(550.0),
                order_items: vec![
                    OrderItem {
                        name: "Paneer Tikka".into(),
                        quantity: 2,
                    },
                    OrderItem {
                        name: "Dal Makhani".into(),
                        quantity: 1,
                    },
                ],
            },
            Utc::now(),
        );
        state.callee_name = Some("Sharma Snacks".into());
        state
    }

    #[test]
    fn greeting_gathers_one_digit_with_ten_second_timeout() {
        let composer = Composer::new(30);
        let prompt = composer.compose(&vendor_call(Language::En));

        let input = prompt.input.expect("greeting must gather");
        assert_eq!(input.max_digits, 1);
        assert_eq!(input.timeout_seconds, 10);
        assert!(prompt.text.contains("Mangwale"));
        assert!(prompt.text.contains("1 2 3 4 5"));
        assert!(prompt.repeat_prompt.is_some());
        assert_eq!(prompt.voice_hint, "en-IN");
    }

    #[test]
    fn retry_attempt_prefixes_the_menu() {
        let composer = Composer::new(30);
        let mut state = vendor_call(Language::En);
        state.bump_attempts(LogicalState::Greeting);

        let prompt = composer.compose(&state);
        assert!(prompt.text.starts_with("Sorry, I did not catch that."));
        assert!(prompt.text.contains("Press 1"));
    }

    #[test]
    fn goodbye_accepted_names_the_collected_prep_time() {
        let composer = Composer::new(30);
        let mut state = vendor_call(Language::En);
        state.logical_state = LogicalState::GoodbyeAccepted;
        state.collected.set_prep_minutes(45);

        let prompt = composer.compose(&state);
        assert!(prompt.is_terminal());
        assert!(prompt.text.contains("45"));
    }

    #[test]
    fn goodbye_accepted_falls_back_to_the_default() {
        let composer = Composer::new(30);
        let mut state = vendor_call(Language::Hi);
        state.logical_state = LogicalState::GoodbyeAccepted;

        let prompt = composer.compose(&state);
        assert!(prompt.text.contains("30"));
        assert_eq!(prompt.voice_hint, "hi-IN");
    }

    #[test]
    fn every_language_composes_every_state() {
        let composer = Composer::new(30);
        for language in [Language::Hi, Language::En, Language::Mr] {
            for logical in [
                LogicalState::Greeting,
                LogicalState::PrepTimeInquiry,
                LogicalState::RejectionReason,
                LogicalState::GoodbyeAccepted,
                LogicalState::GoodbyeRejected,
                LogicalState::GoodbyeNoResponse,
            ] {
                let mut state = vendor_call(language);
                state.logical_state = logical;
                let prompt = composer.compose(&state);
                assert!(!prompt.text.is_empty());
                assert_eq!(prompt.is_terminal(), logical.is_terminal());
            }
        }
    }

    #[test]
    fn rider_greeting_offers_accept_and_decline() {
        let composer = Composer::new(30);
        let mut state = vendor_call(Language::En);
        state.kind = CallKind::RiderAssignment;

        let prompt = composer.compose(&state);
        assert!(prompt.text.contains("delivery"));
        assert!(prompt.input.is_some());
    }
}
