//! The programmable-gather JSON dialect.
//!
//! Terminal replies are flagged by `max_input_digits == 0` together with
//! `input_timeout == 1`; there is no explicit hangup op in this dialect.

use crate::encoder::speakable_text;
use crate::prompt::Prompt;
use crate::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GatherPrompt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

impl GatherPrompt {
    fn from_prompt(prompt: &Prompt) -> Self {
        match &prompt.audio_url {
            Some(url) => Self {
                text: None,
                audio_url: Some(url.clone()),
            },
            None => Self {
                text: Some(speakable_text(&prompt.text).to_string()),
                audio_url: None,
            },
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GatherResponse {
    pub gather_prompt: GatherPrompt,
    pub voice: String,
    pub max_input_digits: u32,
    pub finish_on_key: String,
    pub input_timeout: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_menu: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_gather_prompt: Option<GatherPrompt>,
}

impl GatherResponse {
    pub fn from_prompt(prompt: &Prompt) -> Self {
        match &prompt.input {
            Some(input) => Self {
                gather_prompt: GatherPrompt::from_prompt(prompt),
                voice: prompt.voice_hint.clone(),
                max_input_digits: input.max_digits,
                finish_on_key: input.finish_on_key.clone(),
                input_timeout: input.timeout_seconds,
                repeat_menu: prompt.repeat_prompt.as_ref().map(|_| 1),
                repeat_gather_prompt: prompt
                    .repeat_prompt
                    .as_ref()
                    .map(|repeat| GatherPrompt::from_prompt(repeat)),
            },
            None => Self {
                gather_prompt: GatherPrompt::from_prompt(prompt),
                voice: prompt.voice_hint.clone(),
                max_input_digits: 0,
                finish_on_key: String::new(),
                input_timeout: 1,
                repeat_menu: None,
                repeat_gather_prompt: None,
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.max_input_digits == 0
    }
}

pub fn encode(prompt: &Prompt) -> Result<String> {
    Ok(serde_json::to_string(&GatherResponse::from_prompt(prompt))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::InputSpec;

    fn menu_input() -> InputSpec {
        InputSpec {
            max_digits: 1,
            finish_on_key: "#".into(),
            timeout_seconds: 10,
        }
    }

    #[test]
    fn gather_turn_carries_constraints_and_repeat() {
        let prompt = Prompt::gather("Press 1 to accept.", "hi-IN", menu_input())
            .with_repeat(Prompt::terminal("Please try again.", "hi-IN"));
        let value: serde_json::Value = serde_json::from_str(&encode(&prompt).unwrap()).unwrap();

        assert_eq!(value["gather_prompt"]["text"], "Press 1 to accept.");
        assert_eq!(value["voice"], "hi-IN");
        assert_eq!(value["max_input_digits"], 1);
        assert_eq!(value["finish_on_key"], "#");
        assert_eq!(value["input_timeout"], 10);
        assert_eq!(value["repeat_menu"], 1);
        assert_eq!(value["repeat_gather_prompt"]["text"], "Please try again.");
    }

    #[test]
    fn terminal_turn_sets_the_sentinel_pair() {
        let prompt = Prompt::terminal("Goodbye.", "en-IN");
        let value: serde_json::Value = serde_json::from_str(&encode(&prompt).unwrap()).unwrap();

        assert_eq!(value["max_input_digits"], 0);
        assert_eq!(value["input_timeout"], 1);
        assert!(value.get("repeat_menu").is_none());
    }

    #[test]
    fn audio_url_replaces_text() {
        let prompt = Prompt::gather("fallback", "en-IN", menu_input())
            .with_audio("https://cdn.example/menu.mp3");
        let value: serde_json::Value = serde_json::from_str(&encode(&prompt).unwrap()).unwrap();

        assert_eq!(
            value["gather_prompt"]["audio_url"],
            "https://cdn.example/menu.mp3"
        );
        assert!(value["gather_prompt"].get("text").is_none());
    }

    #[test]
    fn output_round_trips_to_the_same_shape() {
        for prompt in [
            Prompt::gather("Press 1", "en-IN", menu_input()),
            Prompt::terminal("Bye", "en-IN"),
        ] {
            let encoded = encode(&prompt).unwrap();
            let parsed: GatherResponse = serde_json::from_str(&encoded).unwrap();
            assert_eq!(parsed, GatherResponse::from_prompt(&prompt));
            assert_eq!(parsed.is_terminal(), prompt.is_terminal());
        }
    }
}
