pub mod composer;
pub mod locale;

/// The composer's output: what to play, what to collect, and how to retry.
/// Absence of `input` means play-and-hangup.
#[derive(Clone, Debug, PartialEq)]
pub struct Prompt {
    pub text: String,
    pub audio_url: Option<String>,
    pub input: Option<InputSpec>,
    pub voice_hint: String,
    pub repeat_prompt: Option<Box<Prompt>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InputSpec {
    pub max_digits: u32,
    pub finish_on_key: String,
    pub timeout_seconds: u32,
}

impl Prompt {
    pub fn terminal(text: impl Into<String>, voice_hint: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            audio_url: None,
            input: None,
            voice_hint: voice_hint.into(),
            repeat_prompt: None,
        }
    }

    pub fn gather(
        text: impl Into<String>,
        voice_hint: impl Into<String>,
        input: InputSpec,
    ) -> Self {
        Self {
            text: text.into(),
            audio_url: None,
            input: Some(input),
            voice_hint: voice_hint.into(),
            repeat_prompt: None,
        }
    }

    pub fn with_repeat(mut self, repeat: Prompt) -> Self {
        self.repeat_prompt = Some(Box::new(repeat));
        self
    }

    pub fn with_audio(mut self, url: impl Into<String>) -> Self {
        self.audio_url = Some(url.into());
        self
    }

    /// Terminal prompts instruct the carrier to play and hang up.
    pub fn is_terminal(&self) -> bool {
        self.input.is_none()
    }
}
