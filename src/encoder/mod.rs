//! Serializes a [`Prompt`](crate::prompt::Prompt) into whichever reply
//! dialect the deployed applet expects. The composer never branches on the
//! dialect; these two emitters are the only code that knows it exists.

pub mod exoml;
pub mod gather;

use crate::prompt::Prompt;
use crate::Result;
use serde::Deserialize;
use strum::Display;

/// Deployment-time choice matching how the carrier-side applet is
/// configured.
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Dialect {
    Xml,
    Json,
}

/// Spoken in place of empty text so every reply stays playable.
pub(crate) const EMPTY_TEXT_FILLER: &str = "Thank you.";

#[derive(Clone, Debug)]
pub struct EncodedReply {
    pub body: String,
    pub content_type: &'static str,
}

/// Total over every prompt the composer can emit.
pub fn encode(dialect: Dialect, prompt: &Prompt, action_url: &str) -> Result<EncodedReply> {
    match dialect {
        Dialect::Xml => Ok(EncodedReply {
            body: exoml::encode(prompt, action_url)?,
            content_type: "application/xml",
        }),
        Dialect::Json => Ok(EncodedReply {
            body: gather::encode(prompt)?,
            content_type: "application/json",
        }),
    }
}

pub(crate) fn speakable_text(text: &str) -> &str {
    if text.trim().is_empty() {
        EMPTY_TEXT_FILLER
    } else {
        text
    }
}
