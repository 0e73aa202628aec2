//! The passthrough-applet XML dialect.
//!
//! One gather op per prompt with input, zero without. The closing
//! `</Response>` tag must always be emitted; the carrier hangs up on a
//! truncated document.

use crate::encoder::speakable_text;
use crate::prompt::Prompt;
use crate::Result;
use xml::writer::{EventWriter, XmlEvent};

pub fn encode(prompt: &Prompt, action_url: &str) -> Result<String> {
    let w = Vec::new();
    let mut writer = EventWriter::new(w);

    writer.write(XmlEvent::start_element("Response"))?;

    match &prompt.input {
        Some(input) => {
            let num_digits = input.max_digits.to_string();
            let timeout = input.timeout_seconds.to_string();
            writer.write(
                XmlEvent::start_element("Gather")
                    .attr("action", action_url)
                    .attr("numDigits", &num_digits)
                    .attr("finishOnKey", &input.finish_on_key)
                    .attr("timeout", &timeout),
            )?;
            write_media(&mut writer, prompt)?;
            writer.write(XmlEvent::end_element().name("Gather"))?;

            // Played when the gather times out, before the carrier
            // re-fetches the action URL.
            if let Some(repeat) = &prompt.repeat_prompt {
                write_media(&mut writer, repeat)?;
            }
        }
        None => {
            write_media(&mut writer, prompt)?;
            writer.write(XmlEvent::start_element("Hangup"))?;
            writer.write(XmlEvent::end_element().name("Hangup"))?;
        }
    }

    writer.write(XmlEvent::end_element().name("Response"))?;

    let buffer = writer.into_inner();
    Ok(String::from_utf8(buffer)?)
}

fn write_media(writer: &mut EventWriter<Vec<u8>>, prompt: &Prompt) -> Result<()> {
    match &prompt.audio_url {
        Some(url) => {
            writer.write(XmlEvent::start_element("Play"))?;
            writer.write(XmlEvent::characters(url))?;
            writer.write(XmlEvent::end_element().name("Play"))?;
        }
        None => {
            writer.write(XmlEvent::start_element("Say").attr("voice", &prompt.voice_hint))?;
            writer.write(XmlEvent::characters(speakable_text(&prompt.text)))?;
            writer.write(XmlEvent::end_element().name("Say"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::InputSpec;
    use xml::reader::{EventReader, XmlEvent as ReaderEvent};

    fn menu_input() -> InputSpec {
        InputSpec {
            max_digits: 1,
            finish_on_key: "#".into(),
            timeout_seconds: 10,
        }
    }

    #[test]
    fn gather_turn_is_constructing() {
        let want = r##"<?xml version="1.0" encoding="UTF-8"?><Response><Gather action="https://voice.example/callback" numDigits="1" finishOnKey="#" timeout="10"><Say voice="en-IN">Press 1 to accept.</Say></Gather><Say voice="en-IN">Please try again.</Say></Response>"##;

        let prompt = Prompt::gather("Press 1 to accept.", "en-IN", menu_input())
            .with_repeat(Prompt::terminal("Please try again.", "en-IN"));
        let got = encode(&prompt, "https://voice.example/callback").unwrap();

        assert_eq!(got, want);
    }

    #[test]
    fn terminal_turn_says_and_hangs_up() {
        let want = r#"<?xml version="1.0" encoding="UTF-8"?><Response><Say voice="hi-IN">धन्यवाद।</Say><Hangup /></Response>"#;

        let prompt = Prompt::terminal("धन्यवाद।", "hi-IN");
        let got = encode(&prompt, "https://voice.example/callback").unwrap();

        assert_eq!(got, want);
        assert!(got.ends_with("</Response>"));
    }

    #[test]
    fn audio_url_wins_over_text() {
        let prompt = Prompt::gather("fallback text", "en-IN", menu_input())
            .with_audio("https://cdn.example/greeting-hi.mp3");
        let got = encode(&prompt, "https://voice.example/callback").unwrap();

        assert!(got.contains("<Play>https://cdn.example/greeting-hi.mp3</Play>"));
        assert!(!got.contains("fallback text"));
    }

    #[test]
    fn text_is_xml_escaped() {
        let prompt = Prompt::terminal("Chai & Snacks <fresh>", "en-IN");
        let got = encode(&prompt, "https://voice.example/callback").unwrap();

        assert!(got.contains("Chai &amp; Snacks &lt;fresh"));
        assert!(!got.contains("<fresh>"));
    }

    // Round-trip shape check: exactly one Gather when input is present,
    // none when absent, and the document parses to the end.
    #[test]
    fn output_parses_in_its_own_dialect() {
        let cases = [
            (
                Prompt::gather("Press 1", "en-IN", menu_input())
                    .with_repeat(Prompt::terminal("Again", "en-IN")),
                1,
            ),
            (Prompt::terminal("Bye", "en-IN"), 0),
        ];

        for (prompt, want_gathers) in cases {
            let body = encode(&prompt, "https://voice.example/callback").unwrap();
            let mut gathers = 0;
            let mut closed_response = false;
            for event in EventReader::from_str(&body) {
                match event.unwrap() {
                    ReaderEvent::StartElement { name, .. } if name.local_name == "Gather" => {
                        gathers += 1;
                    }
                    ReaderEvent::EndElement { name } if name.local_name == "Response" => {
                        closed_response = true;
                    }
                    _ => {}
                }
            }
            assert_eq!(gathers, want_gathers);
            assert!(closed_response);
        }
    }
}
