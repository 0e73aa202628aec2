//! The per-turn applet fetch.
//!
//! The carrier interprets any non-2xx as "hang up immediately", so every
//! path out of here is a 200 carrying a playable reply in the configured
//! dialect: the real next prompt when things work, a retry or apology prompt
//! when they do not.

use crate::carrier::params::CallbackParams;
use crate::correlation::{strip_quote_wrap, Correlation};
use crate::encoder::{self, EncodedReply};
use crate::prompt::{locale, Prompt};
use crate::server::AppState;
use crate::session::machine::{Event, Turn};
use crate::session::state::{CallState, Language};
use crate::session::store::SessionLookup;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::Form;
use chrono::Utc;
use std::time::Duration;

/// Soft budget inside the carrier's 5s fetch timeout.
const HANDLER_BUDGET: Duration = Duration::from_secs(4);
/// A contended session lock is answered with a retry prompt, not a queue.
const LOCK_WAIT: Duration = Duration::from_millis(500);

pub async fn handle_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    params: Option<Query<CallbackParams>>,
) -> Response {
    let params = params.map(|Query(p)| p).unwrap_or_default();
    respond(state, params, headers, uri, Method::GET).await
}

pub async fn handle_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    params: Option<Form<CallbackParams>>,
) -> Response {
    let params = params.map(|Form(p)| p).unwrap_or_default();
    respond(state, params, headers, uri, Method::POST).await
}

async fn respond(
    state: AppState,
    params: CallbackParams,
    headers: HeaderMap,
    uri: Uri,
    method: Method,
) -> Response {
    let correlation = params
        .custom_field
        .as_deref()
        .and_then(Correlation::decode);
    let language = correlation
        .as_ref()
        .map(|c| c.language)
        .unwrap_or(state.default_language);

    if let Err(error) = state
        .verifier
        .verify_callback(&method, &uri, &headers, &params)
    {
        tracing::warn!(%error, "callback failed signature validation");
        let apology = state.composer.apology(language);
        return into_response(encode_or_last_resort(&state, &apology));
    }

    let reply = match tokio::time::timeout(
        HANDLER_BUDGET,
        handle_turn(&state, params, correlation, language),
    )
    .await
    {
        Ok(reply) => reply,
        Err(_) => {
            tracing::warn!("callback handler exceeded its budget");
            encode_or_last_resort(&state, &state.composer.retry_shortly(language))
        }
    };
    into_response(reply)
}

async fn handle_turn(
    state: &AppState,
    params: CallbackParams,
    correlation: Option<Correlation>,
    language: Language,
) -> EncodedReply {
    let call_sid = params
        .call_sid
        .as_deref()
        .map(str::trim)
        .filter(|sid| !sid.is_empty());
    let Some(call_sid) = call_sid else {
        tracing::warn!("applet fetch without CallSid");
        return encode_or_last_resort(state, &state.composer.apology(language));
    };

    let lookup = match state.store.get(call_sid) {
        Some(entry) => SessionLookup::Found(entry),
        None => match &correlation {
            Some(correlation) => {
                let (entry, created) = state.store.get_or_create(call_sid, || {
                    CallState::from_correlation(call_sid, correlation, Utc::now())
                });
                if created {
                    tracing::info!(%call_sid, "session rebuilt from CustomField");
                }
                SessionLookup::Created(entry)
            }
            None => SessionLookup::Absent,
        },
    };

    let entry = match lookup {
        SessionLookup::Found(entry) | SessionLookup::Created(entry) => entry,
        SessionLookup::Absent => {
            tracing::warn!(%call_sid, "callback for unknown call without CustomField");
            let prompt = Prompt::terminal(locale::unknown_call(language), language.voice_hint());
            return encode_or_last_resort(state, &prompt);
        }
    };

    let mut record = match tokio::time::timeout(LOCK_WAIT, entry.lock()).await {
        Ok(record) => record,
        Err(_) => {
            tracing::warn!(%call_sid, "session lock contended, deferring turn");
            return encode_or_last_resort(state, &state.composer.retry_shortly(language));
        }
    };

    let event = decode_event(&record, params.digits.as_deref());
    let turn = state.machine.apply(&mut record, event, Utc::now());
    if let Turn::Terminal(outcome) = turn {
        tracing::info!(%call_sid, %outcome, "call reached a terminal state");
    }

    let prompt = state.composer.compose(&record);
    drop(record);
    encode_or_last_resort(state, &prompt)
}

fn decode_event(record: &CallState, digits: Option<&str>) -> Event {
    let digits = digits.map(|raw| strip_quote_wrap(raw.trim())).unwrap_or("");
    if digits.is_empty() {
        if record.greeted {
            Event::Timeout
        } else {
            Event::Enter
        }
    } else if digits == "#" {
        // finish key with an empty buffer
        Event::Timeout
    } else {
        Event::Digit(digits.to_string())
    }
}

fn encode_or_last_resort(state: &AppState, prompt: &Prompt) -> EncodedReply {
    match encoder::encode(state.dialect, prompt, &state.callback_url) {
        Ok(reply) => reply,
        Err(error) => {
            tracing::error!(%error, "prompt failed to encode");
            last_resort(state)
        }
    }
}

fn last_resort(state: &AppState) -> EncodedReply {
    match state.dialect {
        encoder::Dialect::Xml => EncodedReply {
            body: concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<Response><Say>Sorry, please try again later.</Say><Hangup /></Response>"#
            )
            .to_string(),
            content_type: "application/xml",
        },
        encoder::Dialect::Json => EncodedReply {
            body: concat!(
                r#"{"gather_prompt":{"text":"Sorry, please try again later."},"#,
                r#""voice":"en-IN","max_input_digits":0,"finish_on_key":"","input_timeout":1}"#
            )
            .to_string(),
            content_type: "application/json",
        },
    }
}

fn into_response(reply: EncodedReply) -> Response {
    ([(header::CONTENT_TYPE, reply.content_type)], reply.body).into_response()
}
