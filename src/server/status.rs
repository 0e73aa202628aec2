//! Terminal status callbacks from the carrier.
//!
//! Always acknowledged with a 200; the carrier must never be blocked on our
//! bookkeeping. Re-deliveries are no-ops thanks to terminal immutability and
//! the `reported` flag.

use crate::carrier::params::{CarrierCallStatus, StatusCallbackParams};
use crate::correlation::Correlation;
use crate::server::AppState;
use crate::session::state::{CallState, Lifecycle, Outcome};
use axum::extract::State;
use axum::http::{HeaderMap, Uri};
use axum::{Form, Json};
use chrono::Utc;
use serde_json::json;

pub async fn handle(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    params: Option<Form<StatusCallbackParams>>,
) -> Json<serde_json::Value> {
    let params = params.map(|Form(p)| p).unwrap_or_default();

    if let Err(error) = state.verifier.verify_status(&uri, &headers, &params) {
        tracing::warn!(%error, "status callback failed signature validation");
        return Json(json!({"ok": true}));
    }

    reconcile(&state, params).await;
    Json(json!({"ok": true}))
}

async fn reconcile(state: &AppState, params: StatusCallbackParams) {
    let call_sid = params
        .call_sid
        .as_deref()
        .map(str::trim)
        .filter(|sid| !sid.is_empty());
    let Some(call_sid) = call_sid else {
        tracing::warn!("status callback without CallSid");
        return;
    };

    let correlation = params
        .custom_field
        .as_deref()
        .and_then(Correlation::decode);

    let entry = match state.store.get(call_sid) {
        Some(entry) => entry,
        None => match &correlation {
            // Answered-then-hung-up edge: the status can be the first and
            // only thing we ever hear about this call.
            Some(correlation) => {
                tracing::info!(%call_sid, "synthesizing session from status callback");
                state
                    .store
                    .get_or_create(call_sid, || {
                        CallState::from_correlation(call_sid, correlation, Utc::now())
                    })
                    .0
            }
            None => {
                tracing::warn!(%call_sid, "status for unknown call without CustomField");
                return;
            }
        },
    };

    let now = Utc::now();
    let mut record = entry.lock().await;

    if record.is_terminal() {
        if !record.reported {
            state.reporter.enqueue(call_sid);
        }
        return;
    }

    let Some(status) = params.call_status() else {
        tracing::warn!(%call_sid, status = ?params.status, "unrecognized carrier status ignored");
        return;
    };

    record.touch(now);
    match status {
        CarrierCallStatus::Queued => {
            record.lifecycle = Lifecycle::Initiated;
            return;
        }
        CarrierCallStatus::Ringing => {
            record.lifecycle = Lifecycle::Ringing;
            return;
        }
        CarrierCallStatus::InProgress => {
            record.lifecycle = Lifecycle::InProgress;
            return;
        }
        CarrierCallStatus::Completed => {
            record.lifecycle = Lifecycle::Completed;
            if record.outcome.is_none() {
                record.outcome = Some(Outcome::NoResponse);
            }
        }
        CarrierCallStatus::Busy => {
            record.lifecycle = Lifecycle::Busy;
            record.outcome = Some(Outcome::NoResponse);
        }
        CarrierCallStatus::NoAnswer => {
            record.lifecycle = Lifecycle::NoAnswer;
            record.outcome = Some(Outcome::NoResponse);
        }
        CarrierCallStatus::Failed => {
            record.lifecycle = Lifecycle::Failed;
            if record.outcome.is_none() {
                record.outcome = Some(Outcome::NoResponse);
            }
        }
        CarrierCallStatus::Canceled => {
            record.lifecycle = Lifecycle::Cancelled;
            if record.outcome.is_none() {
                record.outcome = Some(Outcome::NoResponse);
            }
        }
    }

    if record.terminal_at.is_none() {
        record.terminal_at = Some(now);
    }
    if let Some(duration) = params.duration_seconds() {
        record.duration_seconds = Some(duration);
    }
    if let Some(url) = params.recording_url.as_deref() {
        record.recording_url = Some(url.to_string());
    }

    tracing::info!(
        %call_sid,
        lifecycle = %record.lifecycle,
        outcome = ?record.outcome,
        "status reconciled"
    );
    drop(record);

    state.reporter.enqueue(call_sid);
}
