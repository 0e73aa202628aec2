//! Delivers terminal outcomes to the upstream brain.
//!
//! Handlers only enqueue a CallSid; a dispatcher task fans deliveries out to
//! bounded worker tasks so nothing upstream-shaped ever runs on the carrier
//! request path. At-least-once: the upstream dedupes on the idempotency
//! header, we stop on the `reported` flag.

use crate::session::state::{
    CallKind, CallState, Collected, Language, Lifecycle, Outcome,
};
use crate::session::store::SessionStore;
use crate::Result;
use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};

const RETRY_SCHEDULE: [Duration; 6] = [
    Duration::ZERO,
    Duration::from_secs(2),
    Duration::from_secs(8),
    Duration::from_secs(30),
    Duration::from_secs(120),
    Duration::from_secs(600),
];
/// Give up on a delivery cycle after roughly half an hour.
const MAX_ELAPSED: Duration = Duration::from_secs(30 * 60);
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_CONCURRENT_DELIVERIES: usize = 8;
const IDEMPOTENCY_HEADER: &str = "X-Idempotency-Key";

#[derive(Clone)]
pub struct ReporterHandle {
    tx: mpsc::UnboundedSender<String>,
}

impl ReporterHandle {
    pub fn enqueue(&self, call_sid: impl Into<String>) {
        let call_sid = call_sid.into();
        if self.tx.send(call_sid.clone()).is_err() {
            tracing::error!(%call_sid, "reporter queue closed, outcome dropped");
        }
    }
}

/// The sender half plus its queue; `spawn` consumes the queue, tests keep it
/// to observe what the handlers enqueue.
pub fn channel() -> (ReporterHandle, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ReporterHandle { tx }, rx)
}

/// Stable body the brain receives for every terminal call.
#[derive(Clone, Debug, Serialize)]
pub struct OutcomeReport {
    pub call_sid: String,
    pub kind: CallKind,
    pub order_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rider_id: Option<String>,
    pub outcome: Outcome,
    pub collected: Collected,
    pub lifecycle: Lifecycle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
    pub language: Language,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_at: Option<DateTime<Utc>>,
}

impl OutcomeReport {
    pub fn from_state(state: &CallState) -> Self {
        Self {
            call_sid: state.call_sid.clone(),
            kind: state.kind,
            order_id: state.order_id,
            vendor_id: state.vendor_id.clone(),
            rider_id: state.rider_id.clone(),
            outcome: state.outcome.unwrap_or(Outcome::NoResponse),
            collected: state.collected.clone(),
            lifecycle: state.lifecycle,
            duration_seconds: state.duration_seconds,
            recording_url: state.recording_url.clone(),
            language: state.language,
            started_at: state.created_at,
            terminal_at: state.terminal_at,
        }
    }
}

#[derive(Debug, PartialEq)]
enum Delivery {
    Delivered,
    NonRetryable(StatusCode),
    Retryable(String),
}

fn classify(status: StatusCode) -> Delivery {
    if status.is_success() {
        return Delivery::Delivered;
    }
    if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS {
        return Delivery::Retryable(status.to_string());
    }
    if status.is_client_error() {
        return Delivery::NonRetryable(status);
    }
    Delivery::Retryable(status.to_string())
}

/// Starts the dispatcher and returns the handle the handlers enqueue on.
pub fn spawn(store: Arc<SessionStore>, upstream_url: String) -> Result<ReporterHandle> {
    let client = reqwest::Client::builder().timeout(ATTEMPT_TIMEOUT).build()?;
    let (handle, mut rx) = channel();
    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_DELIVERIES));

    tokio::spawn(async move {
        while let Some(call_sid) = rx.recv().await {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let store = Arc::clone(&store);
            let client = client.clone();
            let url = upstream_url.clone();
            tokio::spawn(async move {
                let _permit = permit;
                deliver(store, client, url, call_sid).await;
            });
        }
    });

    Ok(handle)
}

async fn deliver(
    store: Arc<SessionStore>,
    client: reqwest::Client,
    upstream_url: String,
    call_sid: String,
) {
    let Some(entry) = store.get(&call_sid) else {
        tracing::warn!(%call_sid, "outcome requested for evicted session");
        return;
    };

    // Snapshot once; retries re-send the identical payload.
    let report = {
        let state = entry.lock().await;
        if state.reported {
            return;
        }
        OutcomeReport::from_state(&state)
    };

    let started = Instant::now();
    let mut attempt = 0usize;
    loop {
        let delay = RETRY_SCHEDULE
            .get(attempt)
            .copied()
            .unwrap_or_else(|| RETRY_SCHEDULE[RETRY_SCHEDULE.len() - 1]);
        if !delay.is_zero() {
            tokio::time::sleep(jittered(delay)).await;
        }
        if started.elapsed() >= MAX_ELAPSED {
            tracing::error!(%call_sid, "outcome delivery abandoned after retry budget");
            return;
        }

        let outcome = match client
            .post(&upstream_url)
            .header(IDEMPOTENCY_HEADER, &report.call_sid)
            .json(&report)
            .send()
            .await
        {
            Ok(resp) => classify(resp.status()),
            Err(error) => Delivery::Retryable(error.to_string()),
        };

        match outcome {
            Delivery::Delivered => {
                entry.lock().await.reported = true;
                tracing::info!(%call_sid, outcome = %report.outcome, "outcome delivered upstream");
                return;
            }
            Delivery::NonRetryable(status) => {
                // Retrying a rejected payload only repeats the rejection;
                // settle the flag and surface via logs/alerting.
                entry.lock().await.reported = true;
                tracing::error!(%call_sid, %status, "upstream rejected outcome permanently");
                return;
            }
            Delivery::Retryable(reason) => {
                attempt += 1;
                tracing::warn!(%call_sid, attempt, %reason, "outcome delivery failed, will retry");
            }
        }
    }
}

fn jittered(delay: Duration) -> Duration {
    let factor = rand::rng().random_range(0.8..1.2);
    delay.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::state::{Language, OrderPayload};

    #[test]
    fn status_classification_matches_the_contract() {
        assert_eq!(classify(StatusCode::OK), Delivery::Delivered);
        assert_eq!(classify(StatusCode::ACCEPTED), Delivery::Delivered);
        assert_eq!(
            classify(StatusCode::BAD_REQUEST),
            Delivery::NonRetryable(StatusCode::BAD_REQUEST)
        );
        assert!(matches!(
            classify(StatusCode::REQUEST_TIMEOUT),
            Delivery::Retryable(_)
        ));
        assert!(matches!(
            classify(StatusCode::TOO_MANY_REQUESTS),
            Delivery::Retryable(_)
        ));
        assert!(matches!(
            classify(StatusCode::INTERNAL_SERVER_ERROR),
            Delivery::Retryable(_)
        ));
        assert!(matches!(
            classify(StatusCode::BAD_GATEWAY),
            Delivery::Retryable(_)
        ));
    }

    #[test]
    fn report_snapshots_the_record() {
        let mut state = CallState::new(
            "sid9",
            CallKind::VendorOrderConfirmation,
            Language::En,
            OrderPayload {
                order_id: 9,
                ..OrderPayload::default()
            },
            Utc::now(),
        );
        state.vendor_id = Some("V9".into());
        state.collected.set_accepted(true);
        state.collected.set_prep_minutes(30);
        state.outcome = Some(Outcome::Accepted);
        state.lifecycle = Lifecycle::Completed;
        state.duration_seconds = Some(35);

        let report = OutcomeReport::from_state(&state);
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["call_sid"], "sid9");
        assert_eq!(value["kind"], "vendor-order-confirmation");
        assert_eq!(value["outcome"], "accepted");
        assert_eq!(value["collected"]["prep_minutes"], 30);
        assert_eq!(value["duration_seconds"], 35);
        assert_eq!(value["lifecycle"], "completed");
        assert!(value.get("recording_url").is_none());
    }

    #[test]
    fn missing_outcome_falls_back_to_no_response() {
        let state = CallState::new(
            "sid10",
            CallKind::RiderAssignment,
            Language::Hi,
            OrderPayload::default(),
            Utc::now(),
        );
        let report = OutcomeReport::from_state(&state);
        assert_eq!(report.outcome, Outcome::NoResponse);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let base = Duration::from_secs(10);
        for _ in 0..100 {
            let d = jittered(base);
            assert!(d >= Duration::from_secs(8) && d <= Duration::from_secs(12));
        }
    }
}
