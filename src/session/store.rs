//! Concurrency-safe home of every outstanding call record.
//!
//! The registry itself is a plain sync map held only for lookups and
//! insertions; each record sits behind its own async mutex so writes to one
//! CallSid serialize while unrelated calls proceed in parallel. Nothing
//! outside this module touches the map.

use crate::session::state::{CallKind, CallState, Lifecycle, Outcome};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::Mutex as SyncMutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// How long a `(kind, order_id)` claim shields against duplicate initiation.
pub const DEDUP_WINDOW: Duration = Duration::from_secs(300);

/// Cadence of the expiry sweep.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

pub type SharedCallState = Arc<Mutex<CallState>>;

/// How a callback's session lookup resolved.
pub enum SessionLookup {
    Found(SharedCallState),
    /// No record, but the round-tripped CustomField let us rebuild one.
    Created(SharedCallState),
    Absent,
}

/// Result of the initiator's idempotency check.
#[derive(Clone, Debug, PartialEq)]
pub enum OrderClaim {
    /// Ours to place; release or bind when the carrier answers.
    Claimed,
    /// Another initiation for this order is still awaiting the carrier.
    InFlight,
    /// A live call already exists for this order.
    Existing(String),
}

enum OrderEntry {
    Pending { at: DateTime<Utc> },
    Bound { call_sid: String, at: DateTime<Utc> },
}

impl OrderEntry {
    fn at(&self) -> DateTime<Utc> {
        match self {
            Self::Pending { at } | Self::Bound { at, .. } => *at,
        }
    }
}

pub struct SessionStore {
    live_ttl: Duration,
    reported_ttl: Duration,
    sessions: SyncMutex<HashMap<String, SharedCallState>>,
    orders: SyncMutex<HashMap<(CallKind, u64), OrderEntry>>,
}

impl SessionStore {
    pub fn new(live_ttl: Duration, reported_ttl: Duration) -> Self {
        Self {
            live_ttl,
            reported_ttl,
            sessions: SyncMutex::new(HashMap::new()),
            orders: SyncMutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, call_sid: &str) -> Option<SharedCallState> {
        self.sessions
            .lock()
            .expect("session registry poisoned")
            .get(call_sid)
            .cloned()
    }

    /// Inserts the factory's record unless the CallSid is already present;
    /// the bool reports whether this call created it.
    pub fn get_or_create(
        &self,
        call_sid: &str,
        factory: impl FnOnce() -> CallState,
    ) -> (SharedCallState, bool) {
        let mut sessions = self.sessions.lock().expect("session registry poisoned");
        match sessions.get(call_sid) {
            Some(entry) => (Arc::clone(entry), false),
            None => {
                let entry = Arc::new(Mutex::new(factory()));
                sessions.insert(call_sid.to_string(), Arc::clone(&entry));
                (entry, true)
            }
        }
    }

    pub fn evict(&self, call_sid: &str) {
        self.sessions
            .lock()
            .expect("session registry poisoned")
            .remove(call_sid);
    }

    pub fn live_count(&self) -> usize {
        self.sessions
            .lock()
            .expect("session registry poisoned")
            .len()
    }

    /// Idempotency check for the initiator. Entries older than the window
    /// are dropped on the way in, so a claim is always a fresh decision.
    pub fn claim_order(&self, kind: CallKind, order_id: u64, now: DateTime<Utc>) -> OrderClaim {
        let mut orders = self.orders.lock().expect("order index poisoned");
        let window = TimeDelta::from_std(DEDUP_WINDOW).unwrap_or(TimeDelta::seconds(300));

        if let Some(entry) = orders.get(&(kind, order_id)) {
            if now.signed_duration_since(entry.at()) <= window {
                return match entry {
                    OrderEntry::Pending { .. } => OrderClaim::InFlight,
                    OrderEntry::Bound { call_sid, .. } => OrderClaim::Existing(call_sid.clone()),
                };
            }
        }
        orders.insert((kind, order_id), OrderEntry::Pending { at: now });
        OrderClaim::Claimed
    }

    /// Binds a claim to the CallSid the carrier assigned.
    pub fn bind_order(&self, kind: CallKind, order_id: u64, call_sid: &str, now: DateTime<Utc>) {
        self.orders.lock().expect("order index poisoned").insert(
            (kind, order_id),
            OrderEntry::Bound {
                call_sid: call_sid.to_string(),
                at: now,
            },
        );
    }

    /// Drops a claim after a failed carrier call so a retry can proceed.
    pub fn release_order(&self, kind: CallKind, order_id: u64) {
        self.orders
            .lock()
            .expect("order index poisoned")
            .remove(&(kind, order_id));
    }

    /// One pass of the background sweep. Stale non-terminal records are
    /// force-terminated as `no_response` and their CallSids returned so the
    /// caller can enqueue them for reporting; reported records past their
    /// grace period are evicted.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Vec<String> {
        let snapshot: Vec<(String, SharedCallState)> = {
            let sessions = self.sessions.lock().expect("session registry poisoned");
            sessions
                .iter()
                .map(|(sid, entry)| (sid.clone(), Arc::clone(entry)))
                .collect()
        };

        let live_ttl = TimeDelta::from_std(self.live_ttl).unwrap_or(TimeDelta::seconds(900));
        let reported_ttl = TimeDelta::from_std(self.reported_ttl).unwrap_or(TimeDelta::seconds(60));

        let mut needs_report = Vec::new();
        let mut evictable = Vec::new();

        for (call_sid, entry) in snapshot {
            let mut state = entry.lock().await;
            if !state.is_terminal()
                && now.signed_duration_since(state.last_interaction_at) > live_ttl
            {
                state.lifecycle = Lifecycle::NoAnswer;
                if state.outcome.is_none() {
                    state.outcome = Some(Outcome::NoResponse);
                }
                state.terminal_at = Some(now);
                tracing::info!(%call_sid, "expired live session forced to no_response");
                needs_report.push(call_sid.clone());
            }

            if state.reported {
                if let Some(terminal_at) = state.terminal_at {
                    if now.signed_duration_since(terminal_at) > reported_ttl {
                        evictable.push(call_sid.clone());
                    }
                }
            }
        }

        for call_sid in &evictable {
            self.evict(call_sid);
            tracing::debug!(%call_sid, "evicted reported session");
        }

        let window = TimeDelta::from_std(DEDUP_WINDOW).unwrap_or(TimeDelta::seconds(300));
        self.orders
            .lock()
            .expect("order index poisoned")
            .retain(|_, entry| now.signed_duration_since(entry.at()) <= window);

        needs_report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::state::{Language, OrderPayload};

    fn store() -> SessionStore {
        SessionStore::new(Duration::from_secs(900), Duration::from_secs(60))
    }

    fn call(sid: &str, order_id: u64, now: DateTime<Utc>) -> CallState {
        CallState::new(
            sid,
            CallKind::VendorOrderConfirmation,
            Language::En,
            OrderPayload {
                order_id,
                ..OrderPayload::default()
            },
            now,
        )
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent_per_sid() {
        let store = store();
        let now = Utc::now();
        let (first, created) = store.get_or_create("sid1", || call("sid1", 1, now));
        assert!(created);
        let (second, created) = store.get_or_create("sid1", || call("sid1", 999, now));
        assert!(!created);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().await.order_id, 1);
    }

    #[test]
    fn order_claims_enforce_the_window() {
        let store = store();
        let kind = CallKind::VendorOrderConfirmation;
        let t0 = Utc::now();

        assert_eq!(store.claim_order(kind, 42, t0), OrderClaim::Claimed);
        assert_eq!(
            store.claim_order(kind, 42, t0 + TimeDelta::seconds(10)),
            OrderClaim::InFlight
        );

        store.bind_order(kind, 42, "sid42", t0 + TimeDelta::seconds(1));
        assert_eq!(
            store.claim_order(kind, 42, t0 + TimeDelta::seconds(20)),
            OrderClaim::Existing("sid42".into())
        );

        // past the window the order may be dialed again
        assert_eq!(
            store.claim_order(kind, 42, t0 + TimeDelta::seconds(400)),
            OrderClaim::Claimed
        );
    }

    #[test]
    fn released_claims_can_be_retried_immediately() {
        let store = store();
        let kind = CallKind::VendorOrderConfirmation;
        let t0 = Utc::now();

        assert_eq!(store.claim_order(kind, 7, t0), OrderClaim::Claimed);
        store.release_order(kind, 7);
        assert_eq!(
            store.claim_order(kind, 7, t0 + TimeDelta::seconds(1)),
            OrderClaim::Claimed
        );
    }

    #[tokio::test]
    async fn sweep_forces_stale_sessions_terminal() {
        let store = store();
        let t0 = Utc::now();
        store.get_or_create("stale", || call("stale", 5, t0));

        let needs_report = store.sweep(t0 + TimeDelta::seconds(901)).await;
        assert_eq!(needs_report, vec!["stale".to_string()]);

        let entry = store.get("stale").unwrap();
        let state = entry.lock().await;
        assert_eq!(state.lifecycle, Lifecycle::NoAnswer);
        assert_eq!(state.outcome, Some(Outcome::NoResponse));
    }

    #[tokio::test]
    async fn sweep_evicts_reported_sessions_after_grace() {
        let store = store();
        let t0 = Utc::now();
        let (entry, _) = store.get_or_create("done", || call("done", 6, t0));
        {
            let mut state = entry.lock().await;
            state.lifecycle = Lifecycle::Completed;
            state.outcome = Some(Outcome::Accepted);
            state.terminal_at = Some(t0);
            state.reported = true;
        }

        assert!(store.sweep(t0 + TimeDelta::seconds(30)).await.is_empty());
        assert!(store.get("done").is_some());

        store.sweep(t0 + TimeDelta::seconds(61)).await;
        assert!(store.get("done").is_none());
    }

    #[tokio::test]
    async fn sweep_leaves_fresh_sessions_alone() {
        let store = store();
        let t0 = Utc::now();
        store.get_or_create("fresh", || call("fresh", 9, t0));

        assert!(store.sweep(t0 + TimeDelta::seconds(600)).await.is_empty());
        let entry = store.get("fresh").unwrap();
        assert!(!entry.lock().await.is_terminal());
    }
}
