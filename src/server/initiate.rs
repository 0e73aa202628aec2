//! The brain asks us to place a call.

use crate::carrier::client::PlaceCall;
use crate::correlation::Correlation;
use crate::error::ExodialError;
use crate::server::AppState;
use crate::session::state::{CallKind, CallState, Language, OrderItem, OrderPayload};
use crate::session::store::OrderClaim;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use validator::Validate;

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct InitiateRequest {
    pub order_id: u64,
    #[serde(default)]
    pub vendor_id: Option<String>,
    #[serde(default)]
    pub rider_id: Option<String>,
    #[serde(alias = "vendor_phone", alias = "rider_phone")]
    #[validate(length(min = 10, max = 16))]
    pub callee_phone: String,
    #[serde(default, alias = "vendor_name", alias = "rider_name")]
    pub callee_name: Option<String>,
    #[serde(default)]
    pub order_amount: Option<f64>,
    #[serde(default)]
    pub order_items: Vec<OrderItem>,
    #[serde(default)]
    pub language: Option<Language>,
}

pub async fn handle(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(req): Json<InitiateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let kind = CallKind::from_str(&kind).map_err(|_| ApiError::UnknownKind(kind))?;
    req.validate().map_err(ApiError::Invalid)?;

    let now = Utc::now();
    match state.store.claim_order(kind, req.order_id, now) {
        OrderClaim::Existing(call_sid) => {
            tracing::info!(order_id = req.order_id, %call_sid, "duplicate initiation absorbed");
            return Ok(Json(json!({ "duplicate_of": call_sid })));
        }
        OrderClaim::InFlight => return Err(ApiError::InFlight),
        OrderClaim::Claimed => {}
    }

    let language = req.language.unwrap_or(state.default_language);
    let correlation = Correlation {
        kind,
        order_id: req.order_id,
        vendor_id: req.vendor_id.clone(),
        rider_id: req.rider_id.clone(),
        callee_name: req.callee_name.clone(),
        language,
    };

    let placed = state
        .placer
        .place(PlaceCall {
            phone: req.callee_phone.clone(),
            correlation,
        })
        .await;

    let call_sid = match placed {
        Ok(call_sid) => call_sid,
        Err(error) => {
            state.store.release_order(kind, req.order_id);
            tracing::error!(order_id = req.order_id, %error, "carrier refused to place call");
            return Err(ApiError::Carrier(error));
        }
    };

    let payload = OrderPayload {
        order_id: req.order_id,
        order_amount: req.order_amount,
        order_items: req.order_items.clone(),
    };
    state.store.get_or_create(&call_sid, || {
        let mut record = CallState::new(&call_sid, kind, language, payload, now);
        record.vendor_id = req.vendor_id.clone();
        record.rider_id = req.rider_id.clone();
        record.callee_phone = Some(req.callee_phone.clone());
        record.callee_name = req.callee_name.clone();
        record
    });
    state.store.bind_order(kind, req.order_id, &call_sid, now);

    Ok(Json(json!({ "call_sid": call_sid })))
}

#[derive(Debug)]
pub enum ApiError {
    UnknownKind(String),
    Invalid(validator::ValidationErrors),
    InFlight,
    Carrier(ExodialError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, detail) = match self {
            ApiError::UnknownKind(kind) => (
                StatusCode::NOT_FOUND,
                "unknown_call_kind",
                format!("no call kind named {kind}"),
            ),
            ApiError::Invalid(errors) => (
                StatusCode::BAD_REQUEST,
                "invalid_payload",
                errors.to_string(),
            ),
            ApiError::InFlight => (
                StatusCode::CONFLICT,
                "initiation_in_flight",
                "another initiation for this order is awaiting the carrier".to_string(),
            ),
            ApiError::Carrier(error) => {
                let (status, code) = match &error {
                    ExodialError::AuthInvalid { .. } => {
                        (StatusCode::UNAUTHORIZED, "auth_invalid")
                    }
                    ExodialError::CarrierRejected { .. } => {
                        (StatusCode::BAD_REQUEST, "carrier_rejected")
                    }
                    ExodialError::CarrierUnavailable(_) => {
                        (StatusCode::BAD_GATEWAY, "carrier_unavailable")
                    }
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
                };
                (status, code, error.to_string())
            }
        };
        (status, Json(json!({ "error": code, "detail": detail }))).into_response()
    }
}
