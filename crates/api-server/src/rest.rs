//! REST handlers for the three endpoints the marketplace exposes to
//! partners: ad selection, impression tracking, and click redirects.
//!
//! Partner identity is established upstream and forwarded as the
//! `X-Partner-Id` header; a missing or non-numeric value is a 401, not a
//! 400, since it means the identity the gateway promised never arrived.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use campaign_core::error::MarketError;
use campaign_core::types::{Targeting, UnfilledReason};
use campaign_delivery::ClickValidator;
use campaign_marketplace::selection::{self, SelectionOutcome, SelectionRequest};
use campaign_marketplace::{BudgetAccountant, ImpressionTracker, InMemoryStore, SelectionOrchestrator};

use crate::server::AppConfigState;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfigState,
    pub selector: Arc<SelectionOrchestrator<InMemoryStore>>,
    pub validator: Arc<ClickValidator>,
    pub accountant: Arc<BudgetAccountant<InMemoryStore>>,
    pub impressions: Arc<ImpressionTracker<InMemoryStore>>,
}

#[derive(Deserialize)]
pub struct AdQuery {
    pub category: Option<String>,
    pub geo: Option<String>,
    pub device: Option<String>,
    pub placement: Option<String>,
}

#[derive(Serialize)]
pub struct CampaignSummary {
    pub id: i64,
    pub max_cpc: f64,
    pub partner_payout: f64,
}

#[derive(Serialize)]
pub struct AdSummary {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub image_url: String,
    pub destination_url: String,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum AdResponse {
    Filled {
        filled: bool,
        assignment_code: String,
        tracking_url: String,
        campaign: CampaignSummary,
        ad: AdSummary,
        explanation: String,
        score_breakdown: serde_json::Value,
    },
    Unfilled {
        filled: bool,
        reason: UnfilledReason,
    },
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::UNAUTHORIZED, Json(self)).into_response()
    }
}

fn partner_id_from_headers(headers: &HeaderMap) -> Option<i64> {
    headers
        .get("x-partner-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
}

/// `GET /api/partner/ad` — run ad selection for the calling partner.
pub async fn partner_ad(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AdQuery>,
) -> Result<Json<AdResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Some(partner_id) = partner_id_from_headers(&headers) else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "invalid_identity".to_string(),
                message: "missing or malformed X-Partner-Id".to_string(),
            }),
        ));
    };

    let config = state.config.load();
    let request = SelectionRequest {
        partner_id,
        targeting: Targeting {
            category: query.category,
            geo: query.geo,
            device: query.device,
            placement: query.placement,
        },
    };

    let result = selection::select_with_deadline(&state.selector, &config, request, Utc::now())
        .await
        .map_err(|e| {
            error!(error = %e, "selection failed");
            metrics::counter!("api.selection_errors").increment(1);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "selection_failed".to_string(),
                    message: e.to_string(),
                }),
            )
        })?;

    let body = match result.outcome {
        SelectionOutcome::Filled {
            assignment_code,
            campaign_id,
            ad,
            campaign,
            explanation,
            score_breakdown,
        } => AdResponse::Filled {
            filled: true,
            tracking_url: format!("/t/{assignment_code}"),
            assignment_code,
            campaign: CampaignSummary {
                id: campaign_id,
                max_cpc: campaign.buyer_cpc.as_dollars(),
                partner_payout: campaign.partner_payout.as_dollars(),
            },
            ad: AdSummary {
                id: ad.id,
                title: ad.title,
                body: ad.body,
                image_url: ad.image_url,
                destination_url: ad.destination_url,
            },
            explanation,
            score_breakdown: serde_json::from_str(&score_breakdown).unwrap_or(serde_json::json!({})),
        },
        SelectionOutcome::Unfilled { reason } => AdResponse::Unfilled {
            filled: false,
            reason,
        },
    };

    Ok(Json(body))
}

#[derive(Deserialize)]
pub struct ImpressionQuery {
    pub code: Option<String>,
}

#[derive(Serialize)]
pub struct ImpressionResponse {
    pub status: &'static str,
    pub deduped: bool,
}

/// `POST /api/track/impression` — record an impression for an assignment.
pub async fn track_impression(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<ImpressionQuery>,
) -> Result<Json<ImpressionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Some(code) = query.code else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "missing_code".to_string(),
                message: "query parameter `code` is required".to_string(),
            }),
        ));
    };

    let config = state.config.load();
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok());

    let result = state
        .impressions
        .record(&config.click, &code, forwarded_for, &addr.ip().to_string(), Utc::now())
        .await
        .map_err(|e| {
            error!(error = %e, "impression tracking failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "tracking_failed".to_string(),
                    message: e.to_string(),
                }),
            )
        })?;

    match result {
        Some(deduped) => Ok(Json(ImpressionResponse {
            status: "ok",
            deduped,
        })),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "not_found".to_string(),
                message: format!("no assignment for code {code}"),
            }),
        )),
    }
}

/// `GET /t/:code` — validate a click, debit the budget, redirect.
///
/// Always returns a 302: a click that can't be matched to an assignment
/// still gets recorded (as `REJECTED`/`INVALID_ASSIGNMENT`) and redirected
/// home rather than surfaced as an HTTP error.
pub async fn track_click(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    axum::extract::Path(code): axum::extract::Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let config = state.config.load();
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok());
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let decision = match state
        .validator
        .validate(
            &config.click,
            &code,
            forwarded_for,
            &addr.ip().to_string(),
            user_agent,
            Utc::now(),
        )
        .await
    {
        Ok(decision) => decision,
        Err(e) => {
            error!(error = %e, "click validation failed");
            return Redirect::to("/").into_response();
        }
    };

    match state.accountant.settle(decision, Utc::now()).await {
        Ok(settlement) => {
            if let Some(reason) = settlement.event.reject_reason {
                warn!(?reason, code = %code, "click rejected");
            }
            Redirect::to(&settlement.destination).into_response()
        }
        Err(MarketError::InvariantViolation(msg)) => {
            error!(msg, code = %code, "budget accounting invariant violated");
            Redirect::to("/").into_response()
        }
        Err(e) => {
            error!(error = %e, code = %code, "click settlement failed");
            Redirect::to("/").into_response()
        }
    }
}

/// `GET /health` — liveness probe.
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// `GET /ready` — readiness probe.
pub async fn readiness() -> StatusCode {
    StatusCode::OK
}
