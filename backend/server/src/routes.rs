//! # Waitlist Routes
//!
//! - `POST /api/waitlist/join`: rate limit, validate, join, send the confirmation email
//! - `GET /api/waitlist/confirm?token=`: confirm, send the welcome email, redirect to a result page
//! - `GET /api/waitlist/count`: cached, display-filtered confirmed count
//!
//! Email is a side channel. The store call decides the response, the notifier result is only logged.
use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json,
    body::{Bytes, to_bytes},
    extract::{ConnectInfo, Query, Request, State as AxumState},
    http::{HeaderValue, StatusCode, header::CACHE_CONTROL},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    database::{ConfirmFailure, JoinRequest},
    error::{AppError, DEFAULT_REJECTION},
    state::State,
    templates::Template,
    utils::{
        client_key, confirmation_url, confirmed_redirect, display_count, email_position,
        error_redirect, referral_url,
    },
};

pub const JOIN_SUCCESS_MESSAGE: &str = "Check your email to confirm your spot!";
pub const COUNT_CACHE_CONTROL: &str = "public, max-age=300";

const MAX_BODY_BYTES: usize = 16 * 1024;

pub async fn join_handler(
    AxumState(state): AxumState<Arc<State>>,
    request: Request,
) -> Result<impl IntoResponse, AppError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(peer, request.headers());

    if !state.limiter.check_and_consume(&client) {
        info!("Rate limited join from {client}");
        return Err(AppError::RateLimited);
    }

    let body = to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|_| AppError::MissingEmail)?;
    let payload = parse_join(&body)?;

    let outcome = state.store.join(&payload).await?;

    if !outcome.success {
        let message = outcome
            .error_message
            .unwrap_or_else(|| DEFAULT_REJECTION.to_string());
        return Err(AppError::Rejected(message));
    }

    if let Some(token) = outcome.confirmation_token.as_deref() {
        let template = Template::Confirmation {
            confirmation_url: confirmation_url(&state.config.site_url, token),
            position: email_position(outcome.position),
            site_url: state.config.site_url.clone(),
        };

        if let Err(e) = state.notifier.send(&payload.email, template).await {
            warn!("Confirmation email failed: {e}");
        }
    }

    Ok(Json(json!({
        "success": true,
        "position": outcome.position,
        "message": outcome.error_message.as_deref().unwrap_or(JOIN_SUCCESS_MESSAGE),
    })))
}

fn parse_join(body: &Bytes) -> Result<JoinRequest, AppError> {
    let payload: JoinRequest =
        serde_json::from_slice(body).map_err(|_| AppError::MissingEmail)?;

    if payload.email.trim().is_empty() {
        return Err(AppError::MissingEmail);
    }

    Ok(payload)
}

#[derive(Deserialize)]
pub struct ConfirmParams {
    token: Option<String>,
}

pub async fn confirm_handler(
    AxumState(state): AxumState<Arc<State>>,
    Query(params): Query<ConfirmParams>,
) -> Redirect {
    let Some(token) = params.token.filter(|token| !token.is_empty()) else {
        return Redirect::to(&error_redirect("missing_token"));
    };

    let outcome = match state.store.confirm(&token).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Store error during confirm: {e}");
            return Redirect::to(&error_redirect("server_error"));
        }
    };

    if !outcome.success {
        let reason = ConfirmFailure::classify(outcome.error_message.as_deref());
        info!("Confirmation declined: {}", reason.as_str());
        return Redirect::to(&error_redirect(reason.as_str()));
    }

    if let (Some(email), Some(code)) = (outcome.email.as_deref(), outcome.referral_code.as_deref())
    {
        let template = Template::Welcome {
            position: email_position(outcome.position),
            referral_code: code.to_string(),
            referral_url: referral_url(&state.config.site_url, code),
            site_url: state.config.site_url.clone(),
        };

        if let Err(e) = state.notifier.send(email, template).await {
            warn!("Welcome email failed: {e}");
        }
    }

    Redirect::to(&confirmed_redirect(
        outcome.position,
        outcome.referral_code.as_deref(),
    ))
}

pub async fn count_handler(AxumState(state): AxumState<Arc<State>>) -> Response {
    if let Some(count) = state.count_cache.get() {
        return count_response(count, true);
    }

    match state.store.count().await {
        Ok(raw) => {
            let count = display_count(raw, state.config.count_display_min);
            state.count_cache.set(count);
            count_response(count, false)
        }
        Err(e) => {
            error!("Store error during count: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "count": 0, "error": "Failed to get count" })),
            )
                .into_response()
        }
    }
}

fn count_response(count: u64, cached: bool) -> Response {
    (
        [(CACHE_CONTROL, HeaderValue::from_static(COUNT_CACHE_CONTROL))],
        Json(json!({ "success": true, "count": count, "cached": cached })),
    )
        .into_response()
}
