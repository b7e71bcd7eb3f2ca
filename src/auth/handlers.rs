use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header::AUTHORIZATION, HeaderMap},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{AuthTokens, CallbackParams, HostedUiUrl, Identity, RefreshRequest, SignInRequest},
    extractors::AuthUser,
    services::{bearer_token, hosted_ui_url, is_valid_email},
};
use crate::{
    envelope::{ApiResponse, MessageResponse},
    error::{AppError, FieldErrors, Result},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signin", post(sign_in))
        .route("/auth/refresh", post(refresh))
        .route("/auth/signout", post(sign_out))
        .route("/auth/me", get(get_me))
        .route("/auth/google", get(google_url))
        .route("/auth/callback", get(callback))
}

#[instrument(skip(state, payload))]
pub async fn sign_in(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SignInRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<AuthTokens>>> {
    let Json(mut body) = payload?;
    body.username = body.username.trim().to_string();

    let mut errors = FieldErrors::new();
    if !is_valid_email(&body.username) {
        errors.add("username", "Invalid email address");
    }
    if body.password.chars().count() < 8 {
        errors.add("password", "Password must be at least 8 characters");
    }
    errors.into_result(())?;

    match state.identity.sign_in(&body.username, &body.password).await {
        Ok(tokens) => {
            info!(username = %body.username, "user signed in");
            Ok(Json(ApiResponse::ok(tokens)))
        }
        Err(e) => {
            warn!(error = %e, username = %body.username, "sign in rejected");
            Err(AppError::AuthenticationFailed("Invalid credentials"))
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<AuthTokens>>> {
    let Json(body) = payload?;
    if body.refresh_token.trim().is_empty() {
        return Err(AppError::Validation(FieldErrors::single(
            "refreshToken",
            "Refresh token is required",
        )));
    }

    match state.identity.refresh(&body.refresh_token).await {
        Ok(tokens) => Ok(Json(ApiResponse::ok(tokens))),
        Err(e) => {
            warn!(error = %e, "token refresh rejected");
            Err(AppError::AuthenticationFailed(
                "Invalid or expired refresh token",
            ))
        }
    }
}

#[instrument(skip(state, identity, headers))]
pub async fn sign_out(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>> {
    let token = bearer_token(headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok()))
        .ok_or(AppError::MissingCredentials)?;

    state
        .identity
        .global_sign_out(token)
        .await
        .map_err(AppError::SignOutFailed)?;

    info!(username = %identity.username, "user signed out");
    Ok(Json(MessageResponse::ok("Successfully signed out")))
}

#[instrument(skip(identity))]
pub async fn get_me(AuthUser(identity): AuthUser) -> Json<ApiResponse<Identity>> {
    Json(ApiResponse::ok(identity))
}

#[instrument(skip(state))]
pub async fn google_url(State(state): State<AppState>) -> Result<Json<ApiResponse<HostedUiUrl>>> {
    match hosted_ui_url(&state.config.cognito) {
        Some(url) => Ok(Json(ApiResponse::ok(HostedUiUrl { url }))),
        None => Err(AppError::Configuration("Missing Cognito configuration")),
    }
}

/// Hands the authorization code back to the frontend.
#[instrument(skip(state, params))]
pub async fn callback(
    State(state): State<AppState>,
    params: std::result::Result<Query<CallbackParams>, QueryRejection>,
) -> Result<Redirect> {
    let Query(params) = params?;
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::Validation(FieldErrors::single("code", "Missing authorization code")))?;

    let target = format!(
        "{}?code={}",
        state.config.cognito.redirect_uri,
        urlencoding::encode(&code)
    );
    Ok(Redirect::temporary(&target))
}
