//! Account routes
//!
//! - `POST /api/auth/register` - create an account, returns a session token
//! - `POST /api/auth/login`    - exchange email and password for a token
//! - `GET  /api/auth/me`       - the caller's own profile

use bytes::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use tracing::info;

use crate::auth::TokenInput;
use crate::db::schemas::{UserDoc, UserView};
use crate::routes::{
    authenticate, error_response, json_response, method_not_allowed, not_found_response,
    path_segments, read_form, BoxBody,
};
use crate::server::AppState;
use crate::types::{FirmamentError, Result};

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserView,
}

fn session(state: &AppState, user: &UserDoc) -> Result<AuthResponse> {
    let token = state.jwt.generate_token(TokenInput {
        user_id: user.id.clone(),
        email: user.email.clone(),
        username: user.username.clone(),
    })?;
    Ok(AuthResponse {
        token,
        user: UserView::from(user),
    })
}

async fn handle_register(req: &Request<Bytes>, state: &AppState) -> Result<Response<BoxBody>> {
    let input = read_form(req).await?;
    let user = state.services.register(&input).await?;
    Ok(json_response(StatusCode::CREATED, &session(state, &user)?))
}

async fn handle_login(req: &Request<Bytes>, state: &AppState) -> Result<Response<BoxBody>> {
    let input = read_form(req).await?;
    let email = input.required_text("email")?;
    let password = input
        .text("password")
        .ok_or_else(|| FirmamentError::BadRequest("password is required".into()))?;

    let user = state.services.login(&email, &password).await?;
    info!(user = %user.id, "Login");
    Ok(json_response(StatusCode::OK, &session(state, &user)?))
}

async fn handle_me(req: &Request<Bytes>, state: &AppState) -> Result<Response<BoxBody>> {
    let principal = authenticate(&state.jwt, req)?;
    let user = state.services.me(&principal).await?;
    Ok(json_response(StatusCode::OK, &MeResponse { user }))
}

/// Dispatch `/api/auth/*`
pub async fn handle_auth_request(req: &Request<Bytes>, state: &AppState) -> Response<BoxBody> {
    let segments = path_segments(req.uri().path());
    let rest = segments.get(2..).unwrap_or_default();

    let result = match (req.method(), rest) {
        (&Method::POST, ["register"]) => handle_register(req, state).await,
        (&Method::POST, ["login"]) => handle_login(req, state).await,
        (&Method::GET, ["me"]) => handle_me(req, state).await,
        (_, ["register"] | ["login"] | ["me"]) => return method_not_allowed(),
        _ => return not_found_response(req.uri().path()),
    };

    result.unwrap_or_else(error_response)
}
