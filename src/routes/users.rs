//! User routes under `/api/users`
//!
//! | Method | Path                      | Auth |
//! |--------|---------------------------|------|
//! | GET    | /search?username=         | yes  |
//! | GET    | /me/contacts              | yes  |
//! | POST   | /me/activation-code       | yes  |
//! | POST   | /activate                 | no   |
//! | GET    | /{id}                     | yes  |
//! | PUT    | /{id}                     | yes  |
//! | POST   | /{id}/contacts            | yes  |
//! | DELETE | /{id}/contacts            | yes  |

use bytes::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;

use crate::routes::{
    authenticate, error_response, json_response, method_not_allowed, path_segments,
    query_params, read_form, BoxBody, MessageResponse,
};
use crate::server::AppState;
use crate::types::{FirmamentError, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationCodeResponse {
    pub activation_code: String,
}

async fn handle_search(req: &Request<Bytes>, state: &AppState) -> Result<Response<BoxBody>> {
    authenticate(&state.jwt, req)?;
    let query = query_params(req);
    let username = query
        .get("username")
        .or_else(|| query.get("q"))
        .map(String::as_str)
        .unwrap_or("");

    let users = state.services.search_users(username).await?;
    Ok(json_response(StatusCode::OK, &users))
}

async fn handle_contacts(req: &Request<Bytes>, state: &AppState) -> Result<Response<BoxBody>> {
    let principal = authenticate(&state.jwt, req)?;
    let contacts = state.services.list_contacts(&principal).await?;
    Ok(json_response(StatusCode::OK, &contacts))
}

async fn handle_activation_code(
    req: &Request<Bytes>,
    state: &AppState,
) -> Result<Response<BoxBody>> {
    let principal = authenticate(&state.jwt, req)?;
    let activation_code = state.services.issue_activation_code(&principal).await?;
    Ok(json_response(
        StatusCode::OK,
        &ActivationCodeResponse { activation_code },
    ))
}

async fn handle_activate(req: &Request<Bytes>, state: &AppState) -> Result<Response<BoxBody>> {
    let input = read_form(req).await?;
    let outcome = state.services.activate(input).await?;
    Ok(json_response(StatusCode::OK, &outcome))
}

async fn handle_get_user(
    req: &Request<Bytes>,
    state: &AppState,
    user_id: &str,
) -> Result<Response<BoxBody>> {
    let principal = authenticate(&state.jwt, req)?;
    let profile = state.services.get_user(&principal, user_id).await?;
    Ok(json_response(StatusCode::OK, &profile))
}

async fn handle_update_user(
    req: &Request<Bytes>,
    state: &AppState,
    user_id: &str,
) -> Result<Response<BoxBody>> {
    let principal = authenticate(&state.jwt, req)?;
    let input = read_form(req).await?;
    let user = state.services.update_user(&principal, user_id, &input).await?;
    Ok(json_response(StatusCode::OK, &user))
}

async fn handle_add_contact(
    req: &Request<Bytes>,
    state: &AppState,
    contact_id: &str,
) -> Result<Response<BoxBody>> {
    let principal = authenticate(&state.jwt, req)?;
    let contact = state.services.add_contact(&principal, contact_id).await?;
    Ok(json_response(StatusCode::CREATED, &contact))
}

async fn handle_remove_contact(
    req: &Request<Bytes>,
    state: &AppState,
    contact_id: &str,
) -> Result<Response<BoxBody>> {
    let principal = authenticate(&state.jwt, req)?;
    state.services.remove_contact(&principal, contact_id).await?;
    Ok(json_response(
        StatusCode::OK,
        &MessageResponse::new("Contact removed"),
    ))
}

/// Dispatch `/api/users/*`
pub async fn handle_users_request(req: &Request<Bytes>, state: &AppState) -> Response<BoxBody> {
    let segments = path_segments(req.uri().path());
    let rest = segments.get(2..).unwrap_or_default();

    let result = match (req.method(), rest) {
        (&Method::GET, ["search"]) => handle_search(req, state).await,
        (&Method::GET, ["me", "contacts"]) => handle_contacts(req, state).await,
        (&Method::POST, ["me", "activation-code"]) => handle_activation_code(req, state).await,
        (&Method::POST, ["activate"]) => handle_activate(req, state).await,
        (&Method::GET, [id]) => handle_get_user(req, state, id).await,
        (&Method::PUT, [id]) => handle_update_user(req, state, id).await,
        (&Method::POST, [id, "contacts"]) => handle_add_contact(req, state, id).await,
        (&Method::DELETE, [id, "contacts"]) => handle_remove_contact(req, state, id).await,
        (_, [_] | [_, _]) => return method_not_allowed(),
        _ => Err(FirmamentError::NotFound(format!(
            "No route for {}",
            req.uri().path()
        ))),
    };

    result.unwrap_or_else(error_response)
}
