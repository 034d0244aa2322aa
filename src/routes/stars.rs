//! Star routes under `/api/stars`
//!
//! Paths below `/api/stars/{id}/` other than `rights` address collections
//! and items and are handed to [`handle_resource_request`].

use bytes::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::routes::{
    authenticate, error_response, handle_resource_request, json_response, method_not_allowed,
    path_segments, read_form, BoxBody, MessageResponse,
};
use crate::server::AppState;
use crate::types::Result;

/// Body of `POST /api/stars/{id}/rights`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RightsRequest {
    pub target_user_id: String,
    pub mode: String,
    pub action: String,
}

/// Access lists after a rights change
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RightsResponse {
    pub can_view: Vec<String>,
    pub can_edit: Vec<String>,
}

async fn handle_list_own(req: &Request<Bytes>, state: &AppState) -> Result<Response<BoxBody>> {
    let principal = authenticate(&state.jwt, req)?;
    let stars = state.services.list_own_stars(&principal).await?;
    Ok(json_response(StatusCode::OK, &stars))
}

async fn handle_list_shared(req: &Request<Bytes>, state: &AppState) -> Result<Response<BoxBody>> {
    let principal = authenticate(&state.jwt, req)?;
    let stars = state.services.list_shared_stars(&principal).await?;
    Ok(json_response(StatusCode::OK, &stars))
}

async fn handle_create(req: &Request<Bytes>, state: &AppState) -> Result<Response<BoxBody>> {
    let principal = authenticate(&state.jwt, req)?;
    let input = read_form(req).await?;
    let star = state.services.create_star(&principal, &input).await?;
    Ok(json_response(StatusCode::CREATED, &star))
}

async fn handle_get(
    req: &Request<Bytes>,
    state: &AppState,
    star_id: &str,
) -> Result<Response<BoxBody>> {
    let principal = authenticate(&state.jwt, req)?;
    let star = state.services.get_star(&principal, star_id).await?;
    Ok(json_response(StatusCode::OK, &star))
}

async fn handle_update(
    req: &Request<Bytes>,
    state: &AppState,
    star_id: &str,
) -> Result<Response<BoxBody>> {
    let principal = authenticate(&state.jwt, req)?;
    let input = read_form(req).await?;
    let star = state.services.update_star(&principal, star_id, &input).await?;
    Ok(json_response(StatusCode::OK, &star))
}

async fn handle_delete(
    req: &Request<Bytes>,
    state: &AppState,
    star_id: &str,
) -> Result<Response<BoxBody>> {
    let principal = authenticate(&state.jwt, req)?;
    state.services.delete_star(&principal, star_id).await?;
    Ok(json_response(StatusCode::OK, &MessageResponse::new("Star deleted")))
}

async fn handle_rights(
    req: &Request<Bytes>,
    state: &AppState,
    star_id: &str,
) -> Result<Response<BoxBody>> {
    let principal = authenticate(&state.jwt, req)?;
    let body: RightsRequest = serde_json::from_slice(req.body())?;

    let star = state
        .services
        .change_rights(&principal, star_id, &body.target_user_id, &body.mode, &body.action)
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &RightsResponse {
            can_view: star.can_view,
            can_edit: star.can_edit,
        },
    ))
}

/// Dispatch `/api/stars/*`
pub async fn handle_stars_request(req: &Request<Bytes>, state: &AppState) -> Response<BoxBody> {
    let segments = path_segments(req.uri().path());
    let rest = segments.get(2..).unwrap_or_default();

    let result = match (req.method(), rest) {
        (&Method::GET, []) => handle_list_own(req, state).await,
        (&Method::POST, []) => handle_create(req, state).await,
        (&Method::GET, ["shared"]) => handle_list_shared(req, state).await,
        (&Method::GET, [id]) => handle_get(req, state, id).await,
        (&Method::PUT, [id]) => handle_update(req, state, id).await,
        (&Method::DELETE, [id]) => handle_delete(req, state, id).await,
        (&Method::POST, [id, "rights"]) => handle_rights(req, state, id).await,
        (_, [] | [_] | [_, "rights"]) => return method_not_allowed(),
        (_, [star_id, resource @ ..]) => {
            return handle_resource_request(req, state, star_id, resource).await
        }
    };

    result.unwrap_or_else(error_response)
}
