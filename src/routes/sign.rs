//! `GET /api/s3/sign?key=...&expires=...`
//!
//! Returns a fresh signed URL for a stored object the caller can see.

use bytes::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;

use crate::routes::{
    authenticate, error_response, json_response, method_not_allowed, query_params, BoxBody,
};
use crate::server::AppState;
use crate::types::{FirmamentError, Result};

#[derive(Debug, Serialize)]
pub struct SignResponse {
    pub url: String,
}

async fn sign(req: &Request<Bytes>, state: &AppState) -> Result<Response<BoxBody>> {
    let principal = authenticate(&state.jwt, req)?;
    let query = query_params(req);

    let key = query
        .get("key")
        .ok_or_else(|| FirmamentError::BadRequest("key is required".into()))?;
    let expires = query
        .get("expires")
        .map(|raw| {
            raw.parse::<u64>()
                .map_err(|_| FirmamentError::BadRequest("expires must be a number of seconds".into()))
        })
        .transpose()?;

    let url = state.services.sign_key(&principal, key, expires).await?;
    Ok(json_response(StatusCode::OK, &SignResponse { url }))
}

pub async fn handle_sign_request(req: &Request<Bytes>, state: &AppState) -> Response<BoxBody> {
    if req.method() != Method::GET {
        return method_not_allowed();
    }
    sign(req, state).await.unwrap_or_else(error_response)
}
