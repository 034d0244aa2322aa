//! Request and response plumbing shared by the route handlers
//!
//! Handlers receive a fully buffered `Request<Bytes>` (see
//! [`buffer_request`]) and answer with JSON. Every failure is rendered as
//! `{"error": ..., "code": ...}` with the status taken from
//! [`FirmamentError::status_code`].

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, AUTHORIZATION, CONTENT_TYPE,
};
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error};

use crate::auth::{resolve_principal, JwtValidator, Principal};
use crate::services::FormInput;
use crate::types::{FirmamentError, Result};

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Error body sent for every failed request
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

fn with_cors(mut response: Response<BoxBody>) -> Response<BoxBody> {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
    response
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    let mut response = Response::new(full_body(json));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    with_cors(response)
}

pub fn cors_preflight() -> Response<BoxBody> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    with_cors(response)
}

/// Render an error; server-side failures are logged with their detail
pub fn error_response(err: FirmamentError) -> Response<BoxBody> {
    if err.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        debug!("Request rejected: {}", err);
    }

    json_response(
        err.status_code(),
        &ErrorResponse {
            error: err.public_message(),
            code: err.code().to_string(),
        },
    )
}

pub fn not_found_response(path: &str) -> Response<BoxBody> {
    error_response(FirmamentError::NotFound(format!("No route for {}", path)))
}

pub fn method_not_allowed() -> Response<BoxBody> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &ErrorResponse {
            error: "Method not allowed".into(),
            code: "METHOD_NOT_ALLOWED".into(),
        },
    )
}

/// Non-empty path segments, ignoring a trailing slash
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

pub fn get_auth_header<B>(req: &Request<B>) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Principal for routes that require a session
pub fn authenticate<B>(jwt: &JwtValidator, req: &Request<B>) -> Result<Principal> {
    resolve_principal(jwt, get_auth_header(req))
}

/// Principal for routes that may be public. No header means anonymous;
/// a header carrying a bad token is still rejected.
pub fn optional_principal<B>(jwt: &JwtValidator, req: &Request<B>) -> Result<Option<Principal>> {
    match get_auth_header(req) {
        None => Ok(None),
        Some(_) => authenticate(jwt, req).map(Some),
    }
}

pub fn query_params<B>(req: &Request<B>) -> HashMap<String, String> {
    req.uri()
        .query()
        .and_then(|q| serde_urlencoded::from_str(q).ok())
        .unwrap_or_default()
}

/// Collect the body up to `limit` bytes
pub async fn buffer_request<B>(req: Request<B>, limit: usize) -> Result<Request<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    let collected = Limited::new(body, limit).collect().await.map_err(|e| {
        if e.downcast_ref::<LengthLimitError>().is_some() {
            FirmamentError::PayloadTooLarge("Request body too large".into())
        } else {
            FirmamentError::BadRequest(format!("Failed to read body: {}", e))
        }
    })?;
    Ok(Request::from_parts(parts, collected.to_bytes()))
}

/// Parse the body as multipart, urlencoded or JSON according to its
/// content type
pub async fn read_form(req: &Request<Bytes>) -> Result<FormInput> {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let body = req.body().clone();

    if content_type.starts_with("multipart/form-data") {
        let boundary = multer::parse_boundary(content_type)?;
        return FormInput::from_multipart(body, &boundary).await;
    }

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&body)
            .map_err(|e| FirmamentError::BadRequest(format!("Invalid form body: {}", e)))?;
        let mut input = FormInput::new();
        for (key, value) in pairs {
            input.push(key, Value::String(value));
        }
        return Ok(input);
    }

    FormInput::from_json_bytes(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenInput;

    async fn body_json(response: Response<BoxBody>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_body_hides_server_detail() {
        let response = error_response(FirmamentError::Database("replica 10.0.0.7 down".into()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
        let body = body_json(response).await;
        assert_eq!(body["code"], "SERVER_ERROR");
        assert!(!body["error"].as_str().unwrap().contains("10.0.0.7"));
    }

    #[tokio::test]
    async fn test_buffer_request_enforces_limit() {
        let req = Request::new(Full::new(Bytes::from_static(b"0123456789")));
        let err = buffer_request(req, 4).await.unwrap_err();
        assert!(matches!(err, FirmamentError::PayloadTooLarge(_)));

        let req = Request::new(Full::new(Bytes::from_static(b"0123")));
        let req = buffer_request(req, 4).await.unwrap();
        assert_eq!(req.body().as_ref(), b"0123");
    }

    #[tokio::test]
    async fn test_read_form_by_content_type() {
        let req = Request::builder()
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Bytes::from_static(b"name=Summer&canView%5B%5D=u2&canView%5B%5D=u3"))
            .unwrap();
        let form = read_form(&req).await.unwrap();
        assert_eq!(form.text("name").as_deref(), Some("Summer"));
        assert_eq!(form.acl("canView").unwrap(), vec!["u2", "u3"]);

        let req = Request::builder()
            .header(CONTENT_TYPE, "application/json")
            .body(Bytes::from_static(br#"{"word":"Hope"}"#))
            .unwrap();
        assert_eq!(read_form(&req).await.unwrap().text("word").as_deref(), Some("Hope"));

        let req = Request::new(Bytes::new());
        assert!(!read_form(&req).await.unwrap().has("word"));
    }

    #[test]
    fn test_optional_principal() {
        let jwt = JwtValidator::new_dev();
        let anonymous = Request::new(Bytes::new());
        assert!(optional_principal(&jwt, &anonymous).unwrap().is_none());

        let bad = Request::builder()
            .header(AUTHORIZATION, "Bearer garbage")
            .body(Bytes::new())
            .unwrap();
        assert!(matches!(
            optional_principal(&jwt, &bad),
            Err(FirmamentError::Forbidden(_))
        ));

        let token = jwt
            .generate_token(TokenInput {
                user_id: "u1".into(),
                email: "u1@example.com".into(),
                username: "u1".into(),
            })
            .unwrap();
        let good = Request::builder()
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .body(Bytes::new())
            .unwrap();
        assert_eq!(optional_principal(&jwt, &good).unwrap().unwrap().id(), "u1");
    }

    #[test]
    fn test_query_and_segments() {
        let req = Request::builder()
            .uri("/api/s3/sign?key=stars%2Fs1%2Fa.pdf&expires=60")
            .body(Bytes::new())
            .unwrap();
        let query = query_params(&req);
        assert_eq!(query.get("key").map(String::as_str), Some("stars/s1/a.pdf"));
        assert_eq!(path_segments("/api/stars/s1/"), vec!["api", "stars", "s1"]);
    }
}
