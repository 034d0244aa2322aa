//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one task per connection. Request bodies are
//! buffered (bounded by `max_upload_bytes`) before routing, so every
//! handler works on a `Request<Bytes>`.

use bytes::Bytes;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::JwtValidator;
use crate::config::Args;
use crate::routes::{
    self, buffer_request, cors_preflight, error_response, not_found_response, path_segments,
    BoxBody,
};
use crate::services::Services;
use crate::types::Result;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub services: Services,
    pub jwt: JwtValidator,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, services: Services, jwt: JwtValidator) -> Self {
        Self {
            args,
            services,
            jwt,
            started_at: Instant::now(),
        }
    }
}

/// Accept connections until the process is stopped
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Firmament listening on {} (database: {}, blobs: {})",
        state.args.listen,
        state.services.backend_name(),
        state.services.blob_store().name()
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - do not expose this instance");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    info!("[{}] {} {}", addr, req.method(), req.uri().path());

    if req.method() == Method::OPTIONS {
        return Ok(cors_preflight());
    }

    let req = match buffer_request(req, state.args.max_upload_bytes).await {
        Ok(req) => req,
        Err(e) => return Ok(error_response(e)),
    };

    Ok(dispatch(&state, &req).await)
}

/// Route a buffered request to its handler
pub async fn dispatch(state: &AppState, req: &Request<Bytes>) -> Response<BoxBody> {
    let path = req.uri().path();

    match path_segments(path).as_slice() {
        ["health"] | ["healthz"] if req.method() == Method::GET => routes::health_check(state),
        ["api", "auth", ..] => routes::handle_auth_request(req, state).await,
        ["api", "users", ..] => routes::handle_users_request(req, state).await,
        ["api", "stars", ..] => routes::handle_stars_request(req, state).await,
        ["api", "s3", "sign"] => routes::handle_sign_request(req, state).await,
        _ => not_found_response(path),
    }
}
