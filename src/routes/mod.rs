//! HTTP routes for Firmament

pub mod auth_routes;
pub mod common;
pub mod health;
pub mod resources;
pub mod sign;
pub mod stars;
pub mod users;

pub use auth_routes::handle_auth_request;
pub use common::{
    authenticate, buffer_request, cors_preflight, empty_body, error_response, full_body,
    get_auth_header, json_response, method_not_allowed, not_found_response, optional_principal,
    path_segments, query_params, read_form, BoxBody, ErrorResponse, MessageResponse,
};
pub use health::health_check;
pub use resources::handle_resource_request;
pub use sign::handle_sign_request;
pub use stars::handle_stars_request;
pub use users::handle_users_request;
