//! Collection and item routes below `/api/stars/{starId}/`
//!
//! ```text
//! {collection}                              GET list, POST create
//! {collection}/{id}                         GET, PUT, DELETE
//! {collection}/{id}/{items}                 GET list, POST create
//! {collection}/{id}/{items}/upload          POST create
//! {collection}/{id}/{items}/copy|move       POST with ids
//! {collection}/{id}/{items}/{itemId}        GET, PUT, DELETE
//! {items}                                   GET list, POST create
//! {items}/upload                            POST create
//! {items}/{itemId}                          GET, PUT, DELETE
//! ```
//!
//! `{collection}` is one of `photo-albums`, `video-albums`, `three-d-rooms`;
//! star-level `{items}` are `audios`, `documents`, `messages`.

use bytes::Bytes;
use hyper::{Method, Request, Response, StatusCode};

use crate::resources::{CollectionKind, ItemKind};
use crate::routes::{
    authenticate, error_response, json_response, method_not_allowed, not_found_response,
    optional_principal, read_form, BoxBody, MessageResponse,
};
use crate::server::AppState;
use crate::services::{FormInput, ItemPath};
use crate::types::{FirmamentError, Result};

async fn collection_route(
    req: &Request<Bytes>,
    state: &AppState,
    kind: CollectionKind,
    star_id: &str,
    tail: &[&str],
) -> Result<Response<BoxBody>> {
    let services = &state.services;

    match (req.method(), tail) {
        (&Method::GET, []) => {
            let principal = optional_principal(&state.jwt, req)?;
            let collections = services
                .list_collections(principal.as_ref(), kind, star_id)
                .await?;
            Ok(json_response(StatusCode::OK, &collections))
        }
        (&Method::POST, []) => {
            let principal = authenticate(&state.jwt, req)?;
            let input = read_form(req).await?;
            let collection = services
                .create_collection(&principal, kind, star_id, &input)
                .await?;
            Ok(json_response(StatusCode::CREATED, &collection))
        }
        (&Method::GET, [id]) => {
            let principal = authenticate(&state.jwt, req)?;
            let collection = services.get_collection(&principal, kind, star_id, id).await?;
            Ok(json_response(StatusCode::OK, &collection))
        }
        (&Method::PUT, [id]) => {
            let principal = authenticate(&state.jwt, req)?;
            let input = read_form(req).await?;
            let collection = services
                .update_collection(&principal, kind, star_id, id, &input)
                .await?;
            Ok(json_response(StatusCode::OK, &collection))
        }
        (&Method::DELETE, [id]) => {
            let principal = authenticate(&state.jwt, req)?;
            services.delete_collection(&principal, kind, star_id, id).await?;
            Ok(json_response(
                StatusCode::OK,
                &MessageResponse::new(format!("{} deleted", kind.label())),
            ))
        }
        (_, [collection_id, segment, rest @ ..]) => {
            let item_kind = kind.item_kind(segment).ok_or_else(|| {
                FirmamentError::NotFound(format!("No route for {}", req.uri().path()))
            })?;
            let path = ItemPath::in_collection(item_kind, star_id, collection_id);
            item_route(req, state, path, rest).await
        }
        _ => Ok(method_not_allowed()),
    }
}

/// Ids to copy or move; `ids` or the kind specific `photoIds`, `videoIds`, ...
fn transfer_ids(kind: ItemKind, input: &FormInput) -> Vec<String> {
    let ids = input.ids("ids");
    if !ids.is_empty() {
        return ids;
    }
    input.ids(&format!("{}Ids", kind.upload_field()))
}

async fn item_route(
    req: &Request<Bytes>,
    state: &AppState,
    path: ItemPath<'_>,
    tail: &[&str],
) -> Result<Response<BoxBody>> {
    let services = &state.services;

    match (req.method(), tail) {
        (&Method::GET, []) => {
            let principal = optional_principal(&state.jwt, req)?;
            let items = services.list_items(principal.as_ref(), path).await?;
            Ok(json_response(StatusCode::OK, &items))
        }
        (&Method::POST, [] | ["upload"]) => {
            let principal = authenticate(&state.jwt, req)?;
            let input = read_form(req).await?;
            let item = services.create_item(&principal, path, input).await?;
            Ok(json_response(StatusCode::CREATED, &item))
        }
        (&Method::POST, [action @ ("copy" | "move")]) => {
            let principal = authenticate(&state.jwt, req)?;
            let input = read_form(req).await?;
            let ids = transfer_ids(path.kind, &input);
            let outcome = if *action == "copy" {
                services.copy_items(&principal, path, &ids).await?
            } else {
                services.move_items(&principal, path, &ids).await?
            };
            Ok(json_response(StatusCode::OK, &outcome))
        }
        (&Method::GET, [id]) => {
            let principal = authenticate(&state.jwt, req)?;
            let item = services.get_item(&principal, path, id).await?;
            Ok(json_response(StatusCode::OK, &item))
        }
        (&Method::PUT, [id]) => {
            let principal = authenticate(&state.jwt, req)?;
            let input = read_form(req).await?;
            let item = services.update_item(&principal, path, id, input).await?;
            Ok(json_response(StatusCode::OK, &item))
        }
        (&Method::DELETE, [id]) => {
            let principal = authenticate(&state.jwt, req)?;
            services.delete_item(&principal, path, id).await?;
            Ok(json_response(
                StatusCode::OK,
                &MessageResponse::new(format!("{} deleted", path.kind.label())),
            ))
        }
        (_, [] | [_]) => Ok(method_not_allowed()),
        _ => Ok(not_found_response(req.uri().path())),
    }
}

/// Dispatch the part of a star path after `/api/stars/{starId}/`
pub async fn handle_resource_request(
    req: &Request<Bytes>,
    state: &AppState,
    star_id: &str,
    rest: &[&str],
) -> Response<BoxBody> {
    let result = match rest.split_first() {
        Some((first, tail)) => {
            if let Some(kind) = CollectionKind::from_slug(first) {
                collection_route(req, state, kind, star_id, tail).await
            } else if let Some(kind) = ItemKind::star_level(first) {
                item_route(req, state, ItemPath::star_level(kind, star_id), tail).await
            } else {
                Ok(not_found_response(req.uri().path()))
            }
        }
        None => Ok(not_found_response(req.uri().path())),
    };

    result.unwrap_or_else(error_response)
}
