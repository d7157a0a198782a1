//! Stand handlers: create, edit, list and the holder's own stand.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{CreateStandRequest, StandListParams, UpdateStandRequest};
use crate::api::extract::{PathParam, Payload, QueryParams};
use crate::app_state::AppState;
use crate::domain::{Caller, Stand, StandId};
use crate::error::{ApiError, ErrorResponse};

/// `POST /stands`: open a stand owned by the caller.
///
/// # Errors
///
/// Returns [`ApiError`] on invalid input or a non stand-holder caller.
#[utoipa::path(
    post,
    path = "/api/v1/stands",
    tag = "Stands",
    summary = "Create a stand",
    description = "Creates a SALE or ACTIVITY stand owned by the calling stand holder. The type cannot change afterwards.",
    request_body = CreateStandRequest,
    responses(
        (status = 201, description = "Stand created", body = Stand),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Caller is not a stand holder", body = ErrorResponse),
    )
)]
pub async fn create_stand(
    State(state): State<AppState>,
    caller: Caller,
    Payload(req): Payload<CreateStandRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (kind, fields) = req.into_parts();
    let stand = state.stands.create(&caller, kind, fields).await?;
    Ok((StatusCode::CREATED, Json(stand)))
}

/// `GET /stands`: list stands.
///
/// # Errors
///
/// Returns [`ApiError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/stands",
    tag = "Stands",
    summary = "List stands",
    description = "Lists stands, optionally restricted to one kermesse or to stands free of any running kermesse.",
    params(StandListParams),
    responses(
        (status = 200, description = "Stands", body = Vec<Stand>),
    )
)]
pub async fn list_stands(
    State(state): State<AppState>,
    _caller: Caller,
    QueryParams(params): QueryParams<StandListParams>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.stands.list(params.into()).await?))
}

/// `GET /stands/current`: the caller's stand.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] when the caller owns no stand.
#[utoipa::path(
    get,
    path = "/api/v1/stands/current",
    tag = "Stands",
    summary = "My stand",
    responses(
        (status = 200, description = "Stand owned by the caller", body = Stand),
        (status = 404, description = "Caller owns no stand", body = ErrorResponse),
    )
)]
pub async fn current_stand(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.stands.current(&caller).await?))
}

/// `PATCH /stands/current`: edit the caller's stand.
///
/// # Errors
///
/// Returns [`ApiError`] on invalid input or when the caller owns no stand.
#[utoipa::path(
    patch,
    path = "/api/v1/stands/current",
    tag = "Stands",
    summary = "Edit my stand",
    request_body = UpdateStandRequest,
    responses(
        (status = 202, description = "Stand updated", body = Stand),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Caller owns no stand", body = ErrorResponse),
    )
)]
pub async fn update_current_stand(
    State(state): State<AppState>,
    caller: Caller,
    Payload(req): Payload<UpdateStandRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let stand = state.stands.update_current(&caller, req.into()).await?;
    Ok((StatusCode::ACCEPTED, Json(stand)))
}

/// `GET /stands/{id}`: look up a stand.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/api/v1/stands/{id}",
    tag = "Stands",
    summary = "Get a stand",
    params(
        ("id" = i64, Path, description = "Stand id"),
    ),
    responses(
        (status = 200, description = "Stand", body = Stand),
        (status = 404, description = "Stand not found", body = ErrorResponse),
    )
)]
pub async fn get_stand(
    State(state): State<AppState>,
    _caller: Caller,
    PathParam(id): PathParam<StandId>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.stands.get(id).await?))
}

/// `PATCH /stands/{id}`: edit a stand.
///
/// # Errors
///
/// Returns [`ApiError::Forbidden`] for anyone but the owner.
#[utoipa::path(
    patch,
    path = "/api/v1/stands/{id}",
    tag = "Stands",
    summary = "Edit a stand",
    request_body = UpdateStandRequest,
    params(
        ("id" = i64, Path, description = "Stand id"),
    ),
    responses(
        (status = 202, description = "Stand updated", body = Stand),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Stand not found", body = ErrorResponse),
    )
)]
pub async fn update_stand(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<StandId>,
    Payload(req): Payload<UpdateStandRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let stand = state.stands.update(&caller, id, req.into()).await?;
    Ok((StatusCode::ACCEPTED, Json(stand)))
}

/// Stand routes mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stands", get(list_stands).post(create_stand))
        .route(
            "/stands/current",
            get(current_stand).patch(update_current_stand),
        )
        .route("/stands/{id}", get(get_stand).patch(update_stand))
}
