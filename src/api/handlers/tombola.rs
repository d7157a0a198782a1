//! Tombola handlers: open, edit, list and draw.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::{Json, Router};

use crate::api::dto::{CreateTombolaRequest, TombolaListParams, UpdateTombolaRequest};
use crate::api::extract::{PathParam, Payload, QueryParams};
use crate::app_state::AppState;
use crate::domain::{Caller, Tombola, TombolaDraw, TombolaId};
use crate::error::{ApiError, ErrorResponse};

/// `POST /tombolas`: open a tombola in one of the caller's kermesses.
///
/// # Errors
///
/// Returns [`ApiError`] when the kermesse ended or belongs to someone else.
#[utoipa::path(
    post,
    path = "/api/v1/tombolas",
    tag = "Tombolas",
    summary = "Create a tombola",
    request_body = CreateTombolaRequest,
    responses(
        (status = 201, description = "Tombola opened", body = Tombola),
        (status = 400, description = "Invalid input or kermesse ended", body = ErrorResponse),
        (status = 403, description = "Not the kermesse organizer", body = ErrorResponse),
        (status = 404, description = "Kermesse not found", body = ErrorResponse),
    )
)]
pub async fn create_tombola(
    State(state): State<AppState>,
    caller: Caller,
    Payload(req): Payload<CreateTombolaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (kermesse_id, fields) = req.into_parts();
    let tombola = state.tombolas.create(&caller, kermesse_id, fields).await?;
    Ok((StatusCode::CREATED, Json(tombola)))
}

/// `GET /tombolas`: list tombolas.
///
/// # Errors
///
/// Returns [`ApiError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/tombolas",
    tag = "Tombolas",
    summary = "List tombolas",
    params(TombolaListParams),
    responses(
        (status = 200, description = "Tombolas", body = Vec<Tombola>),
    )
)]
pub async fn list_tombolas(
    State(state): State<AppState>,
    _caller: Caller,
    QueryParams(params): QueryParams<TombolaListParams>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.tombolas.list(params.kermesse_id).await?))
}

/// `GET /tombolas/{id}`: look up a tombola.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/api/v1/tombolas/{id}",
    tag = "Tombolas",
    summary = "Get a tombola",
    params(
        ("id" = i64, Path, description = "Tombola id"),
    ),
    responses(
        (status = 200, description = "Tombola", body = Tombola),
        (status = 404, description = "Tombola not found", body = ErrorResponse),
    )
)]
pub async fn get_tombola(
    State(state): State<AppState>,
    _caller: Caller,
    PathParam(id): PathParam<TombolaId>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.tombolas.get(id).await?))
}

/// `PATCH /tombolas/{id}`: edit name, price and prize.
///
/// # Errors
///
/// Returns [`ApiError`] when the kermesse ended or belongs to someone else.
#[utoipa::path(
    patch,
    path = "/api/v1/tombolas/{id}",
    tag = "Tombolas",
    summary = "Edit a tombola",
    request_body = UpdateTombolaRequest,
    params(
        ("id" = i64, Path, description = "Tombola id"),
    ),
    responses(
        (status = 202, description = "Tombola updated", body = Tombola),
        (status = 400, description = "Invalid input or kermesse ended", body = ErrorResponse),
        (status = 403, description = "Not the kermesse organizer", body = ErrorResponse),
    )
)]
pub async fn update_tombola(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<TombolaId>,
    Payload(req): Payload<UpdateTombolaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tombola = state.tombolas.update(&caller, id, req.into()).await?;
    Ok((StatusCode::ACCEPTED, Json(tombola)))
}

/// `PATCH /tombolas/{id}/end`: close sales and draw the winner.
///
/// # Errors
///
/// Returns [`ApiError::InvalidState`] when the tombola was already drawn.
#[utoipa::path(
    patch,
    path = "/api/v1/tombolas/{id}/end",
    tag = "Tombolas",
    summary = "Draw a tombola",
    description = "Ends ticket sales and marks exactly one uniformly drawn ticket as the winner. A tombola without tickets ends without a winner.",
    params(
        ("id" = i64, Path, description = "Tombola id"),
    ),
    responses(
        (status = 202, description = "Tombola drawn", body = TombolaDraw),
        (status = 400, description = "Tombola already ended", body = ErrorResponse),
        (status = 403, description = "Not the kermesse organizer", body = ErrorResponse),
    )
)]
pub async fn end_tombola(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<TombolaId>,
) -> Result<impl IntoResponse, ApiError> {
    let draw = state.tombolas.end(&caller, id).await?;
    Ok((StatusCode::ACCEPTED, Json(draw)))
}

/// Tombola routes mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tombolas", get(list_tombolas).post(create_tombola))
        .route("/tombolas/{id}", get(get_tombola).patch(update_tombola))
        .route("/tombolas/{id}/end", patch(end_tombola))
}
