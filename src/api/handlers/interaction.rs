//! Interaction handlers: purchases, activity participation and grading.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{CreateInteractionRequest, GradeRequest, InteractionListParams};
use crate::api::extract::{PathParam, Payload, QueryParams};
use crate::app_state::AppState;
use crate::domain::{Caller, Interaction, InteractionId};
use crate::error::{ApiError, ErrorResponse};

/// `POST /interactions`: buy at a stand or join an activity.
///
/// # Errors
///
/// Returns [`ApiError`] when the caller is not taking part in the stand's
/// kermesse, or lacks tokens or stock.
#[utoipa::path(
    post,
    path = "/api/v1/interactions",
    tag = "Interactions",
    summary = "Create an interaction",
    description = "Pays a stand: a sale takes `quantity` units from stock at `price` each, an activity costs its flat price. Tokens move from the caller to the stand holder atomically.",
    request_body = CreateInteractionRequest,
    responses(
        (status = 201, description = "Interaction recorded", body = Interaction),
        (status = 400, description = "Bad quantity, insufficient tokens or stock", body = ErrorResponse),
        (status = 403, description = "Caller not taking part in the stand's kermesse", body = ErrorResponse),
        (status = 404, description = "Stand not found", body = ErrorResponse),
    )
)]
pub async fn create_interaction(
    State(state): State<AppState>,
    caller: Caller,
    Payload(req): Payload<CreateInteractionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let interaction = state
        .interactions
        .create(&caller, req.stand_id, req.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(interaction)))
}

/// `GET /interactions`: interactions visible to the caller.
///
/// # Errors
///
/// Returns [`ApiError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/interactions",
    tag = "Interactions",
    summary = "List interactions",
    description = "Parents see their own and their children's interactions, children their own, stand holders those at their stands.",
    params(InteractionListParams),
    responses(
        (status = 200, description = "Interactions, newest first", body = Vec<Interaction>),
    )
)]
pub async fn list_interactions(
    State(state): State<AppState>,
    caller: Caller,
    QueryParams(params): QueryParams<InteractionListParams>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(
        state
            .interactions
            .list(&caller, params.kermesse_id)
            .await?,
    ))
}

/// `GET /interactions/{id}`: look up an interaction.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/api/v1/interactions/{id}",
    tag = "Interactions",
    summary = "Get an interaction",
    params(
        ("id" = i64, Path, description = "Interaction id"),
    ),
    responses(
        (status = 200, description = "Interaction", body = Interaction),
        (status = 404, description = "Interaction not found", body = ErrorResponse),
    )
)]
pub async fn get_interaction(
    State(state): State<AppState>,
    _caller: Caller,
    PathParam(id): PathParam<InteractionId>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.interactions.get(id).await?))
}

/// `PATCH /interactions/{id}`: grade an activity.
///
/// # Errors
///
/// Returns [`ApiError`] for a transaction, an ended kermesse or anyone but
/// the stand holder.
#[utoipa::path(
    patch,
    path = "/api/v1/interactions/{id}",
    tag = "Interactions",
    summary = "Grade an activity",
    request_body = GradeRequest,
    params(
        ("id" = i64, Path, description = "Interaction id"),
    ),
    responses(
        (status = 202, description = "Activity graded", body = Interaction),
        (status = 400, description = "Not an activity, or kermesse ended", body = ErrorResponse),
        (status = 403, description = "Not the stand holder", body = ErrorResponse),
    )
)]
pub async fn grade_interaction(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<InteractionId>,
    Payload(req): Payload<GradeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let interaction = state.interactions.grade(&caller, id, req.points).await?;
    Ok((StatusCode::ACCEPTED, Json(interaction)))
}

/// Interaction routes mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/interactions",
            get(list_interactions).post(create_interaction),
        )
        .route(
            "/interactions/{id}",
            get(get_interaction).patch(grade_interaction),
        )
}
