//! Kermesse handlers: lifecycle, participants and stand attachment.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};

use crate::api::dto::{AddParticipantRequest, AddStandRequest, KermesseRequest};
use crate::api::extract::{PathParam, Payload};
use crate::app_state::AppState;
use crate::domain::{Caller, Kermesse, KermesseId, User};
use crate::error::{ApiError, ErrorResponse};

/// `POST /kermesses`: open a kermesse.
///
/// # Errors
///
/// Returns [`ApiError::Forbidden`] unless the caller is an organizer.
#[utoipa::path(
    post,
    path = "/api/v1/kermesses",
    tag = "Kermesses",
    summary = "Create a kermesse",
    description = "Opens a kermesse owned by the calling organizer. It starts in STARTED status.",
    request_body = KermesseRequest,
    responses(
        (status = 201, description = "Kermesse created", body = Kermesse),
        (status = 403, description = "Caller is not an organizer", body = ErrorResponse),
    )
)]
pub async fn create_kermesse(
    State(state): State<AppState>,
    caller: Caller,
    Payload(req): Payload<KermesseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let kermesse = state
        .kermesses
        .create(&caller, &req.name, &req.description)
        .await?;
    Ok((StatusCode::CREATED, Json(kermesse)))
}

/// `GET /kermesses`: kermesses relevant to the caller.
///
/// # Errors
///
/// Returns [`ApiError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/kermesses",
    tag = "Kermesses",
    summary = "List my kermesses",
    description = "Organizers see the kermesses they own, parents and children those they take part in, stand holders those hosting one of their stands.",
    responses(
        (status = 200, description = "Kermesses", body = Vec<Kermesse>),
    )
)]
pub async fn list_kermesses(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.kermesses.list(&caller).await?))
}

/// `GET /kermesses/{id}`: look up a kermesse.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/api/v1/kermesses/{id}",
    tag = "Kermesses",
    summary = "Get a kermesse",
    params(
        ("id" = i64, Path, description = "Kermesse id"),
    ),
    responses(
        (status = 200, description = "Kermesse", body = Kermesse),
        (status = 404, description = "Kermesse not found", body = ErrorResponse),
    )
)]
pub async fn get_kermesse(
    State(state): State<AppState>,
    _caller: Caller,
    PathParam(id): PathParam<KermesseId>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.kermesses.get(id).await?))
}

/// `PATCH /kermesses/{id}`: rename a running kermesse.
///
/// # Errors
///
/// Returns [`ApiError`] once ended or for anyone but the owner.
#[utoipa::path(
    patch,
    path = "/api/v1/kermesses/{id}",
    tag = "Kermesses",
    summary = "Edit a kermesse",
    request_body = KermesseRequest,
    params(
        ("id" = i64, Path, description = "Kermesse id"),
    ),
    responses(
        (status = 202, description = "Kermesse updated", body = Kermesse),
        (status = 400, description = "Kermesse already ended", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
    )
)]
pub async fn update_kermesse(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<KermesseId>,
    Payload(req): Payload<KermesseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let kermesse = state
        .kermesses
        .update(&caller, id, &req.name, &req.description)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(kermesse)))
}

/// `GET /kermesses/{id}/invitable`: children not yet taking part.
///
/// # Errors
///
/// Returns [`ApiError::Forbidden`] for anyone but the owner.
#[utoipa::path(
    get,
    path = "/api/v1/kermesses/{id}/invitable",
    tag = "Kermesses",
    summary = "List invitable children",
    params(
        ("id" = i64, Path, description = "Kermesse id"),
    ),
    responses(
        (status = 200, description = "Children who can still be invited", body = Vec<User>),
        (status = 403, description = "Not the owner", body = ErrorResponse),
    )
)]
pub async fn invitable_children(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<KermesseId>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.kermesses.invitable_children(&caller, id).await?))
}

/// `POST /kermesses/{id}/participant`: invite a child and their parent.
///
/// # Errors
///
/// Returns [`ApiError`] once ended, for a non-child user or for anyone but
/// the owner.
#[utoipa::path(
    post,
    path = "/api/v1/kermesses/{id}/participant",
    tag = "Kermesses",
    summary = "Add a participant",
    description = "Adds a child and their parent to the kermesse. Adding an existing participant again is a no-op.",
    request_body = AddParticipantRequest,
    params(
        ("id" = i64, Path, description = "Kermesse id"),
    ),
    responses(
        (status = 202, description = "Participant added"),
        (status = 400, description = "Kermesse ended or user is not a child", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Kermesse or user not found", body = ErrorResponse),
    )
)]
pub async fn add_participant(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<KermesseId>,
    Payload(req): Payload<AddParticipantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .kermesses
        .add_participant(&caller, id, req.user_id)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// `POST /kermesses/{id}/stand`: attach a stand.
///
/// # Errors
///
/// Returns [`ApiError`] once ended, when the stand already serves another
/// running kermesse, or for anyone but the owner.
#[utoipa::path(
    post,
    path = "/api/v1/kermesses/{id}/stand",
    tag = "Kermesses",
    summary = "Attach a stand",
    description = "Attaches a stand to the kermesse. A stand serves at most one running kermesse at a time.",
    request_body = AddStandRequest,
    params(
        ("id" = i64, Path, description = "Kermesse id"),
    ),
    responses(
        (status = 202, description = "Stand attached"),
        (status = 400, description = "Kermesse ended or stand already taken", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Kermesse or stand not found", body = ErrorResponse),
    )
)]
pub async fn add_stand(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<KermesseId>,
    Payload(req): Payload<AddStandRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.kermesses.add_stand(&caller, id, req.stand_id).await?;
    Ok(StatusCode::ACCEPTED)
}

/// `PATCH /kermesses/{id}/end`: close a kermesse.
///
/// # Errors
///
/// Returns [`ApiError::InvalidState`] when already ended or a tombola is
/// still open.
#[utoipa::path(
    patch,
    path = "/api/v1/kermesses/{id}/end",
    tag = "Kermesses",
    summary = "End a kermesse",
    description = "Moves the kermesse to ENDED. Refused while one of its tombolas is still open.",
    params(
        ("id" = i64, Path, description = "Kermesse id"),
    ),
    responses(
        (status = 202, description = "Kermesse ended", body = Kermesse),
        (status = 400, description = "Already ended or tombola still open", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
    )
)]
pub async fn end_kermesse(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<KermesseId>,
) -> Result<impl IntoResponse, ApiError> {
    let kermesse = state.kermesses.end(&caller, id).await?;
    Ok((StatusCode::ACCEPTED, Json(kermesse)))
}

/// Kermesse routes mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/kermesses", get(list_kermesses).post(create_kermesse))
        .route("/kermesses/{id}", get(get_kermesse).patch(update_kermesse))
        .route("/kermesses/{id}/invitable", get(invitable_children))
        .route("/kermesses/{id}/participant", post(add_participant))
        .route("/kermesses/{id}/stand", post(add_stand))
        .route("/kermesses/{id}/end", patch(end_kermesse))
}
