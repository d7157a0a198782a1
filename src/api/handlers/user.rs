//! Account and wallet handlers: registration, profile, children and
//! token distribution.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};

use crate::api::dto::{DistributeRequest, InviteRequest, RegisterRequest};
use crate::api::extract::{PathParam, Payload};
use crate::app_state::AppState;
use crate::domain::{Caller, User, UserId};
use crate::error::{ApiError, ErrorResponse};

/// `POST /register`: create an account.
///
/// # Errors
///
/// Returns [`ApiError`] on invalid input or a duplicate email.
#[utoipa::path(
    post,
    path = "/register",
    tag = "Users",
    summary = "Register an account",
    description = "Creates an organizer, stand holder or parent account with an empty wallet. Children are invited by their parent instead.",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = User),
        (status = 400, description = "Invalid input or CHILD role", body = ErrorResponse),
        (status = 409, description = "Email already used", body = ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Payload(req): Payload<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.users.register(&req.name, &req.email, req.role).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /me`: the authenticated account.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] without a valid caller.
#[utoipa::path(
    get,
    path = "/me",
    tag = "Users",
    summary = "Current account",
    description = "Returns the account of the caller, including its token balance.",
    responses(
        (status = 200, description = "Caller account", body = User),
        (status = 401, description = "Missing or unknown caller", body = ErrorResponse),
    )
)]
pub async fn me(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.users.me(&caller).await?))
}

/// `GET /users/{id}`: look up an account.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "Users",
    summary = "Get an account",
    params(
        ("id" = i64, Path, description = "User id"),
    ),
    responses(
        (status = 200, description = "Account", body = User),
        (status = 404, description = "User not found", body = ErrorResponse),
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    _caller: Caller,
    PathParam(id): PathParam<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.users.get(id).await?))
}

/// `GET /users/children`: the caller's children.
///
/// # Errors
///
/// Returns [`ApiError::Forbidden`] unless the caller is a parent.
#[utoipa::path(
    get,
    path = "/api/v1/users/children",
    tag = "Users",
    summary = "List my children",
    responses(
        (status = 200, description = "Children of the caller", body = Vec<User>),
        (status = 403, description = "Caller is not a parent", body = ErrorResponse),
    )
)]
pub async fn list_children(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.users.children(&caller).await?))
}

/// `POST /users/invite`: create a child account under the caller.
///
/// # Errors
///
/// Returns [`ApiError`] on invalid input, a wrong role or a duplicate email.
#[utoipa::path(
    post,
    path = "/api/v1/users/invite",
    tag = "Users",
    summary = "Invite a child",
    description = "Creates a CHILD account whose parent is the caller.",
    request_body = InviteRequest,
    responses(
        (status = 201, description = "Child created", body = User),
        (status = 403, description = "Caller is not a parent", body = ErrorResponse),
        (status = 409, description = "Email already used", body = ErrorResponse),
    )
)]
pub async fn invite_child(
    State(state): State<AppState>,
    caller: Caller,
    Payload(req): Payload<InviteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let child = state
        .users
        .invite_child(&caller, &req.name, &req.email)
        .await?;
    Ok((StatusCode::CREATED, Json(child)))
}

/// `PATCH /users/distribute`: move tokens from the caller to a child.
///
/// # Errors
///
/// Returns [`ApiError`] when the child is not the caller's or the parent
/// cannot cover the amount.
#[utoipa::path(
    patch,
    path = "/api/v1/users/distribute",
    tag = "Users",
    summary = "Give tokens to a child",
    description = "Debits the calling parent and credits one of their children in a single transaction.",
    request_body = DistributeRequest,
    responses(
        (status = 202, description = "Tokens transferred"),
        (status = 400, description = "Invalid amount or insufficient tokens", body = ErrorResponse),
        (status = 403, description = "Not the parent of this child", body = ErrorResponse),
    )
)]
pub async fn distribute(
    State(state): State<AppState>,
    caller: Caller,
    Payload(req): Payload<DistributeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .users
        .distribute(&caller, req.child_id, req.amount)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// Routes mounted at the root level.
pub fn root_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/me", get(me))
}

/// User routes mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/children", get(list_children))
        .route("/users/invite", post(invite_child))
        .route("/users/distribute", patch(distribute))
        .route("/users/{id}", get(get_user))
}
