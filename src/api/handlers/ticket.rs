//! Ticket handlers: purchase and role-scoped listing.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::BuyTicketRequest;
use crate::api::extract::{PathParam, Payload};
use crate::app_state::AppState;
use crate::domain::{Caller, Ticket, TicketId};
use crate::error::{ApiError, ErrorResponse};

/// `POST /tickets`: buy a ticket.
///
/// # Errors
///
/// Returns [`ApiError`] when the tombola ended, the caller lacks tokens or
/// does not take part in the kermesse.
#[utoipa::path(
    post,
    path = "/api/v1/tickets",
    tag = "Tickets",
    summary = "Buy a ticket",
    description = "Debits the tombola price from the caller and issues one ticket.",
    request_body = BuyTicketRequest,
    responses(
        (status = 201, description = "Ticket issued", body = Ticket),
        (status = 400, description = "Tombola ended or insufficient tokens", body = ErrorResponse),
        (status = 403, description = "Caller not taking part in the kermesse", body = ErrorResponse),
        (status = 404, description = "Tombola not found", body = ErrorResponse),
    )
)]
pub async fn buy_ticket(
    State(state): State<AppState>,
    caller: Caller,
    Payload(req): Payload<BuyTicketRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ticket = state.tombolas.buy_ticket(&caller, req.tombola_id).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// `GET /tickets`: tickets visible to the caller.
///
/// # Errors
///
/// Returns [`ApiError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/tickets",
    tag = "Tickets",
    summary = "List tickets",
    description = "Organizers see tickets of their kermesses, parents their own and their children's, children their own.",
    responses(
        (status = 200, description = "Tickets, newest first", body = Vec<Ticket>),
    )
)]
pub async fn list_tickets(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.tombolas.list_tickets(&caller).await?))
}

/// `GET /tickets/{id}`: look up a ticket.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/api/v1/tickets/{id}",
    tag = "Tickets",
    summary = "Get a ticket",
    params(
        ("id" = i64, Path, description = "Ticket id"),
    ),
    responses(
        (status = 200, description = "Ticket", body = Ticket),
        (status = 404, description = "Ticket not found", body = ErrorResponse),
    )
)]
pub async fn get_ticket(
    State(state): State<AppState>,
    _caller: Caller,
    PathParam(id): PathParam<TicketId>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.tombolas.get_ticket(id).await?))
}

/// Ticket routes mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tickets", get(list_tickets).post(buy_ticket))
        .route("/tickets/{id}", get(get_ticket))
}
