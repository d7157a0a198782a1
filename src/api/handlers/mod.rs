//! REST endpoint handlers organized by resource.

pub mod interaction;
pub mod kermesse;
pub mod stand;
pub mod system;
pub mod ticket;
pub mod tombola;
pub mod user;
pub mod webhook;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(user::routes())
        .merge(stand::routes())
        .merge(kermesse::routes())
        .merge(interaction::routes())
        .merge(tombola::routes())
        .merge(ticket::routes())
}
