//! DTOs for account and wallet endpoints.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::{Role, UserId};

/// Request body for `POST /register`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Display name.
    pub name: String,
    /// Login email, unique across accounts.
    pub email: String,
    /// Any role but `CHILD`.
    pub role: Role,
}

/// Request body for `POST /users/invite`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct InviteRequest {
    /// Display name of the child.
    pub name: String,
    /// Login email of the child.
    pub email: String,
}

/// Request body for `PATCH /users/distribute`.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct DistributeRequest {
    /// Child receiving the tokens.
    pub child_id: UserId,
    /// Tokens to move from the parent to the child.
    pub amount: i64,
}
