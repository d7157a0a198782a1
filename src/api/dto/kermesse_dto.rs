//! DTOs for kermesse endpoints.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::{StandId, UserId};

/// Request body for `POST /kermesses` and `PATCH /kermesses/{id}`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct KermesseRequest {
    /// Display name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
}

/// Request body for `POST /kermesses/{id}/participant`.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct AddParticipantRequest {
    /// Child to invite; their parent joins too.
    pub user_id: UserId,
}

/// Request body for `POST /kermesses/{id}/stand`.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct AddStandRequest {
    /// Stand to attach.
    pub stand_id: StandId,
}
