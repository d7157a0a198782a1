//! DTOs for interaction endpoints.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::domain::{KermesseId, StandId};

/// Request body for `POST /interactions`.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct CreateInteractionRequest {
    /// Stand visited.
    pub stand_id: StandId,
    /// Units bought. Required by sale stands, ignored by activities.
    #[serde(default)]
    pub quantity: Option<i64>,
}

/// Request body for `PATCH /interactions/{id}`.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct GradeRequest {
    /// Grade awarded by the stand holder.
    pub points: i64,
}

/// Query parameters for `GET /interactions`.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InteractionListParams {
    /// Only interactions of this kermesse.
    pub kermesse_id: Option<KermesseId>,
}
