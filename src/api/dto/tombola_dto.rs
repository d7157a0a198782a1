//! DTOs for tombola and ticket endpoints.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::domain::{KermesseId, TombolaId, TombolaUpdate};

/// Request body for `POST /tombolas`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateTombolaRequest {
    /// Kermesse hosting the draw.
    pub kermesse_id: KermesseId,
    /// Display name.
    pub name: String,
    /// Tokens per ticket.
    pub price: i64,
    /// Prize description.
    #[serde(default)]
    pub prize: String,
}

impl CreateTombolaRequest {
    /// Splits the request into the kermesse and the editable fields.
    #[must_use]
    pub fn into_parts(self) -> (KermesseId, TombolaUpdate) {
        (
            self.kermesse_id,
            TombolaUpdate {
                name: self.name,
                price: self.price,
                prize: self.prize,
            },
        )
    }
}

/// Request body for `PATCH /tombolas/{id}`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateTombolaRequest {
    /// Display name.
    pub name: String,
    /// Tokens per ticket.
    pub price: i64,
    /// Prize description.
    #[serde(default)]
    pub prize: String,
}

impl From<UpdateTombolaRequest> for TombolaUpdate {
    fn from(req: UpdateTombolaRequest) -> Self {
        Self {
            name: req.name,
            price: req.price,
            prize: req.prize,
        }
    }
}

/// Query parameters for `GET /tombolas`.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TombolaListParams {
    /// Only tombolas of this kermesse.
    pub kermesse_id: Option<KermesseId>,
}

/// Request body for `POST /tickets`.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct BuyTicketRequest {
    /// Tombola to enter.
    pub tombola_id: TombolaId,
}
