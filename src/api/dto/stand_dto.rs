//! DTOs for stand endpoints.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::domain::{KermesseId, StandFilter, StandKind, StandUpdate};

/// Request body for `POST /stands`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateStandRequest {
    /// Display name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// `SALE` or `ACTIVITY`; fixed for the life of the stand.
    #[serde(rename = "type")]
    pub kind: StandKind,
    /// Tokens per unit or per participation.
    pub price: i64,
    /// Initial stock. Ignored by activities.
    #[serde(default)]
    pub stock: i64,
}

impl CreateStandRequest {
    /// Splits the request into the kind and the editable fields.
    #[must_use]
    pub fn into_parts(self) -> (StandKind, StandUpdate) {
        (
            self.kind,
            StandUpdate {
                name: self.name,
                description: self.description,
                price: self.price,
                stock: self.stock,
            },
        )
    }
}

/// Request body for `PATCH /stands/{id}` and `PATCH /stands/current`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateStandRequest {
    /// Display name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Tokens per unit or per participation.
    pub price: i64,
    /// Stock level to set.
    #[serde(default)]
    pub stock: i64,
}

impl From<UpdateStandRequest> for StandUpdate {
    fn from(req: UpdateStandRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            price: req.price,
            stock: req.stock,
        }
    }
}

/// Query parameters for `GET /stands`.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StandListParams {
    /// Only stands attached to this kermesse.
    pub kermesse_id: Option<KermesseId>,
    /// `true` for stands not attached to any running kermesse, `false`
    /// for stands that are.
    pub is_free: Option<bool>,
}

impl From<StandListParams> for StandFilter {
    fn from(params: StandListParams) -> Self {
        Self {
            kermesse_id: params.kermesse_id,
            is_free: params.is_free,
        }
    }
}
