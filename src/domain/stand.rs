//! Stands (booths) and their inventory.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{KermesseId, StandId, UserId};

/// What a stand offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StandKind {
    /// Sells goods out of a finite stock, priced per unit.
    Sale,
    /// Runs a game for a flat fee; participants get graded.
    Activity,
}

impl StandKind {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sale => "SALE",
            Self::Activity => "ACTIVITY",
        }
    }
}

impl fmt::Display for StandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StandKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SALE" => Ok(Self::Sale),
            "ACTIVITY" => Ok(Self::Activity),
            other => Err(format!("unknown stand type: {other}")),
        }
    }
}

/// A stand record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Stand {
    /// Stand id.
    pub id: StandId,
    /// Stand holder who runs it.
    pub owner_id: UserId,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Sale or activity.
    #[serde(rename = "type")]
    pub kind: StandKind,
    /// Tokens per unit (sale) or per participation (activity).
    pub price: i64,
    /// Units left; only meaningful for [`StandKind::Sale`].
    pub stock: i64,
}

/// Fields needed to create a stand.
#[derive(Debug, Clone)]
pub struct NewStand {
    /// Stand holder.
    pub owner_id: UserId,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Sale or activity.
    pub kind: StandKind,
    /// Tokens per unit or per participation.
    pub price: i64,
    /// Initial stock.
    pub stock: i64,
}

/// Editable stand metadata. The kind is fixed at creation.
#[derive(Debug, Clone)]
pub struct StandUpdate {
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Tokens per unit or per participation.
    pub price: i64,
    /// Stock level to set.
    pub stock: i64,
}

/// Stand listing filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StandFilter {
    /// Only stands attached to this kermesse.
    pub kermesse_id: Option<KermesseId>,
    /// `Some(true)`: only stands free of any started kermesse;
    /// `Some(false)`: only stands currently taken.
    pub is_free: Option<bool>,
}
