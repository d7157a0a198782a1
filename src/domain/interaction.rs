//! Interactions: the append-only record of purchases and activity
//! participations.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{InteractionId, KermesseId, StandId, StandKind, Status, UserId};

/// Kind of interaction, fixed from the stand kind at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionKind {
    /// Purchase at a sale stand.
    Transaction,
    /// Participation in an activity, graded later by the stand holder.
    Activity,
}

impl InteractionKind {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transaction => "TRANSACTION",
            Self::Activity => "ACTIVITY",
        }
    }
}

impl From<StandKind> for InteractionKind {
    fn from(kind: StandKind) -> Self {
        match kind {
            StandKind::Sale => Self::Transaction,
            StandKind::Activity => Self::Activity,
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TRANSACTION" => Ok(Self::Transaction),
            "ACTIVITY" => Ok(Self::Activity),
            other => Err(format!("unknown interaction type: {other}")),
        }
    }
}

/// A recorded interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Interaction {
    /// Interaction id.
    pub id: InteractionId,
    /// Participant who paid.
    pub user_id: UserId,
    /// Stand visited.
    pub stand_id: StandId,
    /// Kermesse the stand belonged to at creation time.
    pub kermesse_id: KermesseId,
    /// Transaction or activity.
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    /// `None` for transactions; `Started` (awaiting grade) or `Ended`
    /// (graded) for activities.
    pub status: Option<Status>,
    /// Tokens moved from the participant to the stand holder.
    pub tokens: i64,
    /// Grade; zero until graded.
    pub points: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Fully validated interaction, ready to be applied atomically: the stock
/// decrement (when `quantity` is set), the debit of `tokens` from
/// `user_id`, the credit to `stand_owner_id`, and the record insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionPlan {
    /// Paying participant.
    pub user_id: UserId,
    /// Stand visited.
    pub stand_id: StandId,
    /// Owner credited with `tokens`.
    pub stand_owner_id: UserId,
    /// Kermesse the interaction belongs to.
    pub kermesse_id: KermesseId,
    /// Derived from the stand kind.
    pub kind: InteractionKind,
    /// Units taken from stock; `None` for activities.
    pub quantity: Option<i64>,
    /// Tokens to move.
    pub tokens: i64,
}

/// Interaction listing filter. All set fields must match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionFilter {
    /// Only interactions in this kermesse.
    pub kermesse_id: Option<KermesseId>,
    /// Only interactions by this user.
    pub user_id: Option<UserId>,
    /// Only interactions by this parent or by one of their children.
    pub family_of: Option<UserId>,
    /// Only interactions at stands owned by this user.
    pub stand_owner_id: Option<UserId>,
}
