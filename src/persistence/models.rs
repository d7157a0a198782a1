//! Database row models and their conversion into domain types.
//!
//! Enumerations are stored as `TEXT`; an unknown value coming back from
//! the database is a persistence error, not a client error.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::domain::{
    Interaction, InteractionId, Kermesse, KermesseId, Stand, StandId, Ticket, TicketId, Tombola,
    TombolaId, User, UserId,
};
use crate::error::ApiError;

/// Column list matching [`UserRow`].
pub(crate) const USER_COLUMNS: &str = "id, parent_id, name, email, role, balance";
/// Column list matching [`KermesseRow`].
pub(crate) const KERMESSE_COLUMNS: &str = "id, owner_id, name, description, status";
/// Column list matching [`StandRow`].
pub(crate) const STAND_COLUMNS: &str = "id, owner_id, name, description, kind, price, stock";
/// Column list matching [`InteractionRow`].
pub(crate) const INTERACTION_COLUMNS: &str =
    "id, user_id, stand_id, kermesse_id, kind, status, tokens, points, created_at";
/// Column list matching [`TombolaRow`].
pub(crate) const TOMBOLA_COLUMNS: &str = "id, kermesse_id, name, status, price, prize";
/// Column list matching [`TicketRow`].
pub(crate) const TICKET_COLUMNS: &str = "id, user_id, tombola_id, winner, created_at";

fn parse_column<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = String>,
{
    raw.parse().map_err(ApiError::Persistence)
}

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    /// Primary key.
    pub id: i64,
    /// Parent account, children only.
    pub parent_id: Option<i64>,
    /// Display name.
    pub name: String,
    /// Unique email.
    pub email: String,
    /// Role discriminator.
    pub role: String,
    /// Token balance.
    pub balance: i64,
}

impl TryFrom<UserRow> for User {
    type Error = ApiError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::new(row.id),
            parent_id: row.parent_id.map(UserId::new),
            name: row.name,
            email: row.email,
            role: parse_column(&row.role)?,
            balance: row.balance,
        })
    }
}

/// A row from the `kermesses` table.
#[derive(Debug, Clone, FromRow)]
pub struct KermesseRow {
    /// Primary key.
    pub id: i64,
    /// Organizer.
    pub owner_id: i64,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Status discriminator.
    pub status: String,
}

impl TryFrom<KermesseRow> for Kermesse {
    type Error = ApiError;

    fn try_from(row: KermesseRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: KermesseId::new(row.id),
            owner_id: UserId::new(row.owner_id),
            name: row.name,
            description: row.description,
            status: parse_column(&row.status)?,
        })
    }
}

/// A row from the `stands` table.
#[derive(Debug, Clone, FromRow)]
pub struct StandRow {
    /// Primary key.
    pub id: i64,
    /// Stand holder.
    pub owner_id: i64,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Kind discriminator.
    pub kind: String,
    /// Unit price.
    pub price: i64,
    /// Units left.
    pub stock: i64,
}

impl TryFrom<StandRow> for Stand {
    type Error = ApiError;

    fn try_from(row: StandRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: StandId::new(row.id),
            owner_id: UserId::new(row.owner_id),
            name: row.name,
            description: row.description,
            kind: parse_column(&row.kind)?,
            price: row.price,
            stock: row.stock,
        })
    }
}

/// A row from the `interactions` table.
#[derive(Debug, Clone, FromRow)]
pub struct InteractionRow {
    /// Primary key.
    pub id: i64,
    /// Paying participant.
    pub user_id: i64,
    /// Stand visited.
    pub stand_id: i64,
    /// Kermesse at creation time.
    pub kermesse_id: i64,
    /// Kind discriminator.
    pub kind: String,
    /// Grading status, activities only.
    pub status: Option<String>,
    /// Tokens moved.
    pub tokens: i64,
    /// Grade.
    pub points: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<InteractionRow> for Interaction {
    type Error = ApiError;

    fn try_from(row: InteractionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: InteractionId::new(row.id),
            user_id: UserId::new(row.user_id),
            stand_id: StandId::new(row.stand_id),
            kermesse_id: KermesseId::new(row.kermesse_id),
            kind: parse_column(&row.kind)?,
            status: row.status.as_deref().map(parse_column).transpose()?,
            tokens: row.tokens,
            points: row.points,
            created_at: row.created_at,
        })
    }
}

/// A row from the `tombolas` table.
#[derive(Debug, Clone, FromRow)]
pub struct TombolaRow {
    /// Primary key.
    pub id: i64,
    /// Owning kermesse.
    pub kermesse_id: i64,
    /// Display name.
    pub name: String,
    /// Status discriminator.
    pub status: String,
    /// Ticket price.
    pub price: i64,
    /// Prize description.
    pub prize: String,
}

impl TryFrom<TombolaRow> for Tombola {
    type Error = ApiError;

    fn try_from(row: TombolaRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: TombolaId::new(row.id),
            kermesse_id: KermesseId::new(row.kermesse_id),
            name: row.name,
            status: parse_column(&row.status)?,
            price: row.price,
            prize: row.prize,
        })
    }
}

/// A row from the `tickets` table.
#[derive(Debug, Clone, FromRow)]
pub struct TicketRow {
    /// Primary key.
    pub id: i64,
    /// Holder.
    pub user_id: i64,
    /// Tombola entered.
    pub tombola_id: i64,
    /// Winning flag.
    pub winner: bool,
    /// Purchase time.
    pub created_at: DateTime<Utc>,
}

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        Self {
            id: TicketId::new(row.id),
            user_id: UserId::new(row.user_id),
            tombola_id: TombolaId::new(row.tombola_id),
            winner: row.winner,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Role, StandKind, Status};

    #[test]
    fn user_row_converts_role_and_parent() {
        let row = UserRow {
            id: 4,
            parent_id: Some(2),
            name: "Lea".to_string(),
            email: "lea@example.org".to_string(),
            role: "CHILD".to_string(),
            balance: 12,
        };
        let Ok(user) = User::try_from(row) else {
            panic!("valid row");
        };
        assert_eq!(user.role, Role::Child);
        assert_eq!(user.parent_id, Some(UserId::new(2)));
    }

    #[test]
    fn unknown_discriminator_is_a_persistence_error() {
        let row = StandRow {
            id: 1,
            owner_id: 1,
            name: "Crêpes".to_string(),
            description: String::new(),
            kind: "LOTTERY".to_string(),
            price: 2,
            stock: 10,
        };
        assert!(matches!(Stand::try_from(row), Err(ApiError::Persistence(_))));
    }

    #[test]
    fn transaction_rows_have_no_status() {
        let row = InteractionRow {
            id: 9,
            user_id: 1,
            stand_id: 2,
            kermesse_id: 3,
            kind: "TRANSACTION".to_string(),
            status: None,
            tokens: 30,
            points: 0,
            created_at: Utc::now(),
        };
        let Ok(interaction) = Interaction::try_from(row) else {
            panic!("valid row");
        };
        assert_eq!(interaction.status, None);

        let row = KermesseRow {
            id: 3,
            owner_id: 1,
            name: "Fête".to_string(),
            description: String::new(),
            status: "ENDED".to_string(),
        };
        assert!(matches!(Kermesse::try_from(row), Ok(k) if k.status == Status::Ended));
        assert_eq!("SALE".parse::<StandKind>(), Ok(StandKind::Sale));
    }
}
