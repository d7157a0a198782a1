//! Tombolas (raffles), their tickets and the winner draw.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::Serialize;
use utoipa::ToSchema;

use super::{KermesseId, Status, TicketId, TombolaId, UserId};

/// A tombola attached to a kermesse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Tombola {
    /// Tombola id.
    pub id: TombolaId,
    /// Kermesse it belongs to.
    pub kermesse_id: KermesseId,
    /// Display name.
    pub name: String,
    /// `Started` while tickets are on sale, `Ended` once drawn.
    pub status: Status,
    /// Tokens per ticket.
    pub price: i64,
    /// Prize description.
    pub prize: String,
}

/// Fields needed to open a tombola.
#[derive(Debug, Clone)]
pub struct NewTombola {
    /// Kermesse it belongs to.
    pub kermesse_id: KermesseId,
    /// Display name.
    pub name: String,
    /// Tokens per ticket.
    pub price: i64,
    /// Prize description.
    pub prize: String,
}

/// Editable tombola fields.
#[derive(Debug, Clone)]
pub struct TombolaUpdate {
    /// Display name.
    pub name: String,
    /// Tokens per ticket.
    pub price: i64,
    /// Prize description.
    pub prize: String,
}

/// A raffle ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Ticket {
    /// Ticket id.
    pub id: TicketId,
    /// Holder.
    pub user_id: UserId,
    /// Tombola entered.
    pub tombola_id: TombolaId,
    /// Set on exactly one ticket when the tombola is drawn.
    pub winner: bool,
    /// Purchase time.
    pub created_at: DateTime<Utc>,
}

/// Outcome of closing a tombola.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TombolaDraw {
    /// The tombola, now `Ended`.
    pub tombola: Tombola,
    /// Winning ticket; `None` when no ticket was sold.
    pub winner: Option<Ticket>,
}

/// Which tickets a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketScope {
    /// Tickets of tombolas in kermesses organized by this user.
    OrganizedBy(UserId),
    /// Tickets held by this parent or by one of their children.
    FamilyOf(UserId),
    /// Tickets held by this user.
    HeldBy(UserId),
}

/// Chooses the winning ticket among all tickets of a tombola.
///
/// Called by the store with the ticket ids read inside the closing
/// transaction.
pub trait WinnerPicker: Send + Sync + fmt::Debug {
    /// Returns the winning ticket, or `None` when `tickets` is empty.
    fn pick(&self, tickets: &[TicketId]) -> Option<TicketId>;
}

/// Uniformly random draw backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPicker;

impl WinnerPicker for RandomPicker {
    fn pick(&self, tickets: &[TicketId]) -> Option<TicketId> {
        tickets.choose(&mut rand::thread_rng()).copied()
    }
}
