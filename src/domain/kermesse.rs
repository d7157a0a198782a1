//! Kermesse (school fair) aggregate and its listing scope.

use serde::Serialize;
use utoipa::ToSchema;

use super::{KermesseId, Status, UserId};

/// A kermesse. Status moves `Started -> Ended` once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Kermesse {
    /// Kermesse id.
    pub id: KermesseId,
    /// Organizer who owns it.
    pub owner_id: UserId,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Lifecycle status.
    pub status: Status,
}

impl Kermesse {
    /// `true` when `user` organizes this kermesse.
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner_id == user
    }
}

/// Fields needed to open a kermesse.
#[derive(Debug, Clone)]
pub struct NewKermesse {
    /// Organizer.
    pub owner_id: UserId,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
}

/// Which kermesses a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KermesseScope {
    /// Kermesses organized by this user.
    OwnedBy(UserId),
    /// Kermesses this user was invited to.
    ParticipatedBy(UserId),
    /// Kermesses holding at least one stand owned by this user.
    HostingStandsOf(UserId),
}
