//! User accounts, roles and the authenticated caller.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::UserId;
use crate::error::ApiError;

/// Account role. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Creates kermesses, tombolas; invites participants and stands.
    Organizer,
    /// Owns a stand and grades its activities.
    StandHolder,
    /// Funds and invites children.
    Parent,
    /// Invited by a parent; spends tokens at stands and tombolas.
    Child,
}

impl Role {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Organizer => "ORGANIZER",
            Self::StandHolder => "STAND_HOLDER",
            Self::Parent => "PARENT",
            Self::Child => "CHILD",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ORGANIZER" => Ok(Self::Organizer),
            "STAND_HOLDER" => Ok(Self::StandHolder),
            "PARENT" => Ok(Self::Parent),
            "CHILD" => Ok(Self::Child),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A user account with its token wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct User {
    /// Account id.
    pub id: UserId,
    /// Parent account; only set for [`Role::Child`].
    pub parent_id: Option<UserId>,
    /// Display name.
    pub name: String,
    /// Unique login email.
    pub email: String,
    /// Account role.
    pub role: Role,
    /// Token balance.
    pub balance: i64,
}

/// Fields needed to create an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Parent account for invited children.
    pub parent_id: Option<UserId>,
    /// Display name.
    pub name: String,
    /// Unique login email.
    pub email: String,
    /// Account role.
    pub role: Role,
}

/// Identity of the authenticated user issuing a request.
///
/// Resolved once at the HTTP boundary and passed explicitly into every
/// service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    /// Authenticated user id.
    pub id: UserId,
    /// Role of that user.
    pub role: Role,
}

impl Caller {
    /// Creates a caller identity.
    #[must_use]
    pub const fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    /// Checks that the caller holds one of `allowed`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] otherwise.
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "role {} may not perform this action",
                self.role
            )))
        }
    }
}
