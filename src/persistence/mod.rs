//! Persistence layer: store traits plus PostgreSQL and in-memory
//! implementations.
//!
//! Every method that touches more than one row is atomic: either all of
//! its writes become visible or none do. Debits are conditional
//! (`balance >= amount`, `stock >= quantity`) and evaluated at write
//! time, so two concurrent requests cannot both spend the same tokens.
//! The services still pre-check the same rules to fail fast with a
//! precise error, but correctness never depends on those reads.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;

use crate::domain::{
    Interaction, InteractionFilter, InteractionId, InteractionPlan, Kermesse, KermesseId,
    KermesseScope, NewKermesse, NewStand, NewTombola, NewUser, Stand, StandFilter, StandId,
    StandUpdate, Ticket, TicketId, TicketScope, Tombola, TombolaDraw, TombolaId, TombolaUpdate,
    User, UserId, WinnerPicker,
};
use crate::error::ApiError;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// User accounts and the wallet ledger.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a new account with a zero balance.
    ///
    /// # Errors
    ///
    /// [`ApiError::EmailAlreadyExists`] on duplicate email.
    async fn create_user(&self, new: NewUser) -> Result<User, ApiError>;

    /// Looks up an account.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn find_user(&self, id: UserId) -> Result<Option<User>, ApiError>;

    /// Looks up an account by email.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError>;

    /// Lists the children of a parent account.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn list_children(&self, parent: UserId) -> Result<Vec<User>, ApiError>;

    /// Applies a signed `delta` to a wallet and returns the updated user.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] for an unknown user,
    /// [`ApiError::InsufficientTokens`] when the balance would drop
    /// below zero.
    async fn adjust_balance(&self, id: UserId, delta: i64) -> Result<User, ApiError>;

    /// Moves `amount` tokens from `from` to `to` in one transaction.
    ///
    /// # Errors
    ///
    /// [`ApiError::InsufficientTokens`] when `from` cannot cover the
    /// amount, [`ApiError::NotFound`] for an unknown account.
    async fn transfer_balance(&self, from: UserId, to: UserId, amount: i64) -> Result<(), ApiError>;
}

/// Stand records and inventory.
#[async_trait]
pub trait StandStore: Send + Sync {
    /// Inserts a stand.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn create_stand(&self, new: NewStand) -> Result<Stand, ApiError>;

    /// Looks up a stand.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn find_stand(&self, id: StandId) -> Result<Option<Stand>, ApiError>;

    /// Looks up the stand run by `owner`, the oldest first if several.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn find_stand_by_owner(&self, owner: UserId) -> Result<Option<Stand>, ApiError>;

    /// Overwrites the editable fields of a stand.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] for an unknown stand.
    async fn update_stand(&self, id: StandId, update: StandUpdate) -> Result<Stand, ApiError>;

    /// Lists stands matching `filter`, by id.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn list_stands(&self, filter: StandFilter) -> Result<Vec<Stand>, ApiError>;
}

/// Kermesse lifecycle and membership.
#[async_trait]
pub trait KermesseStore: Send + Sync {
    /// Inserts a kermesse in `Started` status.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn create_kermesse(&self, new: NewKermesse) -> Result<Kermesse, ApiError>;

    /// Looks up a kermesse.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn find_kermesse(&self, id: KermesseId) -> Result<Option<Kermesse>, ApiError>;

    /// Renames / re-describes a kermesse that has not ended.
    ///
    /// # Errors
    ///
    /// [`ApiError::InvalidState`] once ended, [`ApiError::NotFound`] for
    /// an unknown kermesse.
    async fn update_kermesse(
        &self,
        id: KermesseId,
        name: String,
        description: String,
    ) -> Result<Kermesse, ApiError>;

    /// Lists kermesses visible in `scope`, by id.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn list_kermesses(&self, scope: KermesseScope) -> Result<Vec<Kermesse>, ApiError>;

    /// Child accounts not yet invited to the kermesse.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn list_invitable_children(&self, id: KermesseId) -> Result<Vec<User>, ApiError>;

    /// Enrolls every user of `users` in one transaction. Users already
    /// enrolled are skipped.
    ///
    /// # Errors
    ///
    /// [`ApiError::InvalidState`] when the kermesse is not `Started`;
    /// nothing is enrolled in that case.
    async fn add_participants(&self, id: KermesseId, users: &[UserId]) -> Result<(), ApiError>;

    /// `true` when `user` is enrolled in `id` and `id` is `Started`.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn is_active_participant(&self, id: KermesseId, user: UserId) -> Result<bool, ApiError>;

    /// `true` when `stand` is attached to a `Started` kermesse other than
    /// `except`.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn stand_is_taken(&self, stand: StandId, except: KermesseId) -> Result<bool, ApiError>;

    /// Attaches a stand, re-checking at write time that no other started
    /// kermesse holds it.
    ///
    /// # Errors
    ///
    /// [`ApiError::InvalidState`] when the stand is taken or the
    /// kermesse is not `Started`.
    async fn attach_stand(&self, id: KermesseId, stand: StandId) -> Result<(), ApiError>;

    /// The started kermesse that holds `stand` and has `user` as
    /// participant, if any.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn active_kermesse_for(
        &self,
        user: UserId,
        stand: StandId,
    ) -> Result<Option<KermesseId>, ApiError>;

    /// `true` when a tombola of the kermesse is still `Started`.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn has_open_tombola(&self, id: KermesseId) -> Result<bool, ApiError>;

    /// Flips `Started -> Ended`, atomically re-checking that no tombola
    /// of the kermesse is still open.
    ///
    /// # Errors
    ///
    /// [`ApiError::InvalidState`] when already ended or a tombola is
    /// open, [`ApiError::NotFound`] for an unknown kermesse.
    async fn end_kermesse(&self, id: KermesseId) -> Result<Kermesse, ApiError>;
}

/// Interaction records and the purchase / participation transaction.
#[async_trait]
pub trait InteractionStore: Send + Sync {
    /// Applies `plan` as one unit: conditional stock decrement,
    /// conditional debit of the participant, credit of the stand holder,
    /// record insert.
    ///
    /// # Errors
    ///
    /// [`ApiError::InsufficientStock`] / [`ApiError::InsufficientTokens`]
    /// when a conditional write fails; no effect remains in that case.
    async fn create_interaction(&self, plan: InteractionPlan) -> Result<Interaction, ApiError>;

    /// Looks up an interaction.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn find_interaction(&self, id: InteractionId) -> Result<Option<Interaction>, ApiError>;

    /// Marks an activity as graded with `points`.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] for an unknown interaction.
    async fn grade_interaction(
        &self,
        id: InteractionId,
        points: i64,
    ) -> Result<Interaction, ApiError>;

    /// Lists interactions matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn list_interactions(
        &self,
        filter: InteractionFilter,
    ) -> Result<Vec<Interaction>, ApiError>;
}

/// Tombolas, tickets and the draw.
#[async_trait]
pub trait TombolaStore: Send + Sync {
    /// Inserts a `Started` tombola, provided its kermesse is `Started`
    /// at write time.
    ///
    /// # Errors
    ///
    /// [`ApiError::InvalidState`] when the kermesse has ended.
    async fn create_tombola(&self, new: NewTombola) -> Result<Tombola, ApiError>;

    /// Looks up a tombola.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn find_tombola(&self, id: TombolaId) -> Result<Option<Tombola>, ApiError>;

    /// Overwrites the editable fields of a tombola.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] for an unknown tombola.
    async fn update_tombola(
        &self,
        id: TombolaId,
        update: TombolaUpdate,
    ) -> Result<Tombola, ApiError>;

    /// Lists tombolas, optionally of one kermesse, by id.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn list_tombolas(&self, kermesse: Option<KermesseId>) -> Result<Vec<Tombola>, ApiError>;

    /// Debits `price` from `user` and inserts a ticket, as one unit and
    /// only while the tombola is `Started`.
    ///
    /// # Errors
    ///
    /// [`ApiError::InsufficientTokens`] or [`ApiError::InvalidState`]
    /// (tombola ended); no effect remains in either case.
    async fn issue_ticket(
        &self,
        user: UserId,
        tombola: TombolaId,
        price: i64,
    ) -> Result<Ticket, ApiError>;

    /// Flips the tombola to `Ended` and marks the ticket chosen by
    /// `picker` as winner, in one transaction.
    ///
    /// # Errors
    ///
    /// [`ApiError::InvalidState`] when already ended,
    /// [`ApiError::NotFound`] for an unknown tombola.
    async fn close_tombola(
        &self,
        id: TombolaId,
        picker: &dyn WinnerPicker,
    ) -> Result<TombolaDraw, ApiError>;

    /// Looks up a ticket.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn find_ticket(&self, id: TicketId) -> Result<Option<Ticket>, ApiError>;

    /// Lists tickets visible in `scope`, newest first.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    async fn list_tickets(&self, scope: TicketScope) -> Result<Vec<Ticket>, ApiError>;
}

/// Everything the services need from storage.
pub trait Store:
    UserStore + StandStore + KermesseStore + InteractionStore + TombolaStore + fmt::Debug
{
}

impl<T> Store for T where
    T: UserStore + StandStore + KermesseStore + InteractionStore + TombolaStore + fmt::Debug
{
}
