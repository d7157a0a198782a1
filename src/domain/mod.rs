//! Domain layer: identifiers, entities, commands and listing filters.
//!
//! Everything here is plain data. Business rules live in
//! [`crate::service`]; atomic mutations live behind the store traits in
//! [`crate::persistence`].

pub mod ids;
pub mod interaction;
pub mod kermesse;
pub mod stand;
pub mod status;
pub mod tombola;
pub mod user;

pub use ids::{InteractionId, KermesseId, StandId, TicketId, TombolaId, UserId};
pub use interaction::{Interaction, InteractionFilter, InteractionKind, InteractionPlan};
pub use kermesse::{Kermesse, KermesseScope, NewKermesse};
pub use stand::{NewStand, Stand, StandFilter, StandKind, StandUpdate};
pub use status::Status;
pub use tombola::{
    NewTombola, RandomPicker, Ticket, TicketScope, Tombola, TombolaDraw, TombolaUpdate,
    WinnerPicker,
};
pub use user::{Caller, NewUser, Role, User};
