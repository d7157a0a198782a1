//! Data Transfer Objects for REST request serialization.
//!
//! Responses reuse the domain entities directly; only request bodies and
//! query strings get dedicated types.

pub mod interaction_dto;
pub mod kermesse_dto;
pub mod stand_dto;
pub mod tombola_dto;
pub mod user_dto;
pub mod webhook_dto;

pub use interaction_dto::*;
pub use kermesse_dto::*;
pub use stand_dto::*;
pub use tombola_dto::*;
pub use user_dto::*;
pub use webhook_dto::*;
