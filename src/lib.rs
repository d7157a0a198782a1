//! # kermesse-api
//!
//! REST backend for school fairs ("kermesses"): organizers open events,
//! stand holders run sale and activity stands, parents fund their
//! children's token wallets, and participants spend tokens at stands and
//! on tombola (raffle) tickets.
//!
//! Every operation that moves tokens, consumes stock or draws a winner is
//! applied atomically by the store: it either fully happens or leaves no
//! trace, even under concurrent requests.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers + Caller extractor (api/)
//!     │
//!     ├── UserService, StandService, KermesseService,
//!     │   InteractionService, TombolaService (service/)
//!     │
//!     ├── Store traits (persistence/)
//!     │
//!     └── PostgreSQL (sqlx) or in-memory store
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
