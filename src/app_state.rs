//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::persistence::Store;
use crate::service::{
    InteractionService, KermesseService, StandService, TombolaService, UserService,
};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Accounts and wallets.
    pub users: Arc<UserService>,
    /// Stand inventory.
    pub stands: Arc<StandService>,
    /// Kermesse lifecycle.
    pub kermesses: Arc<KermesseService>,
    /// Purchases and activities.
    pub interactions: Arc<InteractionService>,
    /// Tombolas and tickets.
    pub tombolas: Arc<TombolaService>,
    /// Shared secret of the payment webhook, if enabled.
    pub webhook_secret: Option<Arc<str>>,
}

impl AppState {
    /// Wires every service on top of one store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, webhook_secret: Option<String>) -> Self {
        Self {
            users: Arc::new(UserService::new(Arc::clone(&store))),
            stands: Arc::new(StandService::new(Arc::clone(&store))),
            kermesses: Arc::new(KermesseService::new(Arc::clone(&store))),
            interactions: Arc::new(InteractionService::new(Arc::clone(&store))),
            tombolas: Arc::new(TombolaService::new(store)),
            webhook_secret: webhook_secret.map(Arc::from),
        }
    }
}
