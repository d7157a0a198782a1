//! Tombola engine: raffle lifecycle, ticket sales and the winner draw.

use std::sync::Arc;

use crate::domain::{
    Caller, Kermesse, KermesseId, NewTombola, RandomPicker, Role, Ticket, TicketId, TicketScope,
    Tombola, TombolaDraw, TombolaId, TombolaUpdate, WinnerPicker,
};
use crate::error::ApiError;
use crate::persistence::Store;

use super::{non_negative, required_text};

/// Tombola and ticket workflows.
#[derive(Debug, Clone)]
pub struct TombolaService {
    store: Arc<dyn Store>,
    picker: Arc<dyn WinnerPicker>,
}

impl TombolaService {
    /// Creates a service drawing winners uniformly at random.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_picker(store, Arc::new(RandomPicker))
    }

    /// Creates a service with a custom winner picker.
    #[must_use]
    pub fn with_picker(store: Arc<dyn Store>, picker: Arc<dyn WinnerPicker>) -> Self {
        Self { store, picker }
    }

    /// Opens a tombola in a started kermesse owned by the caller.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] for an unknown kermesse,
    /// [`ApiError::InvalidState`] once it ended, [`ApiError::Forbidden`]
    /// for anyone but its organizer.
    pub async fn create(
        &self,
        caller: &Caller,
        kermesse_id: KermesseId,
        fields: TombolaUpdate,
    ) -> Result<Tombola, ApiError> {
        caller.require_role(&[Role::Organizer])?;
        let fields = validated(fields)?;
        self.owned_started_kermesse(caller, kermesse_id).await?;

        let tombola = self
            .store
            .create_tombola(NewTombola {
                kermesse_id,
                name: fields.name,
                price: fields.price,
                prize: fields.prize,
            })
            .await?;
        tracing::info!(tombola_id = %tombola.id, kermesse_id = %kermesse_id, price = tombola.price, "tombola created");
        Ok(tombola)
    }

    /// Edits name, price and prize while the kermesse runs.
    ///
    /// # Errors
    ///
    /// [`ApiError::InvalidState`] once the kermesse ended,
    /// [`ApiError::Forbidden`] for anyone but its organizer.
    pub async fn update(
        &self,
        caller: &Caller,
        id: TombolaId,
        fields: TombolaUpdate,
    ) -> Result<Tombola, ApiError> {
        caller.require_role(&[Role::Organizer])?;
        let fields = validated(fields)?;
        let tombola = self.get(id).await?;
        self.owned_started_kermesse(caller, tombola.kermesse_id)
            .await?;

        let tombola = self.store.update_tombola(id, fields).await?;
        tracing::info!(tombola_id = %id, "tombola updated");
        Ok(tombola)
    }

    /// Looks up a tombola.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] for an unknown id.
    pub async fn get(&self, id: TombolaId) -> Result<Tombola, ApiError> {
        self.store
            .find_tombola(id)
            .await?
            .ok_or_else(|| ApiError::not_found("tombola", id))
    }

    /// Lists tombolas, optionally of one kermesse.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    pub async fn list(&self, kermesse_id: Option<KermesseId>) -> Result<Vec<Tombola>, ApiError> {
        self.store.list_tombolas(kermesse_id).await
    }

    /// Closes the tombola and draws at most one winning ticket, in one
    /// transaction. A tombola without tickets closes with no winner.
    ///
    /// # Errors
    ///
    /// - [`ApiError::NotFound`] for an unknown tombola.
    /// - [`ApiError::InvalidState`] when the kermesse or the tombola has
    ///   already ended.
    /// - [`ApiError::Forbidden`] for anyone but the organizer.
    pub async fn end(&self, caller: &Caller, id: TombolaId) -> Result<TombolaDraw, ApiError> {
        caller.require_role(&[Role::Organizer])?;
        let tombola = self.get(id).await?;
        self.owned_started_kermesse(caller, tombola.kermesse_id)
            .await?;
        if tombola.status.is_ended() {
            return Err(ApiError::InvalidState("tombola has already ended".to_string()));
        }

        let draw = self.store.close_tombola(id, self.picker.as_ref()).await?;
        tracing::info!(
            tombola_id = %id,
            winner_ticket = ?draw.winner.as_ref().map(|t| t.id),
            winner_user = ?draw.winner.as_ref().map(|t| t.user_id),
            "tombola drawn"
        );
        Ok(draw)
    }

    /// Sells one ticket to the caller for the tombola price.
    ///
    /// # Errors
    ///
    /// - [`ApiError::NotFound`] for an unknown tombola.
    /// - [`ApiError::InvalidState`] once the tombola ended.
    /// - [`ApiError::InsufficientTokens`] when the caller cannot pay.
    /// - [`ApiError::Forbidden`] unless the caller participates in the
    ///   started kermesse.
    pub async fn buy_ticket(
        &self,
        caller: &Caller,
        tombola_id: TombolaId,
    ) -> Result<Ticket, ApiError> {
        caller.require_role(&[Role::Parent, Role::Child])?;
        let tombola = self.get(tombola_id).await?;
        if tombola.status.is_ended() {
            return Err(ApiError::InvalidState("tombola has already ended".to_string()));
        }
        let user = self
            .store
            .find_user(caller.id)
            .await?
            .ok_or_else(|| ApiError::not_found("user", caller.id))?;
        if user.balance < tombola.price {
            return Err(ApiError::InsufficientTokens);
        }
        if !self
            .store
            .is_active_participant(tombola.kermesse_id, caller.id)
            .await?
        {
            return Err(ApiError::Forbidden(format!(
                "user {} does not participate in kermesse {}",
                caller.id, tombola.kermesse_id
            )));
        }

        let ticket = self
            .store
            .issue_ticket(caller.id, tombola_id, tombola.price)
            .await?;
        tracing::info!(ticket_id = %ticket.id, tombola_id = %tombola_id, user_id = %caller.id, "ticket issued");
        Ok(ticket)
    }

    /// Looks up a ticket.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] for an unknown id.
    pub async fn get_ticket(&self, id: TicketId) -> Result<Ticket, ApiError> {
        self.store
            .find_ticket(id)
            .await?
            .ok_or_else(|| ApiError::not_found("ticket", id))
    }

    /// Tickets visible to the caller, newest first. Stand holders never
    /// hold tickets and get an empty list.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    pub async fn list_tickets(&self, caller: &Caller) -> Result<Vec<Ticket>, ApiError> {
        let scope = match caller.role {
            Role::Organizer => TicketScope::OrganizedBy(caller.id),
            Role::Parent => TicketScope::FamilyOf(caller.id),
            Role::Child => TicketScope::HeldBy(caller.id),
            Role::StandHolder => return Ok(Vec::new()),
        };
        self.store.list_tickets(scope).await
    }

    async fn owned_started_kermesse(
        &self,
        caller: &Caller,
        id: KermesseId,
    ) -> Result<Kermesse, ApiError> {
        let kermesse = self
            .store
            .find_kermesse(id)
            .await?
            .ok_or_else(|| ApiError::not_found("kermesse", id))?;
        if kermesse.status.is_ended() {
            return Err(ApiError::InvalidState("kermesse has already ended".to_string()));
        }
        if !kermesse.is_owned_by(caller.id) {
            return Err(ApiError::Forbidden(format!(
                "kermesse {id} is organized by another user"
            )));
        }
        Ok(kermesse)
    }
}

fn validated(fields: TombolaUpdate) -> Result<TombolaUpdate, ApiError> {
    Ok(TombolaUpdate {
        name: required_text("name", &fields.name)?,
        price: non_negative("price", fields.price)?,
        prize: fields.prize.trim().to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Status, User};
    use crate::service::test_support::{balance_of, caller, seed_kermesse, seed_user, store};

    /// Picks the first ticket so draws are reproducible.
    #[derive(Debug)]
    struct FirstPicker;

    impl WinnerPicker for FirstPicker {
        fn pick(&self, tickets: &[TicketId]) -> Option<TicketId> {
            tickets.first().copied()
        }
    }

    fn fields(price: i64) -> TombolaUpdate {
        TombolaUpdate {
            name: "Grande tombola".to_string(),
            price,
            prize: "Vélo".to_string(),
        }
    }

    async fn setup() -> (Arc<dyn Store>, TombolaService, User, Kermesse) {
        let store = store();
        let organizer = seed_user(&store, "o@example.org", Role::Organizer, None, 0).await;
        let kermesse = seed_kermesse(&store, organizer.id).await;
        let service = TombolaService::with_picker(Arc::clone(&store), Arc::new(FirstPicker));
        (store, service, organizer, kermesse)
    }

    async fn participant(
        store: &Arc<dyn Store>,
        kermesse: &Kermesse,
        email: &str,
        balance: i64,
    ) -> User {
        let user = seed_user(store, email, Role::Child, None, balance).await;
        let Ok(()) = store.add_participants(kermesse.id, &[user.id]).await else {
            panic!("enroll {email}");
        };
        user
    }

    #[tokio::test]
    async fn three_buyers_one_winner() {
        let (store, service, organizer, kermesse) = setup().await;
        let Ok(tombola) = service
            .create(&caller(&organizer), kermesse.id, fields(5))
            .await
        else {
            panic!("create tombola");
        };

        let mut buyers = Vec::new();
        for email in ["a@example.org", "b@example.org", "c@example.org"] {
            let buyer = participant(&store, &kermesse, email, 5).await;
            let Ok(_) = service.buy_ticket(&caller(&buyer), tombola.id).await else {
                panic!("buy ticket for {email}");
            };
            assert_eq!(balance_of(&store, buyer.id).await, 0);
            buyers.push(buyer);
        }

        let Ok(draw) = service.end(&caller(&organizer), tombola.id).await else {
            panic!("draw must succeed");
        };
        assert_eq!(draw.tombola.status, Status::Ended);
        let Some(winner) = draw.winner else {
            panic!("a ticket must win");
        };
        assert!(buyers.iter().any(|b| b.id == winner.user_id));

        let Ok(tickets) = service.list_tickets(&caller(&organizer)).await else {
            panic!("list tickets");
        };
        assert_eq!(tickets.len(), 3);
        assert_eq!(tickets.iter().filter(|t| t.winner).count(), 1);
    }

    #[tokio::test]
    async fn second_draw_is_rejected_and_changes_nothing() {
        let (store, service, organizer, kermesse) = setup().await;
        let buyer = participant(&store, &kermesse, "a@example.org", 10).await;
        let Ok(tombola) = service
            .create(&caller(&organizer), kermesse.id, fields(2))
            .await
        else {
            panic!("create tombola");
        };
        let Ok(_) = service.buy_ticket(&caller(&buyer), tombola.id).await else {
            panic!("buy ticket");
        };

        assert!(service.end(&caller(&organizer), tombola.id).await.is_ok());
        assert!(matches!(
            service.end(&caller(&organizer), tombola.id).await,
            Err(ApiError::InvalidState(_))
        ));
        assert!(matches!(
            service.buy_ticket(&caller(&buyer), tombola.id).await,
            Err(ApiError::InvalidState(_))
        ));
        assert_eq!(balance_of(&store, buyer.id).await, 8);

        let Ok(tickets) = service.list_tickets(&caller(&buyer)).await else {
            panic!("list tickets");
        };
        assert_eq!(tickets.iter().filter(|t| t.winner).count(), 1);
    }

    #[tokio::test]
    async fn empty_tombola_closes_without_winner() {
        let (_store, service, organizer, kermesse) = setup().await;
        let Ok(tombola) = service
            .create(&caller(&organizer), kermesse.id, fields(1))
            .await
        else {
            panic!("create tombola");
        };
        let Ok(draw) = service.end(&caller(&organizer), tombola.id).await else {
            panic!("draw must succeed");
        };
        assert_eq!(draw.tombola.status, Status::Ended);
        assert!(draw.winner.is_none());
    }

    #[tokio::test]
    async fn ticket_rules_are_enforced() {
        let (store, service, organizer, kermesse) = setup().await;
        let Ok(tombola) = service
            .create(&caller(&organizer), kermesse.id, fields(5))
            .await
        else {
            panic!("create tombola");
        };
        let poor = participant(&store, &kermesse, "poor@example.org", 4).await;
        let outsider = seed_user(&store, "x@example.org", Role::Child, None, 50).await;

        assert!(matches!(
            service.buy_ticket(&caller(&poor), tombola.id).await,
            Err(ApiError::InsufficientTokens)
        ));
        assert!(matches!(
            service.buy_ticket(&caller(&outsider), tombola.id).await,
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            service.buy_ticket(&caller(&organizer), tombola.id).await,
            Err(ApiError::Forbidden(_))
        ));
        assert_eq!(balance_of(&store, poor.id).await, 4);
        assert_eq!(balance_of(&store, outsider.id).await, 50);
    }

    #[tokio::test]
    async fn only_the_organizer_manages_the_tombola() {
        let (store, service, organizer, kermesse) = setup().await;
        let rival = seed_user(&store, "r@example.org", Role::Organizer, None, 0).await;

        assert!(matches!(
            service.create(&caller(&rival), kermesse.id, fields(1)).await,
            Err(ApiError::Forbidden(_))
        ));
        let Ok(tombola) = service
            .create(&caller(&organizer), kermesse.id, fields(1))
            .await
        else {
            panic!("create tombola");
        };
        assert!(matches!(
            service.end(&caller(&rival), tombola.id).await,
            Err(ApiError::Forbidden(_))
        ));
        let Ok(updated) = service
            .update(&caller(&organizer), tombola.id, fields(3))
            .await
        else {
            panic!("update tombola");
        };
        assert_eq!(updated.price, 3);
        assert!(matches!(
            service
                .create(&caller(&organizer), KermesseId::new(404), fields(1))
                .await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_ticket_purchases_never_overdraw() {
        let (store, service, organizer, kermesse) = setup().await;
        let Ok(tombola) = service
            .create(&caller(&organizer), kermesse.id, fields(5))
            .await
        else {
            panic!("create tombola");
        };
        let buyer = participant(&store, &kermesse, "a@example.org", 5).await;
        let buyer_caller = caller(&buyer);
        let tombola_id = tombola.id;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.buy_ticket(&buyer_caller, tombola_id).await
            }));
        }
        let mut issued = 0;
        for handle in handles {
            let Ok(result) = handle.await else {
                panic!("task panicked");
            };
            if result.is_ok() {
                issued += 1;
            }
        }
        assert_eq!(issued, 1);
        assert_eq!(balance_of(&store, buyer.id).await, 0);
    }
}
