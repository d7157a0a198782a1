//! Process-local store backed by ordered maps.
//!
//! The whole state sits behind one [`tokio::sync::RwLock`]. Every mutation
//! takes the write guard, validates all of its preconditions, and only then
//! applies its writes, so a failed operation leaves nothing behind and two
//! concurrent operations are serialized exactly like conflicting database
//! transactions.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{InteractionStore, KermesseStore, StandStore, TombolaStore, UserStore};
use crate::domain::{
    Interaction, InteractionFilter, InteractionId, InteractionKind, InteractionPlan, Kermesse,
    KermesseId, KermesseScope, NewKermesse, NewStand, NewTombola, NewUser, Role, Stand,
    StandFilter, StandId, StandUpdate, Status, Ticket, TicketId, TicketScope, Tombola,
    TombolaDraw, TombolaId, TombolaUpdate, User, UserId, WinnerPicker,
};
use crate::error::ApiError;

/// In-memory [`super::Store`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Default)]
struct Sequences {
    users: i64,
    kermesses: i64,
    stands: i64,
    interactions: i64,
    tombolas: i64,
    tickets: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq = seq.saturating_add(1);
    *seq
}

#[derive(Debug, Default)]
struct MemoryState {
    seq: Sequences,
    users: BTreeMap<UserId, User>,
    kermesses: BTreeMap<KermesseId, Kermesse>,
    stands: BTreeMap<StandId, Stand>,
    participants: BTreeSet<(KermesseId, UserId)>,
    attachments: BTreeSet<(KermesseId, StandId)>,
    interactions: BTreeMap<InteractionId, Interaction>,
    tombolas: BTreeMap<TombolaId, Tombola>,
    tickets: BTreeMap<TicketId, Ticket>,
}

impl MemoryState {
    fn user(&self, id: UserId) -> Result<&User, ApiError> {
        self.users.get(&id).ok_or_else(|| ApiError::not_found("user", id))
    }

    fn user_mut(&mut self, id: UserId) -> Result<&mut User, ApiError> {
        self.users
            .get_mut(&id)
            .ok_or_else(|| ApiError::not_found("user", id))
    }

    fn kermesse(&self, id: KermesseId) -> Result<&Kermesse, ApiError> {
        self.kermesses
            .get(&id)
            .ok_or_else(|| ApiError::not_found("kermesse", id))
    }

    fn ensure_started(&self, id: KermesseId) -> Result<(), ApiError> {
        if self.kermesse(id)?.status.is_ended() {
            return Err(ApiError::InvalidState("kermesse has already ended".to_string()));
        }
        Ok(())
    }

    fn is_started(&self, id: KermesseId) -> bool {
        self.kermesses
            .get(&id)
            .is_some_and(|k| k.status == Status::Started)
    }

    fn stand_taken(&self, stand: StandId, except: KermesseId) -> bool {
        self.attachments
            .iter()
            .any(|&(k, s)| s == stand && k != except && self.is_started(k))
    }

    fn open_tombola(&self, id: KermesseId) -> bool {
        self.tombolas
            .values()
            .any(|t| t.kermesse_id == id && t.status == Status::Started)
    }

    fn ensure_funds(&self, id: UserId, amount: i64) -> Result<(), ApiError> {
        if self.user(id)?.balance < amount {
            return Err(ApiError::InsufficientTokens);
        }
        Ok(())
    }

    fn is_family(&self, user: UserId, parent: UserId) -> bool {
        user == parent
            || self
                .users
                .get(&user)
                .is_some_and(|u| u.parent_id == Some(parent))
    }
}

fn newest_first<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
    items
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new: NewUser) -> Result<User, ApiError> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == new.email) {
            return Err(ApiError::EmailAlreadyExists(new.email));
        }
        let user = User {
            id: UserId::new(next(&mut state.seq.users)),
            parent_id: new.parent_id,
            name: new.name,
            email: new.email,
            role: new.role,
            balance: 0,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, ApiError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_children(&self, parent: UserId) -> Result<Vec<User>, ApiError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .filter(|u| u.parent_id == Some(parent))
            .cloned()
            .collect())
    }

    async fn adjust_balance(&self, id: UserId, delta: i64) -> Result<User, ApiError> {
        let mut state = self.state.write().await;
        let user = state.user_mut(id)?;
        let balance = user
            .balance
            .checked_add(delta)
            .ok_or_else(|| ApiError::BadRequest("balance overflow".to_string()))?;
        if balance < 0 {
            return Err(ApiError::InsufficientTokens);
        }
        user.balance = balance;
        Ok(user.clone())
    }

    async fn transfer_balance(
        &self,
        from: UserId,
        to: UserId,
        amount: i64,
    ) -> Result<(), ApiError> {
        let mut state = self.state.write().await;
        state.user(to)?;
        state.ensure_funds(from, amount)?;
        let payer = state.user_mut(from)?;
        payer.balance = payer.balance.saturating_sub(amount);
        let payee = state.user_mut(to)?;
        payee.balance = payee.balance.saturating_add(amount);
        Ok(())
    }
}

#[async_trait]
impl StandStore for MemoryStore {
    async fn create_stand(&self, new: NewStand) -> Result<Stand, ApiError> {
        let mut state = self.state.write().await;
        let stand = Stand {
            id: StandId::new(next(&mut state.seq.stands)),
            owner_id: new.owner_id,
            name: new.name,
            description: new.description,
            kind: new.kind,
            price: new.price,
            stock: new.stock,
        };
        state.stands.insert(stand.id, stand.clone());
        Ok(stand)
    }

    async fn find_stand(&self, id: StandId) -> Result<Option<Stand>, ApiError> {
        Ok(self.state.read().await.stands.get(&id).cloned())
    }

    async fn find_stand_by_owner(&self, owner: UserId) -> Result<Option<Stand>, ApiError> {
        let state = self.state.read().await;
        Ok(state.stands.values().find(|s| s.owner_id == owner).cloned())
    }

    async fn update_stand(&self, id: StandId, update: StandUpdate) -> Result<Stand, ApiError> {
        let mut state = self.state.write().await;
        let stand = state
            .stands
            .get_mut(&id)
            .ok_or_else(|| ApiError::not_found("stand", id))?;
        stand.name = update.name;
        stand.description = update.description;
        stand.price = update.price;
        stand.stock = update.stock;
        Ok(stand.clone())
    }

    async fn list_stands(&self, filter: StandFilter) -> Result<Vec<Stand>, ApiError> {
        let state = self.state.read().await;
        Ok(state
            .stands
            .values()
            .filter(|s| {
                filter
                    .kermesse_id
                    .is_none_or(|k| state.attachments.contains(&(k, s.id)))
            })
            .filter(|s| {
                filter.is_free.is_none_or(|free| {
                    let taken = state
                        .attachments
                        .iter()
                        .any(|&(k, stand)| stand == s.id && state.is_started(k));
                    free != taken
                })
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl KermesseStore for MemoryStore {
    async fn create_kermesse(&self, new: NewKermesse) -> Result<Kermesse, ApiError> {
        let mut state = self.state.write().await;
        let kermesse = Kermesse {
            id: KermesseId::new(next(&mut state.seq.kermesses)),
            owner_id: new.owner_id,
            name: new.name,
            description: new.description,
            status: Status::Started,
        };
        state.kermesses.insert(kermesse.id, kermesse.clone());
        Ok(kermesse)
    }

    async fn find_kermesse(&self, id: KermesseId) -> Result<Option<Kermesse>, ApiError> {
        Ok(self.state.read().await.kermesses.get(&id).cloned())
    }

    async fn update_kermesse(
        &self,
        id: KermesseId,
        name: String,
        description: String,
    ) -> Result<Kermesse, ApiError> {
        let mut state = self.state.write().await;
        state.ensure_started(id)?;
        let kermesse = state
            .kermesses
            .get_mut(&id)
            .ok_or_else(|| ApiError::not_found("kermesse", id))?;
        kermesse.name = name;
        kermesse.description = description;
        Ok(kermesse.clone())
    }

    async fn list_kermesses(&self, scope: KermesseScope) -> Result<Vec<Kermesse>, ApiError> {
        let state = self.state.read().await;
        let visible = |k: &Kermesse| match scope {
            KermesseScope::OwnedBy(user) => k.owner_id == user,
            KermesseScope::ParticipatedBy(user) => state.participants.contains(&(k.id, user)),
            KermesseScope::HostingStandsOf(user) => state.attachments.iter().any(|&(id, s)| {
                id == k.id && state.stands.get(&s).is_some_and(|s| s.owner_id == user)
            }),
        };
        Ok(state
            .kermesses
            .values()
            .filter(|k| visible(k))
            .cloned()
            .collect())
    }

    async fn list_invitable_children(&self, id: KermesseId) -> Result<Vec<User>, ApiError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .filter(|u| u.role == Role::Child && !state.participants.contains(&(id, u.id)))
            .cloned()
            .collect())
    }

    async fn add_participants(&self, id: KermesseId, users: &[UserId]) -> Result<(), ApiError> {
        let mut state = self.state.write().await;
        state.ensure_started(id)?;
        for user in users {
            state.user(*user)?;
        }
        for user in users {
            state.participants.insert((id, *user));
        }
        Ok(())
    }

    async fn is_active_participant(&self, id: KermesseId, user: UserId) -> Result<bool, ApiError> {
        let state = self.state.read().await;
        Ok(state.is_started(id) && state.participants.contains(&(id, user)))
    }

    async fn stand_is_taken(&self, stand: StandId, except: KermesseId) -> Result<bool, ApiError> {
        Ok(self.state.read().await.stand_taken(stand, except))
    }

    async fn attach_stand(&self, id: KermesseId, stand: StandId) -> Result<(), ApiError> {
        let mut state = self.state.write().await;
        state.ensure_started(id)?;
        if !state.stands.contains_key(&stand) {
            return Err(ApiError::not_found("stand", stand));
        }
        if state.stand_taken(stand, id) {
            return Err(ApiError::InvalidState("stand already taken".to_string()));
        }
        state.attachments.insert((id, stand));
        Ok(())
    }

    async fn active_kermesse_for(
        &self,
        user: UserId,
        stand: StandId,
    ) -> Result<Option<KermesseId>, ApiError> {
        let state = self.state.read().await;
        Ok(state
            .participants
            .iter()
            .filter(|&&(_, u)| u == user)
            .map(|&(k, _)| k)
            .find(|&k| state.is_started(k) && state.attachments.contains(&(k, stand))))
    }

    async fn has_open_tombola(&self, id: KermesseId) -> Result<bool, ApiError> {
        Ok(self.state.read().await.open_tombola(id))
    }

    async fn end_kermesse(&self, id: KermesseId) -> Result<Kermesse, ApiError> {
        let mut state = self.state.write().await;
        state.ensure_started(id)?;
        if state.open_tombola(id) {
            return Err(ApiError::InvalidState(
                "kermesse cannot end while a tombola is in progress".to_string(),
            ));
        }
        let kermesse = state
            .kermesses
            .get_mut(&id)
            .ok_or_else(|| ApiError::not_found("kermesse", id))?;
        kermesse.status = Status::Ended;
        Ok(kermesse.clone())
    }
}

#[async_trait]
impl InteractionStore for MemoryStore {
    async fn create_interaction(&self, plan: InteractionPlan) -> Result<Interaction, ApiError> {
        let mut state = self.state.write().await;

        state.ensure_started(plan.kermesse_id)?;
        let stand = state
            .stands
            .get(&plan.stand_id)
            .ok_or_else(|| ApiError::not_found("stand", plan.stand_id))?;
        if plan.quantity.is_some_and(|q| stand.stock < q) {
            return Err(ApiError::InsufficientStock);
        }
        state.user(plan.stand_owner_id)?;
        state.ensure_funds(plan.user_id, plan.tokens)?;

        if let Some(quantity) = plan.quantity {
            if let Some(stand) = state.stands.get_mut(&plan.stand_id) {
                stand.stock = stand.stock.saturating_sub(quantity);
            }
        }
        let payer = state.user_mut(plan.user_id)?;
        payer.balance = payer.balance.saturating_sub(plan.tokens);
        let owner = state.user_mut(plan.stand_owner_id)?;
        owner.balance = owner.balance.saturating_add(plan.tokens);

        let interaction = Interaction {
            id: InteractionId::new(next(&mut state.seq.interactions)),
            user_id: plan.user_id,
            stand_id: plan.stand_id,
            kermesse_id: plan.kermesse_id,
            kind: plan.kind,
            status: match plan.kind {
                InteractionKind::Activity => Some(Status::Started),
                InteractionKind::Transaction => None,
            },
            tokens: plan.tokens,
            points: 0,
            created_at: Utc::now(),
        };
        state.interactions.insert(interaction.id, interaction.clone());
        Ok(interaction)
    }

    async fn find_interaction(&self, id: InteractionId) -> Result<Option<Interaction>, ApiError> {
        Ok(self.state.read().await.interactions.get(&id).cloned())
    }

    async fn grade_interaction(
        &self,
        id: InteractionId,
        points: i64,
    ) -> Result<Interaction, ApiError> {
        let mut state = self.state.write().await;
        let interaction = state
            .interactions
            .get_mut(&id)
            .ok_or_else(|| ApiError::not_found("interaction", id))?;
        interaction.status = Some(Status::Ended);
        interaction.points = points;
        Ok(interaction.clone())
    }

    async fn list_interactions(
        &self,
        filter: InteractionFilter,
    ) -> Result<Vec<Interaction>, ApiError> {
        let state = self.state.read().await;
        let matching: Vec<Interaction> = state
            .interactions
            .values()
            .filter(|i| filter.kermesse_id.is_none_or(|k| i.kermesse_id == k))
            .filter(|i| filter.user_id.is_none_or(|u| i.user_id == u))
            .filter(|i| filter.family_of.is_none_or(|p| state.is_family(i.user_id, p)))
            .filter(|i| {
                filter.stand_owner_id.is_none_or(|owner| {
                    state
                        .stands
                        .get(&i.stand_id)
                        .is_some_and(|s| s.owner_id == owner)
                })
            })
            .cloned()
            .collect();
        Ok(newest_first(matching, |i| (i.created_at, i.id)))
    }
}

#[async_trait]
impl TombolaStore for MemoryStore {
    async fn create_tombola(&self, new: NewTombola) -> Result<Tombola, ApiError> {
        let mut state = self.state.write().await;
        state.ensure_started(new.kermesse_id)?;
        let tombola = Tombola {
            id: TombolaId::new(next(&mut state.seq.tombolas)),
            kermesse_id: new.kermesse_id,
            name: new.name,
            status: Status::Started,
            price: new.price,
            prize: new.prize,
        };
        state.tombolas.insert(tombola.id, tombola.clone());
        Ok(tombola)
    }

    async fn find_tombola(&self, id: TombolaId) -> Result<Option<Tombola>, ApiError> {
        Ok(self.state.read().await.tombolas.get(&id).cloned())
    }

    async fn update_tombola(
        &self,
        id: TombolaId,
        update: TombolaUpdate,
    ) -> Result<Tombola, ApiError> {
        let mut state = self.state.write().await;
        let tombola = state
            .tombolas
            .get_mut(&id)
            .ok_or_else(|| ApiError::not_found("tombola", id))?;
        tombola.name = update.name;
        tombola.price = update.price;
        tombola.prize = update.prize;
        Ok(tombola.clone())
    }

    async fn list_tombolas(&self, kermesse: Option<KermesseId>) -> Result<Vec<Tombola>, ApiError> {
        let state = self.state.read().await;
        Ok(state
            .tombolas
            .values()
            .filter(|t| kermesse.is_none_or(|k| t.kermesse_id == k))
            .cloned()
            .collect())
    }

    async fn issue_ticket(
        &self,
        user: UserId,
        tombola: TombolaId,
        price: i64,
    ) -> Result<Ticket, ApiError> {
        let mut state = self.state.write().await;
        let current = state
            .tombolas
            .get(&tombola)
            .ok_or_else(|| ApiError::not_found("tombola", tombola))?;
        if current.status.is_ended() {
            return Err(ApiError::InvalidState("tombola has already ended".to_string()));
        }
        state.ensure_funds(user, price)?;

        let holder = state.user_mut(user)?;
        holder.balance = holder.balance.saturating_sub(price);
        let ticket = Ticket {
            id: TicketId::new(next(&mut state.seq.tickets)),
            user_id: user,
            tombola_id: tombola,
            winner: false,
            created_at: Utc::now(),
        };
        state.tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn close_tombola(
        &self,
        id: TombolaId,
        picker: &dyn WinnerPicker,
    ) -> Result<TombolaDraw, ApiError> {
        let mut state = self.state.write().await;
        let current = state
            .tombolas
            .get(&id)
            .ok_or_else(|| ApiError::not_found("tombola", id))?;
        if current.status.is_ended() {
            return Err(ApiError::InvalidState("tombola has already ended".to_string()));
        }

        let candidates: Vec<TicketId> = state
            .tickets
            .values()
            .filter(|t| t.tombola_id == id)
            .map(|t| t.id)
            .collect();
        let mut winner = None;
        if let Some(picked) = picker.pick(&candidates).filter(|w| candidates.contains(w)) {
            if let Some(ticket) = state.tickets.get_mut(&picked) {
                ticket.winner = true;
                winner = Some(ticket.clone());
            }
        }

        let tombola = state
            .tombolas
            .get_mut(&id)
            .ok_or_else(|| ApiError::not_found("tombola", id))?;
        tombola.status = Status::Ended;
        Ok(TombolaDraw {
            tombola: tombola.clone(),
            winner,
        })
    }

    async fn find_ticket(&self, id: TicketId) -> Result<Option<Ticket>, ApiError> {
        Ok(self.state.read().await.tickets.get(&id).cloned())
    }

    async fn list_tickets(&self, scope: TicketScope) -> Result<Vec<Ticket>, ApiError> {
        let state = self.state.read().await;
        let visible = |t: &Ticket| match scope {
            TicketScope::OrganizedBy(organizer) => state
                .tombolas
                .get(&t.tombola_id)
                .and_then(|tb| state.kermesses.get(&tb.kermesse_id))
                .is_some_and(|k| k.owner_id == organizer),
            TicketScope::FamilyOf(parent) => state.is_family(t.user_id, parent),
            TicketScope::HeldBy(user) => t.user_id == user,
        };
        let matching: Vec<Ticket> = state
            .tickets
            .values()
            .filter(|t| visible(t))
            .cloned()
            .collect();
        Ok(newest_first(matching, |t| (t.created_at, t.id)))
    }
}
