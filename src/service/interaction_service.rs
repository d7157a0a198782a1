//! Interaction engine: purchases at sale stands, paid participations at
//! activity stands, and the grading of activities.
//!
//! Creation follows a fixed validation order (stand, caller, membership,
//! stock, funds) and then hands a single [`InteractionPlan`] to the store,
//! which re-checks stock and funds at write time.

use std::sync::Arc;

use crate::domain::{
    Caller, Interaction, InteractionFilter, InteractionId, InteractionKind, InteractionPlan,
    KermesseId, Role, StandId, StandKind,
};
use crate::error::ApiError;
use crate::persistence::Store;

use super::non_negative;

/// Purchase / participation workflow and listings.
#[derive(Debug, Clone)]
pub struct InteractionService {
    store: Arc<dyn Store>,
}

impl InteractionService {
    /// Creates a new `InteractionService`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Buys `quantity` units at a sale stand, or joins an activity for its
    /// flat price. Tokens move from the caller to the stand holder.
    ///
    /// # Errors
    ///
    /// - [`ApiError::NotFound`] for an unknown stand or caller.
    /// - [`ApiError::Forbidden`] unless the caller participates in a
    ///   started kermesse holding the stand.
    /// - [`ApiError::BadRequest`] when a sale has no positive quantity.
    /// - [`ApiError::InsufficientStock`] / [`ApiError::InsufficientTokens`].
    pub async fn create(
        &self,
        caller: &Caller,
        stand_id: StandId,
        quantity: Option<i64>,
    ) -> Result<Interaction, ApiError> {
        caller.require_role(&[Role::Parent, Role::Child])?;

        let stand = self
            .store
            .find_stand(stand_id)
            .await?
            .ok_or_else(|| ApiError::not_found("stand", stand_id))?;
        let user = self
            .store
            .find_user(caller.id)
            .await?
            .ok_or_else(|| ApiError::not_found("user", caller.id))?;
        let kermesse_id = self
            .store
            .active_kermesse_for(caller.id, stand_id)
            .await?
            .ok_or_else(|| {
                ApiError::Forbidden(format!(
                    "user {} does not participate in a started kermesse holding stand {stand_id}",
                    caller.id
                ))
            })?;

        let (quantity, total) = match stand.kind {
            StandKind::Sale => {
                let quantity = quantity.ok_or_else(|| {
                    ApiError::BadRequest("quantity is required for a sale stand".to_string())
                })?;
                if quantity < 1 {
                    return Err(ApiError::BadRequest("quantity must be at least 1".to_string()));
                }
                if stand.stock < quantity {
                    return Err(ApiError::InsufficientStock);
                }
                let total = stand
                    .price
                    .checked_mul(quantity)
                    .ok_or_else(|| ApiError::BadRequest("quantity too large".to_string()))?;
                (Some(quantity), total)
            }
            StandKind::Activity => (None, stand.price),
        };
        if user.balance < total {
            tracing::warn!(user_id = %caller.id, stand_id = %stand_id, total, balance = user.balance, "interaction refused: insufficient tokens");
            return Err(ApiError::InsufficientTokens);
        }

        let interaction = self
            .store
            .create_interaction(InteractionPlan {
                user_id: caller.id,
                stand_id,
                stand_owner_id: stand.owner_id,
                kermesse_id,
                kind: InteractionKind::from(stand.kind),
                quantity,
                tokens: total,
            })
            .await?;
        tracing::info!(
            interaction_id = %interaction.id,
            user_id = %caller.id,
            stand_id = %stand_id,
            kermesse_id = %kermesse_id,
            tokens = total,
            "interaction created"
        );
        Ok(interaction)
    }

    /// Grades an activity participation. Only the holder of the stand may
    /// grade, and only while the kermesse runs.
    ///
    /// # Errors
    ///
    /// - [`ApiError::NotFound`] for an unknown interaction.
    /// - [`ApiError::BadRequest`] for a transaction or negative points.
    /// - [`ApiError::InvalidState`] once the kermesse ended.
    /// - [`ApiError::Forbidden`] for anyone but the stand holder.
    pub async fn grade(
        &self,
        caller: &Caller,
        id: InteractionId,
        points: i64,
    ) -> Result<Interaction, ApiError> {
        caller.require_role(&[Role::StandHolder])?;
        let points = non_negative("points", points)?;

        let interaction = self.get(id).await?;
        if interaction.kind != InteractionKind::Activity {
            return Err(ApiError::BadRequest(
                "only activity interactions can be graded".to_string(),
            ));
        }
        let kermesse = self
            .store
            .find_kermesse(interaction.kermesse_id)
            .await?
            .ok_or_else(|| ApiError::not_found("kermesse", interaction.kermesse_id))?;
        if kermesse.status.is_ended() {
            return Err(ApiError::InvalidState("kermesse has already ended".to_string()));
        }
        let stand = self
            .store
            .find_stand(interaction.stand_id)
            .await?
            .ok_or_else(|| ApiError::not_found("stand", interaction.stand_id))?;
        if stand.owner_id != caller.id {
            return Err(ApiError::Forbidden(format!(
                "stand {} belongs to another user",
                stand.id
            )));
        }

        let interaction = self.store.grade_interaction(id, points).await?;
        tracing::info!(interaction_id = %id, points, "activity graded");
        Ok(interaction)
    }

    /// Looks up an interaction.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] for an unknown id.
    pub async fn get(&self, id: InteractionId) -> Result<Interaction, ApiError> {
        self.store
            .find_interaction(id)
            .await?
            .ok_or_else(|| ApiError::not_found("interaction", id))
    }

    /// Interactions visible to the caller, newest first: a parent sees
    /// their family's, a child their own, a stand holder those at their
    /// stands. Organizers are not narrowed by role.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    pub async fn list(
        &self,
        caller: &Caller,
        kermesse_id: Option<KermesseId>,
    ) -> Result<Vec<Interaction>, ApiError> {
        let mut filter = InteractionFilter {
            kermesse_id,
            ..InteractionFilter::default()
        };
        match caller.role {
            Role::Parent => filter.family_of = Some(caller.id),
            Role::Child => filter.user_id = Some(caller.id),
            Role::StandHolder => filter.stand_owner_id = Some(caller.id),
            Role::Organizer => {}
        }
        self.store.list_interactions(filter).await
    }
}
