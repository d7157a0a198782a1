//! Stand inventory: creation, metadata edits, lookups.

use std::sync::Arc;

use crate::domain::{Caller, NewStand, Role, Stand, StandFilter, StandId, StandKind, StandUpdate};
use crate::error::ApiError;
use crate::persistence::Store;

use super::{non_negative, required_text};

/// Stand management for stand holders.
#[derive(Debug, Clone)]
pub struct StandService {
    store: Arc<dyn Store>,
}

impl StandService {
    /// Creates a new `StandService`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Opens a stand owned by the calling stand holder.
    ///
    /// # Errors
    ///
    /// [`ApiError::Forbidden`] unless the caller is a stand holder,
    /// [`ApiError::BadRequest`] for a blank name or negative numbers.
    pub async fn create(
        &self,
        caller: &Caller,
        kind: StandKind,
        fields: StandUpdate,
    ) -> Result<Stand, ApiError> {
        caller.require_role(&[Role::StandHolder])?;
        let fields = validated(fields)?;
        let stand = self
            .store
            .create_stand(NewStand {
                owner_id: caller.id,
                name: fields.name,
                description: fields.description,
                kind,
                price: fields.price,
                stock: fields.stock,
            })
            .await?;
        tracing::info!(stand_id = %stand.id, owner_id = %caller.id, kind = %stand.kind, "stand created");
        Ok(stand)
    }

    /// Edits a stand. Only its owner may do so; the kind never changes.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] for an unknown stand, [`ApiError::Forbidden`]
    /// for anyone but the owner.
    pub async fn update(
        &self,
        caller: &Caller,
        id: StandId,
        fields: StandUpdate,
    ) -> Result<Stand, ApiError> {
        caller.require_role(&[Role::StandHolder])?;
        let fields = validated(fields)?;
        let stand = self.get(id).await?;
        if stand.owner_id != caller.id {
            return Err(ApiError::Forbidden(format!("stand {id} belongs to another user")));
        }
        let stand = self.store.update_stand(id, fields).await?;
        tracing::info!(stand_id = %id, "stand updated");
        Ok(stand)
    }

    /// Looks up a stand.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] for an unknown id.
    pub async fn get(&self, id: StandId) -> Result<Stand, ApiError> {
        self.store
            .find_stand(id)
            .await?
            .ok_or_else(|| ApiError::not_found("stand", id))
    }

    /// The stand run by the caller.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] when the caller owns no stand.
    pub async fn current(&self, caller: &Caller) -> Result<Stand, ApiError> {
        caller.require_role(&[Role::StandHolder])?;
        self.store
            .find_stand_by_owner(caller.id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("stand of user {}", caller.id)))
    }

    /// Edits the stand run by the caller.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] when the caller owns no stand.
    pub async fn update_current(
        &self,
        caller: &Caller,
        fields: StandUpdate,
    ) -> Result<Stand, ApiError> {
        let stand = self.current(caller).await?;
        self.update(caller, stand.id, fields).await
    }

    /// Lists stands, by id.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    pub async fn list(&self, filter: StandFilter) -> Result<Vec<Stand>, ApiError> {
        self.store.list_stands(filter).await
    }
}

fn validated(fields: StandUpdate) -> Result<StandUpdate, ApiError> {
    Ok(StandUpdate {
        name: required_text("name", &fields.name)?,
        description: fields.description.trim().to_string(),
        price: non_negative("price", fields.price)?,
        stock: non_negative("stock", fields.stock)?,
    })
}
