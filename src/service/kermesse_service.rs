//! Kermesse lifecycle: creation, membership (participants and stands),
//! and the one-way end transition.

use std::sync::Arc;

use crate::domain::{
    Caller, Kermesse, KermesseId, KermesseScope, NewKermesse, Role, StandId, User, UserId,
};
use crate::error::ApiError;
use crate::persistence::Store;

use super::required_text;

/// Kermesse management for organizers, listings for everyone.
#[derive(Debug, Clone)]
pub struct KermesseService {
    store: Arc<dyn Store>,
}

impl KermesseService {
    /// Creates a new `KermesseService`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Opens a kermesse owned by the calling organizer.
    ///
    /// # Errors
    ///
    /// [`ApiError::Forbidden`] unless the caller is an organizer.
    pub async fn create(
        &self,
        caller: &Caller,
        name: &str,
        description: &str,
    ) -> Result<Kermesse, ApiError> {
        caller.require_role(&[Role::Organizer])?;
        let kermesse = self
            .store
            .create_kermesse(NewKermesse {
                owner_id: caller.id,
                name: required_text("name", name)?,
                description: description.trim().to_string(),
            })
            .await?;
        tracing::info!(kermesse_id = %kermesse.id, owner_id = %caller.id, "kermesse created");
        Ok(kermesse)
    }

    /// Renames a kermesse that has not ended yet.
    ///
    /// # Errors
    ///
    /// [`ApiError::InvalidState`] once ended, [`ApiError::Forbidden`] for
    /// anyone but the owner.
    pub async fn update(
        &self,
        caller: &Caller,
        id: KermesseId,
        name: &str,
        description: &str,
    ) -> Result<Kermesse, ApiError> {
        caller.require_role(&[Role::Organizer])?;
        let name = required_text("name", name)?;
        let kermesse = self.started(id).await?;
        ensure_owner(&kermesse, caller)?;

        let kermesse = self
            .store
            .update_kermesse(id, name, description.trim().to_string())
            .await?;
        tracing::info!(kermesse_id = %id, "kermesse updated");
        Ok(kermesse)
    }

    /// Looks up a kermesse.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] for an unknown id.
    pub async fn get(&self, id: KermesseId) -> Result<Kermesse, ApiError> {
        self.store
            .find_kermesse(id)
            .await?
            .ok_or_else(|| ApiError::not_found("kermesse", id))
    }

    /// Kermesses relevant to the caller: organized ones for organizers,
    /// joined ones for parents and children, hosting ones for stand
    /// holders.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on storage failure.
    pub async fn list(&self, caller: &Caller) -> Result<Vec<Kermesse>, ApiError> {
        let scope = match caller.role {
            Role::Organizer => KermesseScope::OwnedBy(caller.id),
            Role::Parent | Role::Child => KermesseScope::ParticipatedBy(caller.id),
            Role::StandHolder => KermesseScope::HostingStandsOf(caller.id),
        };
        self.store.list_kermesses(scope).await
    }

    /// Child accounts that can still be invited.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] for an unknown kermesse,
    /// [`ApiError::Forbidden`] for anyone but the owner.
    pub async fn invitable_children(
        &self,
        caller: &Caller,
        id: KermesseId,
    ) -> Result<Vec<User>, ApiError> {
        caller.require_role(&[Role::Organizer])?;
        let kermesse = self.get(id).await?;
        ensure_owner(&kermesse, caller)?;
        self.store.list_invitable_children(id).await
    }

    /// Invites a child, and with it the child's parent, in one
    /// transaction. Already enrolled members are left as they are.
    ///
    /// # Errors
    ///
    /// [`ApiError::InvalidState`] once ended, [`ApiError::Forbidden`] for
    /// anyone but the owner, [`ApiError::BadRequest`] when the target is
    /// not a child account.
    pub async fn add_participant(
        &self,
        caller: &Caller,
        id: KermesseId,
        child_id: UserId,
    ) -> Result<(), ApiError> {
        caller.require_role(&[Role::Organizer])?;
        let kermesse = self.started(id).await?;
        ensure_owner(&kermesse, caller)?;

        let child = self
            .store
            .find_user(child_id)
            .await?
            .ok_or_else(|| ApiError::not_found("user", child_id))?;
        if child.role != Role::Child {
            return Err(ApiError::BadRequest(format!(
                "user {child_id} is not a child account"
            )));
        }

        let members: Vec<UserId> = std::iter::once(child.id).chain(child.parent_id).collect();
        self.store.add_participants(id, &members).await?;
        tracing::info!(kermesse_id = %id, child_id = %child_id, parent_id = ?child.parent_id, "participant added");
        Ok(())
    }

    /// Attaches a stand that no other started kermesse holds.
    ///
    /// # Errors
    ///
    /// [`ApiError::InvalidState`] once ended or when the stand is taken,
    /// [`ApiError::Forbidden`] for anyone but the owner.
    pub async fn add_stand(
        &self,
        caller: &Caller,
        id: KermesseId,
        stand_id: StandId,
    ) -> Result<(), ApiError> {
        caller.require_role(&[Role::Organizer])?;
        let kermesse = self.started(id).await?;
        if self.store.find_stand(stand_id).await?.is_none() {
            return Err(ApiError::not_found("stand", stand_id));
        }
        if self.store.stand_is_taken(stand_id, id).await? {
            return Err(ApiError::InvalidState("stand already taken".to_string()));
        }
        ensure_owner(&kermesse, caller)?;

        self.store.attach_stand(id, stand_id).await?;
        tracing::info!(kermesse_id = %id, stand_id = %stand_id, "stand attached");
        Ok(())
    }

    /// Ends a kermesse for good. Refused while one of its tombolas is
    /// still open.
    ///
    /// # Errors
    ///
    /// [`ApiError::InvalidState`] when already ended or a tombola is
    /// open, [`ApiError::Forbidden`] for anyone but the owner.
    pub async fn end(&self, caller: &Caller, id: KermesseId) -> Result<Kermesse, ApiError> {
        caller.require_role(&[Role::Organizer])?;
        let kermesse = self.started(id).await?;
        if self.store.has_open_tombola(id).await? {
            tracing::warn!(kermesse_id = %id, "end refused: tombola still open");
            return Err(ApiError::InvalidState(
                "kermesse cannot end while a tombola is in progress".to_string(),
            ));
        }
        ensure_owner(&kermesse, caller)?;

        let kermesse = self.store.end_kermesse(id).await?;
        tracing::info!(kermesse_id = %id, "kermesse ended");
        Ok(kermesse)
    }

    async fn started(&self, id: KermesseId) -> Result<Kermesse, ApiError> {
        let kermesse = self.get(id).await?;
        if kermesse.status.is_ended() {
            return Err(ApiError::InvalidState("kermesse has already ended".to_string()));
        }
        Ok(kermesse)
    }
}

fn ensure_owner(kermesse: &Kermesse, caller: &Caller) -> Result<(), ApiError> {
    if kermesse.is_owned_by(caller.id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "kermesse {} is organized by another user",
            kermesse.id
        )))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{NewTombola, RandomPicker, StandKind, Status};
    use crate::service::test_support::{caller, seed_kermesse, seed_stand, seed_user, store};

    #[tokio::test]
    async fn add_participant_enrolls_the_parent_too() {
        let store = store();
        let organizer = seed_user(&store, "o@example.org", Role::Organizer, None, 0).await;
        let parent = seed_user(&store, "p@example.org", Role::Parent, None, 0).await;
        let first = seed_user(&store, "c1@example.org", Role::Child, Some(parent.id), 0).await;
        let second = seed_user(&store, "c2@example.org", Role::Child, Some(parent.id), 0).await;
        let service = KermesseService::new(Arc::clone(&store));
        let Ok(kermesse) = service.create(&caller(&organizer), "Fête", "").await else {
            panic!("create kermesse");
        };

        assert!(service
            .add_participant(&caller(&organizer), kermesse.id, first.id)
            .await
            .is_ok());
        // The parent is already enrolled through the first child.
        assert!(service
            .add_participant(&caller(&organizer), kermesse.id, second.id)
            .await
            .is_ok());

        for user in [parent.id, first.id, second.id] {
            assert!(matches!(
                store.is_active_participant(kermesse.id, user).await,
                Ok(true)
            ));
        }
        let Ok(joined) = service.list(&caller(&parent)).await else {
            panic!("list for parent");
        };
        assert_eq!(joined.len(), 1);
    }

    #[tokio::test]
    async fn add_participant_checks_owner_and_target_role() {
        let store = store();
        let organizer = seed_user(&store, "o@example.org", Role::Organizer, None, 0).await;
        let intruder = seed_user(&store, "i@example.org", Role::Organizer, None, 0).await;
        let parent = seed_user(&store, "p@example.org", Role::Parent, None, 0).await;
        let child = seed_user(&store, "c@example.org", Role::Child, Some(parent.id), 0).await;
        let kermesse = seed_kermesse(&store, organizer.id).await;
        let service = KermesseService::new(Arc::clone(&store));

        assert!(matches!(
            service
                .add_participant(&caller(&intruder), kermesse.id, child.id)
                .await,
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            service
                .add_participant(&caller(&organizer), kermesse.id, parent.id)
                .await,
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            service
                .add_participant(&caller(&organizer), KermesseId::new(77), child.id)
                .await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn stand_is_exclusive_to_one_started_kermesse() {
        let store = store();
        let organizer = seed_user(&store, "o@example.org", Role::Organizer, None, 0).await;
        let holder = seed_user(&store, "h@example.org", Role::StandHolder, None, 0).await;
        let stand = seed_stand(&store, holder.id, StandKind::Sale, 2, 10).await;
        let first = seed_kermesse(&store, organizer.id).await;
        let second = seed_kermesse(&store, organizer.id).await;
        let service = KermesseService::new(Arc::clone(&store));

        assert!(service
            .add_stand(&caller(&organizer), first.id, stand.id)
            .await
            .is_ok());
        assert!(matches!(
            service
                .add_stand(&caller(&organizer), second.id, stand.id)
                .await,
            Err(ApiError::InvalidState(_))
        ));

        let Ok(hosting) = service.list(&caller(&holder)).await else {
            panic!("list for stand holder");
        };
        assert_eq!(hosting.iter().map(|k| k.id).collect::<Vec<_>>(), vec![first.id]);
    }

    #[tokio::test]
    async fn end_is_gated_by_open_tombolas_and_terminal() {
        let store = store();
        let organizer = seed_user(&store, "o@example.org", Role::Organizer, None, 0).await;
        let kermesse = seed_kermesse(&store, organizer.id).await;
        let Ok(tombola) = store
            .create_tombola(NewTombola {
                kermesse_id: kermesse.id,
                name: "Lot".to_string(),
                price: 1,
                prize: "Peluche".to_string(),
            })
            .await
        else {
            panic!("create tombola");
        };
        let service = KermesseService::new(Arc::clone(&store));

        assert!(matches!(
            service.end(&caller(&organizer), kermesse.id).await,
            Err(ApiError::InvalidState(_))
        ));

        assert!(store.close_tombola(tombola.id, &RandomPicker).await.is_ok());
        let Ok(ended) = service.end(&caller(&organizer), kermesse.id).await else {
            panic!("end must succeed once tombolas are closed");
        };
        assert_eq!(ended.status, Status::Ended);

        assert!(matches!(
            service.end(&caller(&organizer), kermesse.id).await,
            Err(ApiError::InvalidState(_))
        ));
        assert!(matches!(
            service
                .update(&caller(&organizer), kermesse.id, "Renamed", "")
                .await,
            Err(ApiError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn invitable_children_excludes_enrolled_ones() {
        let store = store();
        let organizer = seed_user(&store, "o@example.org", Role::Organizer, None, 0).await;
        let enrolled = seed_user(&store, "c1@example.org", Role::Child, None, 0).await;
        let pending = seed_user(&store, "c2@example.org", Role::Child, None, 0).await;
        let kermesse = seed_kermesse(&store, organizer.id).await;
        let service = KermesseService::new(Arc::clone(&store));

        assert!(service
            .add_participant(&caller(&organizer), kermesse.id, enrolled.id)
            .await
            .is_ok());
        let Ok(invitable) = service
            .invitable_children(&caller(&organizer), kermesse.id)
            .await
        else {
            panic!("list invitable children");
        };
        assert_eq!(invitable.iter().map(|u| u.id).collect::<Vec<_>>(), vec![pending.id]);
    }
}
