//! Accounts and the wallet ledger: registration, child invites, the
//! parent-to-child token distribution and payment credits.

use std::sync::Arc;

use crate::domain::{Caller, NewUser, Role, User, UserId};
use crate::error::ApiError;
use crate::persistence::Store;

use super::required_text;

/// Account management and token movements between wallets.
#[derive(Debug, Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
}

impl UserService {
    /// Creates a new `UserService`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Creates a self-registered account. Children cannot register on
    /// their own; they are invited by a parent.
    ///
    /// # Errors
    ///
    /// [`ApiError::BadRequest`] for a blank field, an invalid email or the
    /// child role, [`ApiError::EmailAlreadyExists`] on duplicate email.
    pub async fn register(&self, name: &str, email: &str, role: Role) -> Result<User, ApiError> {
        if role == Role::Child {
            return Err(ApiError::BadRequest("role cannot be CHILD".to_string()));
        }
        let new = NewUser {
            parent_id: None,
            name: required_text("name", name)?,
            email: checked_email(email)?,
            role,
        };
        self.ensure_email_free(&new.email).await?;

        let user = self.store.create_user(new).await?;
        tracing::info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(user)
    }

    /// Creates a child account attached to the calling parent.
    ///
    /// # Errors
    ///
    /// [`ApiError::Forbidden`] unless the caller is a parent,
    /// [`ApiError::EmailAlreadyExists`] on duplicate email.
    pub async fn invite_child(
        &self,
        caller: &Caller,
        name: &str,
        email: &str,
    ) -> Result<User, ApiError> {
        caller.require_role(&[Role::Parent])?;
        let new = NewUser {
            parent_id: Some(caller.id),
            name: required_text("name", name)?,
            email: checked_email(email)?,
            role: Role::Child,
        };
        self.ensure_email_free(&new.email).await?;

        let child = self.store.create_user(new).await?;
        tracing::info!(parent_id = %caller.id, child_id = %child.id, "child invited");
        Ok(child)
    }

    /// Looks up an account.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] for an unknown id.
    pub async fn get(&self, id: UserId) -> Result<User, ApiError> {
        self.store
            .find_user(id)
            .await?
            .ok_or_else(|| ApiError::not_found("user", id))
    }

    /// The caller's own account, with a fresh balance.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] if the account vanished.
    pub async fn me(&self, caller: &Caller) -> Result<User, ApiError> {
        self.get(caller.id).await
    }

    /// Children of the calling parent.
    ///
    /// # Errors
    ///
    /// [`ApiError::Forbidden`] unless the caller is a parent.
    pub async fn children(&self, caller: &Caller) -> Result<Vec<User>, ApiError> {
        caller.require_role(&[Role::Parent])?;
        self.store.list_children(caller.id).await
    }

    /// Moves `amount` tokens from the calling parent to one of their
    /// children.
    ///
    /// # Errors
    ///
    /// [`ApiError::Forbidden`] when the caller is not a parent or not the
    /// child's parent, [`ApiError::BadRequest`] for a non-positive amount,
    /// [`ApiError::InsufficientTokens`] when the parent cannot cover it.
    pub async fn distribute(
        &self,
        caller: &Caller,
        child_id: UserId,
        amount: i64,
    ) -> Result<(), ApiError> {
        caller.require_role(&[Role::Parent])?;
        if amount <= 0 {
            return Err(ApiError::BadRequest("amount must be positive".to_string()));
        }
        let child = self.get(child_id).await?;
        if child.parent_id != Some(caller.id) {
            return Err(ApiError::Forbidden(format!(
                "user {child_id} is not a child of user {}",
                caller.id
            )));
        }
        let parent = self.get(caller.id).await?;
        if parent.balance < amount {
            return Err(ApiError::InsufficientTokens);
        }

        self.store
            .transfer_balance(caller.id, child_id, amount)
            .await?;
        tracing::info!(parent_id = %caller.id, child_id = %child_id, amount, "tokens distributed");
        Ok(())
    }

    /// Credits tokens bought through the payment provider. No role
    /// precondition: the payment itself is the authorization.
    ///
    /// # Errors
    ///
    /// [`ApiError::BadRequest`] for a non-positive amount,
    /// [`ApiError::NotFound`] for an unknown user.
    pub async fn credit_from_payment(&self, user: UserId, amount: i64) -> Result<User, ApiError> {
        if amount <= 0 {
            return Err(ApiError::BadRequest("amount must be positive".to_string()));
        }
        let user = self.store.adjust_balance(user, amount).await?;
        tracing::info!(user_id = %user.id, amount, balance = user.balance, "payment credited");
        Ok(user)
    }

    async fn ensure_email_free(&self, email: &str) -> Result<(), ApiError> {
        if self.store.find_user_by_email(email).await?.is_some() {
            return Err(ApiError::EmailAlreadyExists(email.to_string()));
        }
        Ok(())
    }
}

fn checked_email(email: &str) -> Result<String, ApiError> {
    let email = required_text("email", email)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(ApiError::BadRequest(format!("invalid email: {email}"))),
    }
}
