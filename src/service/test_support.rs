//! Fixtures shared by the service tests.
#![allow(clippy::panic)]

use std::sync::Arc;

use crate::domain::{
    Caller, Kermesse, NewKermesse, NewStand, NewUser, Role, Stand, StandKind, User, UserId,
};
use crate::persistence::{MemoryStore, Store};

pub(crate) fn store() -> Arc<dyn Store> {
    Arc::new(MemoryStore::new())
}

pub(crate) fn caller(user: &User) -> Caller {
    Caller::new(user.id, user.role)
}

pub(crate) async fn seed_user(
    store: &Arc<dyn Store>,
    email: &str,
    role: Role,
    parent: Option<UserId>,
    balance: i64,
) -> User {
    let Ok(user) = store
        .create_user(NewUser {
            parent_id: parent,
            name: email.to_string(),
            email: email.to_string(),
            role,
        })
        .await
    else {
        panic!("seed user {email}");
    };
    let Ok(user) = store.adjust_balance(user.id, balance).await else {
        panic!("fund user {email}");
    };
    user
}

pub(crate) async fn seed_stand(
    store: &Arc<dyn Store>,
    owner: UserId,
    kind: StandKind,
    price: i64,
    stock: i64,
) -> Stand {
    let Ok(stand) = store
        .create_stand(NewStand {
            owner_id: owner,
            name: "Stand".to_string(),
            description: String::new(),
            kind,
            price,
            stock,
        })
        .await
    else {
        panic!("seed stand");
    };
    stand
}

pub(crate) async fn seed_kermesse(store: &Arc<dyn Store>, owner: UserId) -> Kermesse {
    let Ok(kermesse) = store
        .create_kermesse(NewKermesse {
            owner_id: owner,
            name: "Kermesse".to_string(),
            description: String::new(),
        })
        .await
    else {
        panic!("seed kermesse");
    };
    kermesse
}

pub(crate) async fn balance_of(store: &Arc<dyn Store>, id: UserId) -> i64 {
    let Ok(Some(user)) = store.find_user(id).await else {
        panic!("user {id} must exist");
    };
    user.balance
}
