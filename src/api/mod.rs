//! HTTP handlers, one module per resource.

pub mod admin;
pub mod cart;
pub mod dashboard;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod products;
pub mod seller;
pub mod settings;
pub mod stores;
pub mod support;
pub mod users;

use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::stores::Store;
use crate::db::users::Seller;
use crate::db::{StoreRepository, UserRepository};
use crate::domain::value_objects::Role;
use crate::error::AppError;
use crate::state::AppState;

/// The caller's seller profile.
pub(crate) async fn seller_of(state: &AppState, user_id: Uuid) -> Result<Seller, AppError> {
    Ok(UserRepository::new(&state.db).seller_for_user(user_id).await?)
}

/// The store, provided the caller owns it. Admins may address any store.
pub(crate) async fn owned_store(state: &AppState, auth: &AuthUser, store_id: Uuid) -> Result<Store, AppError> {
    let stores = StoreRepository::new(&state.db);
    if auth.role == Role::Admin {
        return Ok(stores.get(store_id).await?);
    }
    let seller = seller_of(state, auth.user_id).await?;
    Ok(stores.owned_by(store_id, seller.id).await?)
}
