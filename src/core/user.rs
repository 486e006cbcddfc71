//! User business logic - Account creation and lookup.

use crate::{
    entities::{User, Wallet, user, wallet},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*};

/// Creates a user. Ids are assigned by the caller and never change afterwards.
pub async fn create_user<C>(db: &C, id: &str, username: &str) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    if id.trim().is_empty() || username.trim().is_empty() {
        return Err(Error::InvalidInput {
            message: "User id and username cannot be empty".to_string(),
        });
    }

    let now = chrono::Utc::now();
    let user = user::ActiveModel {
        id: Set(id.to_string()),
        username: Set(username.trim().to_string()),
        phone: Set(None),
        email: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    user.insert(db).await.map_err(Into::into)
}

/// Finds a user by id, returning None if it does not exist.
pub async fn get_user_by_id<C>(db: &C, user_id: &str) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Loads a user and their wallet, if they have charged one yet.
pub async fn get_user_info<C>(
    db: &C,
    user_id: &str,
) -> Result<(user::Model, Option<wallet::Model>)>
where
    C: ConnectionTrait,
{
    let user = get_user_by_id(db, user_id)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            user_id: user_id.to_string(),
        })?;
    let wallet = Wallet::find()
        .filter(wallet::Column::UserId.eq(user_id))
        .one(db)
        .await?;
    Ok((user, wallet))
}

/// Fails with [`Error::UserNotFound`] unless the user exists.
pub(crate) async fn require_user<C>(db: &C, user_id: &str) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    get_user_by_id(db, user_id)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            user_id: user_id.to_string(),
        })
}
