use sea_orm::{ConnectionTrait, prelude::*};

use crate::{Actor, EngineError, ResultEngine, Role, users};

use super::Engine;

impl Engine {
    /// Resolve `user_id` to an [`Actor`]. Unknown users are forbidden from
    /// everything.
    pub(super) async fn actor<C>(&self, db: &C, user_id: &str) -> ResultEngine<Actor>
    where
        C: ConnectionTrait,
    {
        let user = users::Entity::find_by_id(user_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::Forbidden(format!("unknown user {user_id}")))?;
        let role = Role::try_from(user.role.as_str()).unwrap_or_else(|err| {
            tracing::warn!(%user_id, role = %user.role, %err, "unrecognized role, treating as owner-only");
            Role::OwnerOnly
        });
        Ok(Actor::new(user.username, role))
    }

    /// Role of `user_id` as stored by the identity provider.
    pub async fn role_of(&self, user_id: &str) -> ResultEngine<Role> {
        Ok(self.actor(&self.database, user_id).await?.role)
    }
}
