//! Role lookups against the `user_roles` authorization table.

use crate::api::helper;
use crate::errors::AppError;
use crate::model::AppRole;
use crate::schema::user_roles::dsl as roles_dsl;
use async_trait::async_trait;
use deadpool_diesel::postgres::Pool;
use diesel::prelude::*;
use tracing::debug;
use uuid::Uuid;

#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// All role rows held by the user.
    async fn roles_of(&self, user_id: Uuid) -> Result<Vec<AppRole>, AppError>;

    /// The user's effective role: the highest-privilege row, `None` without rows.
    async fn primary_role(&self, user_id: Uuid) -> Result<Option<AppRole>, AppError> {
        let roles = self.roles_of(user_id).await?;
        Ok(roles.into_iter().max_by_key(AppRole::privilege))
    }

    /// The highest-privilege role the user holds among `accepted`, if any.
    async fn find_role_in(
        &self,
        user_id: Uuid,
        accepted: &[AppRole],
    ) -> Result<Option<AppRole>, AppError> {
        let roles = self.roles_of(user_id).await?;
        Ok(roles
            .into_iter()
            .filter(|role| accepted.contains(role))
            .max_by_key(AppRole::privilege))
    }
}

pub struct PgRoleDirectory {
    pool: Pool,
}

impl PgRoleDirectory {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleDirectory for PgRoleDirectory {
    async fn roles_of(&self, user_id: Uuid) -> Result<Vec<AppRole>, AppError> {
        let roles = helper::run_query(&self.pool, move |conn| {
            roles_dsl::user_roles
                .filter(roles_dsl::user_id.eq(user_id))
                .select(roles_dsl::role)
                .load::<AppRole>(conn)
        })
        .await?;
        debug!("User {} holds roles {:?}", user_id, roles);
        Ok(roles)
    }

    async fn find_role_in(
        &self,
        user_id: Uuid,
        accepted: &[AppRole],
    ) -> Result<Option<AppRole>, AppError> {
        let accepted = accepted.to_vec();
        let roles = helper::run_query(&self.pool, move |conn| {
            roles_dsl::user_roles
                .filter(roles_dsl::user_id.eq(user_id))
                .filter(roles_dsl::role.eq_any(accepted))
                .select(roles_dsl::role)
                .load::<AppRole>(conn)
        })
        .await?;
        Ok(roles.into_iter().max_by_key(AppRole::privilege))
    }
}
