use std::{future::Future, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};

use super::repo_types::{CreateUserOptions, ListUsersOptions, NewUser, UpdateUserOptions, User};
use super::store::{check_credentials, UsersError, UsersResult, UsersStore, EMAIL_UNIQUE_CONSTRAINT};
use crate::dbutil::is_unique_violation;

/// PostgreSQL-backed implementation of [`UsersStore`].
#[derive(Clone)]
pub struct PgUsersStore {
    db: PgPool,
    query_timeout: Duration,
}

impl PgUsersStore {
    pub fn new(db: PgPool, query_timeout: Duration) -> Self {
        Self { db, query_timeout }
    }

    /// Bounds `fut` by the query timeout. The inner database result is left to the caller.
    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, sqlx::Error>>,
    ) -> UsersResult<Result<T, sqlx::Error>> {
        tokio::time::timeout(self.query_timeout, fut)
            .await
            .map_err(|_| {
                UsersError::Store(anyhow::anyhow!(
                    "{op}: timed out after {:?}",
                    self.query_timeout
                ))
            })
    }

    async fn run<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, sqlx::Error>>,
    ) -> UsersResult<T> {
        let value = self.bounded(op, fut).await?.context(op)?;
        Ok(value)
    }
}

#[async_trait]
impl UsersStore for PgUsersStore {
    async fn authenticate(&self, email: &str, password: &str) -> UsersResult<User> {
        let found = self
            .run(
                "find user by email",
                sqlx::query_as::<_, User>(
                    r#"
                    SELECT id, uid, email, password, salt, nickname, created_at, updated_at, deleted_at
                    FROM users
                    WHERE email = $1 AND deleted_at IS NULL
                    "#,
                )
                .bind(email)
                .fetch_optional(&self.db),
            )
            .await?;
        check_credentials(found, password)
    }

    async fn create(&self, options: CreateUserOptions) -> UsersResult<User> {
        let new_user = NewUser::from_options(options);
        let inserted = self
            .bounded(
                "insert user",
                sqlx::query_as::<_, User>(
                    r#"
                    INSERT INTO users (uid, email, password, salt, nickname)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id, uid, email, password, salt, nickname, created_at, updated_at, deleted_at
                    "#,
                )
                .bind(&new_user.uid)
                .bind(&new_user.email)
                .bind(&new_user.password)
                .bind(&new_user.salt)
                .bind(&new_user.nickname)
                .fetch_one(&self.db),
            )
            .await?;

        match inserted {
            Ok(user) => {
                info!(user_id = user.id, uid = %user.uid, "user created");
                Ok(user)
            }
            Err(e) if is_unique_violation(&e, EMAIL_UNIQUE_CONSTRAINT) => {
                debug!(email = %new_user.email, "email already registered");
                Err(UsersError::Conflict)
            }
            Err(e) => Err(UsersError::Store(anyhow::Error::new(e).context("insert user"))),
        }
    }

    async fn list(&self, options: ListUsersOptions) -> UsersResult<(Vec<User>, i64)> {
        let (limit, offset) = options.pagination.limit_offset();
        let db = &self.db;
        // Count and page come from one snapshot.
        let snapshot = async move {
            let mut tx = db.begin().await?;
            sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
                .execute(&mut *tx)
                .await?;

            let total: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
                    .fetch_one(&mut *tx)
                    .await?;

            let users = sqlx::query_as::<_, User>(
                r#"
                SELECT id, uid, email, password, salt, nickname, created_at, updated_at, deleted_at
                FROM users
                WHERE deleted_at IS NULL
                ORDER BY id DESC
                LIMIT $1 OFFSET $2
                "#,
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok::<_, sqlx::Error>((users, total))
        };
        self.run("list users", snapshot).await
    }

    async fn get_by_id(&self, id: i64) -> UsersResult<User> {
        self.run(
            "get user by id",
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, uid, email, password, salt, nickname, created_at, updated_at, deleted_at
                FROM users
                WHERE id = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(id)
            .fetch_optional(&self.db),
        )
        .await?
        .ok_or(UsersError::NotFound)
    }

    async fn get_by_uid(&self, uid: &str) -> UsersResult<User> {
        self.run(
            "get user by uid",
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, uid, email, password, salt, nickname, created_at, updated_at, deleted_at
                FROM users
                WHERE uid = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(uid)
            .fetch_optional(&self.db),
        )
        .await?
        .ok_or(UsersError::NotFound)
    }

    async fn update(&self, id: i64, options: UpdateUserOptions) -> UsersResult<()> {
        let done = self
            .run(
                "update user",
                sqlx::query(
                    r#"
                    UPDATE users
                    SET nickname = $2, updated_at = now()
                    WHERE id = $1 AND deleted_at IS NULL
                    "#,
                )
                .bind(id)
                .bind(&options.nickname)
                .execute(&self.db),
            )
            .await?;
        debug!(user_id = id, rows = done.rows_affected(), "user updated");
        Ok(())
    }

    async fn delete(&self, id: i64) -> UsersResult<()> {
        let done = self
            .run(
                "delete user",
                sqlx::query(
                    r#"
                    UPDATE users
                    SET deleted_at = now()
                    WHERE id = $1 AND deleted_at IS NULL
                    "#,
                )
                .bind(id)
                .execute(&self.db),
            )
            .await?;
        if done.rows_affected() > 0 {
            info!(user_id = id, "user deleted");
        }
        Ok(())
    }
}
