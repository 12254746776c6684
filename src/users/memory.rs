use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use super::repo_types::{CreateUserOptions, ListUsersOptions, NewUser, UpdateUserOptions, User};
use super::store::{check_credentials, UsersError, UsersResult, UsersStore};

/// In-process [`UsersStore`] with the same visibility and uniqueness rules as the
/// PostgreSQL one. The mutex stands in for the database's unique index.
#[derive(Default)]
pub struct InMemoryUsersStore {
    rows: Mutex<Vec<User>>,
}

impl InMemoryUsersStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row, soft-deleted ones included.
    pub async fn raw_rows(&self) -> Vec<User> {
        self.rows.lock().await.clone()
    }

    fn live<'a>(rows: &'a [User]) -> impl DoubleEndedIterator<Item = &'a User> {
        rows.iter().filter(|u| u.deleted_at.is_none())
    }
}

#[async_trait]
impl UsersStore for InMemoryUsersStore {
    async fn authenticate(&self, email: &str, password: &str) -> UsersResult<User> {
        let rows = self.rows.lock().await;
        let found = Self::live(&rows).find(|u| u.email == email).cloned();
        drop(rows);
        check_credentials(found, password)
    }

    async fn create(&self, options: CreateUserOptions) -> UsersResult<User> {
        let new_user = NewUser::from_options(options);
        let mut rows = self.rows.lock().await;
        if Self::live(&rows).any(|u| u.email == new_user.email) {
            return Err(UsersError::Conflict);
        }
        if rows.iter().any(|u| u.uid == new_user.uid) {
            return Err(anyhow::anyhow!("duplicate uid {}", new_user.uid).into());
        }

        let now = OffsetDateTime::now_utc();
        let user = User {
            id: rows.last().map_or(1, |u| u.id + 1),
            uid: new_user.uid,
            email: new_user.email,
            password: new_user.password,
            salt: new_user.salt,
            nickname: new_user.nickname,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        rows.push(user.clone());
        Ok(user)
    }

    async fn list(&self, options: ListUsersOptions) -> UsersResult<(Vec<User>, i64)> {
        let (limit, offset) = options.pagination.limit_offset();
        let rows = self.rows.lock().await;
        let total = Self::live(&rows).count() as i64;
        let page = Self::live(&rows)
            .rev()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn get_by_id(&self, id: i64) -> UsersResult<User> {
        let rows = self.rows.lock().await;
        let found = Self::live(&rows).find(|u| u.id == id).cloned();
        found.ok_or(UsersError::NotFound)
    }

    async fn get_by_uid(&self, uid: &str) -> UsersResult<User> {
        let rows = self.rows.lock().await;
        let found = Self::live(&rows).find(|u| u.uid == uid).cloned();
        found.ok_or(UsersError::NotFound)
    }

    async fn update(&self, id: i64, options: UpdateUserOptions) -> UsersResult<()> {
        let mut rows = self.rows.lock().await;
        if let Some(user) = rows.iter_mut().find(|u| u.id == id && u.deleted_at.is_none()) {
            user.nickname = options.nickname;
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> UsersResult<()> {
        let mut rows = self.rows.lock().await;
        if let Some(user) = rows.iter_mut().find(|u| u.id == id && u.deleted_at.is_none()) {
            user.deleted_at = Some(OffsetDateTime::now_utc());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::dbutil::Pagination;

    fn options(email: &str, password: &str, nickname: &str) -> CreateUserOptions {
        CreateUserOptions {
            email: email.into(),
            password: password.into(),
            nickname: nickname.into(),
        }
    }

    async fn seeded(n: usize) -> InMemoryUsersStore {
        let store = InMemoryUsersStore::new();
        for i in 0..n {
            store
                .create(options(&format!("user{i}@x.com"), "pw", &format!("n{i}")))
                .await
                .unwrap();
        }
        store
    }

    fn page(page: i64, page_size: i64) -> ListUsersOptions {
        ListUsersOptions {
            pagination: Pagination::new(page, page_size),
        }
    }

    #[tokio::test]
    async fn end_to_end_create_and_authenticate() {
        let store = InMemoryUsersStore::new();
        let created = store.create(options("a@x.com", "secret", "A")).await.unwrap();
        assert!(!created.uid.is_empty());
        assert_ne!(created.password, "secret");

        let authed = store.authenticate("a@x.com", "secret").await.unwrap();
        assert_eq!(authed.uid, created.uid);

        assert!(matches!(
            store.authenticate("a@x.com", "wrong").await,
            Err(UsersError::BadCredentials)
        ));
        assert!(matches!(
            store.create(options("a@x.com", "other", "A2")).await,
            Err(UsersError::Conflict)
        ));
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_look_the_same() {
        let store = seeded(1).await;
        let unknown = store.authenticate("ghost@x.com", "pw").await.unwrap_err();
        let wrong = store.authenticate("user0@x.com", "nope").await.unwrap_err();
        assert!(matches!(unknown, UsersError::BadCredentials));
        assert!(matches!(wrong, UsersError::BadCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn concurrent_creates_for_one_email_yield_one_conflict() {
        let store = Arc::new(InMemoryUsersStore::new());
        let handles: Vec<_> = (0..2)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .create(options("race@x.com", "pw", &format!("r{i}")))
                        .await
                })
            })
            .collect();

        let mut ok = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(UsersError::Conflict) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((ok, conflicts), (1, 1));
    }

    #[tokio::test]
    async fn list_is_newest_first_and_counts_everything() {
        let store = seeded(5).await;
        let (users, total) = store.list(page(1, 2)).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(
            users.iter().map(|u| u.email.as_str()).collect::<Vec<_>>(),
            ["user4@x.com", "user3@x.com"]
        );

        let (users, total) = store.list(page(3, 2)).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "user0@x.com");

        let (users, _) = store.list(page(4, 2)).await.unwrap();
        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn list_zero_zero_is_first_default_page() {
        let store = seeded(25).await;
        let (a, ta) = store.list(page(0, 0)).await.unwrap();
        let (b, tb) = store.list(page(1, 20)).await.unwrap();
        assert_eq!(ta, tb);
        assert_eq!(a.len(), 20);
        assert_eq!(
            a.iter().map(|u| u.id).collect::<Vec<_>>(),
            b.iter().map(|u| u.id).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn deleted_users_disappear_everywhere() {
        let store = seeded(3).await;
        let victim = store.get_by_uid(&store.raw_rows().await[1].uid).await.unwrap();
        store.delete(victim.id).await.unwrap();

        assert!(matches!(store.get_by_id(victim.id).await, Err(UsersError::NotFound)));
        assert!(matches!(
            store.get_by_uid(&victim.uid).await,
            Err(UsersError::NotFound)
        ));
        assert!(matches!(
            store.authenticate(&victim.email, "pw").await,
            Err(UsersError::BadCredentials)
        ));
        let (users, total) = store.list(page(1, 20)).await.unwrap();
        assert_eq!(total, 2);
        assert!(users.iter().all(|u| u.id != victim.id));

        // kept for history
        assert_eq!(store.raw_rows().await.len(), 3);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = seeded(1).await;
        let user = store.get_by_id(1).await.unwrap();
        store.delete(user.id).await.unwrap();
        store.delete(user.id).await.unwrap();
        store.delete(999).await.unwrap();
    }

    #[tokio::test]
    async fn email_can_be_reused_after_delete() {
        let store = seeded(1).await;
        let old = store.get_by_id(1).await.unwrap();
        store.delete(old.id).await.unwrap();
        let new = store.create(options("user0@x.com", "pw2", "again")).await.unwrap();
        assert_ne!(new.id, old.id);
        assert_ne!(new.uid, old.uid);
    }

    #[tokio::test]
    async fn update_touches_only_nickname() {
        let store = seeded(1).await;
        let before = store.get_by_id(1).await.unwrap();
        store
            .update(
                before.id,
                UpdateUserOptions {
                    nickname: "renamed".into(),
                },
            )
            .await
            .unwrap();
        let after = store.get_by_id(1).await.unwrap();

        assert_eq!(after.nickname, "renamed");
        assert_eq!(after.email, before.email);
        assert_eq!(after.password, before.password);
        assert_eq!(after.salt, before.salt);
        assert_eq!(after.uid, before.uid);
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at >= before.updated_at);
        assert!(store.authenticate("user0@x.com", "pw").await.is_ok());
    }

    #[tokio::test]
    async fn update_of_missing_user_is_silently_accepted() {
        let store = seeded(1).await;
        store
            .update(
                42,
                UpdateUserOptions {
                    nickname: "ghost".into(),
                },
            )
            .await
            .expect("update on a missing id must not fail");
        let (users, _) = store.list(ListUsersOptions::default()).await.unwrap();
        assert!(users.iter().all(|u| u.nickname != "ghost"));
    }

    #[tokio::test]
    async fn lookups_miss_with_not_found() {
        let store = seeded(1).await;
        assert!(matches!(store.get_by_id(2).await, Err(UsersError::NotFound)));
        assert!(matches!(
            store.get_by_uid("nope").await,
            Err(UsersError::NotFound)
        ));
    }

    #[tokio::test]
    async fn lookups_release_the_rows_lock() {
        let store = seeded(1).await;
        let by_uid = store.get_by_uid(&store.raw_rows().await[0].uid).await.unwrap();
        let by_id = store.get_by_id(by_uid.id).await.unwrap();
        let authed = store.authenticate("user0@x.com", "pw").await.unwrap();
        assert_eq!((by_id.id, authed.id), (by_uid.id, by_uid.id));

        let created = tokio::time::timeout(
            Duration::from_secs(1),
            store.create(options("b@x.com", "pw", "b")),
        )
        .await
        .expect("rows lock still held after lookups")
        .unwrap();
        assert_eq!(created.id, 2);
    }
}
