use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{StoreError, UserStore};
use super::repo_types::{NewUser, User};

/// `UserStore` kept in process memory. Email uniqueness is checked under the same
/// lock as the insert, mirroring the database constraint.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate);
        }
        let row = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            mobile: user.mobile,
            pin_hash: user.pin_hash,
            role: user.role,
            status: user.status,
            image: user.image,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(row.clone());
        Ok(row)
    }

    async fn find_by_identifier(
        &self,
        email: &str,
        mobile: Option<i64>,
    ) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        let by_email = users.iter().find(|u| u.email == email);
        let found = by_email.or_else(|| {
            mobile.and_then(|m| users.iter().find(|u| u.mobile == m))
        });
        Ok(found.cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        Ok(users.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, mobile: i64) -> NewUser {
        NewUser {
            name: "Ada".into(),
            email: email.into(),
            mobile,
            pin_hash: "$2b$10$hash".into(),
            role: "user".into(),
            status: "active".into(),
            image: None,
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_email() {
        let store = InMemoryUserStore::new();
        store.insert(new_user("ada@x.com", 555)).await.expect("first insert");
        let err = store.insert(new_user("ada@x.com", 777)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn find_by_identifier_matches_email_or_mobile() {
        let store = InMemoryUserStore::new();
        let ada = store.insert(new_user("ada@x.com", 555)).await.unwrap();

        let by_email = store.find_by_identifier("ada@x.com", None).await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(ada.id));

        let by_mobile = store.find_by_identifier("555", Some(555)).await.unwrap();
        assert_eq!(by_mobile.map(|u| u.id), Some(ada.id));

        let missing = store.find_by_identifier("nobody@x.com", None).await.unwrap();
        assert!(missing.is_none());
    }
}
