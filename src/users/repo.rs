use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use super::repo_types::{NewUser, User};

const USER_COLUMNS: &str = "id, name, email, mobile, pin_hash, role, status, image, created_at";

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint (the `email` key) rejected the write.
    #[error("duplicate key")]
    Duplicate,
    #[error("store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if is_unique_violation(&e) {
            StoreError::Duplicate
        } else {
            StoreError::Unavailable(e)
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Persistence for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a record. Fails with [`StoreError::Duplicate`] if the email is taken.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
    /// Look up a record whose email equals `email` or whose mobile equals `mobile`.
    async fn find_by_identifier(
        &self,
        email: &str,
        mobile: Option<i64>,
    ) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn list(&self) -> Result<Vec<User>, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, mobile, pin_hash, role, status, image)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.mobile)
        .bind(&user.pin_hash)
        .bind(&user.role)
        .bind(&user.status)
        .bind(&user.image)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_by_identifier(
        &self,
        email: &str,
        mobile: Option<i64>,
    ) -> Result<Option<User>, StoreError> {
        // ORDER BY keeps the result stable if an email and another record's mobile both match.
        let row = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE email = $1 OR ($2::BIGINT IS NOT NULL AND mobile = $2)
            ORDER BY (email = $1) DESC, created_at ASC
            LIMIT 1
            "#
        ))
        .bind(email)
        .bind(mobile)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    fn db_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(TestDbError { code: Some(code) }))
    }

    #[test]
    fn unique_violation_sqlstate_becomes_duplicate() {
        assert!(is_unique_violation(&db_error("23505")));
        assert!(matches!(StoreError::from(db_error("23505")), StoreError::Duplicate));
    }

    #[test]
    fn other_sqlstate_is_unavailable() {
        assert!(!is_unique_violation(&db_error("99999")));
        assert!(matches!(
            StoreError::from(db_error("99999")),
            StoreError::Unavailable(_)
        ));
    }

    #[test]
    fn non_database_errors_are_unavailable() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn row_not_found_is_not_a_duplicate() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

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

    #[sqlx::test]
    async fn insert_duplicate_email_is_rejected_by_constraint(pool: PgPool) {
        let store = PgUserStore::new(pool);
        let first = store.insert(new_user("ada@x.com", 555)).await.unwrap();
        assert_eq!(first.email, "ada@x.com");

        let err = store.insert(new_user("ada@x.com", 777)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[sqlx::test]
    async fn find_by_identifier_by_email_or_mobile(pool: PgPool) {
        let store = PgUserStore::new(pool);
        let ada = store.insert(new_user("ada@x.com", 555)).await.unwrap();

        let by_email = store.find_by_identifier("ada@x.com", None).await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(ada.id));

        let by_mobile = store.find_by_identifier("555", Some(555)).await.unwrap();
        assert_eq!(by_mobile.map(|u| u.id), Some(ada.id));

        let unknown_mobile = store.find_by_identifier("556", Some(556)).await.unwrap();
        assert!(unknown_mobile.is_none());

        let missing = store.find_by_identifier("nobody@x.com", None).await.unwrap();
        assert!(missing.is_none());

        let by_id = store.find_by_id(ada.id).await.unwrap();
        assert_eq!(by_id.map(|u| u.mobile), Some(555));
    }

    #[sqlx::test]
    async fn email_match_wins_over_other_records_mobile(pool: PgPool) {
        let store = PgUserStore::new(pool);
        // Registered first so it would win on created_at alone.
        let by_mobile = store.insert(new_user("mobile@x.com", 42)).await.unwrap();
        let by_email = store.insert(new_user("42", 999)).await.unwrap();

        let found = store.find_by_identifier("42", Some(42)).await.unwrap().unwrap();
        assert_eq!(found.id, by_email.id);
        assert_ne!(found.id, by_mobile.id);
    }
}
