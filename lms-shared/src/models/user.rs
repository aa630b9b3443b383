/// User model and database operations
///
/// Users register with an email address and a password. They are never
/// hard-deleted: the API deactivates them on request and the worker
/// deactivates accounts that have not logged in for a configurable number
/// of days. Group membership (see [`Group`]) lives in `user_groups`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY,
///     email TEXT NOT NULL,              -- unique on LOWER(email)
///     password_hash TEXT NOT NULL,
///     first_name VARCHAR(150) NOT NULL DEFAULT '',
///     last_name VARCHAR(150) NOT NULL DEFAULT '',
///     phone VARCHAR(20),
///     city VARCHAR(100),
///     avatar TEXT,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     is_staff BOOLEAN NOT NULL DEFAULT FALSE,
///     is_superuser BOOLEAN NOT NULL DEFAULT FALSE,
///     last_login TIMESTAMPTZ,
///     date_joined TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use lms_shared::models::user::{User, CreateUser};
/// use lms_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "student@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     ..Default::default()
/// }).await?;
///
/// let found = User::find_by_email(&pool, "STUDENT@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone, city, avatar, \
     is_active, is_staff, is_superuser, last_login, date_joined, updated_at";

/// Named permission group a user can belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    /// May read and update every course and lesson, but never create or delete
    Moderators,
}

impl Group {
    /// Name stored in `user_groups.group_name`
    pub fn as_str(&self) -> &'static str {
        match self {
            Group::Moderators => "moderators",
        }
    }
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    /// Email address, unique ignoring case
    pub email: String,

    /// Argon2id password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub first_name: String,

    pub last_name: String,

    /// Phone number (at most 20 characters)
    pub phone: Option<String>,

    /// City (at most 100 characters)
    pub city: Option<String>,

    /// Avatar image path or URL
    pub avatar: Option<String>,

    /// Inactive users cannot authenticate
    pub is_active: bool,

    pub is_staff: bool,

    pub is_superuser: bool,

    /// When the user last obtained a token pair (None if never)
    pub last_login: Option<DateTime<Utc>>,

    pub date_joined: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,

    /// Argon2id password hash (NOT the plaintext password)
    pub password_hash: String,

    pub first_name: String,

    pub last_name: String,

    pub phone: Option<String>,

    pub city: Option<String>,

    pub avatar: Option<String>,
}

/// Input for updating an existing user
///
/// All fields are optional. Only non-None fields are written; the nested
/// options allow clearing a nullable column with `Some(None)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub email: Option<String>,

    pub password_hash: Option<String>,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    pub phone: Option<Option<String>>,

    pub city: Option<Option<String>>,

    pub avatar: Option<Option<String>>,
}

impl UpdateUser {
    /// True when no field would be written
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password_hash.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.city.is_none()
            && self.avatar.is_none()
    }
}

impl User {
    /// Creates a new, active, non-staff user
    ///
    /// # Errors
    ///
    /// Returns an error if the email is already taken (unique violation on
    /// `users_email_lower_idx`) or the database is unreachable.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, phone, city, avatar)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(Uuid::new_v4())
            .bind(data.email)
            .bind(data.password_hash)
            .bind(data.first_name)
            .bind(data.last_name)
            .bind(data.phone)
            .bind(data.city)
            .bind(data.avatar)
            .fetch_one(pool)
            .await
    }

    /// Finds a user by ID, whether active or not
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email address, ignoring case
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)");

        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Updates an existing user
    ///
    /// Only non-None fields in `data` are written. `updated_at` is always
    /// refreshed.
    ///
    /// # Returns
    ///
    /// The updated user, or None if no user has this ID
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use lms_shared::models::user::{User, UpdateUser};
    /// # use sqlx::PgPool;
    /// # use uuid::Uuid;
    /// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    /// let update = UpdateUser {
    ///     city: Some(Some("Kazan".to_string())),
    ///     phone: Some(None),
    ///     ..Default::default()
    /// };
    /// User::update(&pool, user_id, update).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        // Build dynamic update query based on which fields are present
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        let mut push = |column: &str, query: &mut String| {
            bind_count += 1;
            query.push_str(&format!(", {} = ${}", column, bind_count));
        };

        if data.email.is_some() {
            push("email", &mut query);
        }
        if data.password_hash.is_some() {
            push("password_hash", &mut query);
        }
        if data.first_name.is_some() {
            push("first_name", &mut query);
        }
        if data.last_name.is_some() {
            push("last_name", &mut query);
        }
        if data.phone.is_some() {
            push("phone", &mut query);
        }
        if data.city.is_some() {
            push("city", &mut query);
        }
        if data.avatar.is_some() {
            push("avatar", &mut query);
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {USER_COLUMNS}"));

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(email) = data.email {
            q = q.bind(email);
        }
        if let Some(password_hash) = data.password_hash {
            q = q.bind(password_hash);
        }
        if let Some(first_name) = data.first_name {
            q = q.bind(first_name);
        }
        if let Some(last_name) = data.last_name {
            q = q.bind(last_name);
        }
        if let Some(phone) = data.phone {
            q = q.bind(phone);
        }
        if let Some(city) = data.city {
            q = q.bind(city);
        }
        if let Some(avatar) = data.avatar {
            q = q.bind(avatar);
        }

        q.fetch_optional(pool).await
    }

    /// Marks a user inactive
    ///
    /// Deactivated users keep their data (courses, payments) but can no
    /// longer authenticate.
    ///
    /// # Returns
    ///
    /// True if the user existed
    pub async fn deactivate(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_active = FALSE, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deactivates every regular user whose last login predates `cutoff`
    ///
    /// Staff, superusers and users that never logged in are left untouched.
    ///
    /// # Returns
    ///
    /// Number of users deactivated
    pub async fn deactivate_inactive(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_active = FALSE, updated_at = NOW()
            WHERE is_active
              AND NOT is_staff
              AND NOT is_superuser
              AND last_login < $1
            "#,
        )
        .bind(cutoff)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Stamps the last login timestamp
    ///
    /// Called after a successful token exchange.
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET last_login = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists users with pagination, oldest first
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY date_joined, id LIMIT $1 OFFSET $2"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Counts total number of users
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Adds the user to a group (no-op if already a member)
    pub async fn add_to_group(pool: &PgPool, id: Uuid, group: Group) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_groups (user_id, group_name)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(id)
        .bind(group.as_str())
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Checks group membership
    pub async fn is_member_of(pool: &PgPool, id: Uuid, group: Group) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM user_groups WHERE user_id = $1 AND group_name = $2
            )
            "#,
        )
        .bind(id)
        .bind(group.as_str())
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_names() {
        assert_eq!(Group::Moderators.as_str(), "moderators");
    }

    #[test]
    fn test_update_user_default_is_empty() {
        let update = UpdateUser::default();
        assert!(update.is_empty());

        let update = UpdateUser {
            phone: Some(None),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            city: None,
            avatar: None,
            is_active: true,
            is_staff: false,
            is_superuser: false,
            last_login: None,
            date_joined: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("password_hash"));
    }
}
