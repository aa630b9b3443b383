/// Payment model and database operations
///
/// A payment references exactly one paid target, a course or a lesson. It is
/// written once as "pending" and only the provider fields
/// (`stripe_product_id`, `stripe_price_id`, `stripe_session_id`,
/// `payment_url`) are filled in afterwards. A row whose session fields are
/// still NULL is an orphaned pending payment.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE payments (
///     id UUID PRIMARY KEY,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     payment_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     paid_course_id UUID REFERENCES courses(id) ON DELETE RESTRICT,
///     paid_lesson_id UUID REFERENCES lessons(id) ON DELETE RESTRICT,
///     amount NUMERIC(10, 2) NOT NULL CHECK (amount > 0),
///     payment_method TEXT NOT NULL CHECK (payment_method IN ('cash', 'transfer')),
///     stripe_product_id TEXT,
///     stripe_price_id TEXT,
///     stripe_session_id TEXT,
///     payment_url TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CHECK (num_nonnulls(paid_course_id, paid_lesson_id) = 1)
/// );
/// ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = "id, user_id, payment_date, paid_course_id, paid_lesson_id, amount, \
     payment_method, stripe_product_id, stripe_price_id, stripe_session_id, payment_url, \
     created_at, updated_at";

/// How the payment is settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Transfer,
}

impl PaymentMethod {
    /// Converts the method to its database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Transfer => "transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored payment method is not recognised
#[derive(Debug, thiserror::Error)]
#[error("Unknown payment method: {0}")]
pub struct UnknownPaymentMethod(pub String);

impl FromStr for PaymentMethod {
    type Err = UnknownPaymentMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "transfer" => Ok(PaymentMethod::Transfer),
            other => Err(UnknownPaymentMethod(other.to_string())),
        }
    }
}

impl TryFrom<String> for PaymentMethod {
    type Error = UnknownPaymentMethod;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Payment record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,

    /// Paying user
    pub user_id: Uuid,

    pub payment_date: DateTime<Utc>,

    /// Paid course (exclusive with `paid_lesson_id`)
    pub paid_course_id: Option<Uuid>,

    /// Paid lesson (exclusive with `paid_course_id`)
    pub paid_lesson_id: Option<Uuid>,

    /// Amount in major currency units, two decimal places
    pub amount: Decimal,

    #[sqlx(try_from = "String")]
    pub payment_method: PaymentMethod,

    pub stripe_product_id: Option<String>,

    pub stripe_price_id: Option<String>,

    pub stripe_session_id: Option<String>,

    /// Checkout page the user is sent to
    pub payment_url: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// True once a checkout session has been attached
    pub fn has_session(&self) -> bool {
        self.stripe_session_id.is_some()
    }
}

/// Input for recording a pending payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePayment {
    pub user_id: Uuid,
    pub paid_course_id: Option<Uuid>,
    pub paid_lesson_id: Option<Uuid>,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
}

/// Provider identifiers written after a checkout session is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSession {
    pub product_id: String,
    pub price_id: String,
    pub session_id: String,
    pub url: String,
}

/// Sort order for payment listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaymentOrdering {
    /// `payment_date`
    DateAscending,

    /// `-payment_date`
    #[default]
    DateDescending,
}

impl FromStr for PaymentOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment_date" => Ok(PaymentOrdering::DateAscending),
            "-payment_date" => Ok(PaymentOrdering::DateDescending),
            other => Err(format!("Unsupported ordering: {}", other)),
        }
    }
}

/// Filters for payment listings. None means "do not filter".
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub user_id: Option<Uuid>,
    pub paid_course_id: Option<Uuid>,
    pub paid_lesson_id: Option<Uuid>,
    pub payment_method: Option<PaymentMethod>,
    pub ordering: PaymentOrdering,
}

impl Payment {
    /// Inserts a pending payment with no provider fields
    pub async fn create(pool: &PgPool, data: CreatePayment) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO payments (id, user_id, paid_course_id, paid_lesson_id, amount, payment_method)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PAYMENT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Payment>(&query)
            .bind(Uuid::new_v4())
            .bind(data.user_id)
            .bind(data.paid_course_id)
            .bind(data.paid_lesson_id)
            .bind(data.amount)
            .bind(data.payment_method.as_str())
            .fetch_one(pool)
            .await
    }

    /// Finds a payment by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1");

        sqlx::query_as::<_, Payment>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Writes the provider identifiers onto a pending payment
    ///
    /// # Returns
    ///
    /// The updated payment, or None if it no longer exists
    pub async fn attach_session(
        pool: &PgPool,
        id: Uuid,
        session: &ProviderSession,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE payments
            SET stripe_product_id = $2,
                stripe_price_id = $3,
                stripe_session_id = $4,
                payment_url = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PAYMENT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Payment>(&query)
            .bind(id)
            .bind(&session.product_id)
            .bind(&session.price_id)
            .bind(&session.session_id)
            .bind(&session.url)
            .fetch_optional(pool)
            .await
    }

    /// Lists payments matching `filter`
    pub async fn list(
        pool: &PgPool,
        filter: &PaymentFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let order = match filter.ordering {
            PaymentOrdering::DateAscending => "payment_date ASC, id ASC",
            PaymentOrdering::DateDescending => "payment_date DESC, id DESC",
        };

        let query = format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::uuid IS NULL OR paid_course_id = $2)
              AND ($3::uuid IS NULL OR paid_lesson_id = $3)
              AND ($4::text IS NULL OR payment_method = $4)
            ORDER BY {order}
            LIMIT $5 OFFSET $6
            "#
        );

        sqlx::query_as::<_, Payment>(&query)
            .bind(filter.user_id)
            .bind(filter.paid_course_id)
            .bind(filter.paid_lesson_id)
            .bind(filter.payment_method.map(|m| m.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Counts payments matching `filter` (ordering is ignored)
    pub async fn count(pool: &PgPool, filter: &PaymentFilter) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM payments
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::uuid IS NULL OR paid_course_id = $2)
              AND ($3::uuid IS NULL OR paid_lesson_id = $3)
              AND ($4::text IS NULL OR payment_method = $4)
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.paid_course_id)
        .bind(filter.paid_lesson_id)
        .bind(filter.payment_method.map(|m| m.as_str()))
        .fetch_one(pool)
        .await?;

        Ok(count)
    }
}
