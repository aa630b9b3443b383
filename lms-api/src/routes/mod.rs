/// API route handlers
///
/// - `health`: health check
/// - `auth`: token obtain and refresh
/// - `users`: registration and account management
/// - `courses`, `lessons`: owner-scoped CRUD
/// - `subscriptions`: course subscription toggle
/// - `payments`: checkout sessions and payment history
/// - `pagination`: page parameters and the paged response envelope

pub mod auth;
pub mod courses;
pub mod health;
pub mod lessons;
pub mod pagination;
pub mod payments;
pub mod subscriptions;
pub mod users;

use serde::{Deserialize, Deserializer};

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        preview: Option<Option<String>>,
    }

    #[test]
    fn test_double_option() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.preview, None);

        let cleared: Patch = serde_json::from_str(r#"{"preview": null}"#).unwrap();
        assert_eq!(cleared.preview, Some(None));

        let set: Patch = serde_json::from_str(r#"{"preview": "a.png"}"#).unwrap();
        assert_eq!(set.preview, Some(Some("a.png".to_string())));
    }
}
