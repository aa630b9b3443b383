//! Payments
//!
//! - [`orchestrator`]: records a pending payment and opens a provider
//!   checkout session for it
//! - [`money`]: decimal amounts to provider minor units
//! - [`provider`]: the provider port
//! - [`stripe`], [`mock`]: provider implementations

pub mod mock;
pub mod money;
pub mod orchestrator;
pub mod provider;
pub mod stripe;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{FieldError, NON_FIELD_ERRORS};

/// What a payment pays for: exactly one course or one lesson
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum PaymentTarget {
    Course(Uuid),
    Lesson(Uuid),
}

impl PaymentTarget {
    /// Builds the target from the two optional request fields
    ///
    /// # Errors
    ///
    /// Both or neither set is a validation error on `non_field_errors`.
    ///
    /// ```
    /// use lms_shared::payments::PaymentTarget;
    /// use uuid::Uuid;
    ///
    /// let id = Uuid::new_v4();
    /// assert_eq!(PaymentTarget::from_fields(Some(id), None), Ok(PaymentTarget::Course(id)));
    /// assert!(PaymentTarget::from_fields(None, None).is_err());
    /// assert!(PaymentTarget::from_fields(Some(id), Some(id)).is_err());
    /// ```
    pub fn from_fields(
        paid_course: Option<Uuid>,
        paid_lesson: Option<Uuid>,
    ) -> Result<Self, FieldError> {
        match (paid_course, paid_lesson) {
            (Some(course_id), None) => Ok(PaymentTarget::Course(course_id)),
            (None, Some(lesson_id)) => Ok(PaymentTarget::Lesson(lesson_id)),
            (Some(_), Some(_)) => Err(FieldError::new(
                NON_FIELD_ERRORS,
                "Specify either paid_course or paid_lesson, not both",
            )),
            (None, None) => Err(FieldError::new(
                NON_FIELD_ERRORS,
                "Specify either paid_course or paid_lesson",
            )),
        }
    }

    pub fn course_id(&self) -> Option<Uuid> {
        match self {
            PaymentTarget::Course(id) => Some(*id),
            PaymentTarget::Lesson(_) => None,
        }
    }

    pub fn lesson_id(&self) -> Option<Uuid> {
        match self {
            PaymentTarget::Course(_) => None,
            PaymentTarget::Lesson(id) => Some(*id),
        }
    }

    /// Request field the target came from
    pub fn field_name(&self) -> &'static str {
        match self {
            PaymentTarget::Course(_) => "paid_course",
            PaymentTarget::Lesson(_) => "paid_lesson",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_one_target_required() {
        let course = Uuid::new_v4();
        let lesson = Uuid::new_v4();

        assert_eq!(
            PaymentTarget::from_fields(None, Some(lesson)),
            Ok(PaymentTarget::Lesson(lesson))
        );

        let both = PaymentTarget::from_fields(Some(course), Some(lesson)).unwrap_err();
        assert_eq!(both.field, NON_FIELD_ERRORS);

        let neither = PaymentTarget::from_fields(None, None).unwrap_err();
        assert_eq!(neither.field, NON_FIELD_ERRORS);
    }

    #[test]
    fn test_target_accessors() {
        let id = Uuid::new_v4();
        let target = PaymentTarget::Course(id);
        assert_eq!(target.course_id(), Some(id));
        assert_eq!(target.lesson_id(), None);
        assert_eq!(target.field_name(), "paid_course");
    }
}
