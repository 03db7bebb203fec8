/// Validated JSON bodies
///
/// [`ValidJson`] deserializes a request body and runs its `validator` rules.
/// Malformed JSON and rule violations both become a 400 in the failure
/// envelope; the message is the first violation in the payload's declared
/// field order.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use crate::error::{ApiError, ValidationErrorDetail};

/// Key `validator` files struct-level (schema) errors under
const SCHEMA_FIELD: &str = "__all__";

/// A request body with an ordered list of fields
///
/// `FIELDS` decides which violation is reported first. Schema-level checks
/// are listed as `"__all__"`.
pub trait Payload: DeserializeOwned + Validate {
    const FIELDS: &'static [&'static str];
}

/// JSON body that passed validation
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: Payload,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

        value
            .validate()
            .map_err(|errors| violations(&errors, T::FIELDS))?;

        Ok(ValidJson(value))
    }
}

/// Flattens `errors` into details ordered by `order`, then by field name
pub fn violations(errors: &ValidationErrors, order: &[&str]) -> ApiError {
    let fields = errors.field_errors();

    let mut names: Vec<String> = fields.keys().map(|name| name.to_string()).collect();
    names.sort_by_key(|name| {
        let rank = order
            .iter()
            .position(|field| *field == name.as_str())
            .unwrap_or(order.len());
        (rank, name.clone())
    });

    let details: Vec<ValidationErrorDetail> = names
        .iter()
        .filter_map(|name| fields.get(name.as_str()).map(|errors| (name, errors)))
        .flat_map(|(name, errors)| {
            errors.iter().map(move |error| ValidationErrorDetail {
                field: if name == SCHEMA_FIELD {
                    error.code.to_string()
                } else {
                    name.clone()
                },
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Validation failed".to_string()),
            })
        })
        .collect();

    let message = details
        .first()
        .map(|detail| detail.message.clone())
        .unwrap_or_else(|| "Validation failed".to_string());

    ApiError::Validation {
        message,
        errors: details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Sample {
        #[validate(length(min = 3, message = "zeta too short"))]
        zeta: String,

        #[validate(length(min = 3, message = "alpha too short"))]
        alpha: String,
    }

    impl Payload for Sample {
        const FIELDS: &'static [&'static str] = &["zeta", "alpha"];
    }

    #[test]
    fn test_first_violation_follows_declared_order() {
        let sample = Sample {
            zeta: "z".to_string(),
            alpha: "a".to_string(),
        };
        let errors = sample.validate().unwrap_err();

        match violations(&errors, Sample::FIELDS) {
            ApiError::Validation { message, errors } => {
                assert_eq!(message, "zeta too short");
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[1].field, "alpha");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unlisted_fields_sort_last() {
        let sample = Sample {
            zeta: "zzz".to_string(),
            alpha: "a".to_string(),
        };
        let errors = sample.validate().unwrap_err();

        match violations(&errors, &[]) {
            ApiError::Validation { message, .. } => assert_eq!(message, "alpha too short"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
