use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::error::{AppError, FieldError};

/// An Axum extractor that deserializes JSON and validates it using `validator::Validate`.
///
/// Drop-in replacement for `Json<T>`: malformed bodies are a 400 with the
/// parser's message, rule violations a 400 listing each failing field.
pub struct Validated<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for Validated<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| AppError::BadRequest(rejection.body_text()))?;

        value.validate().map_err(|errors| AppError::Validation(field_errors(&errors)))?;
        Ok(Validated(value))
    }
}

/// Flattens nested validator output into `field`, `parent.field` or `list[2].field` paths.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut out = Vec::new();
    collect(errors, "", &mut out);
    out.sort_by(|a, b| a.field.cmp(&b.field));
    out
}

fn collect(errors: &ValidationErrors, prefix: &str, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() { (*field).to_string() } else { format!("{prefix}.{field}") };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    out.push(FieldError {
                        field: path.clone(),
                        message: error
                            .message
                            .as_ref()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| format!("Validation failed for field '{path}'")),
                        code: error.code.to_string(),
                    });
                }
            }
            ValidationErrorsKind::Struct(inner) => collect(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(inner, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Line {
        #[validate(range(min = 1, message = "Valid quantity is required"))]
        quantity: i32,
    }

    #[derive(Validate)]
    struct Body {
        #[validate(email)]
        email: String,
        #[validate]
        lines: Vec<Line>,
    }

    #[test]
    fn test_nested_paths() {
        let body = Body { email: "nope".into(), lines: vec![Line { quantity: 1 }, Line { quantity: 0 }] };
        let errors = field_errors(&body.validate().unwrap_err());
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "lines[1].quantity"]);
        assert_eq!(errors[1].message, "Valid quantity is required");
        assert_eq!(errors[1].code, "range");
    }
}
