use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bson::ser::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(m) => format!("{field}: {m}"),
                    None => format!("{field}: invalid value"),
                })
            })
            .collect();
        messages.sort();

        AppError::Validation(messages.join(", "))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Unauthorized { .. } => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Forbidden { .. } => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Conflict { .. } => (StatusCode::CONFLICT, self.to_string()),
            AppError::Database { .. }
            | AppError::Serialization { .. }
            | AppError::Internal { .. } => {
                error!("{self}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
        };

        (
            status,
            Json(json!({ "success": false, "message": message })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::AppError;
    use validator::ValidationErrors;

    #[test]
    fn test_validation_errors_flatten_to_field_messages() {
        let mut errors = ValidationErrors::new();
        let mut err = validator::ValidationError::new("length");
        err.message = Some("must be between 2-100 characters".into());
        errors.add("name", err);

        let app_err = AppError::from(errors);
        assert_eq!(
            app_err.to_string(),
            "name: must be between 2-100 characters"
        );
    }
}
