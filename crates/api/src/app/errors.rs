use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use eafoods_core::DomainError;
use eafoods_infra::{ServiceError, StoreError};

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::Store(StoreError::Conflict(msg)) => {
            json_error(StatusCode::CONFLICT, "conflict", msg)
        }
        ServiceError::Store(e) => {
            tracing::error!(error = %e, "storage failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "internal storage error",
            )
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    let (status, code) = match err {
        DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        DomainError::InvalidId(_) => (StatusCode::BAD_REQUEST, "invalid_id"),
        DomainError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        DomainError::OutsideWindow(_) => (StatusCode::UNPROCESSABLE_ENTITY, "outside_window"),
        DomainError::InsufficientStock { .. } => (StatusCode::CONFLICT, "insufficient_stock"),
        DomainError::InvalidTransition(_) => (StatusCode::CONFLICT, "invalid_transition"),
        DomainError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
        DomainError::Unauthorized => (StatusCode::FORBIDDEN, "unauthorized"),
    };
    json_error(status, code, message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (DomainError::validation("x"), StatusCode::BAD_REQUEST),
            (DomainError::invalid_id("x"), StatusCode::BAD_REQUEST),
            (DomainError::not_found("x"), StatusCode::NOT_FOUND),
            (DomainError::outside_window("x"), StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::insufficient_stock(2, 1), StatusCode::CONFLICT),
            (DomainError::invalid_transition("x"), StatusCode::CONFLICT),
            (DomainError::conflict("x"), StatusCode::CONFLICT),
            (DomainError::Unauthorized, StatusCode::FORBIDDEN),
        ];
        for (err, status) in cases {
            assert_eq!(domain_error_to_response(err).status(), status);
        }
    }

    #[test]
    fn storage_failures_are_internal_except_conflicts() {
        let res = service_error_to_response(StoreError::Backend("down".into()).into());
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let res = service_error_to_response(StoreError::Conflict("dup".into()).into());
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }
}
