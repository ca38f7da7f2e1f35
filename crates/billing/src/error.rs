//! Billing error types

use thiserror::Error;

/// Result alias used across the billing crate
pub type BillingResult<T> = Result<T, BillingError>;

#[derive(Debug, Error)]
pub enum BillingError {
    /// Caller lacks the role or ownership required for the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A referenced entity (plan, team, subscription, activation, status) is missing
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Subscription {0} has no pending order")]
    NoPendingOrder(i64),

    #[error("Invalid order transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Optimistic version check on the subscription row failed
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Constraint violation or transaction failure in the ledger store
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for BillingError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => BillingError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) => {
                if db.is_foreign_key_violation() {
                    tracing::warn!(message = db.message(), "Foreign key constraint rejected write");
                } else if db.is_unique_violation() {
                    tracing::warn!(message = db.message(), "Unique constraint rejected write");
                } else {
                    tracing::error!(code = ?db.code(), message = db.message(), "Ledger store error");
                }
                BillingError::Database(db.message().to_string())
            }
            _ => {
                tracing::error!(error = ?err, "Non-database SQLx error");
                BillingError::Database(err.to_string())
            }
        }
    }
}

impl From<sqlx::migrate::MigrateError> for BillingError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        BillingError::Database(format!("migration failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: BillingError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, BillingError::NotFound(_)));
    }
}
