//! Mapping from sqlx errors to the domain's [`StoreError`].

use crate::domain::repositories::StoreError;

/// Returns the violated constraint name for a unique-violation error.
pub fn unique_violation_constraint(e: &sqlx::Error) -> Option<&str> {
    let db_err = e.as_database_error()?;

    if !db_err.is_unique_violation() {
        return None;
    }

    Some(db_err.constraint().unwrap_or("unknown"))
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match unique_violation_constraint(&e) {
            Some(constraint) => {
                tracing::debug!(constraint, "Unique constraint violated");
                StoreError::UniqueViolation
            }
            None => StoreError::Backend(e.to_string()),
        }
    }
}
