pub mod pagination;

pub use pagination::Pagination;

use sqlx::error::ErrorKind;

/// True when `err` is a unique violation on `constraint`.
///
/// Postgres reports the index name for violations of a unique index, so
/// partial unique indexes are matched the same way as table constraints.
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err.as_database_error() {
        Some(db_err) => {
            db_err.kind() == ErrorKind::UniqueViolation && db_err.constraint() == Some(constraint)
        }
        None => false,
    }
}
