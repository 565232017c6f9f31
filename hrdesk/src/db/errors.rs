use thiserror::Error;

/// Unified error type for database operations that application code can handle
#[derive(Error, Debug)]
pub enum DbError {
    /// Entity not found by the given identifier
    #[error("Entity not found")]
    NotFound,

    /// Unique constraint violation
    #[error("Unique constraint violation")]
    UniqueViolation {
        /// Column(s) covered by the violated constraint, e.g. `email` or `org_id, email`
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// Foreign key constraint violation
    #[error("Foreign key constraint violation")]
    ForeignKeyViolation { table: Option<String>, message: String },

    /// Check constraint violation
    #[error("Check constraint violation")]
    CheckViolation { table: Option<String>, message: String },

    /// A conditional update matched no row because the entity changed state concurrently.
    #[error("{entity_type} {entity_id} is no longer in a state that allows this change")]
    StaleState { entity_type: String, entity_id: String },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convert from sqlx::Error using proper sqlx error categorization
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                // SQLite reports neither table nor constraint name, only "UNIQUE constraint failed: t.col"
                let (table, constraint) = match db_err.table() {
                    Some(table) => (Some(table.to_string()), db_err.constraint().map(|s| s.to_string())),
                    None => extract_constraint_target(&message),
                };

                if db_err.is_unique_violation() {
                    DbError::UniqueViolation {
                        constraint,
                        table,
                        message,
                    }
                } else if db_err.is_foreign_key_violation() {
                    DbError::ForeignKeyViolation { table, message }
                } else if db_err.is_check_violation() {
                    DbError::CheckViolation { table, message }
                } else {
                    // All other database errors are non-recoverable - convert to anyhow
                    DbError::Other(anyhow::Error::from(err))
                }
            }
            // All other sqlx errors are non-recoverable - convert to anyhow with context
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

/// Extract table and column list from a SQLite constraint message.
///
/// "UNIQUE constraint failed: members.org_id, members.email" -> (Some("members"), Some("org_id, email"))
fn extract_constraint_target(message: &str) -> (Option<String>, Option<String>) {
    let Some((_, target)) = message.split_once("failed: ") else {
        return (None, None);
    };

    let mut table = None;
    let mut columns = Vec::new();
    for qualified in target.split(',') {
        if let Some((t, column)) = qualified.trim().split_once('.') {
            table.get_or_insert_with(|| t.to_string());
            columns.push(column.to_string());
        }
    }

    if columns.is_empty() {
        (table, None)
    } else {
        (table, Some(columns.join(", ")))
    }
}

/// Type alias for database operation results
pub type Result<T> = std::result::Result<T, DbError>;
