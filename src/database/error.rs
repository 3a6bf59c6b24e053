use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {message}")]
    Connection { message: String },

    #[error("Unique constraint violation: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("Row not found")]
    NotFound,

    #[error("Database query error: {message}")]
    Query { message: String },
}

impl DatabaseError {
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            sqlx::Error::Database(db_err) => {
                // 23505 = unique_violation
                if db_err.code().as_deref() == Some("23505") {
                    return DatabaseError::UniqueViolation {
                        constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                    };
                }
                DatabaseError::Query {
                    message: db_err.to_string(),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::Connection {
                    message: err.to_string(),
                }
            }
            _ => DatabaseError::Query {
                message: err.to_string(),
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, DatabaseError::Connection { .. })
    }
}
