use crate::application::repos::RepoError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const QUERY_CANCELED: &str = "57014";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const ADMIN_SHUTDOWN: &str = "57P01";

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Unavailable("connection pool timed out".into()),
        sqlx::Error::PoolClosed => RepoError::Unavailable("connection pool closed".into()),
        sqlx::Error::Io(io) => RepoError::Unavailable(io.to_string()),
        sqlx::Error::Tls(tls) => RepoError::Unavailable(tls.to_string()),
        sqlx::Error::Database(db) => {
            let code = db.code();
            let code = code.as_deref();
            let message = db.message();
            if code == Some(UNIQUE_VIOLATION) || message.contains("duplicate key") {
                RepoError::Duplicate {
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                }
            } else if code == Some(FOREIGN_KEY_VIOLATION)
                || message.contains("violates foreign key constraint")
                || message.contains("invalid input syntax")
            {
                RepoError::InvalidInput {
                    message: message.to_string(),
                }
            } else if message.contains("violates") {
                RepoError::Integrity {
                    message: message.to_string(),
                }
            } else if code == Some(QUERY_CANCELED)
                || message.contains("canceling statement due to user request")
            {
                RepoError::Timeout
            } else if matches!(
                code,
                Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED | ADMIN_SHUTDOWN)
            ) {
                RepoError::Unavailable(message.to_string())
            } else {
                RepoError::from_persistence(message)
            }
        }
        other => RepoError::from_persistence(other),
    }
}

/// `ILIKE` pattern matching `search` as a literal substring.
pub(crate) fn contains_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for ch in search.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

pub(crate) fn convert_count(value: i64) -> Result<u64, RepoError> {
    value
        .try_into()
        .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
}
