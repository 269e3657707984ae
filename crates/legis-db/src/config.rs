use legis_core::AppError;

/// Configuration for the database connection pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Read configuration from environment variables.
    ///
    /// - `DATABASE_URL` (required)
    /// - `DATABASE_MAX_CONNECTIONS` (optional, defaults to 5)
    pub fn from_env() -> Result<Self, AppError> {
        Self::optional_from_env()?.ok_or_else(|| {
            AppError::ConfigError("DATABASE_URL not set. Required for database operations.".into())
        })
    }

    /// Like [`Self::from_env`], but an unset `DATABASE_URL` means "no database"
    /// rather than an error. The CLI then keeps facts in memory.
    pub fn optional_from_env() -> Result<Option<Self>, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>, AppError> {
        let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) else {
            return Ok(None);
        };

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            None => 5,
            Some(raw) => {
                let parsed: u32 = raw.trim().parse().map_err(|_| {
                    AppError::ConfigError(format!(
                        "Invalid DATABASE_MAX_CONNECTIONS '{raw}': must be a positive integer"
                    ))
                })?;
                if parsed == 0 {
                    return Err(AppError::ConfigError(
                        "DATABASE_MAX_CONNECTIONS must be at least 1".into(),
                    ));
                }
                parsed
            }
        };

        Ok(Some(Self {
            url,
            max_connections,
        }))
    }
}
