//! Database credentials for the query engine

use std::path::Path;

pub const USERNAME_VAR: &str = "SQL_USERNAME";
pub const PASSWORD_VAR: &str = "SQL_PASSWORD";
pub const DATABASE_VAR: &str = "SQL_DATABASE";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub database: String,
}

// Keeps the password out of debug output
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialsError {
    pub missing: Vec<&'static str>,
}

impl std::fmt::Display for CredentialsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "missing credentials: set {} in the environment or the .env file",
            self.missing.join(", ")
        )
    }
}

impl std::error::Error for CredentialsError {}

impl Credentials {
    /// Load `env_file` (if present) into the environment, then read the SQL_* variables
    pub fn load(env_file: &Path) -> Result<Self, CredentialsError> {
        match dotenvy::from_path(env_file) {
            Ok(()) => log::debug!("Loaded environment from {}", env_file.display()),
            Err(e) if e.not_found() => {
                log::debug!("No env file at {}", env_file.display())
            }
            Err(e) => log::warn!("Could not load {}: {}", env_file.display(), e),
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, CredentialsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut get = |name: &'static str| {
            let value = lookup(name).filter(|v| !v.trim().is_empty());
            if value.is_none() {
                missing.push(name);
            }
            value.unwrap_or_default()
        };

        let username = get(USERNAME_VAR);
        let password = get(PASSWORD_VAR);
        let database = get(DATABASE_VAR);

        if !missing.is_empty() {
            return Err(CredentialsError { missing });
        }
        Ok(Self {
            username,
            password,
            database,
        })
    }

    /// `user/password@database`
    pub fn connection_string(&self) -> String {
        format!("{}/{}@{}", self.username, self.password, self.database)
    }

    /// Connection string safe to log
    pub fn masked(&self) -> String {
        format!("{}/***@{}", self.username, self.database)
    }
}
