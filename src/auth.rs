use keyring::Entry;

const SERVICE_NAME: &str = "parley";
const TOKEN_ENTRY: &str = "access_token";

#[derive(Debug)]
pub enum AuthError {
    KeyringError(String),
    NoToken,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::KeyringError(msg) => write!(f, "Keyring error: {}", msg),
            AuthError::NoToken => write!(f, "No access token stored. Use --login first."),
        }
    }
}

impl std::error::Error for AuthError {}

fn entry() -> Result<Entry, AuthError> {
    Entry::new(SERVICE_NAME, TOKEN_ENTRY).map_err(|e| AuthError::KeyringError(e.to_string()))
}

pub fn get_stored_token() -> Result<String, AuthError> {
    entry()?.get_password().map_err(|e| match e {
        keyring::Error::NoEntry => AuthError::NoToken,
        other => AuthError::KeyringError(other.to_string()),
    })
}

pub fn store_token(token: &str) -> Result<(), AuthError> {
    let entry = entry()?;

    // Delete existing entry if present (ignore errors)
    let _ = entry.delete_credential();

    entry
        .set_password(token)
        .map_err(|e| AuthError::KeyringError(e.to_string()))
}

pub fn delete_token() -> Result<(), AuthError> {
    entry()?
        .delete_credential()
        .map_err(|e| AuthError::KeyringError(e.to_string()))
}

/// Keyring token first, then the one from the config file.
pub fn resolve_token(config_token: Option<&str>) -> Option<String> {
    match get_stored_token() {
        Ok(token) => Some(token),
        Err(e) => {
            tracing::debug!(error = %e, "no keyring token, falling back to config");
            config_token.map(str::to_string)
        }
    }
}
