//! Shared utility functions for provider adapters.

use ax_domain::config::ProviderConfig;
use ax_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve the bearer credential for a provider from its configured
/// environment variable name (`ProviderConfig::auth_env`).
pub fn resolve_auth_env(cfg: &ProviderConfig) -> Result<String> {
    let var_name = cfg.auth_env.as_deref().ok_or_else(|| {
        Error::Auth(format!("provider '{}' has no auth_env configured", cfg.id))
    })?;
    std::env::var(var_name).map_err(|_| {
        Error::Auth(format!(
            "environment variable '{var_name}' not set or not valid UTF-8"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(auth_env: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            id: "test".into(),
            kind: Default::default(),
            base_url: "https://example.invalid".into(),
            auth_env: auth_env.map(str::to_string),
            default_model: None,
        }
    }

    #[test]
    fn resolves_from_env_var() {
        let var_name = "AX_TEST_RESOLVE_AUTH_ENV_1";
        std::env::set_var(var_name, "secret-value");
        let result = resolve_auth_env(&cfg(Some(var_name))).unwrap();
        assert_eq!(result, "secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn errors_when_unset() {
        let err = resolve_auth_env(&cfg(Some("AX_TEST_NONEXISTENT_VAR_999"))).unwrap_err();
        assert!(err.to_string().contains("AX_TEST_NONEXISTENT_VAR_999"));
    }

    #[test]
    fn errors_when_no_auth_env_configured() {
        let err = resolve_auth_env(&cfg(None)).unwrap_err();
        assert!(err.to_string().contains("no auth_env configured"));
    }
}
