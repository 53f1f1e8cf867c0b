//! Harness configuration.

/// Connection settings for the cloud under test.
///
/// Read from the conventional `OS_*` environment variables, with the
/// defaults a freshly deployed lab environment ships with.
#[derive(Debug, Clone)]
pub struct Config {
    /// Keystone endpoint, e.g. `http://192.0.2.10:5000/v2.0`.
    pub auth_url: String,

    /// User to authenticate as.
    pub username: String,

    /// Password for `username`.
    pub password: String,

    /// Tenant (project) to scope the token to.
    pub tenant: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let auth_url = std::env::var("OS_AUTH_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:5000/v2.0".to_string());
        let username = std::env::var("OS_USERNAME").unwrap_or_else(|_| "admin".to_string());
        let password = std::env::var("OS_PASSWORD").unwrap_or_else(|_| "admin".to_string());
        let tenant = std::env::var("OS_TENANT_NAME").unwrap_or_else(|_| "admin".to_string());

        Self {
            auth_url,
            username,
            password,
            tenant,
        }
    }

    /// Build a config pointing at an explicit Keystone endpoint.
    pub fn for_auth_url(auth_url: impl Into<String>) -> Self {
        Self {
            auth_url: auth_url.into(),
            username: "admin".to_string(),
            password: "admin".to_string(),
            tenant: "admin".to_string(),
        }
    }
}
