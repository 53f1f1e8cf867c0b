//! Keystone session: password authentication and service-catalog lookup.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::ApiError;

/// Service types we resolve from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    Compute,
    Network,
    Volume,
    Image,
}

impl ServiceType {
    fn catalog_name(self) -> &'static str {
        match self {
            ServiceType::Compute => "compute",
            ServiceType::Network => "network",
            ServiceType::Volume => "volumev2",
            ServiceType::Image => "image",
        }
    }
}

/// An authenticated Keystone session.
///
/// Holds the scoped token and the service catalog returned at login. Tokens
/// are not refreshed; a test run is expected to finish well within the
/// token lifetime.
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
    catalog: Vec<CatalogService>,
}

impl Session {
    /// Authenticate against Keystone with password credentials.
    pub async fn login(config: &Config) -> Result<Self, ApiError> {
        debug!(auth_url = %config.auth_url, tenant = %config.tenant, "authenticating");

        let request = AuthRequest {
            auth: AuthPayload {
                password_credentials: PasswordCredentials {
                    username: config.username.clone(),
                    password: config.password.clone(),
                },
                tenant_name: config.tenant.clone(),
            },
        };

        let url = format!("{}/tokens", config.auth_url.trim_end_matches('/'));
        let response = reqwest::Client::new().post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(ApiError::Auth(format!(
                "token request returned status {status}"
            )));
        }

        let body: AuthResponse = response.json().await?;
        Ok(Self {
            token: body.access.token.id,
            catalog: body.access.service_catalog,
        })
    }

    /// The scoped token, sent as `X-Auth-Token` on service requests.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Resolve the public endpoint for a service type.
    pub fn endpoint(&self, service: ServiceType) -> Result<&str, ApiError> {
        self.catalog
            .iter()
            .find(|s| s.service_type == service.catalog_name())
            .and_then(|s| s.endpoints.first())
            .map(|e| e.public_url.as_str())
            .ok_or_else(|| {
                ApiError::Auth(format!(
                    "service catalog has no '{}' endpoint",
                    service.catalog_name()
                ))
            })
    }
}

#[derive(Debug, Serialize)]
struct AuthRequest {
    auth: AuthPayload,
}

#[derive(Debug, Serialize)]
struct AuthPayload {
    #[serde(rename = "passwordCredentials")]
    password_credentials: PasswordCredentials,
    #[serde(rename = "tenantName")]
    tenant_name: String,
}

#[derive(Debug, Serialize)]
struct PasswordCredentials {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
struct Access {
    token: Token,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<CatalogService>,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogService {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogEndpoint {
    #[serde(rename = "publicURL")]
    public_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_response_deserialization() {
        let json = r#"{
            "access": {
                "token": {"id": "tok-123", "expires": "2026-08-07T12:00:00Z"},
                "serviceCatalog": [
                    {
                        "type": "compute",
                        "name": "nova",
                        "endpoints": [{"publicURL": "http://192.0.2.10:8774/v2.1"}]
                    },
                    {
                        "type": "network",
                        "name": "neutron",
                        "endpoints": [{"publicURL": "http://192.0.2.10:9696"}]
                    }
                ]
            }
        }"#;

        let parsed: AuthResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.access.token.id, "tok-123");

        let session = Session {
            token: parsed.access.token.id,
            catalog: parsed.access.service_catalog,
        };
        assert_eq!(
            session.endpoint(ServiceType::Compute).unwrap(),
            "http://192.0.2.10:8774/v2.1"
        );
        assert!(session.endpoint(ServiceType::Volume).is_err());
    }

    #[test]
    fn test_auth_request_shape() {
        let request = AuthRequest {
            auth: AuthPayload {
                password_credentials: PasswordCredentials {
                    username: "admin".to_string(),
                    password: "secret".to_string(),
                },
                tenant_name: "admin".to_string(),
            },
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"passwordCredentials\""));
        assert!(json.contains("\"tenantName\":\"admin\""));
    }
}
