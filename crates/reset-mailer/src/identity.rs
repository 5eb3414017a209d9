//! Identity provider client
//!
//! Mints password-reset action links through the provider's admin REST API
//! (`accounts:sendOobCode` with `returnOobLink`), so the provider never sends
//! its own email and the link can be rewritten before delivery.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::IdentityConfig;

/// Settings attached to a generated action link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCodeSettings {
    /// Page the user continues to after the action
    pub url: String,
    /// Ask the provider to let the app handle the code
    pub handle_code_in_app: bool,
}

impl ActionCodeSettings {
    pub fn in_app(url: &str) -> Self {
        Self {
            url: url.to_string(),
            handle_code_in_app: true,
        }
    }
}

/// Source of password reset links
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Generate a one-time password reset link for `email`
    async fn generate_password_reset_link(
        &self,
        email: &str,
        settings: &ActionCodeSettings,
    ) -> Result<String, IdentityError>;
}

#[async_trait]
impl<T: IdentityProvider + ?Sized> IdentityProvider for std::sync::Arc<T> {
    async fn generate_password_reset_link(
        &self,
        email: &str,
        settings: &ActionCodeSettings,
    ) -> Result<String, IdentityError> {
        (**self).generate_password_reset_link(email, settings).await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendOobCodePayload<'a> {
    request_type: &'static str,
    email: &'a str,
    return_oob_link: bool,
    continue_url: &'a str,
    can_handle_code_in_app: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendOobCodeResponse {
    #[serde(default)]
    oob_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorEnvelope {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// REST client for the identity toolkit admin API
pub struct IdentityToolkitClient {
    http: reqwest::Client,
    api_base: String,
    project_id: String,
    access_token: String,
}

impl IdentityToolkitClient {
    pub fn new(config: &IdentityConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create with a preconfigured HTTP client
    pub fn with_client(http: reqwest::Client, config: &IdentityConfig) -> Self {
        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            access_token: config.access_token.clone(),
        }
    }

    fn send_oob_code_url(&self) -> String {
        if self.project_id.is_empty() {
            format!("{}/v1/accounts:sendOobCode", self.api_base)
        } else {
            format!(
                "{}/v1/projects/{}/accounts:sendOobCode",
                self.api_base, self.project_id
            )
        }
    }
}

#[async_trait]
impl IdentityProvider for IdentityToolkitClient {
    #[instrument(skip(self, email, settings))]
    async fn generate_password_reset_link(
        &self,
        email: &str,
        settings: &ActionCodeSettings,
    ) -> Result<String, IdentityError> {
        let payload = SendOobCodePayload {
            request_type: "PASSWORD_RESET",
            email,
            return_oob_link: true,
            continue_url: &settings.url,
            can_handle_code_in_app: settings.handle_code_in_app,
        };

        let mut request = self.http.post(self.send_oob_code_url()).json(&payload);
        if !self.access_token.is_empty() {
            request = request.bearer_auth(&self.access_token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ProviderErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or(body);
            return Err(IdentityError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: SendOobCodeResponse =
            serde_json::from_str(&body).map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;

        debug!("Password reset link generated");
        parsed
            .oob_link
            .filter(|link| !link.is_empty())
            .ok_or_else(|| IdentityError::InvalidResponse("missing oobLink".to_string()))
    }
}

/// Identity provider errors
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Identity provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected identity provider response: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(project_id: &str) -> IdentityConfig {
        IdentityConfig {
            api_base: "https://identity.example.com/".to_string(),
            project_id: project_id.to_string(),
            access_token: "token".to_string(),
        }
    }

    #[test]
    fn test_endpoint_with_project() {
        let client = IdentityToolkitClient::new(&identity("demo-project"));
        assert_eq!(
            client.send_oob_code_url(),
            "https://identity.example.com/v1/projects/demo-project/accounts:sendOobCode"
        );
    }

    #[test]
    fn test_endpoint_without_project() {
        let client = IdentityToolkitClient::new(&identity(""));
        assert_eq!(
            client.send_oob_code_url(),
            "https://identity.example.com/v1/accounts:sendOobCode"
        );
    }

    #[test]
    fn test_payload_serialization() {
        let payload = SendOobCodePayload {
            request_type: "PASSWORD_RESET",
            email: "ann@example.com",
            return_oob_link: true,
            continue_url: "http://localhost:5173/reset-password",
            can_handle_code_in_app: true,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["requestType"], "PASSWORD_RESET");
        assert_eq!(json["returnOobLink"], true);
        assert_eq!(json["continueUrl"], "http://localhost:5173/reset-password");
        assert_eq!(json["canHandleCodeInApp"], true);
    }

    #[test]
    fn test_error_envelope_parsing() {
        let body = r#"{"error":{"code":400,"message":"EMAIL_NOT_FOUND"}}"#;
        let parsed: ProviderErrorEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.message.as_deref(), Some("EMAIL_NOT_FOUND"));
    }
}
