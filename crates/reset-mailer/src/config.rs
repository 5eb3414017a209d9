//! Environment configuration for the reset mailer
//!
//! All settings come from environment variables. Missing SMTP credentials
//! are reported at startup but never block deployment; the send fails at
//! call time instead.

use tracing::warn;

/// Default SMTP submission port (STARTTLS)
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Where users land when no continue URL is configured
pub const DEFAULT_CONTINUE_URL: &str = "http://localhost:5173/reset-password";

/// Product name used in the email subject and body
pub const DEFAULT_APP_NAME: &str = "U Health";

/// Hosting region of the deployed function
pub const DEFAULT_REGION: &str = "australia-southeast2";

/// Maximum simultaneous dispatches
pub const DEFAULT_MAX_INSTANCES: usize = 5;

/// Identity provider REST endpoint
pub const DEFAULT_IDENTITY_API_BASE: &str = "https://identitytoolkit.googleapis.com";

/// SMTP relay settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS when true, STARTTLS otherwise
    pub secure: bool,
    pub user: String,
    pub password: String,
}

impl SmtpConfig {
    /// True when host, user and password are all present
    pub fn is_complete(&self) -> bool {
        !self.host.is_empty() && !self.user.is_empty() && !self.password.is_empty()
    }

    /// Whether the relay should be given credentials at all
    pub fn has_credentials(&self) -> bool {
        !self.user.is_empty()
    }
}

/// Identity provider admin API settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    pub api_base: String,
    pub project_id: String,
    pub access_token: String,
}

/// Configuration for the reset mailer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetMailerConfig {
    pub smtp: SmtpConfig,

    /// Sender address; falls back to the SMTP user
    pub from_address: String,

    /// Application page that receives the rewritten reset link
    pub continue_url: String,

    pub app_name: String,

    pub region: String,

    /// Concurrency cap for the hosting function
    pub max_instances: usize,

    pub identity: IdentityConfig,
}

impl Default for ResetMailerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ResetMailerConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).unwrap_or_default();

        let smtp = SmtpConfig {
            host: var("SMTP_HOST"),
            port: lookup("SMTP_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            secure: lookup("SMTP_SECURE")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            user: var("SMTP_USER"),
            password: var("SMTP_PASS"),
        };

        let from_address = lookup("RESET_EMAIL_FROM")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| smtp.user.clone());

        Self {
            from_address,
            continue_url: lookup("RESET_CONTINUE_URL")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_CONTINUE_URL.to_string()),
            app_name: lookup("RESET_APP_NAME")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
            region: lookup("FUNCTION_REGION")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            max_instances: lookup("FUNCTION_MAX_INSTANCES")
                .and_then(|v| v.trim().parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_INSTANCES),
            identity: IdentityConfig {
                api_base: lookup("IDENTITY_API_BASE")
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| DEFAULT_IDENTITY_API_BASE.to_string()),
                project_id: var("IDENTITY_PROJECT_ID"),
                access_token: var("IDENTITY_ACCESS_TOKEN"),
            },
            smtp,
        }
    }

    /// Log a warning when the relay cannot possibly authenticate.
    /// Returns whether the SMTP settings are complete.
    pub fn warn_if_incomplete(&self) -> bool {
        let complete = self.smtp.is_complete();
        if !complete {
            warn!("SMTP configuration incomplete. Check environment variables.");
        }
        complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ResetMailerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ResetMailerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = ResetMailerConfig::default();
        assert_eq!(config.smtp.port, 587);
        assert!(!config.smtp.secure);
        assert_eq!(config.continue_url, "http://localhost:5173/reset-password");
        assert_eq!(config.from_address, "");
        assert_eq!(config.app_name, "U Health");
        assert_eq!(config.region, "australia-southeast2");
        assert_eq!(config.max_instances, 5);
        assert!(!config.smtp.is_complete());
    }

    #[test]
    fn test_from_address_falls_back_to_smtp_user() {
        let config = config_from(&[("SMTP_USER", "mailer@example.com")]);
        assert_eq!(config.from_address, "mailer@example.com");

        let config = config_from(&[
            ("SMTP_USER", "mailer@example.com"),
            ("RESET_EMAIL_FROM", "noreply@example.com"),
        ]);
        assert_eq!(config.from_address, "noreply@example.com");
    }

    #[test]
    fn test_secure_flag_is_case_insensitive() {
        assert!(config_from(&[("SMTP_SECURE", "TRUE")]).smtp.secure);
        assert!(config_from(&[("SMTP_SECURE", "true")]).smtp.secure);
        assert!(!config_from(&[("SMTP_SECURE", "1")]).smtp.secure);
        assert!(!config_from(&[("SMTP_SECURE", "yes")]).smtp.secure);
    }

    #[test]
    fn test_bad_port_uses_default() {
        assert_eq!(config_from(&[("SMTP_PORT", "465")]).smtp.port, 465);
        assert_eq!(config_from(&[("SMTP_PORT", "smtp")]).smtp.port, 587);
    }

    #[test]
    fn test_zero_max_instances_uses_default() {
        assert_eq!(config_from(&[("FUNCTION_MAX_INSTANCES", "0")]).max_instances, 5);
        assert_eq!(config_from(&[("FUNCTION_MAX_INSTANCES", "12")]).max_instances, 12);
    }

    #[test]
    fn test_incomplete_smtp_is_reported_not_fatal() {
        let config = config_from(&[("SMTP_HOST", "smtp.example.com"), ("SMTP_USER", "u")]);
        assert!(!config.warn_if_incomplete());

        let config = config_from(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USER", "u"),
            ("SMTP_PASS", "p"),
        ]);
        assert!(config.warn_if_incomplete());
    }
}
