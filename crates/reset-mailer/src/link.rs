//! Reset link rewriting
//!
//! The identity provider hands back an action link on its own domain. Users
//! should land on the application's reset page instead, so the action
//! parameters are lifted off the provider link and re-attached to the
//! configured continue URL.

use url::Url;

const DEFAULT_MODE: &str = "resetPassword";
const DEFAULT_LANG: &str = "en";

/// Action parameters carried by a provider reset link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetLinkParams {
    pub mode: String,
    pub oob_code: String,
    pub lang: String,
}

impl ResetLinkParams {
    /// Extract `mode`, `oobCode` and `lang` from a provider link.
    /// Missing or empty values take their defaults.
    pub fn from_provider_link(link: &str) -> Result<Self, LinkError> {
        let url = Url::parse(link).map_err(|e| LinkError::Malformed {
            link: link.to_string(),
            reason: e.to_string(),
        })?;

        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
                .filter(|value| !value.is_empty())
        };

        Ok(Self {
            mode: param("mode").unwrap_or_else(|| DEFAULT_MODE.to_string()),
            oob_code: param("oobCode").unwrap_or_default(),
            lang: param("lang").unwrap_or_else(|| DEFAULT_LANG.to_string()),
        })
    }

    /// Append the parameters to `continue_url`
    pub fn to_app_link(&self, continue_url: &str) -> String {
        let separator = if continue_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}mode={}&oobCode={}&lang={}",
            continue_url,
            separator,
            urlencoding::encode(&self.mode),
            urlencoding::encode(&self.oob_code),
            urlencoding::encode(&self.lang),
        )
    }
}

/// Rewrite a provider reset link so it points at `continue_url`
pub fn rewrite_reset_link(provider_link: &str, continue_url: &str) -> Result<String, LinkError> {
    ResetLinkParams::from_provider_link(provider_link).map(|p| p.to_app_link(continue_url))
}

/// The link that ends up in the email
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetLink {
    /// Provider parameters re-attached to the application page
    Rewritten(String),
    /// Provider link used verbatim because it could not be parsed
    Fallback(String),
}

impl ResetLink {
    /// Rewrite when possible, otherwise keep the provider link as-is
    pub fn resolve(provider_link: &str, continue_url: &str) -> Self {
        match rewrite_reset_link(provider_link, continue_url) {
            Ok(link) => ResetLink::Rewritten(link),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Failed to build custom reset link, falling back to provider link"
                );
                ResetLink::Fallback(provider_link.to_string())
            }
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResetLink::Rewritten(link) | ResetLink::Fallback(link) => link,
        }
    }

    pub fn is_rewritten(&self) -> bool {
        matches!(self, ResetLink::Rewritten(_))
    }
}

/// Link parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("Malformed reset link {link:?}: {reason}")]
    Malformed { link: String, reason: String },
}
