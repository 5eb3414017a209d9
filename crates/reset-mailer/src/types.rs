//! Request/response structures and the reset email itself
//!
//! The callable envelope follows the HTTPS callable protocol:
//! `{"data": ...}` in, `{"result": ...}` or `{"error": {...}}` out.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Input of `sendPasswordResetEmail`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResetRequest {
    /// Raw address as supplied by the caller; trimmed by the dispatcher.
    /// Falsy JSON reads as absent and other scalars are stringified.
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(js_string(&other)),
    })
}

/// String form a JavaScript client would produce for `value`
fn js_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(js_string).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
        other => other.to_string(),
    }
}

/// Output of `sendPasswordResetEmail`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetResponse {
    pub success: bool,
}

impl ResetResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Callable request wrapper; a missing or `null` payload reads as `T::default()`
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct CallableRequest<T> {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: T,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Callable error status, serialized in the protocol's canonical form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallableStatus {
    InvalidArgument,
    Internal,
}

impl CallableStatus {
    /// HTTP status code for this error kind
    pub fn http_status(self) -> u16 {
        match self {
            CallableStatus::InvalidArgument => 400,
            CallableStatus::Internal => 500,
        }
    }
}

/// Error body of a callable response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallableError {
    pub status: CallableStatus,
    pub message: String,
}

/// Callable response wrapper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallableResponse<T> {
    Result(T),
    Error(CallableError),
}

/// A fully composed password reset email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl ResetEmail {
    /// Compose the reset email for `to` pointing at `link`
    pub fn compose(from: &str, to: &str, app_name: &str, link: &str) -> Self {
        let text = format!(
            "We received a request to reset your {app_name} password. Use the link below to choose a new password:\n\n\
             {link}\n\n\
             If you did not request this change, you can ignore this email."
        );

        let href = escape_html(link);
        let html = format!(
            r#"<p>Hello,</p>
<p>We received a request to reset your {app} password. Click the button below to choose a new password:</p>
<p><a href="{href}" target="_blank" rel="noopener" style="display:inline-block;padding:10px 16px;background:#0d6efd;color:#fff;text-decoration:none;border-radius:4px;">Reset Password</a></p>
<p>If you did not request this change, you can ignore this email.</p>"#,
            app = escape_html(app_name),
        );

        Self {
            from: from.to_string(),
            to: to.to_string(),
            subject: format!("Reset your {app_name} password"),
            text,
            html,
        }
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
