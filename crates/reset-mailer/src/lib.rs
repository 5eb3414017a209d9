//! Reset Mailer Lambda - password reset emails over SMTP
//!
//! Serves the `sendPasswordResetEmail` callable:
//!
//! 1. Trim and validate the email address (`INVALID_ARGUMENT` when empty)
//! 2. Ask the identity provider for a one-time reset link
//! 3. Move the link's `mode`, `oobCode` and `lang` onto the app's own reset
//!    page (falling back to the raw provider link if it cannot be parsed)
//! 4. Send a text + HTML email through the SMTP relay
//!
//! Any provider or relay failure is logged and reported to the caller as a
//! generic `INTERNAL` error.
//!
//! ## Architecture
//!
//! ```text
//! Web app → API Gateway → Lambda (this) → Identity Toolkit (reset link)
//!                                 ↓
//!                             SMTP relay → Recipient
//! ```
//!
//! ## Usage
//!
//! Deploy as an AWS Lambda function with API Gateway trigger.
//! `main.rs` wires configuration into [`http::handler`].

pub mod config;
pub mod dispatcher;
pub mod http;
pub mod identity;
pub mod link;
pub mod smtp;
pub mod types;

pub use config::{IdentityConfig, ResetMailerConfig, SmtpConfig};
pub use dispatcher::{DispatchError, DispatchReport, ResetDispatcher};
pub use identity::{ActionCodeSettings, IdentityError, IdentityProvider, IdentityToolkitClient};
pub use link::{rewrite_reset_link, LinkError, ResetLink, ResetLinkParams};
pub use smtp::{MailError, MailTransport, SmtpMailer, UnavailableMailer};
pub use types::{
    CallableError, CallableRequest, CallableResponse, CallableStatus, ResetEmail, ResetRequest,
    ResetResponse,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
