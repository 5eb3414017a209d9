//! AWS Lambda handler for the reset mailer
//!
//! Loads configuration, builds the dispatcher once and serves
//! [`reset_mailer::http::handler`] for every invocation.
//!
//! ## Deployment
//!
//! ```bash
//! # Install cargo-lambda
//! cargo install cargo-lambda
//!
//! # Build for ARM64
//! cargo lambda build --release --arm64 --bin reset-mailer
//!
//! # Deploy (reserved concurrency mirrors FUNCTION_MAX_INSTANCES)
//! cargo lambda deploy reset-mailer --region australia-southeast2
//! ```

use lambda_http::{run, service_fn, Error, Request};
use reset_mailer::http::handler;
use reset_mailer::{
    IdentityToolkitClient, MailTransport, ResetDispatcher, ResetMailerConfig, SmtpMailer,
    UnavailableMailer,
};
use std::sync::Arc;
use tracing::{info, warn};

type Dispatcher = ResetDispatcher<IdentityToolkitClient, Arc<dyn MailTransport>>;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // CloudWatch-friendly structured logs
    tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_current_span(false)
        .without_time()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("reset_mailer=info".parse()?),
        )
        .init();

    let config = ResetMailerConfig::from_env();
    config.warn_if_incomplete();

    info!(
        version = reset_mailer::VERSION,
        region = %config.region,
        max_instances = config.max_instances,
        "Starting reset mailer Lambda"
    );

    let mailer: Arc<dyn MailTransport> = match SmtpMailer::new(&config.smtp) {
        Ok(mailer) => Arc::new(mailer),
        Err(e) => {
            warn!(error = %e, "SMTP transport unavailable, reset emails will fail");
            Arc::new(UnavailableMailer::new(e.to_string()))
        }
    };
    let identity = IdentityToolkitClient::new(&config.identity);
    let dispatcher: Arc<Dispatcher> = Arc::new(ResetDispatcher::new(&config, identity, mailer));

    run(service_fn(move |event: Request| {
        let dispatcher = Arc::clone(&dispatcher);
        async move { handler(event, &*dispatcher).await }
    }))
    .await
}
