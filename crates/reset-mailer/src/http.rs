//! HTTP routing for the Lambda function
//!
//! - POST /sendPasswordResetEmail - Callable: send a password reset email
//! - GET /health - Health check
//! - OPTIONS * - CORS preflight

use lambda_http::http::{HeaderValue, StatusCode};
use lambda_http::{Body, Error, Request, Response};
use serde::Serialize;
use serde_json::json;
use tracing::{error, instrument, warn};

use crate::dispatcher::ResetDispatcher;
use crate::identity::IdentityProvider;
use crate::smtp::MailTransport;
use crate::types::{
    CallableError, CallableRequest, CallableResponse, CallableStatus, ResetRequest, ResetResponse,
};

/// Main Lambda handler
#[instrument(skip(event, dispatcher), fields(method = %event.method(), path = %event.uri().path()))]
pub async fn handler<I, M>(
    event: Request,
    dispatcher: &ResetDispatcher<I, M>,
) -> Result<Response<Body>, Error>
where
    I: IdentityProvider,
    M: MailTransport,
{
    let method = event.method().clone();
    let path = event.uri().path().to_string();

    let response = match (method.as_str(), path.as_str()) {
        ("POST", "/sendPasswordResetEmail") => handle_send_reset(event, dispatcher).await,
        ("GET", "/health") => handle_health(),
        ("OPTIONS", _) => handle_cors_preflight(),
        _ => {
            warn!(method = %method, path = %path, "Route not found");
            json_response(StatusCode::NOT_FOUND, json!({ "error": "Not found" }))
        }
    }?;

    Ok(with_cors(response))
}

/// Handle POST /sendPasswordResetEmail
async fn handle_send_reset<I, M>(
    event: Request,
    dispatcher: &ResetDispatcher<I, M>,
) -> Result<Response<Body>, Error>
where
    I: IdentityProvider,
    M: MailTransport,
{
    let body = event.body();
    let request: CallableRequest<ResetRequest> = match serde_json::from_slice(body.as_ref()) {
        Ok(req) => req,
        Err(e) => {
            warn!(error = %e, "Malformed callable request");
            let response_body: CallableResponse<ResetResponse> =
                CallableResponse::Error(CallableError {
                    status: CallableStatus::InvalidArgument,
                    message: "Bad Request".to_string(),
                });
            return json_response(StatusCode::BAD_REQUEST, response_body);
        }
    };

    match dispatcher
        .send_password_reset_email(request.data.email.as_deref())
        .await
    {
        Ok(result) => json_response(StatusCode::OK, CallableResponse::Result(result)),
        Err(e) => {
            let status = StatusCode::from_u16(e.status().http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if status.is_server_error() {
                error!(status = %status, "Reset email dispatch failed");
            }
            let response_body: CallableResponse<ResetResponse> =
                CallableResponse::Error(e.to_callable());
            json_response(status, response_body)
        }
    }
}

/// Handle GET /health - Health check
fn handle_health() -> Result<Response<Body>, Error> {
    json_response(
        StatusCode::OK,
        json!({
            "status": "healthy",
            "version": crate::VERSION,
        }),
    )
}

/// Handle CORS preflight
fn handle_cors_preflight() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Max-Age", "86400")
        .body(Body::Empty)?)
}

fn with_cors(mut resp: Response<Body>) -> Response<Body> {
    let headers = resp.headers_mut();
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    resp
}

/// Create a JSON response
fn json_response<T: Serialize>(status: StatusCode, body: T) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(&body)?))?)
}
