//! Terminal error emission.
//!
//! Every failed request ends here exactly once: negotiation failures,
//! authentication and authorization failures, handler and formatter errors,
//! timeouts, and panics.

use serde_json::json;
use tracing::{error, info};

use crate::error::{ErrorKind, HttpError};
use crate::request::Request;
use crate::response::HttpResponse;
use crate::security::SecurityContext;

/// Turns a failure into the response the client receives, and logs it.
///
/// `security` is present when the failure happened after authentication.
pub trait ErrorHandler: Send + Sync + 'static {
    fn handle(
        &self,
        error: HttpError,
        req: &Request,
        security: Option<&dyn SecurityContext>,
    ) -> HttpResponse;
}

/// The default handler: logs one line per failure and answers with
/// `{"status", "message"}` (plus `"code"` when the error has one).
///
/// An error that carries its own body keeps it. Unknown errors are answered
/// with a generic message; their detail only reaches the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonErrorHandler;

impl ErrorHandler for JsonErrorHandler {
    fn handle(
        &self,
        err: HttpError,
        req: &Request,
        security: Option<&dyn SecurityContext>,
    ) -> HttpResponse {
        let status = err.status();
        let mut line = format!("{} {} {}", status.as_u16(), req.method(), req.url());
        if let Some(context) = security {
            line.push_str(&format!(" ({})", context.to_log_safe_string()));
        }
        if status.is_server_error() {
            error!(kind = %err.kind(), detail = err.message(), "{line}");
        } else {
            info!(kind = %err.kind(), "{line}");
        }

        let message = match err.kind() {
            ErrorKind::Unknown => "Server Error".to_owned(),
            _ => err.message().to_owned(),
        };
        let code = err.code().map(str::to_owned);
        let response = err.into_response();
        if response.body().is_some() {
            return response;
        }

        let mut body = json!({ "status": status.as_u16(), "message": message });
        if let Some(code) = code {
            body["code"] = code.into();
        }
        response.with_body(body)
    }
}
