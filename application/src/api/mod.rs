//! HTTP API definitions.

pub mod listing;

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse as _, Redirect, Response},
};
use service::domain::auth::{self, Access};

use crate::{context::CurrentUser, define_error, Context, Error};

/// Name of the [`tracing::Span`] for the API handlers.
const SPAN_NAME: &str = "HTTP handler";

/// Route guard middleware.
///
/// Runs the protected handler only for a signed-in user, exposing it as a
/// [`CurrentUser`] request extension. Signed-out users are redirected to the
/// sign-in view.
///
/// Possible error codes:
/// - `AUTHENTICATION_PENDING` - authentication status is not known yet.
pub async fn guard(context: Context, mut req: Request, next: Next) -> Response {
    match admit(context.auth_status().await) {
        Ok(user) => {
            drop(req.extensions_mut().insert(user));
            next.run(req).await
        }
        Err(resp) => resp,
    }
}

/// Admits the [`CurrentUser`] with the provided [`auth::Status`] to a
/// protected route, or returns the [`Response`] to answer with instead.
fn admit(status: &auth::Status) -> Result<CurrentUser, Response> {
    match auth::guard(status) {
        Access::Pending => Err(Error::from(GuardError::Pending).into_response()),
        Access::Granted(id) => Ok(CurrentUser(id)),
        Access::Redirect(route) => {
            Err(Redirect::to(&route.to_string()).into_response())
        }
    }
}

define_error! {
    enum GuardError {
        #[code = "AUTHENTICATION_PENDING"]
        #[status = SERVICE_UNAVAILABLE]
        #[message = "Loading"]
        Pending,
    }
}
