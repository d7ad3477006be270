//! [`Context`]-related definitions.

use axum::{async_trait, extract::FromRequestParts, RequestPartsExt as _};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use service::{
    command::{self, Command as _},
    domain::{auth, user},
};
use tokio::sync::OnceCell;
use tracing as log;

use crate::{Error, Service};

/// Context of an HTTP request.
#[derive(Debug)]
pub struct Context {
    /// [`Service`] instance.
    service: Service,

    /// Parts of the HTTP request.
    parts: http::request::Parts,

    /// Lazily computed [`auth::Status`] of the request.
    status: OnceCell<auth::Status>,
}

impl Context {
    /// Returns [`Service`] instance of this [`Context`].
    #[must_use]
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Returns the [`auth::Status`] of the current HTTP request.
    ///
    /// A missing, malformed or rejected bearer token means the user is signed
    /// out.
    pub async fn auth_status(&self) -> &auth::Status {
        self.status.get_or_init(|| self.authenticate()).await
    }

    /// Resolves the identity of the current user out of the bearer token.
    async fn authenticate(&self) -> auth::Status {
        let header = self
            .parts
            .clone()
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await;

        let identity = match header {
            Ok(TypedHeader(Authorization(bearer))) => {
                #[expect(unsafe_code, reason = "specified in correct header")]
                let token = unsafe {
                    user::Token::new_unchecked(bearer.token().to_owned())
                };
                match self
                    .service
                    .execute(command::AuthorizeUserSession { token })
                    .await
                {
                    Ok(session) => Some(session.user_id),
                    Err(e) => {
                        log::debug!("rejected session token: {e}");
                        None
                    }
                }
            }
            Err(e) => {
                if !e.is_missing() {
                    log::debug!("rejected `Authorization` header: {e}");
                }
                None
            }
        };

        auth::Status::default().on_change(identity)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Context
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _: &S,
    ) -> Result<Self, Self::Rejection> {
        let service = parts
            .extensions
            .get::<Service>()
            .cloned()
            .ok_or_else(|| Error::internal(&"missing `Service` extension"))?;

        Ok(Self {
            service,
            parts: parts.clone(),
            status: OnceCell::new(),
        })
    }
}

/// Signed-in user granted access to a protected route.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CurrentUser(pub user::Id);
