//! [`Command`] for authorizing a user [`Session`].

use derive_more::{Display, Error, From};
use jsonwebtoken::Validation;
use tracerr::Traced;

use crate::{
    domain::user::{self, Session},
    Service,
};

use super::Command;

/// [`Command`] for authorizing a user [`Session`] by its access
/// [`user::Token`].
#[derive(Clone, Debug, From)]
pub struct AuthorizeUserSession {
    /// [`user::Token`] to authorize.
    pub token: user::Token,
}

impl<Db, St, Geo> Command<AuthorizeUserSession> for Service<Db, St, Geo> {
    type Ok = Session;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AuthorizeUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        let AuthorizeUserSession { token } = cmd;

        Ok(jsonwebtoken::decode::<Session>(
            token.as_ref(),
            &self.config().jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(tracerr::from_and_wrap!(=> ExecutionError))?
        .claims)
    }
}

/// Error of [`AuthorizeUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`jsonwebtoken`] decoding error.
    #[display("Failed to decode a JSON Web Token: {_0}")]
    JsonWebTokenDecodeError(jsonwebtoken::errors::Error),
}

#[cfg(test)]
mod spec {
    use common::DateTime;
    use jsonwebtoken::{EncodingKey, Header};

    use crate::{
        domain::user::{self, ExpirationDateTime, Session},
        Command as _, Config, Service,
    };

    use super::AuthorizeUserSession;

    fn service() -> Service<(), (), ()> {
        Service::new(
            Config {
                jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                    b"secret",
                ),
            },
            (),
            (),
            (),
        )
    }

    #[expect(unsafe_code, reason = "test")]
    fn token(secret: &[u8], lifetime_secs: i64) -> AuthorizeUserSession {
        let session = Session {
            user_id: user::Id::new("u1").unwrap(),
            expires_at: ExpirationDateTime::from_unix_timestamp(
                DateTime::now().unix_timestamp() + lifetime_secs,
            )
            .unwrap(),
        };
        let encoded = jsonwebtoken::encode(
            &Header::default(),
            &session,
            &EncodingKey::from_secret(secret),
        )
        .unwrap();
        unsafe { user::Token::new_unchecked(encoded) }.into()
    }

    #[tokio::test]
    async fn authorizes_valid_token() {
        let session = service().execute(token(b"secret", 3600)).await.unwrap();

        assert_eq!(session.user_id, user::Id::new("u1").unwrap());
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        assert!(service().execute(token(b"secret", -3600)).await.is_err());
    }

    #[tokio::test]
    async fn rejects_foreign_signature() {
        assert!(service().execute(token(b"other", 3600)).await.is_err());
    }

    #[tokio::test]
    async fn rejects_garbage() {
        #[expect(unsafe_code, reason = "test")]
        let token = unsafe { user::Token::new_unchecked("garbage".to_owned()) };

        assert!(service()
            .execute(AuthorizeUserSession { token })
            .await
            .is_err());
    }
}
