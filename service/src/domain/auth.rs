//! Authentication [`Status`] and the route guard.

use crate::domain::{user, Route};

/// Authentication status of the current user.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Status {
    /// Status is still being checked.
    #[default]
    Unknown,

    /// User is signed in.
    Authenticated(user::Id),

    /// User is signed out.
    Unauthenticated,
}

impl Status {
    /// Handles an identity change reported by the authentication provider.
    ///
    /// [`None`] means the user signed out (or has never signed in).
    #[must_use]
    pub fn on_change(self, identity: Option<user::Id>) -> Self {
        match identity {
            Some(id) => Self::Authenticated(id),
            None => Self::Unauthenticated,
        }
    }
}

/// Decision of the route [`guard()`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Access {
    /// Status is not known yet, a placeholder should be shown.
    Pending,

    /// Protected content may be rendered for the given user.
    Granted(user::Id),

    /// User should be redirected to the given [`Route`].
    Redirect(Route),
}

/// Decides whether protected content may be accessed with the given
/// [`Status`].
#[must_use]
pub fn guard(status: &Status) -> Access {
    match status {
        Status::Unknown => Access::Pending,
        Status::Authenticated(id) => Access::Granted(id.clone()),
        Status::Unauthenticated => Access::Redirect(Route::SignIn),
    }
}
