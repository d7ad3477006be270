//! [`Route`] definitions.

use derive_more::Display;

use crate::domain::listing;

/// Application route a user may be navigated to.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum Route {
    /// Sign-in view.
    #[display("/sign-in")]
    SignIn,

    /// Detail view of a [`Listing`].
    ///
    /// [`Listing`]: listing::Listing
    #[display("/category/{kind}/{id}")]
    Listing {
        /// [`listing::Kind`] of the [`Listing`].
        ///
        /// [`Listing`]: listing::Listing
        kind: listing::Kind,

        /// [`listing::Id`] of the [`Listing`].
        ///
        /// [`Listing`]: listing::Listing
        id: listing::Id,
    },
}
