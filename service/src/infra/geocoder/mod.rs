//! [`Geocoder`]-related implementations.

pub mod google;

use derive_more::{Display, Error as StdError, From};

pub use self::google::Google;

/// Geocoding operation.
///
/// Resolves a free-text address into a [`Place`], if any.
///
/// [`Place`]: crate::domain::geolocation::Place
pub use common::Handler as Geocoder;

/// [`Geocoder`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// [`Google`] error.
    Google(google::Error),
}
