//! [`Geolocation`] definitions.

use serde::{Deserialize, Serialize};

/// Geographic coordinates of a listed property.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Geolocation {
    /// Latitude in degrees.
    pub lat: f64,

    /// Longitude in degrees.
    pub lng: f64,
}

/// Place resolved from a free-text address by a geocoding lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct Place {
    /// [`Geolocation`] of this [`Place`].
    pub geolocation: Geolocation,

    /// Address of this [`Place`] as formatted by the geocoding service, if
    /// any.
    pub formatted_address: Option<String>,
}
