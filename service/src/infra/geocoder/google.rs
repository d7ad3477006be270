//! [Google Geocoding API] [`Geocoder`] implementation.
//!
//! [Google Geocoding API]: https://developers.google.com/maps/documentation/geocoding

use std::time;

use common::operations::{By, Select};
use derive_more::{Debug, Display, Error as StdError, From};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;
use tracerr::Traced;
use tracing as log;
use url::Url;

use crate::{
    domain::{
        geolocation::{Geolocation, Place},
        listing,
    },
    infra::{geocoder, Geocoder},
};

/// [`Google`] geocoder configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Endpoint of the Geocoding API.
    pub endpoint: String,

    /// API key to authorize requests with.
    #[debug(skip)]
    pub api_key: SecretString,

    /// Timeout of a single HTTP request.
    pub timeout: time::Duration,
}

/// [Google Geocoding API] client.
///
/// [Google Geocoding API]: https://developers.google.com/maps/documentation/geocoding
#[derive(Clone, Debug)]
pub struct Google {
    /// HTTP client performing requests.
    client: reqwest::Client,

    /// Endpoint of the Geocoding API.
    endpoint: Url,

    /// API key to authorize requests with.
    #[debug(skip)]
    api_key: SecretString,
}

impl Google {
    /// Creates a new [`Google`] geocoder with the provided [`Config`].
    ///
    /// # Errors
    ///
    /// If the configured endpoint is not a valid URL, or the HTTP client fails
    /// to initialize.
    pub fn new(conf: Config) -> Result<Self, Traced<geocoder::Error>> {
        let Config {
            endpoint,
            api_key,
            timeout,
        } = conf;

        let endpoint = Url::parse(&endpoint)
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

impl Geocoder<Select<By<Option<Place>, listing::Address>>> for Google {
    type Ok = Option<Place>;
    type Err = Traced<geocoder::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Place>, listing::Address>>,
    ) -> Result<Self::Ok, Self::Err> {
        let address = by.into_inner();

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("address", address.as_ref()),
                ("key", self.api_key.expose_secret()),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)?
            .json::<Response>()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)?;

        log::debug!("geocoding of `{address}` returned `{}`", response.status);

        response
            .into_place()
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)
    }
}

/// Response of the Geocoding API.
#[derive(Debug, Deserialize)]
struct Response {
    /// Status code of the lookup.
    status: String,

    /// Found results, most relevant first.
    #[serde(default)]
    results: Vec<GeocodingResult>,

    /// Details of a failed lookup.
    #[serde(default)]
    error_message: String,
}

impl Response {
    /// Converts this [`Response`] into the most relevant [`Place`], if any.
    fn into_place(self) -> Result<Option<Place>, Error> {
        match self.status.as_str() {
            "OK" => Ok(self.results.into_iter().next().map(
                |GeocodingResult {
                     formatted_address,
                     geometry,
                 }| Place {
                    geolocation: geometry.location,
                    formatted_address,
                },
            )),
            "ZERO_RESULTS" => Ok(None),
            _ => Err(Error::Status {
                status: self.status,
                message: self.error_message,
            }),
        }
    }
}

/// Single result of the Geocoding API.
#[derive(Debug, Deserialize)]
struct GeocodingResult {
    /// Human-readable address of the found place.
    #[serde(default)]
    formatted_address: Option<String>,

    /// Geometry of the found place.
    geometry: Geometry,
}

/// Geometry of a [`GeocodingResult`].
#[derive(Debug, Deserialize)]
struct Geometry {
    /// Geocoded [`Geolocation`].
    location: Geolocation,
}

/// [`Google`] geocoder error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// HTTP request failed.
    #[display("HTTP request failed: {_0}")]
    Http(reqwest::Error),

    /// Configured endpoint is not a valid URL.
    #[display("Invalid endpoint: {_0}")]
    InvalidEndpoint(url::ParseError),

    /// Lookup failed with a non-successful status.
    #[display("Geocoding failed with `{status}` status: {message}")]
    #[from(ignore)]
    Status {
        /// Status code of the lookup.
        status: String,

        /// Details of the failure.
        message: String,
    },
}
