//! [`Draft`] of a [`Listing`] and its reducer.
//!
//! [`Listing`]: super::Listing

use derive_more::{Display, Error};
use smart_default::SmartDefault;
use strum::EnumString;

use crate::domain::{user, Image};

use super::{Address, Kind, Price, Rooms};

/// Maximum number of images a [`Draft`] may have.
pub const MAX_IMAGES: usize = 6;

/// Not yet persisted [`Listing`] under active edit.
///
/// [`Listing`]: super::Listing
#[derive(Clone, Debug, SmartDefault)]
pub struct Draft {
    /// [`Kind`] of the [`Listing`].
    ///
    /// [`Listing`]: super::Listing
    #[default(Kind::Rent)]
    pub kind: Kind,

    /// Display name of the [`Listing`].
    ///
    /// [`Listing`]: super::Listing
    pub name: String,

    /// Number of bedrooms.
    #[default(1)]
    pub bedrooms: Rooms,

    /// Number of bathrooms.
    #[default(1)]
    pub bathrooms: Rooms,

    /// Indicator whether a parking spot is included.
    pub parking: bool,

    /// Indicator whether the property is furnished.
    pub furnished: bool,

    /// Free-text [`Address`] of the property.
    pub address: Address,

    /// Indicator whether the discounted price applies.
    pub offer: bool,

    /// Regular [`Price`].
    pub regular_price: Price,

    /// Discounted [`Price`], meaningful only when [`Draft::offer`] is active.
    pub discounted_price: Price,

    /// Selected [`Image`]s.
    pub images: Vec<Image>,

    /// Latitude entered by the owner.
    pub latitude: f64,

    /// Longitude entered by the owner.
    pub longitude: f64,

    /// ID of the owning user, once known.
    pub user_ref: Option<user::Id>,
}

impl Draft {
    /// Returns the next [`Draft`] with the provided [`Input`] applied to the
    /// given [`Field`].
    ///
    /// # Errors
    ///
    /// If the [`Input`] doesn't fit the [`Field`]. The caller keeps the
    /// previous [`Draft`] in such case.
    pub fn reduce(self, field: Field, input: Input) -> Result<Self, ReduceError> {
        use ReduceError as E;

        let text = match input {
            Input::Files(images) => {
                return if field == Field::Images {
                    Ok(Self { images, ..self })
                } else {
                    Err(E::FilesUnexpected(field))
                };
            }
            Input::Text(_) if field == Field::Images => {
                return Err(E::FilesExpected(field));
            }
            Input::Text(text) => text,
        };
        let invalid = || E::InvalidValue {
            field,
            value: text.clone(),
        };
        let flag = || decode_bool(&text).ok_or_else(invalid);

        Ok(match field {
            Field::Kind => Self {
                kind: text.parse().map_err(|_| invalid())?,
                ..self
            },
            Field::Name => Self {
                name: text,
                ..self
            },
            Field::Bedrooms => Self {
                bedrooms: text.trim().parse().map_err(|_| invalid())?,
                ..self
            },
            Field::Bathrooms => Self {
                bathrooms: text.trim().parse().map_err(|_| invalid())?,
                ..self
            },
            Field::Parking => Self {
                parking: flag()?,
                ..self
            },
            Field::Furnished => Self {
                furnished: flag()?,
                ..self
            },
            Field::Offer => Self {
                offer: flag()?,
                ..self
            },
            Field::Address => Self {
                address: text.into(),
                ..self
            },
            Field::RegularPrice => Self {
                regular_price: text.parse().map_err(|_| invalid())?,
                ..self
            },
            Field::DiscountedPrice => Self {
                discounted_price: text.parse().map_err(|_| invalid())?,
                ..self
            },
            Field::Latitude => Self {
                latitude: parse_coordinate(&text, 90.0).ok_or_else(invalid)?,
                ..self
            },
            Field::Longitude => Self {
                longitude: parse_coordinate(&text, 180.0)
                    .ok_or_else(invalid)?,
                ..self
            },
            Field::Images => unreachable!("handled above"),
        })
    }

    /// Returns the next [`Draft`] owned by the provided user.
    #[must_use]
    pub fn with_owner(self, owner: user::Id) -> Self {
        Self {
            user_ref: Some(owner),
            ..self
        }
    }

    /// Checks the business rules this [`Draft`] must satisfy before being
    /// submitted.
    ///
    /// # Errors
    ///
    /// - If the discounted price isn't lower than the regular one.
    /// - If more than [`MAX_IMAGES`] images are selected.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.discounted_price >= self.regular_price {
            return Err(ValidationError::DiscountNotLess);
        }
        if self.images.len() > MAX_IMAGES {
            return Err(ValidationError::TooManyImages(self.images.len()));
        }
        Ok(())
    }
}

/// Decodes a boolean encoded as the literal `"true"` or `"false"` string.
#[must_use]
pub fn decode_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Parses a finite coordinate not exceeding the provided `limit` by absolute
/// value.
fn parse_coordinate(value: &str, limit: f64) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|c| c.is_finite() && c.abs() <= limit)
}

/// Identifier of a [`Draft`] field, as used by the form elements.
#[derive(
    Clone, Copy, Debug, EnumString, Eq, Hash, PartialEq, strum::Display,
)]
#[strum(serialize_all = "camelCase")]
pub enum Field {
    /// [`Draft::kind`].
    #[strum(serialize = "type")]
    Kind,

    /// [`Draft::name`].
    Name,

    /// [`Draft::bedrooms`].
    Bedrooms,

    /// [`Draft::bathrooms`].
    Bathrooms,

    /// [`Draft::parking`].
    Parking,

    /// [`Draft::furnished`].
    Furnished,

    /// [`Draft::address`].
    Address,

    /// [`Draft::offer`].
    Offer,

    /// [`Draft::regular_price`].
    RegularPrice,

    /// [`Draft::discounted_price`].
    DiscountedPrice,

    /// [`Draft::images`].
    Images,

    /// [`Draft::latitude`].
    Latitude,

    /// [`Draft::longitude`].
    Longitude,
}

/// Raw input value of a form element.
#[derive(Clone, Debug)]
pub enum Input {
    /// Textual value (text, number or boolean button).
    Text(String),

    /// Full selection of a file input.
    Files(Vec<Image>),
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

/// Error of applying an [`Input`] to a [`Draft`].
#[derive(Clone, Debug, Display, Error)]
pub enum ReduceError {
    /// [`Field`] accepts files only.
    #[display("`{_0}` field accepts files only")]
    FilesExpected(#[error(not(source))] Field),

    /// [`Field`] doesn't accept files.
    #[display("`{_0}` field doesn't accept files")]
    FilesUnexpected(#[error(not(source))] Field),

    /// Value doesn't fit the [`Field`].
    #[display("`{value}` is not a valid `{field}` value")]
    InvalidValue {
        /// [`Field`] the value was provided for.
        field: Field,

        /// Provided value.
        value: String,
    },
}

/// Error of [`Draft::validate()`].
#[derive(Clone, Copy, Debug, Display, Error, Eq, PartialEq)]
pub enum ValidationError {
    /// Discounted price is not lower than the regular one.
    #[display("Discounted price needs to be less than regular price")]
    DiscountNotLess,

    /// Too many images selected.
    #[display("Max {MAX_IMAGES} images, {_0} selected")]
    TooManyImages(#[error(not(source))] usize),
}
