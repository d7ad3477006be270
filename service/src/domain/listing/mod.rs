//! [`Listing`] definitions.

pub mod draft;
pub mod form;

use std::str::FromStr;

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf};
use derive_more::{AsRef, Display, From, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{image, user, Geolocation};

pub use self::{
    draft::Draft,
    form::{Form, Phase},
};

/// Property listed for rent or sale.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Listing {
    /// ID of this [`Listing`].
    pub id: Id,

    /// Persisted [`Document`] of this [`Listing`].
    #[serde(flatten)]
    pub document: Document,

    /// [`DateTime`] when this [`Listing`] was created.
    #[serde(rename = "timestamp", with = "common::datetime::serde::rfc3339")]
    pub created_at: CreationDateTime,
}

/// Persisted representation of a [`Listing`].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// [`Kind`] of the [`Listing`].
    #[serde(rename = "type")]
    pub kind: Kind,

    /// Display name of the [`Listing`].
    pub name: String,

    /// Number of bedrooms.
    pub bedrooms: Rooms,

    /// Number of bathrooms.
    pub bathrooms: Rooms,

    /// Indicator whether a parking spot is included.
    pub parking: bool,

    /// Indicator whether the property is furnished.
    pub furnished: bool,

    /// Indicator whether the [`Listing`] has a discounted price.
    pub offer: bool,

    /// Regular [`Price`].
    pub regular_price: Price,

    /// Discounted [`Price`], present only when [`Document::offer`] is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discounted_price: Option<Price>,

    /// Latitude entered by the owner.
    pub latitude: f64,

    /// Longitude entered by the owner.
    pub longitude: f64,

    /// [`Address`] of the property, as entered by the owner.
    pub location: Address,

    /// Effective [`Geolocation`] of the property.
    pub geolocation: Geolocation,

    /// Download [`image::Url`]s of the uploaded images.
    pub img_urls: Vec<image::Url>,

    /// ID of the user owning the [`Listing`].
    pub user_ref: user::Id,
}

impl Document {
    /// Assembles a new [`Document`] out of the submitted [`Draft`].
    ///
    /// Images of the [`Draft`] are replaced with their uploaded
    /// [`image::Url`]s, and the discounted price is dropped unless an offer is
    /// active.
    #[must_use]
    pub fn assemble(
        draft: Draft,
        owner: user::Id,
        geolocation: Geolocation,
        img_urls: Vec<image::Url>,
    ) -> Self {
        let Draft {
            kind,
            name,
            bedrooms,
            bathrooms,
            parking,
            furnished,
            address,
            offer,
            regular_price,
            discounted_price,
            images: _,
            latitude,
            longitude,
            user_ref: _,
        } = draft;

        Self {
            kind,
            name,
            bedrooms,
            bathrooms,
            parking,
            furnished,
            offer,
            regular_price,
            discounted_price: offer.then_some(discounted_price),
            latitude,
            longitude,
            location: address,
            geolocation,
            img_urls,
            user_ref: owner,
        }
    }
}

/// ID of a [`Listing`].
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    From,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl FromStr for Id {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self).map_err(|_| "invalid `listing::Id`")
    }
}

define_kind! {
    #[doc = "Kind of a [`Listing`]."]
    enum Kind {
        #[doc = "Property offered for sale."]
        Sale,

        #[doc = "Property offered for rent."]
        Rent,
    }
}

/// Number of rooms of some type in a [`Listing`].
pub type Rooms = u16;

/// Free-text address of a [`Listing`].
#[derive(
    AsRef,
    Clone,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    Hash,
    PartialEq,
    Serialize,
)]
#[as_ref(str)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Indicates whether this [`Address`] contains no meaningful text.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// Price of a [`Listing`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(transparent)]
pub struct Price(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Price {
    /// Creates a new [`Price`] if the given `amount` is not negative.
    #[must_use]
    pub fn new(amount: Decimal) -> Option<Self> {
        (!amount.is_sign_negative()).then_some(Self(amount))
    }
}

impl FromStr for Price {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .ok()
            .and_then(Self::new)
            .ok_or("invalid `Price`")
    }
}

/// [`DateTime`] when a [`Listing`] was created.
pub type CreationDateTime = DateTimeOf<(Listing, unit::Creation)>;
