//! Domain definitions.

pub mod auth;
pub mod geolocation;
pub mod image;
pub mod listing;
pub mod route;
pub mod user;

pub use self::{
    geolocation::Geolocation, image::Image, listing::Listing, route::Route,
};
