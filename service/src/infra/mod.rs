//! Infrastructure layer.

pub mod database;
pub mod geocoder;
pub mod storage;

pub use self::{
    database::Database,
    geocoder::{Geocoder, Google},
    storage::{Firebase, Storage},
};
#[cfg(feature = "postgres")]
pub use self::database::{postgres, Postgres};
