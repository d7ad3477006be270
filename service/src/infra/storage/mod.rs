//! [`Storage`]-related implementations.

pub mod firebase;

use derive_more::{Display, Error as StdError, From};

use crate::domain::{
    image::{upload, ObjectName},
    Image,
};

pub use self::firebase::Firebase;

/// Object storage operation.
pub use common::Handler as Storage;

/// Upload of an [`Image`] into a [`Storage`] under the provided
/// [`ObjectName`].
#[derive(Clone, Debug)]
pub struct Upload {
    /// [`ObjectName`] to store the [`Image`] under.
    pub object: ObjectName,

    /// [`Image`] to upload.
    pub image: Image,

    /// [`upload::Reporter`] of the upload progress.
    pub reporter: upload::Reporter,
}

/// [`Storage`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// [`Firebase`] error.
    Firebase(firebase::Error),
}
