//! [`Image`] definitions.

use std::{fmt, sync::Arc};

use derive_more::{AsRef, Display, Into};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user;

/// Image file selected for uploading.
#[derive(Clone)]
pub struct Image {
    /// Original [`FileName`] of this [`Image`].
    pub name: FileName,

    /// MIME type of this [`Image`], if known.
    pub content_type: Option<String>,

    /// Raw bytes of this [`Image`].
    pub content: Arc<[u8]>,
}

impl Image {
    /// Returns the size of this [`Image`] in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        u64::try_from(self.content.len()).unwrap_or(u64::MAX)
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("size", &self.content.len())
            .finish()
    }
}

/// Original name of an [`Image`] file.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str)]
pub struct FileName(String);

impl FileName {
    /// Creates a new [`FileName`] if the given `name` is valid.
    ///
    /// Directory components are stripped, as only the base name of the file
    /// matters.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Option<Self> {
        let name = name
            .as_ref()
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim();
        (!name.is_empty() && name.len() <= 255 && name != "." && name != "..")
            .then(|| Self(name.to_owned()))
    }
}

/// Name of an uploaded [`Image`] object in the storage.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, Into, PartialEq)]
#[as_ref(str)]
pub struct ObjectName(String);

impl ObjectName {
    /// Directory all the [`Image`] objects are stored in.
    pub const DIRECTORY: &'static str = "images";

    /// Generates a new unique [`ObjectName`] for the [`Image`] of the provided
    /// owner.
    ///
    /// The name is composed of the owner's ID, the original file name and a
    /// random suffix, so uploads of the same file never collide.
    #[must_use]
    pub fn generate(owner: &user::Id, file: &FileName) -> Self {
        Self(format!(
            "{}/{owner}-{file}-{}",
            Self::DIRECTORY,
            Uuid::new_v4(),
        ))
    }
}

/// Permanent download URL of an uploaded [`Image`].
#[derive(
    AsRef, Clone, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[as_ref(str)]
#[serde(transparent)]
pub struct Url(String);

impl Url {
    /// Creates a new [`Url`] without checking its contents.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `url` is an absolute URL.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(url: impl Into<String>) -> Self {
        Self(url.into())
    }
}

impl From<reqwest::Url> for Url {
    fn from(url: reqwest::Url) -> Self {
        Self(url.into())
    }
}

pub mod upload {
    //! [`Image`] upload progress definitions.
    //!
    //! [`Image`]: super::Image

    use tokio::sync::mpsc;
    use tracing as log;

    use super::ObjectName;

    /// Progress of a single object upload.
    #[derive(Clone, Debug, Eq, PartialEq)]
    pub struct Progress {
        /// [`ObjectName`] being uploaded.
        pub object: ObjectName,

        /// Number of bytes transferred so far.
        pub transferred: u64,

        /// Total number of bytes to transfer.
        pub total: u64,
    }

    impl Progress {
        /// Returns the completion percentage of this [`Progress`].
        #[must_use]
        pub fn percent(&self) -> u8 {
            if self.total == 0 {
                return 100;
            }
            let percent = self.transferred.min(self.total) * 100 / self.total;
            u8::try_from(percent).unwrap_or(100)
        }
    }

    /// Observer channel of [`Progress`] events.
    pub type Observer = mpsc::UnboundedSender<Progress>;

    /// Reporter of [`Progress`] events.
    ///
    /// Every event is logged and forwarded to the [`Observer`], if any. A gone
    /// [`Observer`] never affects the upload itself.
    #[derive(Clone, Debug, Default)]
    pub struct Reporter {
        /// [`Observer`] to forward [`Progress`] events to.
        observer: Option<Observer>,
    }

    impl Reporter {
        /// Creates a new [`Reporter`] forwarding events to the provided
        /// [`Observer`].
        #[must_use]
        pub fn new(observer: Option<Observer>) -> Self {
            Self { observer }
        }

        /// Reports the provided [`Progress`].
        pub fn report(&self, progress: Progress) {
            log::debug!(
                "upload of `{}` is {}% done",
                progress.object,
                progress.percent(),
            );
            if let Some(observer) = &self.observer {
                _ = observer.send(progress);
            }
        }
    }
}
