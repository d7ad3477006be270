//! [Firebase Storage] [`Storage`] implementation.
//!
//! [Firebase Storage]: https://firebase.google.com/docs/storage

use std::{convert::Infallible, sync::Arc, time};

use common::operations::{Delete, Insert};
use derive_more::{Debug, Display, Error as StdError, From};
use futures::{stream, StreamExt as _};
use reqwest::{header, StatusCode};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;
use tracerr::Traced;
use tracing as log;
use url::Url;

use crate::{
    domain::image::{
        self,
        upload::{Progress, Reporter},
        ObjectName,
    },
    infra::{
        storage::{self, Upload},
        Storage,
    },
};

/// [`Firebase`] storage configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Endpoint of the Firebase Storage REST API.
    pub endpoint: String,

    /// Bucket to store objects in.
    pub bucket: String,

    /// Bearer token to authorize requests with, if any.
    #[debug(skip)]
    pub token: Option<SecretString>,

    /// Timeout of a single HTTP request.
    pub timeout: time::Duration,

    /// Size of a single uploaded chunk in bytes.
    pub chunk_size: usize,
}

/// [Firebase Storage] REST API client.
///
/// [Firebase Storage]: https://firebase.google.com/docs/storage
#[derive(Clone, Debug)]
pub struct Firebase {
    /// HTTP client performing requests.
    client: reqwest::Client,

    /// Endpoint of the Firebase Storage REST API.
    endpoint: Url,

    /// Bucket to store objects in.
    bucket: String,

    /// Bearer token to authorize requests with, if any.
    #[debug(skip)]
    token: Option<SecretString>,

    /// Size of a single uploaded chunk in bytes.
    chunk_size: usize,
}

impl Firebase {
    /// Creates a new [`Firebase`] storage with the provided [`Config`].
    ///
    /// # Errors
    ///
    /// If the configured endpoint is not a valid URL, or the HTTP client fails
    /// to initialize.
    pub fn new(conf: Config) -> Result<Self, Traced<storage::Error>> {
        let Config {
            endpoint,
            bucket,
            token,
            timeout,
            chunk_size,
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
            bucket,
            token,
            chunk_size: chunk_size.max(1),
        })
    }

    /// Builds a [`Url`] of the provided path `segments` relative to the
    /// endpoint.
    ///
    /// Every segment is percent-encoded, so an [`ObjectName`] with slashes
    /// stays a single segment.
    fn url<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            _ = path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Returns the [`Url`] of the bucket objects collection.
    fn objects_url(&self) -> Url {
        self.url(["v0", "b", &self.bucket, "o"])
    }

    /// Returns the [`Url`] of the provided object.
    fn object_url(&self, object: &ObjectName) -> Url {
        self.url(["v0", "b", &self.bucket, "o", object.as_ref()])
    }

    /// Returns the permanent download [`image::Url`] of the provided object.
    fn download_url(&self, object: &ObjectName, token: &str) -> image::Url {
        let mut url = self.object_url(object);
        _ = url
            .query_pairs_mut()
            .append_pair("alt", "media")
            .append_pair("token", token);
        url.into()
    }

    /// Applies the configured bearer token (if any) to the provided request.
    fn authorize(
        &self,
        req: reqwest::RequestBuilder,
    ) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token.expose_secret()),
            None => req,
        }
    }
}

impl Storage<Insert<Upload>> for Firebase {
    type Ok = image::Url;
    type Err = Traced<storage::Error>;

    async fn execute(
        &self,
        Insert(upload): Insert<Upload>,
    ) -> Result<Self::Ok, Self::Err> {
        let Upload {
            object,
            image,
            reporter,
        } = upload;

        let total = image.size();
        reporter.report(Progress {
            object: object.clone(),
            transferred: 0,
            total,
        });

        let body = reqwest::Body::wrap_stream(progress(
            chunks(image.content, self.chunk_size),
            object.clone(),
            total,
            reporter,
        ));
        let content_type = image
            .content_type
            .unwrap_or_else(|| "application/octet-stream".to_owned());

        let created = self
            .authorize(self.client.post(self.objects_url()))
            .query(&[("uploadType", "media"), ("name", object.as_ref())])
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, total)
            .body(body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)?
            .json::<CreatedObject>()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)?;

        let token = created
            .download_token()
            .ok_or_else(|| {
                tracerr::new!(Error::MissingDownloadToken(object.clone()))
            })
            .map_err(tracerr::map_from)?;

        log::debug!("uploaded `{}` object", created.name);

        Ok(self.download_url(&object, token))
    }
}

impl Storage<Delete<ObjectName>> for Firebase {
    type Ok = ();
    type Err = Traced<storage::Error>;

    async fn execute(
        &self,
        Delete(object): Delete<ObjectName>,
    ) -> Result<Self::Ok, Self::Err> {
        let resp = self
            .authorize(self.client.delete(self.object_url(&object)))
            .send()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)?;

        // Already gone.
        if resp.status() == StatusCode::NOT_FOUND {
            log::debug!("object `{object}` doesn't exist");
            return Ok(());
        }

        resp.error_for_status()
            .map(drop)
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)
    }
}

/// Splits the provided `content` into chunks of the provided `size`.
fn chunks(
    content: Arc<[u8]>,
    size: usize,
) -> impl Iterator<Item = Vec<u8>> + Send + 'static {
    let len = content.len();
    (0..len)
        .step_by(size)
        .map(move |start| content[start..len.min(start + size)].to_vec())
}

/// Wraps the provided `chunks` into a stream reporting the [`Progress`] of
/// every chunk being pulled by the HTTP body.
fn progress(
    chunks: impl Iterator<Item = Vec<u8>> + Send + 'static,
    object: ObjectName,
    total: u64,
    reporter: Reporter,
) -> impl stream::Stream<Item = Result<Vec<u8>, Infallible>> + Send + 'static {
    let mut transferred = 0_u64;
    stream::iter(chunks).map(move |chunk| {
        transferred = transferred
            .saturating_add(u64::try_from(chunk.len()).unwrap_or(u64::MAX));
        reporter.report(Progress {
            object: object.clone(),
            transferred,
            total,
        });
        Ok(chunk)
    })
}

/// Metadata of a created object.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedObject {
    /// Full name of the object.
    name: String,

    /// Comma-separated download tokens of the object.
    #[serde(default)]
    download_tokens: Option<String>,
}

impl CreatedObject {
    /// Returns the first download token of this [`CreatedObject`], if any.
    fn download_token(&self) -> Option<&str> {
        self.download_tokens
            .as_deref()
            .and_then(|t| t.split(',').next())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// [`Firebase`] storage error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// HTTP request failed.
    #[display("HTTP request failed: {_0}")]
    Http(reqwest::Error),

    /// Configured endpoint is not a valid URL.
    #[display("Invalid endpoint: {_0}")]
    InvalidEndpoint(url::ParseError),

    /// Created object has no download token.
    #[display("Object `{_0}` has no download token")]
    #[from(ignore)]
    MissingDownloadToken(#[error(not(source))] ObjectName),
}
