//! [`Command`] for creating a new [`Listing`].

use common::operations::{By, Delete, Insert, Select};
use derive_more::{Display, Error, From};
use futures::future;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        geolocation::Place,
        image::{self, upload, ObjectName},
        listing::{self, draft},
        Geolocation, Listing, Route,
    },
    infra::{
        database, geocoder,
        storage::{self, Upload},
        Database, Geocoder, Storage,
    },
    Service,
};

use super::Command;

/// Literal an address is rendered with when it fails to resolve.
const UNDEFINED: &str = "undefined";

/// [`Command`] for creating a new [`Listing`] out of a submitted
/// [`listing::Draft`].
#[derive(Clone, Debug)]
pub struct CreateListing {
    /// Submitted [`listing::Draft`].
    pub draft: listing::Draft,

    /// Indicator whether the [`Geolocation`] should be resolved from the
    /// [`listing::Address`] rather than taken from the entered coordinates.
    pub geolocation_enabled: bool,

    /// [`upload::Observer`] of the image uploads progress, if any.
    pub progress: Option<upload::Observer>,
}

/// Result of a successful [`CreateListing`] execution.
#[derive(Clone, Debug)]
pub struct Created {
    /// Created [`Listing`].
    pub listing: Listing,

    /// [`Route`] of the created [`Listing`] detail view.
    pub redirect: Route,
}

impl<Db, St, Geo> Command<CreateListing> for Service<Db, St, Geo>
where
    Db: Database<
        Insert<listing::Document>,
        Ok = Listing,
        Err = Traced<database::Error>,
    >,
    St: Storage<Insert<Upload>, Ok = image::Url, Err = Traced<storage::Error>>
        + Storage<Delete<ObjectName>, Ok = (), Err = Traced<storage::Error>>,
    Geo: Geocoder<
        Select<By<Option<Place>, listing::Address>>,
        Ok = Option<Place>,
        Err = Traced<geocoder::Error>,
    >,
{
    type Ok = Created;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateListing) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateListing {
            draft,
            geolocation_enabled,
            progress,
        } = cmd;

        draft
            .validate()
            .map_err(tracerr::from_and_wrap!(=> E))?;
        let owner = draft
            .user_ref
            .clone()
            .ok_or(E::Unauthenticated)
            .map_err(tracerr::wrap!())?;

        let geolocation = if geolocation_enabled {
            let address = &draft.address;
            if address.is_blank() || address.as_ref().contains(UNDEFINED) {
                return Err(tracerr::new!(E::AddressNotFound(address.clone())));
            }

            let place = self
                .geocoder()
                .execute(Select(By::new(address.clone())))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            match place {
                Some(Place {
                    geolocation,
                    formatted_address: Some(formatted),
                }) if !formatted.contains(UNDEFINED) => geolocation,
                Some(_) | None => {
                    return Err(tracerr::new!(E::AddressNotFound(
                        address.clone()
                    )));
                }
            }
        } else {
            Geolocation {
                lat: draft.latitude,
                lng: draft.longitude,
            }
        };

        let reporter = upload::Reporter::new(progress);
        let uploads = draft.images.iter().map(|image| {
            let object = ObjectName::generate(&owner, &image.name);
            let upload = Upload {
                object: object.clone(),
                image: image.clone(),
                reporter: reporter.clone(),
            };
            async move { (object, self.storage().execute(Insert(upload)).await) }
        });

        let mut uploaded = Vec::with_capacity(draft.images.len());
        let mut failure = None;
        for (object, res) in future::join_all(uploads).await {
            match res {
                Ok(url) => uploaded.push((object, url)),
                Err(e) => {
                    log::warn!("failed to upload `{object}` object: {e}");
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
            }
        }
        let (objects, img_urls): (Vec<_>, Vec<_>) = uploaded.into_iter().unzip();
        if let Some(e) = failure {
            compensate(self.storage(), objects).await;
            return Err(e).map_err(tracerr::map_from_and_wrap!(=> E));
        }

        let kind = draft.kind;
        let document =
            listing::Document::assemble(draft, owner, geolocation, img_urls);
        let listing = match self.database().execute(Insert(document)).await {
            Ok(listing) => listing,
            Err(e) => {
                log::error!("failed to write `Listing` document: {e}");
                compensate(self.storage(), objects).await;
                return Err(e).map_err(tracerr::map_from_and_wrap!(=> E));
            }
        };
        log::info!("created `Listing(id: {})`", listing.id);

        let redirect = Route::Listing {
            kind,
            id: listing.id,
        };
        Ok(Created { listing, redirect })
    }
}

/// Deletes the provided uploaded `objects` from the [`Storage`].
///
/// Failures are logged only, as nothing else can be done about them.
async fn compensate<St>(storage: &St, objects: Vec<ObjectName>)
where
    St: Storage<Delete<ObjectName>, Ok = (), Err = Traced<storage::Error>>,
{
    let deletions = objects.into_iter().map(|object| async move {
        match storage.execute(Delete(object.clone())).await {
            Ok(()) => log::debug!("deleted orphaned `{object}` object"),
            Err(e) => {
                log::error!("failed to delete orphaned `{object}` object: {e}");
            }
        }
    });
    _ = future::join_all(deletions).await;
}

/// Error of [`CreateListing`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`listing::Draft`] violates business rules.
    #[display("Invalid `Draft`: {_0}")]
    Validation(draft::ValidationError),

    /// [`listing::Draft`] has no owner.
    #[display("`User` is not authenticated")]
    #[from(ignore)]
    Unauthenticated,

    /// [`listing::Address`] cannot be resolved into a [`Geolocation`].
    #[display("Address `{_0}` cannot be resolved")]
    #[from(ignore)]
    AddressNotFound(#[error(not(source))] listing::Address),

    /// [`Geocoder`] error.
    #[display("`Geocoder` operation failed: {_0}")]
    Geocoder(geocoder::Error),

    /// Image upload to [`Storage`] failed.
    #[display("Image upload failed: {_0}")]
    ImageUpload(storage::Error),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),
}

#[cfg(test)]
mod spec {
    use std::{
        collections::HashSet,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
    };

    use common::{
        operations::{By, Delete, Insert, Select},
        DateTime,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::sync::mpsc;
    use tracerr::Traced;
    use uuid::Uuid;

    use crate::{
        domain::{
            geolocation::{Geolocation, Place},
            image::{self, upload::Progress, FileName, ObjectName},
            listing::{self, draft::ValidationError, Draft, Kind},
            user, Image, Listing, Route,
        },
        infra::{
            database, geocoder,
            storage::{self, firebase, Upload},
            Database, Geocoder, Storage,
        },
        Command as _, Config, Service,
    };

    use super::{CreateListing, ExecutionError};

    /// In-memory [`Database`] recording inserted documents.
    #[derive(Clone, Debug, Default)]
    struct MemoryDatabase {
        inserted: Arc<Mutex<Vec<Listing>>>,
        broken: bool,
    }

    impl Database<Insert<listing::Document>> for MemoryDatabase {
        type Ok = Listing;
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            Insert(document): Insert<listing::Document>,
        ) -> Result<Self::Ok, Self::Err> {
            if self.broken {
                return Err(tracerr::new!(broken_database()));
            }
            let listing = Listing {
                id: Uuid::new_v4().into(),
                document,
                created_at: DateTime::now().coerce(),
            };
            self.inserted.lock().unwrap().push(listing.clone());
            Ok(listing)
        }
    }

    #[cfg(feature = "postgres")]
    fn broken_database() -> database::Error {
        use crate::infra::postgres;

        postgres::Error::from(postgres::connection::PoolError::Closed).into()
    }

    #[cfg(not(feature = "postgres"))]
    fn broken_database() -> database::Error {
        unreachable!("no `Database` backend enabled")
    }

    /// In-memory [`Storage`] recording uploaded and deleted objects.
    #[derive(Clone, Debug, Default)]
    struct MemoryStorage {
        attempted: Arc<Mutex<Vec<ObjectName>>>,
        stored: Arc<Mutex<Vec<ObjectName>>>,
        deleted: Arc<Mutex<Vec<ObjectName>>>,
        rejected_file: Option<&'static str>,
    }

    impl Storage<Insert<Upload>> for MemoryStorage {
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
            self.attempted.lock().unwrap().push(object.clone());

            if Some(image.name.as_ref()) == self.rejected_file {
                return Err(tracerr::new!(storage::Error::from(
                    firebase::Error::MissingDownloadToken(object),
                )));
            }

            reporter.report(Progress {
                object: object.clone(),
                transferred: image.size(),
                total: image.size(),
            });
            self.stored.lock().unwrap().push(object.clone());

            Ok(stored_url(&object))
        }
    }

    #[expect(unsafe_code, reason = "test")]
    fn stored_url(object: &ObjectName) -> image::Url {
        unsafe {
            image::Url::new_unchecked(format!("https://storage.test/{object}"))
        }
    }

    impl Storage<Delete<ObjectName>> for MemoryStorage {
        type Ok = ();
        type Err = Traced<storage::Error>;

        async fn execute(
            &self,
            Delete(object): Delete<ObjectName>,
        ) -> Result<Self::Ok, Self::Err> {
            self.deleted.lock().unwrap().push(object);
            Ok(())
        }
    }

    /// [`Geocoder`] answering every lookup with the same result.
    #[derive(Clone, Debug, Default)]
    struct FixedGeocoder {
        answer: Option<Place>,
        denied: bool,
        calls: Arc<AtomicUsize>,
    }

    impl FixedGeocoder {
        fn resolving(formatted_address: &str, lat: f64, lng: f64) -> Self {
            Self {
                answer: Some(Place {
                    geolocation: Geolocation { lat, lng },
                    formatted_address: Some(formatted_address.to_owned()),
                }),
                ..Self::default()
            }
        }
    }

    impl Geocoder<Select<By<Option<Place>, listing::Address>>>
        for FixedGeocoder
    {
        type Ok = Option<Place>;
        type Err = Traced<geocoder::Error>;

        async fn execute(
            &self,
            _: Select<By<Option<Place>, listing::Address>>,
        ) -> Result<Self::Ok, Self::Err> {
            _ = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.denied {
                return Err(tracerr::new!(geocoder::Error::from(
                    geocoder::google::Error::Status {
                        status: "REQUEST_DENIED".to_owned(),
                        message: String::new(),
                    },
                )));
            }
            Ok(self.answer.clone())
        }
    }

    struct Fixture {
        service: Service<MemoryDatabase, MemoryStorage, FixedGeocoder>,
        database: MemoryDatabase,
        storage: MemoryStorage,
        geocoder: FixedGeocoder,
    }

    impl Fixture {
        fn new(
            database: MemoryDatabase,
            storage: MemoryStorage,
            geocoder: FixedGeocoder,
        ) -> Self {
            Self {
                service: Service::new(
                    Config {
                        jwt_decoding_key:
                            jsonwebtoken::DecodingKey::from_secret(b"secret"),
                    },
                    database.clone(),
                    storage.clone(),
                    geocoder.clone(),
                ),
                database,
                storage,
                geocoder,
            }
        }

        fn untouched(&self) -> bool {
            self.database.inserted.lock().unwrap().is_empty()
                && self.storage.attempted.lock().unwrap().is_empty()
                && self.geocoder.calls.load(Ordering::SeqCst) == 0
        }
    }

    impl Default for Fixture {
        fn default() -> Self {
            Self::new(
                MemoryDatabase::default(),
                MemoryStorage::default(),
                FixedGeocoder::default(),
            )
        }
    }

    fn image(name: &str) -> Image {
        Image {
            name: FileName::new(name).unwrap(),
            content_type: Some("image/jpeg".to_owned()),
            content: Arc::from(name.as_bytes()),
        }
    }

    fn draft(images: &[&str]) -> Draft {
        Draft {
            kind: Kind::Rent,
            name: "Cosy flat near the park".to_owned(),
            address: "1 Main St".to_owned().into(),
            regular_price: "1000".parse().unwrap(),
            images: images.iter().copied().map(image).collect(),
            latitude: 10.0,
            longitude: 20.0,
            user_ref: user::Id::new("u1"),
            ..Draft::default()
        }
    }

    fn cmd(draft: Draft, geolocation_enabled: bool) -> CreateListing {
        CreateListing {
            draft,
            geolocation_enabled,
            progress: None,
        }
    }

    #[tokio::test]
    async fn creates_rent_listing() {
        let fx = Fixture::default();

        let created = fx
            .service
            .execute(cmd(draft(&["a.jpg", "b.jpg"]), false))
            .await
            .unwrap();

        let inserted = fx.database.inserted.lock().unwrap().clone();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].id, created.listing.id);

        let doc = serde_json::to_value(&created.listing.document).unwrap();
        assert_eq!(doc["geolocation"], json!({"lat": 10.0, "lng": 20.0}));
        assert_eq!(doc["imgUrls"].as_array().unwrap().len(), 2);
        assert_eq!(doc["location"], json!("1 Main St"));
        assert_eq!(doc["userRef"], json!("u1"));
        assert!(doc.get("discountedPrice").is_none());
        assert!(doc.get("images").is_none());
        assert!(doc.get("address").is_none());

        assert_eq!(
            created.redirect.to_string(),
            format!("/category/rent/{}", created.listing.id),
        );
        assert_eq!(
            created.redirect,
            Route::Listing {
                kind: Kind::Rent,
                id: created.listing.id,
            },
        );
        assert!(fx.storage.deleted.lock().unwrap().is_empty());
        assert_eq!(fx.geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn uploads_every_image_under_distinct_name() {
        let fx = Fixture::default();

        let created = fx
            .service
            .execute(cmd(draft(&["a.jpg", "b.jpg", "a.jpg"]), false))
            .await
            .unwrap();

        let attempted = fx.storage.attempted.lock().unwrap().clone();
        assert_eq!(attempted.len(), 3);
        assert_eq!(attempted.iter().collect::<HashSet<_>>().len(), 3);
        for object in &attempted {
            assert!(object.as_ref().starts_with("images/u1-"));
        }

        let expected = attempted
            .iter()
            .map(|o| stored_url(o).to_string())
            .collect::<HashSet<_>>();
        let actual = created
            .listing
            .document
            .img_urls
            .iter()
            .map(|u| u.to_string())
            .collect::<HashSet<_>>();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn rejects_non_discounted_offer_before_network() {
        let fx = Fixture::default();
        let draft = Draft {
            offer: true,
            discounted_price: "1000".parse().unwrap(),
            ..draft(&["a.jpg"])
        };

        let err = fx.service.execute(cmd(draft, true)).await.unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::Validation(ValidationError::DiscountNotLess),
        ));
        assert!(fx.untouched());
    }

    #[tokio::test]
    async fn rejects_too_many_images_before_network() {
        let fx = Fixture::default();
        let names = (1..=7).map(|n| format!("{n}.png")).collect::<Vec<_>>();
        let names = names.iter().map(String::as_str).collect::<Vec<_>>();

        let err = fx
            .service
            .execute(cmd(draft(&names), true))
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::Validation(ValidationError::TooManyImages(7)),
        ));
        assert!(fx.untouched());
    }

    #[tokio::test]
    async fn requires_owner() {
        let fx = Fixture::default();
        let draft = Draft {
            user_ref: None,
            ..draft(&["a.jpg"])
        };

        let err = fx.service.execute(cmd(draft, false)).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::Unauthenticated));
        assert!(fx.untouched());
    }

    #[tokio::test]
    async fn resolves_geolocation_from_address() {
        let fx = Fixture::new(
            MemoryDatabase::default(),
            MemoryStorage::default(),
            FixedGeocoder::resolving("1 Main St, Springfield, USA", 40.7, -74.0),
        );

        let created =
            fx.service.execute(cmd(draft(&[]), true)).await.unwrap();

        assert_eq!(fx.geocoder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            created.listing.document.geolocation,
            Geolocation {
                lat: 40.7,
                lng: -74.0,
            },
        );
        assert_eq!(created.listing.document.latitude, 10.0);
        assert!(created.listing.document.img_urls.is_empty());
    }

    #[tokio::test]
    async fn rejects_zero_results() {
        let fx = Fixture::default();

        let err = fx
            .service
            .execute(cmd(draft(&["a.jpg"]), true))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::AddressNotFound(_)));
        assert_eq!(fx.geocoder.calls.load(Ordering::SeqCst), 1);
        assert!(fx.database.inserted.lock().unwrap().is_empty());
        assert!(fx.storage.attempted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_undefined_formatted_address() {
        let fx = Fixture::new(
            MemoryDatabase::default(),
            MemoryStorage::default(),
            FixedGeocoder::resolving("undefined, USA", 1.0, 2.0),
        );

        let err = fx
            .service
            .execute(cmd(draft(&["a.jpg"]), true))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::AddressNotFound(_)));
        assert!(fx.database.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_undefined_entered_address() {
        let fx = Fixture::new(
            MemoryDatabase::default(),
            MemoryStorage::default(),
            FixedGeocoder::resolving("1 Main St", 1.0, 2.0),
        );
        let draft = Draft {
            address: "undefined".to_owned().into(),
            ..draft(&[])
        };

        let err = fx.service.execute(cmd(draft, true)).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::AddressNotFound(_)));
        assert!(fx.untouched());
    }

    #[tokio::test]
    async fn propagates_geocoder_failure() {
        let fx = Fixture::new(
            MemoryDatabase::default(),
            MemoryStorage::default(),
            FixedGeocoder {
                denied: true,
                ..FixedGeocoder::default()
            },
        );

        let err = fx
            .service
            .execute(cmd(draft(&["a.jpg"]), true))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::Geocoder(_)));
        assert!(fx.storage.attempted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn deletes_uploaded_images_on_upload_failure() {
        let fx = Fixture::new(
            MemoryDatabase::default(),
            MemoryStorage {
                rejected_file: Some("b.jpg"),
                ..MemoryStorage::default()
            },
            FixedGeocoder::default(),
        );

        let err = fx
            .service
            .execute(cmd(draft(&["a.jpg", "b.jpg", "c.jpg"]), false))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::ImageUpload(_)));
        assert_eq!(fx.storage.attempted.lock().unwrap().len(), 3);
        assert!(fx.database.inserted.lock().unwrap().is_empty());

        let stored = fx.storage.stored.lock().unwrap().clone();
        let deleted = fx.storage.deleted.lock().unwrap().clone();
        assert_eq!(stored.len(), 2);
        assert_eq!(
            deleted.into_iter().collect::<HashSet<_>>(),
            stored.into_iter().collect::<HashSet<_>>(),
        );
    }

    #[cfg(feature = "postgres")]
    #[tokio::test]
    async fn deletes_uploaded_images_on_write_failure() {
        let fx = Fixture::new(
            MemoryDatabase {
                broken: true,
                ..MemoryDatabase::default()
            },
            MemoryStorage::default(),
            FixedGeocoder::default(),
        );

        let err = fx
            .service
            .execute(cmd(draft(&["a.jpg", "b.jpg"]), false))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::Db(_)));
        assert_eq!(
            fx.storage
                .deleted
                .lock()
                .unwrap()
                .iter()
                .collect::<HashSet<_>>(),
            fx.storage
                .stored
                .lock()
                .unwrap()
                .iter()
                .collect::<HashSet<_>>(),
        );
        assert_eq!(fx.storage.deleted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reports_upload_progress() {
        let fx = Fixture::default();
        let (tx, mut rx) = mpsc::unbounded_channel();

        _ = fx
            .service
            .execute(CreateListing {
                progress: Some(tx),
                ..cmd(draft(&["a.jpg", "b.jpg"]), false)
            })
            .await
            .unwrap();

        let mut done = HashSet::new();
        while let Ok(progress) = rx.try_recv() {
            assert_eq!(progress.percent(), 100);
            _ = done.insert(progress.object);
        }
        assert_eq!(
            done,
            fx.storage
                .stored
                .lock()
                .unwrap()
                .iter()
                .cloned()
                .collect::<HashSet<_>>(),
        );
    }
}
