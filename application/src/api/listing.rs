//! [`Listing`] endpoints.

use std::sync::Arc;

use axum::{
    extract::{multipart::Field as Part, Multipart, Path},
    response::{IntoResponse as _, Response},
    Extension, Json,
};
use serde::Serialize;
use service::{
    command::{self, create_listing, Command as _},
    domain::{
        image::FileName,
        listing::{
            self,
            draft::{self, Field, Input},
            form, Form,
        },
        Image, Listing,
    },
    query, Query as _,
};
use tokio::sync::mpsc;
use tracing as log;

use crate::{context::CurrentUser, define_error, AsError, Context, Error};

use super::SPAN_NAME;

/// Name of the form element switching the [`Geolocation`] resolving from the
/// address.
///
/// [`Geolocation`]: service::domain::Geolocation
pub const GEOLOCATION_ENABLED: &str = "geolocationEnabled";

/// Creates a new [`Listing`] out of a submitted `multipart/form-data` form.
///
/// Form elements are named after the [`Field`]s, every selected image is a
/// separate `images` part.
///
/// Possible error codes:
/// - `INVALID_FORM` - form contains an unknown or malformed element;
/// - `DISCOUNT_NOT_LESS` - discounted price is not lower than the regular one;
/// - `TOO_MANY_IMAGES` - more images selected than allowed;
/// - `ADDRESS_NOT_FOUND` - address cannot be resolved into coordinates;
/// - `GEOCODER_UNAVAILABLE` - geocoding service failed;
/// - `IMAGES_NOT_UPLOADED` - some image failed to upload.
#[tracing::instrument(
    skip_all,
    fields(
        http.handler = "createListing",
        otel.name = SPAN_NAME,
        user.id = %user.0,
    ),
)]
pub async fn create(
    context: Context,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<Response, Error> {
    let mut form = read_form(multipart).await?;

    // Signed-out users never pass the route guard.
    let CurrentUser(user) = user;
    _ = form.on_auth_change(Some(user));

    let draft = form.submit().map_err(AsError::into_error)?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (created, ()) = tokio::join!(
        context.service().execute(command::CreateListing {
            draft,
            geolocation_enabled: form.geolocation_enabled(),
            progress: Some(tx),
        }),
        async move {
            while let Some(p) = rx.recv().await {
                if p.transferred == p.total {
                    log::debug!("sent `{}` object, {} bytes", p.object, p.total);
                }
            }
        },
    );

    let create_listing::Created { listing, redirect } = match created {
        Ok(created) => created,
        Err(e) => {
            form.fail().map_err(AsError::into_error)?;
            return Err(e.into_error());
        }
    };
    form.complete(redirect.clone()).map_err(AsError::into_error)?;

    let location = redirect.to_string();
    Ok((
        http::StatusCode::CREATED,
        [(http::header::LOCATION, location.clone())],
        Json(Saved {
            message: "Listing saved",
            listing,
            redirect: location,
        }),
    )
        .into_response())
}

/// Returns the [`Listing`] of the detail view.
///
/// Possible error codes:
/// - `LISTING_NOT_FOUND` - no [`Listing`] of the requested kind and ID exists.
#[tracing::instrument(
    skip_all,
    fields(
        http.handler = "getListing",
        listing.id = %id,
        listing.kind = %kind,
        otel.name = SPAN_NAME,
    ),
)]
pub async fn get(
    context: Context,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<Listing>, Error> {
    let (Ok(kind), Ok(id)) =
        (kind.parse::<listing::Kind>(), id.parse::<listing::Id>())
    else {
        return Err(ListingError::NotFound.into());
    };

    context
        .service()
        .execute(query::listing::ById::by(id))
        .await
        .map_err(AsError::into_error)?
        .filter(|l| l.document.kind == kind)
        .map(Json)
        .ok_or_else(|| ListingError::NotFound.into())
}

/// Body of a successful [`create()`] response.
#[derive(Debug, Serialize)]
struct Saved {
    /// Notification to show.
    message: &'static str,

    /// Created [`Listing`].
    listing: Listing,

    /// Path of the created [`Listing`] detail view.
    redirect: String,
}

/// Reads the provided [`Multipart`] body into a [`Form`].
///
/// Images are applied as a whole selection once every part is read.
async fn read_form(mut multipart: Multipart) -> Result<Form, Error> {
    let mut form = Form::new();
    let mut images = Vec::new();

    while let Some(part) =
        multipart.next_field().await.map_err(AsError::into_error)?
    {
        let Some(name) = part.name().map(ToOwned::to_owned) else {
            return Err(FormError::Unnamed.into());
        };

        if name == GEOLOCATION_ENABLED {
            let text = part.text().await.map_err(AsError::into_error)?;
            let enabled = draft::decode_bool(&text)
                .ok_or_else(|| Error::from(FormError::Malformed))?;
            form.set_geolocation_enabled(enabled);
            continue;
        }

        let field = name
            .parse::<Field>()
            .map_err(|_| Error::from(FormError::Unknown))?;
        if field == Field::Images {
            if let Some(image) = read_image(part).await? {
                images.push(image);
            }
            continue;
        }

        let text = part.text().await.map_err(AsError::into_error)?;
        form.mutate(field, Input::Text(text))
            .map_err(AsError::into_error)?;
    }

    if !images.is_empty() {
        form.mutate(Field::Images, Input::Files(images))
            .map_err(AsError::into_error)?;
    }

    Ok(form)
}

/// Reads an [`Image`] out of the provided file [`Part`].
///
/// Returns [`None`] for an empty file input.
async fn read_image(part: Part<'_>) -> Result<Option<Image>, Error> {
    let name = part.file_name().and_then(FileName::new);
    let content_type = part.content_type().map(ToOwned::to_owned);
    let content = part.bytes().await.map_err(AsError::into_error)?;

    match name {
        Some(name) => Ok(Some(Image {
            name,
            content_type,
            content: Arc::from(&content[..]),
        })),
        None if content.is_empty() => Ok(None),
        None => Err(FormError::Malformed.into()),
    }
}

impl AsError for form::Error {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Input(e) => e.try_as_error(),
            Self::UnexpectedPhase(_) => None,
        }
    }
}

impl AsError for draft::ReduceError {
    fn try_as_error(&self) -> Option<Error> {
        Some(Error {
            message: self.to_string(),
            ..Error::from(FormError::Malformed)
        })
    }
}

impl AsError for create_listing::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Validation(e) => e.try_as_error(),
            Self::Unauthenticated => Some(ListingError::Unauthenticated.into()),
            Self::AddressNotFound(_) => {
                Some(ListingError::AddressNotFound.into())
            }
            Self::Geocoder(_) => Some(ListingError::GeocoderUnavailable.into()),
            Self::ImageUpload(_) => Some(ListingError::ImagesNotUploaded.into()),
            Self::Db(e) => e.try_as_error(),
        }
    }
}

impl AsError for draft::ValidationError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::DiscountNotLess => ListingError::DiscountNotLess.into(),
            Self::TooManyImages(_) => ListingError::TooManyImages.into(),
        })
    }
}

define_error! {
    enum FormError {
        #[code = "INVALID_FORM"]
        #[status = BAD_REQUEST]
        #[message = "Form element has no name"]
        Unnamed,

        #[code = "INVALID_FORM"]
        #[status = BAD_REQUEST]
        #[message = "Unknown form element"]
        Unknown,

        #[code = "INVALID_FORM"]
        #[status = BAD_REQUEST]
        #[message = "Malformed form element"]
        Malformed,
    }
}

define_error! {
    enum ListingError {
        #[code = "LISTING_NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Listing not found"]
        NotFound,

        #[code = "AUTHENTICATION_REQUIRED"]
        #[status = UNAUTHORIZED]
        #[message = "Authentication required"]
        Unauthenticated,

        #[code = "DISCOUNT_NOT_LESS"]
        #[status = UNPROCESSABLE_ENTITY]
        #[message = "Discounted price needs to be less than regular price"]
        DiscountNotLess,

        #[code = "TOO_MANY_IMAGES"]
        #[status = UNPROCESSABLE_ENTITY]
        #[message = "Max 6 images"]
        TooManyImages,

        #[code = "ADDRESS_NOT_FOUND"]
        #[status = UNPROCESSABLE_ENTITY]
        #[message = "Please enter a correct address"]
        AddressNotFound,

        #[code = "GEOCODER_UNAVAILABLE"]
        #[status = BAD_GATEWAY]
        #[message = "Address cannot be resolved right now"]
        GeocoderUnavailable,

        #[code = "IMAGES_NOT_UPLOADED"]
        #[status = BAD_GATEWAY]
        #[message = "Images not uploaded"]
        ImagesNotUploaded,
    }
}

#[cfg(test)]
mod spec {
    use axum::{
        body::Body,
        extract::{FromRequest as _, Multipart},
    };
    use service::{
        command::create_listing::ExecutionError,
        domain::listing::{draft::ValidationError, Address, Kind},
    };

    use crate::AsError as _;

    use super::read_form;

    const BOUNDARY: &str = "X-LISTING-BOUNDARY";

    fn text(name: &str, value: &str) -> String {
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{name}\"\r\n\
             \r\n\
             {value}\r\n",
        )
    }

    fn file(name: &str, value: &str) -> String {
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"images\"; \
             filename=\"{name}\"\r\n\
             Content-Type: image/jpeg\r\n\
             \r\n\
             {value}\r\n",
        )
    }

    async fn multipart(parts: &[String]) -> Multipart {
        let body = format!("{}--{BOUNDARY}--\r\n", parts.concat());
        let req = http::Request::builder()
            .method(http::Method::POST)
            .header(
                http::header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(req, &()).await.unwrap()
    }

    #[tokio::test]
    async fn reads_form_elements() {
        let form = read_form(
            multipart(&[
                text("type", "sale"),
                text("name", "Sunny loft downtown"),
                text("bedrooms", "3"),
                text("parking", "true"),
                text("address", "1 Main St"),
                text("geolocationEnabled", "true"),
                file("front.jpg", "front"),
                file("back.jpg", "back"),
            ])
            .await,
        )
        .await
        .unwrap();

        let draft = form.draft();
        assert_eq!(draft.kind, Kind::Sale);
        assert_eq!(draft.name, "Sunny loft downtown");
        assert_eq!(draft.bedrooms, 3);
        assert!(draft.parking);
        assert_eq!(draft.address, Address::from("1 Main St".to_owned()));
        assert!(form.geolocation_enabled());

        let names = draft
            .images
            .iter()
            .map(|i| i.name.to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, ["front.jpg", "back.jpg"]);
        assert_eq!(&*draft.images[0].content, b"front");
        assert_eq!(draft.images[0].content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn skips_empty_file_input() {
        let form = read_form(multipart(&[file("", "")]).await).await.unwrap();

        assert!(form.draft().images.is_empty());
    }

    #[tokio::test]
    async fn rejects_unknown_element() {
        let err = read_form(multipart(&[text("color", "red")]).await)
            .await
            .unwrap_err();

        assert_eq!(err.status_code, http::StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "INVALID_FORM");
    }

    #[tokio::test]
    async fn rejects_malformed_values() {
        for part in [
            text("bedrooms", "three"),
            text("offer", "yes"),
            text("geolocationEnabled", "1"),
        ] {
            let err = read_form(multipart(&[part]).await).await.unwrap_err();

            assert_eq!(err.status_code, http::StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn maps_submission_errors() {
        for (err, status, message) in [
            (
                ExecutionError::Validation(ValidationError::DiscountNotLess),
                http::StatusCode::UNPROCESSABLE_ENTITY,
                "Discounted price needs to be less than regular price",
            ),
            (
                ExecutionError::Validation(ValidationError::TooManyImages(7)),
                http::StatusCode::UNPROCESSABLE_ENTITY,
                "Max 6 images",
            ),
            (
                ExecutionError::AddressNotFound(Address::from(
                    "undefined".to_owned(),
                )),
                http::StatusCode::UNPROCESSABLE_ENTITY,
                "Please enter a correct address",
            ),
            (
                ExecutionError::Unauthenticated,
                http::StatusCode::UNAUTHORIZED,
                "Authentication required",
            ),
        ] {
            let err = err.into_error();

            assert_eq!(err.status_code, status);
            assert_eq!(err.message, message);
        }
    }
}
