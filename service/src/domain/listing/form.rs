//! Listing submission [`Form`] state machine.

use derive_more::{Display, Error as StdError};

use crate::domain::{user, Route};

use super::draft::{self, Draft, Field, Input};

/// Observable phase of a [`Form`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Phase {
    /// Accepting user input.
    #[default]
    Editing,

    /// Submission is in progress, input is not accepted.
    Submitting,

    /// Submission succeeded, user is navigated to the [`Route`].
    Complete(Route),
}

/// Listing creation form.
#[derive(Clone, Debug, Default)]
pub struct Form {
    /// Current [`Draft`].
    draft: Draft,

    /// Indicator whether the coordinates are resolved from the address rather
    /// than entered by the user.
    geolocation_enabled: bool,

    /// Current [`Phase`].
    phase: Phase,
}

impl Form {
    /// Creates a new empty [`Form`] in the [`Phase::Editing`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current [`Draft`].
    #[must_use]
    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    /// Returns the current [`Phase`].
    #[must_use]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Indicates whether the coordinates are resolved from the address.
    #[must_use]
    pub fn geolocation_enabled(&self) -> bool {
        self.geolocation_enabled
    }

    /// Switches resolving of the coordinates from the address.
    pub fn set_geolocation_enabled(&mut self, enabled: bool) {
        self.geolocation_enabled = enabled;
    }

    /// Applies the [`Input`] of a form element to the [`Draft`].
    ///
    /// # Errors
    ///
    /// - If this [`Form`] is not in the [`Phase::Editing`].
    /// - If the [`Input`] doesn't fit the [`Field`], the [`Draft`] stays
    ///   unchanged.
    pub fn mutate(&mut self, field: Field, input: Input) -> Result<(), Error> {
        self.ensure(&Phase::Editing)?;
        self.draft = self.draft.clone().reduce(field, input)?;
        Ok(())
    }

    /// Handles an identity change reported by the authentication provider.
    ///
    /// Returns the [`Route`] to navigate to, if the user signed out.
    pub fn on_auth_change(&mut self, identity: Option<user::Id>) -> Option<Route> {
        match identity {
            Some(id) => {
                self.draft = self.draft.clone().with_owner(id);
                None
            }
            None => Some(Route::SignIn),
        }
    }

    /// Starts submission, moving this [`Form`] to the [`Phase::Submitting`].
    ///
    /// Returns the [`Draft`] to submit.
    ///
    /// # Errors
    ///
    /// If this [`Form`] is not in the [`Phase::Editing`].
    pub fn submit(&mut self) -> Result<Draft, Error> {
        self.ensure(&Phase::Editing)?;
        self.phase = Phase::Submitting;
        Ok(self.draft.clone())
    }

    /// Reverts a failed submission, moving this [`Form`] back to the
    /// [`Phase::Editing`] with the [`Draft`] kept for correction.
    ///
    /// # Errors
    ///
    /// If this [`Form`] is not in the [`Phase::Submitting`].
    pub fn fail(&mut self) -> Result<(), Error> {
        self.ensure(&Phase::Submitting)?;
        self.phase = Phase::Editing;
        Ok(())
    }

    /// Completes a successful submission, moving this [`Form`] to the
    /// [`Phase::Complete`].
    ///
    /// # Errors
    ///
    /// If this [`Form`] is not in the [`Phase::Submitting`].
    pub fn complete(&mut self, route: Route) -> Result<(), Error> {
        self.ensure(&Phase::Submitting)?;
        self.phase = Phase::Complete(route);
        Ok(())
    }

    /// Ensures this [`Form`] is in the `expected` [`Phase`].
    fn ensure(&self, expected: &Phase) -> Result<(), Error> {
        if &self.phase == expected {
            Ok(())
        } else {
            Err(Error::UnexpectedPhase(self.phase.clone()))
        }
    }
}

/// Error of a [`Form`] operation.
#[derive(Clone, Debug, Display, StdError)]
pub enum Error {
    /// Operation is not allowed in the current [`Phase`].
    #[display("Operation is not allowed in `{_0:?}` phase")]
    UnexpectedPhase(#[error(not(source))] Phase),

    /// [`Input`] was rejected.
    #[display("Invalid input: {_0}")]
    Input(draft::ReduceError),
}

impl From<draft::ReduceError> for Error {
    fn from(e: draft::ReduceError) -> Self {
        Self::Input(e)
    }
}

#[cfg(test)]
mod spec {
    use uuid::Uuid;

    use crate::domain::{listing, user, Route};

    use super::{Error, Field, Form, Phase};

    fn route() -> Route {
        Route::Listing {
            kind: listing::Kind::Rent,
            id: Uuid::nil().into(),
        }
    }

    #[test]
    fn starts_editing() {
        let form = Form::new();

        assert_eq!(form.phase(), &Phase::Editing);
        assert!(!form.geolocation_enabled());
    }

    #[test]
    fn completes_submission() {
        let mut form = Form::new();
        form.mutate(Field::Name, "Sunny loft downtown".into()).unwrap();

        let draft = form.submit().unwrap();
        assert_eq!(draft.name, "Sunny loft downtown");
        assert_eq!(form.phase(), &Phase::Submitting);

        form.complete(route()).unwrap();
        assert_eq!(form.phase(), &Phase::Complete(route()));
    }

    #[test]
    fn reverts_failed_submission() {
        let mut form = Form::new();
        form.mutate(Field::Offer, "true".into()).unwrap();
        _ = form.submit().unwrap();

        form.fail().unwrap();

        assert_eq!(form.phase(), &Phase::Editing);
        assert!(form.draft().offer);
        form.mutate(Field::Offer, "false".into()).unwrap();
        assert!(!form.draft().offer);
    }

    #[test]
    fn rejects_input_while_submitting() {
        let mut form = Form::new();
        _ = form.submit().unwrap();

        assert!(matches!(
            form.mutate(Field::Name, "late".into()),
            Err(Error::UnexpectedPhase(Phase::Submitting)),
        ));
        assert!(matches!(
            form.submit(),
            Err(Error::UnexpectedPhase(Phase::Submitting)),
        ));
    }

    #[test]
    fn rejects_settling_while_editing() {
        let mut form = Form::new();

        assert!(form.fail().is_err());
        assert!(form.complete(route()).is_err());
    }

    #[test]
    fn keeps_draft_on_invalid_input() {
        let mut form = Form::new();
        form.mutate(Field::Bedrooms, "3".into()).unwrap();

        assert!(matches!(
            form.mutate(Field::Bedrooms, "three".into()),
            Err(Error::Input(_)),
        ));
        assert_eq!(form.draft().bedrooms, 3);
    }

    #[test]
    fn describes_errors() {
        let mut form = Form::new();
        _ = form.submit().unwrap();
        let err = form.mutate(Field::Name, "late".into()).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Operation is not allowed in `Submitting` phase",
        );
        assert!(std::error::Error::source(&err).is_none());

        let mut form = Form::new();
        let err = form.mutate(Field::Bedrooms, "three".into()).unwrap_err();
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn follows_authentication() {
        let mut form = Form::new();

        assert_eq!(form.on_auth_change(user::Id::new("u1")), None);
        assert_eq!(form.draft().user_ref, user::Id::new("u1"));

        assert_eq!(form.on_auth_change(None), Some(Route::SignIn));
    }
}
