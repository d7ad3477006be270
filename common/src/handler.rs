//! [`Handler`] abstractions.

use std::future::Future;

/// Executable handler of some `Args`.
///
/// Commands, queries and infrastructure adapters are all [`Handler`]s of the
/// operations they support, so the business logic stays generic over the
/// adapters it is composed of.
///
/// # Example
///
/// ```rust
/// # use std::convert::Infallible;
/// # use common::{operations::Insert, Handler};
/// struct Doubler;
///
/// impl Handler<Insert<u8>> for Doubler {
///     type Ok = u16;
///     type Err = Infallible;
///
///     async fn execute(&self, Insert(n): Insert<u8>) -> Result<u16, Infallible> {
///         Ok(u16::from(n) * 2)
///     }
/// }
/// ```
pub trait Handler<Args = ()> {
    /// Type of successful [`Handler`] result.
    type Ok;

    /// Type of this [`Handler`] error.
    type Err;

    /// Executes this [`Handler`] with the provided arguments.
    fn execute(
        &self,
        args: Args,
    ) -> impl Future<Output = Result<Self::Ok, Self::Err>>;
}
