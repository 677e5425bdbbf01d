//! Capabilities of the versions of a custom resource taking part in hub and
//! spoke conversions.
//!
//! Every spoke version converts to and from the hub, so there is no need to
//! convert between every pair of versions.
//!
//! ```
//! use crd_conversion::{ConvertFrom, ConvertTo, Hub};
//! use std::convert::Infallible;
//!
//! #[derive(Clone, Default)]
//! struct HubCluster {
//!     name: String,
//!     paused: bool,
//! }
//!
//! impl Hub for HubCluster {}
//!
//! #[derive(Clone, Default)]
//! struct SpokeCluster {
//!     name: String,
//! }
//!
//! impl ConvertTo<HubCluster> for SpokeCluster {
//!     type Error = Infallible;
//!
//!     fn convert_to(&self, hub: &mut HubCluster) -> Result<(), Self::Error> {
//!         hub.name = self.name.clone();
//!         Ok(())
//!     }
//! }
//!
//! impl ConvertFrom<HubCluster> for SpokeCluster {
//!     type Error = Infallible;
//!
//!     fn convert_from(&mut self, hub: &HubCluster) -> Result<(), Self::Error> {
//!         self.name = hub.name.clone();
//!         Ok(())
//!     }
//! }
//! ```

/// Marks the canonical version of a resource which all other versions convert
/// through.
pub trait Hub {}

/// A spoke version which can be converted into the hub `H`.
pub trait ConvertTo<H: Hub> {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Writes the content of `self` into `hub`.
    fn convert_to(&self, hub: &mut H) -> Result<(), Self::Error>;
}

/// A spoke version which can be converted from the hub `H`.
pub trait ConvertFrom<H: Hub> {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Overwrites the content of `self` with the content of `hub`.
    fn convert_from(&mut self, hub: &H) -> Result<(), Self::Error>;
}

/// A spoke version which converts in both directions.
pub trait Convertible<H: Hub>: ConvertTo<H> + ConvertFrom<H> {}

impl<H, T> Convertible<H> for T
where
    H: Hub,
    T: ConvertTo<H> + ConvertFrom<H>,
{
}
