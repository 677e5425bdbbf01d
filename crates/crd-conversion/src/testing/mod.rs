//! Tooling for testing conversions between hub and spoke versions.
//!
//! The [`RoundTripTest`] fills instances of both versions with random content
//! using a [`Fuzzer`], converts them back and forth and checks that nothing got
//! lost along the way.
//!
//! ```ignore
//! use crd_conversion::testing::{RoundTripTest, fuzz_test};
//!
//! #[test]
//! fn cluster_conversion() {
//!     fuzz_test(
//!         v1beta1::Cluster::default(),
//!         v1alpha4::Cluster::default(),
//!         Vec::new(),
//!         Vec::new(),
//!     )();
//! }
//!
//! #[test]
//! fn machine_conversion() {
//!     RoundTripTest::new(v1beta1::Machine::default(), v1alpha4::Machine::default())
//!         .with_hub_fn(|machine, _| machine.status = None)
//!         .run();
//! }
//! ```
mod equality;
mod fuzzer;
mod roundtrip;

pub use equality::*;
pub use fuzzer::*;
pub use roundtrip::*;
