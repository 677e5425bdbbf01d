//! This library provides helpers for custom resources which are served in
//! multiple API versions, one of them being the canonical *hub* version and the
//! others being *spoke* versions converting to and from the hub.
//!
//! ## Resolving API versions of references
//!
//! CRDs advertise which of their versions satisfy a given API contract by
//! carrying a label keyed by the contract, for example
//! `cluster.x-k8s.io/v1beta1=v1alpha4_v1beta1`. The [`ContractResolver`]
//! looks up this label and rewrites an object reference to the latest
//! advertised version.
//!
//! ```no_run
//! # async fn resolve(client: kube::Client) -> Result<(), crd_conversion::reference::Error> {
//! use crd_conversion::{Contract, ContractResolver};
//! use k8s_openapi::api::core::v1::ObjectReference;
//!
//! let contract: Contract = "cluster.x-k8s.io/v1beta1".parse().expect("valid contract");
//! let resolver = ContractResolver::new(client, contract);
//!
//! let mut reference = ObjectReference {
//!     api_version: Some("infrastructure.cluster.x-k8s.io/v1alpha3".to_owned()),
//!     kind: Some("DockerCluster".to_owned()),
//!     name: Some("my-cluster".to_owned()),
//!     ..Default::default()
//! };
//!
//! resolver.resolve(&mut reference).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Lossless conversions
//!
//! Spoke versions usually know fewer fields than the hub. To not lose them in a
//! hub -> spoke -> hub round trip, [`data::marshal_data`] stores the hub in an
//! annotation of the spoke and [`data::unmarshal_data`] restores it on the way
//! back.
//!
//! ## Crate Features
//!
//! - `clap` enables deriving `clap::Parser` for [`ContractOptions`].
//! - `testing` enables the fuzzer and the round trip harness in [`testing`].
//! - `full` enables all available features.

pub mod contract;
pub mod convertible;
pub mod data;
pub mod reference;
#[cfg(feature = "testing")]
pub mod testing;
pub mod version;

pub use contract::{Contract, ContractOptions};
pub use convertible::{ConvertFrom, ConvertTo, Convertible, Hub};
pub use data::DATA_ANNOTATION;
pub use reference::{ContractResolver, CrdLookup};
pub use version::{KubeAwareVersion, KubeAwareVersions};

// External re-exports
pub use k8s_openapi;
pub use kube;
