//! API contracts and the CRD labels advertising them.
//!
//! A CRD declares that some of its versions satisfy a contract by carrying a
//! label keyed by the contract, for example
//! `cluster.x-k8s.io/v1beta1: v1alpha4_v1beta1`.
use std::{collections::BTreeMap, fmt::Display, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize, de::Visitor};
use snafu::{OptionExt, Snafu, ensure};

use crate::version::KubeAwareVersions;

/// The contract used by [`ContractOptions`] if none is configured.
pub const DEFAULT_CONTRACT: &str = "cluster.x-k8s.io/v1beta1";

const MAX_GROUP_LENGTH: usize = 253;

static GROUP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?)*$")
        .expect("failed to compile contract group regex")
});

static VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$")
        .expect("failed to compile contract version regex")
});

/// Error variants which can be encountered when creating a new [`Contract`]
/// from unparsed input.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ParseContractError {
    #[snafu(display("contract must have the <GROUP>/<VERSION> format"))]
    MissingVersion,

    #[snafu(display("contract group must not be empty"))]
    EmptyGroup,

    #[snafu(display("contract group {group:?} must be a valid DNS subdomain"))]
    InvalidGroup { group: String },

    #[snafu(display("contract version {version:?} must be a valid DNS label"))]
    InvalidVersion { version: String },
}

/// A validated API contract with the `<GROUP>/<VERSION>` format, for example
/// `cluster.x-k8s.io/v1beta1`.
///
/// The textual form of the contract is used as the key of the label which
/// lists the versions of a CRD satisfying the contract. Contracts are passed
/// around explicitly (see [`ContractOptions`]) instead of being baked into the
/// code.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Contract {
    group: String,
    version: String,
}

impl Contract {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, ParseContractError> {
        let group = group.into();
        let version = version.into();

        ensure!(!group.is_empty(), EmptyGroupSnafu);
        ensure!(
            group.len() <= MAX_GROUP_LENGTH && GROUP_REGEX.is_match(&group),
            InvalidGroupSnafu { group }
        );
        ensure!(VERSION_REGEX.is_match(&version), InvalidVersionSnafu { version });

        Ok(Self { group, version })
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// The key of the CRD label listing the versions satisfying this contract.
    pub fn label_key(&self) -> String {
        self.to_string()
    }

    /// Returns the versions the given CRD labels declare for this contract.
    ///
    /// Returns [`None`] if the label is missing or has an empty value.
    pub fn supported_versions(
        &self,
        labels: Option<&BTreeMap<String, String>>,
    ) -> Option<KubeAwareVersions> {
        let value = labels?.get(&self.label_key())?;

        if value.is_empty() {
            return None;
        }

        Some(KubeAwareVersions::from_label_value(value))
    }
}

impl FromStr for Contract {
    type Err = ParseContractError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (group, version) = input.split_once('/').context(MissingVersionSnafu)?;
        Self::new(group, version)
    }
}

impl Display for Contract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{group}/{version}", group = self.group, version = self.version)
    }
}

impl<'de> Deserialize<'de> for Contract {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ContractVisitor;

        impl Visitor<'_> for ContractVisitor {
            type Value = Contract;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(formatter, "an API contract in the <GROUP>/<VERSION> format")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Contract::from_str(v).map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_str(ContractVisitor)
    }
}

impl Serialize for Contract {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg_attr(
    feature = "clap",
    derive(clap::Parser),
    command(next_help_heading = "Conversion Options")
)]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractOptions {
    /// The API contract used to pick versions of referenced custom resources,
    /// for example `cluster.x-k8s.io/v1beta1`.
    #[cfg_attr(feature = "clap", arg(long, env, default_value = DEFAULT_CONTRACT))]
    pub api_contract: Contract,
}

impl Default for ContractOptions {
    fn default() -> Self {
        Self {
            api_contract: DEFAULT_CONTRACT
                .parse()
                .expect("the default contract must be valid"),
        }
    }
}
