//! Resolves the API version of object references based on the versions a CRD
//! declares for an API contract.
use async_trait::async_trait;
use k8s_openapi::{
    api::core::v1::ObjectReference,
    apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition,
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use kube::{
    Api, Client,
    api::{ApiResource, ListParams},
    core::{GroupVersion, GroupVersionKind, gvk::ParseGroupVersionError},
};
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::instrument;

use crate::contract::Contract;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("object reference has no apiVersion"))]
    MissingApiVersion,

    #[snafu(display("object reference has no kind"))]
    MissingKind,

    #[snafu(display("failed to parse apiVersion {api_version:?} of object reference"))]
    ParseApiVersion {
        source: ParseGroupVersionError,
        api_version: String,
    },

    #[snafu(display("failed to list CustomResourceDefinitions for kind {kind:?} in {api_version:?}"))]
    ListCrds {
        source: BoxError,
        api_version: String,
        kind: String,
    },

    #[snafu(display(
        "failed to find a CustomResourceDefinition for kind {kind:?} in {api_version:?} with contract {contract:?}"
    ))]
    CrdNotFound {
        api_version: String,
        kind: String,
        contract: String,
    },

    #[snafu(display(
        "cannot find any versions matching contract {contract:?} for CRD {crd} as contract version label(s) are either missing or empty"
    ))]
    NoSupportedVersions { contract: String, crd: String },
}

/// Access to the CustomResourceDefinitions known to the API server.
///
/// Implemented for [`kube::Client`].
#[async_trait]
pub trait CrdLookup {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetches only the metadata of the CRD serving `gvk`.
    ///
    /// The CRD is looked up by name, see [`crd_name`].
    async fn crd_metadata(&self, gvk: &GroupVersionKind) -> Result<ObjectMeta, Self::Error>;

    /// Lists the CRDs labelled with `contract` and returns the one serving the
    /// group and kind of `gvk`.
    async fn find_crd_with_contract(
        &self,
        gvk: &GroupVersionKind,
        contract: &Contract,
    ) -> Result<Option<CustomResourceDefinition>, Self::Error>;
}

#[async_trait]
impl CrdLookup for Client {
    type Error = kube::Error;

    async fn crd_metadata(&self, gvk: &GroupVersionKind) -> Result<ObjectMeta, Self::Error> {
        let crd_api: Api<CustomResourceDefinition> = Api::all(self.clone());
        let crd = crd_api.get_metadata(&crd_name(gvk)).await?;

        Ok(crd.metadata)
    }

    async fn find_crd_with_contract(
        &self,
        gvk: &GroupVersionKind,
        contract: &Contract,
    ) -> Result<Option<CustomResourceDefinition>, Self::Error> {
        let crd_api: Api<CustomResourceDefinition> = Api::all(self.clone());
        let list_params = ListParams::default().labels(&contract.label_key());
        let crds = crd_api.list(&list_params).await?;

        Ok(crds
            .into_iter()
            .find(|crd| crd.spec.group == gvk.group && crd.spec.names.kind == gvk.kind))
    }
}

/// Returns the name of the CRD serving `gvk`, `<plural>.<group>`.
///
/// ```
/// use crd_conversion::reference::crd_name;
/// use kube::core::GroupVersionKind;
///
/// let gvk = GroupVersionKind::gvk("infrastructure.cluster.x-k8s.io", "v1beta1", "DockerCluster");
/// assert_eq!(crd_name(&gvk), "dockerclusters.infrastructure.cluster.x-k8s.io");
/// ```
pub fn crd_name(gvk: &GroupVersionKind) -> String {
    let resource = ApiResource::from_gvk(gvk);
    format!("{plural}.{group}", plural = resource.plural, group = gvk.group)
}

/// Rewrites object references to the latest version a CRD declares for a
/// contract.
pub struct ContractResolver<L> {
    lookup: L,
    contract: Contract,
}

impl<L> ContractResolver<L>
where
    L: CrdLookup,
{
    pub fn new(lookup: L, contract: Contract) -> Self {
        Self { lookup, contract }
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    /// Queries the CRD of `reference` and sets its version to the latest one
    /// listed in the contract label of the CRD.
    ///
    /// The CRD metadata is fetched by name first. If that fails, all CRDs with
    /// the contract label are listed instead. `reference` is only modified if a
    /// different version is chosen, it is left untouched on errors.
    #[instrument(
        skip(self, reference),
        fields(
            contract = %self.contract,
            reference.api_version = ?reference.api_version,
            reference.kind = ?reference.kind,
        )
    )]
    pub async fn resolve(&self, reference: &mut ObjectReference) -> Result<()> {
        let gvk = reference_gvk(reference)?;
        let metadata = self.fetch_crd_metadata(&gvk).await?;

        let chosen = self
            .contract
            .supported_versions(metadata.labels.as_ref())
            .and_then(|mut versions| {
                versions.sort();
                versions.into_inner().pop()
            })
            .with_context(|| NoSupportedVersionsSnafu {
                contract: self.contract.to_string(),
                crd: metadata.name.clone().unwrap_or_default(),
            })?;

        if chosen != *gvk.version {
            let api_version = GroupVersion::gv(&gvk.group, chosen.as_str()).api_version();
            tracing::debug!(
                from = %gvk.version,
                to = %chosen,
                "updating version of object reference"
            );

            reference.api_version = Some(api_version);
        }

        Ok(())
    }

    async fn fetch_crd_metadata(&self, gvk: &GroupVersionKind) -> Result<ObjectMeta> {
        let err = match self.lookup.crd_metadata(gvk).await {
            Ok(metadata) => return Ok(metadata),
            Err(err) => err,
        };

        tracing::info!(
            error = %err,
            "cannot retrieve CRD with metadata only client, falling back to slower listing"
        );

        let crd = self
            .lookup
            .find_crd_with_contract(gvk, &self.contract)
            .await
            .map_err(BoxError::from)
            .with_context(|_| ListCrdsSnafu {
                api_version: gvk.api_version(),
                kind: &gvk.kind,
            })?
            .with_context(|| CrdNotFoundSnafu {
                api_version: gvk.api_version(),
                kind: &gvk.kind,
                contract: self.contract.to_string(),
            })?;

        Ok(crd.metadata)
    }
}

fn reference_gvk(reference: &ObjectReference) -> Result<GroupVersionKind> {
    let api_version = reference
        .api_version
        .as_deref()
        .filter(|api_version| !api_version.is_empty())
        .context(MissingApiVersionSnafu)?;
    let kind = reference
        .kind
        .as_deref()
        .filter(|kind| !kind.is_empty())
        .context(MissingKindSnafu)?;

    let GroupVersion { group, version, .. } = api_version
        .parse::<GroupVersion>()
        .context(ParseApiVersionSnafu { api_version })?;

    Ok(GroupVersionKind::gvk(&group, &version, kind))
}
