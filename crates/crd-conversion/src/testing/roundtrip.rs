use std::fmt::Display;

use kube::Resource;
use serde::Serialize;
use snafu::{ResultExt, Snafu};

use crate::{
    convertible::{ConvertFrom, ConvertTo, Convertible, Hub},
    data::remove_data_annotation,
    testing::{Fuzz, FuzzFn, Fuzzer, equality::SemanticEquality},
};

/// The number of fuzzed objects checked per scenario if not configured
/// otherwise.
pub const DEFAULT_ITERATIONS: usize = 10_000;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The direction of a round trip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    /// A fuzzed spoke is converted to the hub and back.
    SpokeHubSpoke,

    /// A fuzzed hub is converted to the spoke and back.
    HubSpokeHub,
}

impl Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SpokeHubSpoke => write!(f, "spoke-hub-spoke"),
            Self::HubSpokeHub => write!(f, "hub-spoke-hub"),
        }
    }
}

#[derive(Debug, Snafu)]
pub enum RoundTripError {
    #[snafu(display("failed to convert spoke into hub in {scenario} iteration {iteration} (seed {seed})"))]
    ConvertToHub {
        source: BoxError,
        scenario: Scenario,
        iteration: usize,
        seed: u64,
    },

    #[snafu(display("failed to convert hub into spoke in {scenario} iteration {iteration} (seed {seed})"))]
    ConvertFromHub {
        source: BoxError,
        scenario: Scenario,
        iteration: usize,
        seed: u64,
    },

    #[snafu(display("failed to serialize objects for comparison in {scenario} iteration {iteration}"))]
    SerializeObject {
        source: serde_json::Error,
        scenario: Scenario,
        iteration: usize,
    },

    #[snafu(display(
        "{scenario} round trip is not lossless in iteration {iteration} (seed {seed}):\n{diff}"
    ))]
    NotLossless {
        scenario: Scenario,
        iteration: usize,
        seed: u64,
        diff: String,
    },
}

/// Checks that converting randomized objects between a hub `H` and a spoke
/// `S` doesn't lose any information.
///
/// Every iteration clones one of the prototypes, fuzzes it, converts it to the
/// other version and back and compares the result with the fuzzed object using
/// [`SemanticEquality`]. The prototypes provide everything the fuzzer doesn't
/// touch, usually `apiVersion` and `kind`.
///
/// ```ignore
/// RoundTripTest::new(v1beta1::Cluster::default(), v1alpha4::Cluster::default())
///     .with_spoke_fn(|spoke, _| spoke.status = None)
///     .run();
/// ```
pub struct RoundTripTest<H, S> {
    hub: H,
    spoke: S,
    iterations: usize,
    seed: Option<u64>,
    equality: SemanticEquality,
    hub_fns: Vec<FuzzFn<H>>,
    spoke_fns: Vec<FuzzFn<S>>,
}

impl<H, S> RoundTripTest<H, S>
where
    H: Hub + Fuzz + Clone + Serialize,
    S: Convertible<H> + Fuzz + Resource + Clone + Serialize,
{
    pub fn new(hub: H, spoke: S) -> Self {
        Self {
            hub,
            spoke,
            iterations: DEFAULT_ITERATIONS,
            seed: None,
            equality: SemanticEquality::default(),
            hub_fns: Vec::new(),
            spoke_fns: Vec::new(),
        }
    }

    /// Sets the number of fuzzed objects checked per scenario.
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Uses a fixed seed instead of a random one, to reproduce a failure.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Treats an empty map at `path` like a missing one when comparing, see
    /// [`SemanticEquality::with_map_path`].
    pub fn with_map_path(mut self, path: impl AsRef<str>) -> Self {
        self.equality = self.equality.with_map_path(path);
        self
    }

    /// Adds a customization which runs after every fuzzed hub has been filled.
    ///
    /// Customizations are applied in the order they were added. They are
    /// typically used to clear fields which are expected to be lossy.
    pub fn with_hub_fn(mut self, hub_fn: impl Fn(&mut H, &mut Fuzzer) + 'static) -> Self {
        self.hub_fns.push(Box::new(hub_fn));
        self
    }

    /// Adds a customization which runs after every fuzzed spoke has been
    /// filled, see [`Self::with_hub_fn`].
    pub fn with_spoke_fn(mut self, spoke_fn: impl Fn(&mut S, &mut Fuzzer) + 'static) -> Self {
        self.spoke_fns.push(Box::new(spoke_fn));
        self
    }

    /// Adds several hub customizations at once, see [`Self::with_hub_fn`].
    pub fn with_hub_fns(mut self, hub_fns: impl IntoIterator<Item = FuzzFn<H>>) -> Self {
        self.hub_fns.extend(hub_fns);
        self
    }

    /// Adds several spoke customizations at once, see [`Self::with_hub_fn`].
    pub fn with_spoke_fns(mut self, spoke_fns: impl IntoIterator<Item = FuzzFn<S>>) -> Self {
        self.spoke_fns.extend(spoke_fns);
        self
    }

    /// Converts fuzzed spokes to the hub and back.
    ///
    /// The [`DATA_ANNOTATION`](crate::DATA_ANNOTATION) is removed from the
    /// converted spoke before comparing, as converting from the hub is
    /// expected to add it.
    pub fn check_spoke_hub_spoke(&self) -> Result<(), RoundTripError> {
        let scenario = Scenario::SpokeHubSpoke;
        let mut fuzzer = self.fuzzer(scenario);
        let seed = fuzzer.seed();

        for iteration in 0..self.iterations {
            let mut spoke_before = self.spoke.clone();
            fuzzer.fuzz(&mut spoke_before);
            for spoke_fn in &self.spoke_fns {
                spoke_fn(&mut spoke_before, &mut fuzzer);
            }

            let mut hub = self.hub.clone();
            ConvertTo::convert_to(&spoke_before, &mut hub)
                .map_err(BoxError::from)
                .context(ConvertToHubSnafu { scenario, iteration, seed })?;

            let mut spoke_after = self.spoke.clone();
            ConvertFrom::convert_from(&mut spoke_after, &hub)
                .map_err(BoxError::from)
                .context(ConvertFromHubSnafu { scenario, iteration, seed })?;
            remove_data_annotation(&mut spoke_after);

            self.compare(&spoke_before, &spoke_after, scenario, iteration, seed)?;
        }

        Ok(())
    }

    /// Converts fuzzed hubs to the spoke and back.
    ///
    /// Nothing is removed from the converted hub, so all data the spoke can't
    /// represent must be restored by its [`ConvertTo`] implementation.
    pub fn check_hub_spoke_hub(&self) -> Result<(), RoundTripError> {
        let scenario = Scenario::HubSpokeHub;
        let mut fuzzer = self.fuzzer(scenario);
        let seed = fuzzer.seed();

        for iteration in 0..self.iterations {
            let mut hub_before = self.hub.clone();
            fuzzer.fuzz(&mut hub_before);
            for hub_fn in &self.hub_fns {
                hub_fn(&mut hub_before, &mut fuzzer);
            }

            let mut spoke = self.spoke.clone();
            ConvertFrom::convert_from(&mut spoke, &hub_before)
                .map_err(BoxError::from)
                .context(ConvertFromHubSnafu { scenario, iteration, seed })?;

            let mut hub_after = self.hub.clone();
            ConvertTo::convert_to(&spoke, &mut hub_after)
                .map_err(BoxError::from)
                .context(ConvertToHubSnafu { scenario, iteration, seed })?;

            self.compare(&hub_before, &hub_after, scenario, iteration, seed)?;
        }

        Ok(())
    }

    /// Runs both scenarios, panicking on the first failure.
    #[allow(clippy::panic)]
    pub fn run(&self) {
        if let Err(err) = self
            .check_spoke_hub_spoke()
            .and_then(|()| self.check_hub_spoke_hub())
        {
            panic!("{}", snafu::Report::from_error(err));
        }
    }

    fn fuzzer(&self, scenario: Scenario) -> Fuzzer {
        let fuzzer = self.seed.map_or_else(Fuzzer::new, Fuzzer::with_seed);
        tracing::info!(
            %scenario,
            seed = fuzzer.seed(),
            iterations = self.iterations,
            "running conversion round trips"
        );

        fuzzer
    }

    fn compare<T: Serialize>(
        &self,
        before: &T,
        after: &T,
        scenario: Scenario,
        iteration: usize,
        seed: u64,
    ) -> Result<(), RoundTripError> {
        let diff = self
            .equality
            .diff(before, after)
            .context(SerializeObjectSnafu { scenario, iteration })?;

        match diff {
            Some(diff) => NotLosslessSnafu {
                scenario,
                iteration,
                seed,
                diff,
            }
            .fail(),
            None => Ok(()),
        }
    }
}

/// Returns a test function checking both round trip scenarios between `hub`
/// and `spoke`.
///
/// The customizations are applied to every fuzzed hub and spoke respectively.
/// Use [`RoundTripTest`] directly to change the number of iterations, the seed
/// or the map paths.
///
/// ```ignore
/// #[test]
/// fn cluster_conversion() {
///     fuzz_test(
///         v1beta1::Cluster::default(),
///         v1alpha4::Cluster::default(),
///         Vec::new(),
///         vec![Box::new(|cluster, _| cluster.status = None)],
///     )();
/// }
/// ```
pub fn fuzz_test<H, S>(
    hub: H,
    spoke: S,
    hub_fns: impl IntoIterator<Item = FuzzFn<H>>,
    spoke_fns: impl IntoIterator<Item = FuzzFn<S>>,
) -> impl FnOnce()
where
    H: Hub + Fuzz + Clone + Serialize,
    S: Convertible<H> + Fuzz + Resource + Clone + Serialize,
{
    let test = RoundTripTest::new(hub, spoke)
        .with_hub_fns(hub_fns)
        .with_spoke_fns(spoke_fns);

    move || test.run()
}
