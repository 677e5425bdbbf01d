use std::{collections::BTreeMap, ops::RangeInclusive};

use k8s_openapi::{
    apimachinery::pkg::apis::meta::v1::{
        FieldsV1, ManagedFieldsEntry, ObjectMeta, OwnerReference, Time,
    },
    jiff::Timestamp,
};
use rand::{Rng, SeedableRng, distr::Alphanumeric, rngs::StdRng};

/// The latest point in time generated for timestamps, 2100-01-01T00:00:00Z.
const MAX_TIMESTAMP_SECONDS: i64 = 4_102_444_800;

/// A customization applied to a fuzzed value of type `T` after it has been
/// filled by its [`Fuzz`] implementation.
pub type FuzzFn<T> = Box<dyn Fn(&mut T, &mut Fuzzer)>;

/// Fills values with random content.
///
/// The fuzzer is seeded once and then drives every [`Fuzz`] implementation
/// with the same random source. Use [`Fuzzer::with_seed`] to reproduce a run.
#[derive(Debug)]
pub struct Fuzzer {
    rng: StdRng,
    seed: u64,
    nil_chance: f64,
    elements: RangeInclusive<usize>,
    string_length: RangeInclusive<usize>,
}

impl Default for Fuzzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Fuzzer {
    /// Creates a fuzzer with a random seed.
    pub fn new() -> Self {
        let seed = rand::random();
        tracing::debug!(seed, "seeding fuzzer");

        Self::with_seed(seed)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
            nil_chance: 0.2,
            elements: 1..=10,
            string_length: 0..=20,
        }
    }

    /// The probability of optional values and collections to stay empty.
    ///
    /// The chance is clamped to `0.0..=1.0`, NaN is treated as `0.0`.
    pub fn nil_chance(mut self, nil_chance: f64) -> Self {
        self.nil_chance = if nil_chance.is_nan() {
            0.0
        } else {
            nil_chance.clamp(0.0, 1.0)
        };
        self
    }

    /// The number of elements generated for non-empty collections.
    ///
    /// Reversed bounds are swapped.
    pub fn num_elements(mut self, elements: RangeInclusive<usize>) -> Self {
        self.elements = ordered(elements);
        self
    }

    /// The length of generated strings.
    ///
    /// Reversed bounds are swapped.
    pub fn string_length(mut self, string_length: RangeInclusive<usize>) -> Self {
        self.string_length = ordered(string_length);
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Fills `value` with random content.
    pub fn fuzz<T: Fuzz + ?Sized>(&mut self, value: &mut T) {
        value.fuzz(self);
    }

    /// Returns a freshly fuzzed `T`.
    pub fn generate<T: Fuzz + Default>(&mut self) -> T {
        let mut value = T::default();
        self.fuzz(&mut value);
        value
    }

    /// Rolls whether an optional value or a collection should stay empty.
    pub fn should_be_nil(&mut self) -> bool {
        self.rng.random_bool(self.nil_chance)
    }

    /// Rolls the number of elements of a collection.
    pub fn element_count(&mut self) -> usize {
        if self.should_be_nil() {
            return 0;
        }

        self.rng.random_range(self.elements.clone())
    }

    /// Returns a random alphanumeric string.
    pub fn string(&mut self) -> String {
        let length = self.rng.random_range(self.string_length.clone());

        (&mut self.rng)
            .sample_iter(Alphanumeric)
            .take(length)
            .map(char::from)
            .collect()
    }

    /// Returns a random point in time between 1970 and 2100, truncated to
    /// seconds as the API server stores timestamps with second precision.
    pub fn time(&mut self) -> Time {
        let seconds = self.rng.random_range(0..=MAX_TIMESTAMP_SECONDS);
        Time(Timestamp::from_second(seconds).unwrap_or(Timestamp::UNIX_EPOCH))
    }

    /// Returns a random non-empty DNS label, suitable for names and label
    /// values.
    pub fn dns_label(&mut self) -> String {
        let length = self.rng.random_range(1..=20);

        (0..length)
            .map(|_| char::from(self.rng.random_range(b'a'..=b'z')))
            .collect()
    }
}

fn ordered(range: RangeInclusive<usize>) -> RangeInclusive<usize> {
    let (start, end) = range.into_inner();
    start.min(end)..=start.max(end)
}

/// Types which can be filled with random content by a [`Fuzzer`].
///
/// Implementations for custom resources usually fuzz their `metadata`, `spec`
/// and `status` and leave `apiVersion` and `kind` untouched:
///
/// ```
/// use crd_conversion::testing::{Fuzz, Fuzzer};
///
/// #[derive(Default)]
/// struct ClusterSpec {
///     replicas: i32,
///     paused: Option<bool>,
/// }
///
/// impl Fuzz for ClusterSpec {
///     fn fuzz(&mut self, fuzzer: &mut Fuzzer) {
///         self.replicas.fuzz(fuzzer);
///         self.paused.fuzz(fuzzer);
///     }
/// }
///
/// let spec: ClusterSpec = Fuzzer::with_seed(42).generate();
/// ```
pub trait Fuzz {
    fn fuzz(&mut self, fuzzer: &mut Fuzzer);
}

macro_rules! impl_fuzz_for_primitives {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Fuzz for $ty {
                fn fuzz(&mut self, fuzzer: &mut Fuzzer) {
                    *self = fuzzer.rng().random();
                }
            }
        )*
    };
}

impl_fuzz_for_primitives!(bool, u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl Fuzz for String {
    fn fuzz(&mut self, fuzzer: &mut Fuzzer) {
        *self = fuzzer.string();
    }
}

impl<T: Fuzz + Default> Fuzz for Option<T> {
    fn fuzz(&mut self, fuzzer: &mut Fuzzer) {
        *self = if fuzzer.should_be_nil() {
            None
        } else {
            Some(fuzzer.generate())
        };
    }
}

impl<T: Fuzz + ?Sized> Fuzz for Box<T> {
    fn fuzz(&mut self, fuzzer: &mut Fuzzer) {
        self.as_mut().fuzz(fuzzer);
    }
}

impl<T: Fuzz + Default> Fuzz for Vec<T> {
    fn fuzz(&mut self, fuzzer: &mut Fuzzer) {
        let count = fuzzer.element_count();
        *self = (0..count).map(|_| fuzzer.generate()).collect();
    }
}

impl<T: Fuzz + Default> Fuzz for BTreeMap<String, T> {
    fn fuzz(&mut self, fuzzer: &mut Fuzzer) {
        let count = fuzzer.element_count();
        *self = (0..count)
            .map(|_| (fuzzer.string(), fuzzer.generate()))
            .collect();
    }
}

impl Fuzz for Time {
    fn fuzz(&mut self, fuzzer: &mut Fuzzer) {
        *self = fuzzer.time();
    }
}

/// Fills every field of the metadata, as all of them have to be carried over
/// by conversions.
impl Fuzz for ObjectMeta {
    fn fuzz(&mut self, fuzzer: &mut Fuzzer) {
        self.name = Some(fuzzer.dns_label());
        self.namespace = Some(fuzzer.dns_label());
        self.generate_name = (!fuzzer.should_be_nil()).then(|| fuzzer.dns_label());
        self.uid = Some(fuzzer.string());
        self.resource_version = Some(fuzzer.rng().random::<u64>().to_string());
        self.generation = Some(fuzzer.rng().random_range(0..=i64::MAX));
        self.creation_timestamp = Some(fuzzer.time());
        self.deletion_timestamp = (!fuzzer.should_be_nil()).then(|| fuzzer.time());
        self.deletion_grace_period_seconds = (!fuzzer.should_be_nil())
            .then(|| fuzzer.rng().random_range(0..=i64::from(u32::MAX)));
        self.labels = fuzz_string_map(fuzzer);
        self.annotations = fuzz_string_map(fuzzer);
        self.finalizers = (!fuzzer.should_be_nil()).then(|| {
            let count = fuzzer.element_count();
            (0..count).map(|_| fuzzer.dns_label()).collect()
        });
        self.owner_references.fuzz(fuzzer);
        self.managed_fields.fuzz(fuzzer);
    }
}

impl Fuzz for OwnerReference {
    fn fuzz(&mut self, fuzzer: &mut Fuzzer) {
        self.api_version = format!("{group}/v1", group = fuzzer.dns_label());
        self.kind = fuzzer.string();
        self.name = fuzzer.dns_label();
        self.uid = fuzzer.string();
        self.controller.fuzz(fuzzer);
        self.block_owner_deletion.fuzz(fuzzer);
    }
}

impl Fuzz for ManagedFieldsEntry {
    fn fuzz(&mut self, fuzzer: &mut Fuzzer) {
        self.api_version.fuzz(fuzzer);
        self.fields_type = Some("FieldsV1".to_owned());
        self.fields_v1 = (!fuzzer.should_be_nil()).then(|| {
            let count = fuzzer.element_count();
            let fields = (0..count)
                .map(|_| {
                    let field = format!("f:{field}", field = fuzzer.dns_label());
                    (field, serde_json::Value::Object(Default::default()))
                })
                .collect();
            FieldsV1(serde_json::Value::Object(fields))
        });
        self.manager.fuzz(fuzzer);
        self.operation = Some(if fuzzer.rng().random_bool(0.5) {
            "Apply".to_owned()
        } else {
            "Update".to_owned()
        });
        self.subresource.fuzz(fuzzer);
        self.time = (!fuzzer.should_be_nil()).then(|| fuzzer.time());
    }
}

fn fuzz_string_map(fuzzer: &mut Fuzzer) -> Option<BTreeMap<String, String>> {
    if fuzzer.should_be_nil() {
        return None;
    }

    let count = fuzzer.element_count();
    Some(
        (0..count)
            .map(|_| (fuzzer.dns_label(), fuzzer.string()))
            .collect(),
    )
}
