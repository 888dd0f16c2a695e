//! Transfer function registry for sensor inputs
//!
//! Every configured input names a transfer function that turns the measured
//! value into an engineering value, together with a set of named numeric
//! parameters. This module holds the static table those names are resolved
//! against.
//!
//! ## Builtin Functions
//!
//! - `identity` - Returns the measured value unchanged
//! - `linear` - `a * value + b` (a = 1, b = 0)
//! - `quadratic` - `a * value^2 + b * value + c`
//! - `exponential` - `a * exp(b * value) + c` (a = 1)
//! - `map_range` - Remap `[in_min, in_max]` onto `[out_min, out_max]`
//! - `clamp` - Limit the value to `[min, max]`
//! - `voltage_divider` - ADC counts to volts using `v_ref` and `resolution`
//! - `threshold` - `high` when value >= `level`, otherwise `low`
//!
//! Parameters that are not supplied fall back to the defaults listed above,
//! or to `0.0` when no default is listed.
//!
//! ## Example
//!
//! ```
//! use hand_reconfig::functions::{FunctionParams, FunctionRegistry};
//!
//! let linear = FunctionRegistry::builtin().resolve("linear").unwrap();
//! let params: FunctionParams = [("a".to_string(), 2.0), ("b".to_string(), 1.0)]
//!     .into_iter()
//!     .collect();
//! assert_eq!(linear.apply(3.0, &params), 7.0);
//! ```

mod builtins;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

/// Signature shared by all transfer functions
pub type TransferFn = fn(f64, &FunctionParams) -> f64;

static BUILTIN_REGISTRY: LazyLock<FunctionRegistry> =
    LazyLock::new(|| FunctionRegistry::builder().with_builtins().build());

/// Named numeric parameters handed to a transfer function
///
/// Inserting a name that already exists overwrites the previous value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionParams(BTreeMap<String, f64>);

impl FunctionParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter, returning the value it replaced
    pub fn insert(&mut self, name: impl Into<String>, value: f64) -> Option<f64> {
        self.0.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Get a parameter or the supplied default
    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, f64)> for FunctionParams {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

/// A resolved handle into the registry
#[derive(Clone, Copy)]
pub struct TransferFunction {
    name: &'static str,
    func: TransferFn,
}

impl TransferFunction {
    pub fn new(name: &'static str, func: TransferFn) -> Self {
        Self { name, func }
    }

    /// Registry name of this function
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Evaluate the function for one measured value
    #[inline]
    pub fn apply(&self, value: f64, params: &FunctionParams) -> f64 {
        (self.func)(value, params)
    }
}

impl std::fmt::Debug for TransferFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferFunction")
            .field("name", &self.name)
            .finish()
    }
}

impl PartialEq for TransferFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Read-only mapping from function name to transfer function
///
/// A registry is assembled once through [`FunctionRegistryBuilder`] and never
/// mutated afterwards, so it can be shared between threads freely.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<&'static str, TransferFunction>,
}

impl FunctionRegistry {
    /// The process-wide registry of builtin functions
    pub fn builtin() -> &'static FunctionRegistry {
        &BUILTIN_REGISTRY
    }

    /// Start assembling a custom registry
    pub fn builder() -> FunctionRegistryBuilder {
        FunctionRegistryBuilder::default()
    }

    /// Look up a function by name. `None` means the name is not registered.
    pub fn resolve(&self, name: &str) -> Option<TransferFunction> {
        self.functions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Builder for [`FunctionRegistry`]
#[derive(Debug, Default)]
pub struct FunctionRegistryBuilder {
    functions: HashMap<&'static str, TransferFunction>,
}

impl FunctionRegistryBuilder {
    /// Add every builtin function
    pub fn with_builtins(mut self) -> Self {
        for &(name, func) in builtins::BUILTINS {
            self.functions.insert(name, TransferFunction::new(name, func));
        }
        self
    }

    /// Register a function; a later registration under the same name wins
    pub fn register(mut self, name: &'static str, func: TransferFn) -> Self {
        if self
            .functions
            .insert(name, TransferFunction::new(name, func))
            .is_some()
        {
            tracing::debug!("Transfer function '{}' replaced", name);
        }
        self
    }

    pub fn build(self) -> FunctionRegistry {
        FunctionRegistry {
            functions: self.functions,
        }
    }
}
