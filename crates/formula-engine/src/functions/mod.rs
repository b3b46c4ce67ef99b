//! Built-in functions.
//!
//! Every function registers a [`FunctionSpec`] through `inventory`; the parser resolves
//! names with [`lookup_function`] and checks arity against the spec. How a call is
//! evaluated depends on its [`FunctionKind`]:
//! - aggregators fold every value of every argument, walking multi-cell direct arguments
//!   offset by offset
//! - `IF`/`CHOOSE` evaluate the selector, then suppress the arguments not selected
//! - element-wise functions map scalar arguments to one scalar per result offset
//! - `ROW`/`COLUMN` report where their argument points; `TRANSPOSE` mirrors the offset

use std::sync::OnceLock;

use ahash::AHashMap;
use formula_model::{Axis, Scalar};

pub mod aggregate;
pub(crate) mod branch;
pub mod elementwise;
pub mod operators;
pub(crate) mod position;

pub use aggregate::{AggregateKind, Aggregator};

/// Upper bound for variadic functions.
pub const VAR_ARGS: usize = 255;

/// Element-wise implementation: receives one scalar per argument.
pub type ElementwiseFn = fn(&[Scalar]) -> Scalar;

#[derive(Clone, Copy, Debug)]
pub enum FunctionKind {
    Aggregate(AggregateKind),
    If,
    Choose,
    Elementwise(ElementwiseFn),
    /// `ROW` or `COLUMN`.
    Position(Axis),
    Transpose,
}

#[derive(Clone, Copy, Debug)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub kind: FunctionKind,
}

impl FunctionSpec {
    pub fn accepts(&self, arg_count: usize) -> bool {
        (self.min_args..=self.max_args).contains(&arg_count)
    }
}

inventory::collect!(FunctionSpec);

inventory::submit! {
    FunctionSpec {
        name: "IF",
        min_args: 2,
        max_args: 3,
        kind: FunctionKind::If,
    }
}

inventory::submit! {
    FunctionSpec {
        name: "CHOOSE",
        min_args: 2,
        max_args: VAR_ARGS,
        kind: FunctionKind::Choose,
    }
}

/// Iterate all registered [`FunctionSpec`]s.
pub fn iter_function_specs() -> impl Iterator<Item = &'static FunctionSpec> {
    inventory::iter::<FunctionSpec>.into_iter()
}

fn registry() -> &'static AHashMap<String, &'static FunctionSpec> {
    static REGISTRY: OnceLock<AHashMap<String, &'static FunctionSpec>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = AHashMap::new();
        for spec in inventory::iter::<FunctionSpec> {
            map.insert(spec.name.to_ascii_uppercase(), spec);
        }
        map
    })
}

/// Case-insensitive lookup of a built-in.
pub fn lookup_function(name: &str) -> Option<&'static FunctionSpec> {
    registry().get(&name.to_ascii_uppercase()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let spec = lookup_function("sum").expect("SUM is registered");
        assert_eq!(spec.name, "SUM");
        assert!(matches!(spec.kind, FunctionKind::Aggregate(AggregateKind::Sum)));
        assert!(lookup_function("NOPE").is_none());
    }

    #[test]
    fn every_builtin_is_registered_once() {
        let mut names: Vec<_> = iter_function_specs().map(|s| s.name).collect();
        names.sort_unstable();
        let total = names.len();
        names.dedup();
        assert_eq!(names.len(), total);
        for name in [
            "SUM", "AVERAGE", "COUNT", "COUNTA", "MIN", "MAX", "AND", "OR", "XOR", "CONCAT",
            "IF", "CHOOSE", "NOT", "ABS", "INT", "MOD", "ROUND", "SIGN", "LEN", "UPPER",
            "LOWER", "TRIM", "ISBLANK", "ISERROR", "ISNUMBER", "ISTEXT", "ISLOGICAL",
            "CONCATENATE", "ROW", "COLUMN", "TRANSPOSE",
        ] {
            assert!(names.contains(&name), "{name} missing");
        }
    }

    #[test]
    fn arity_bounds() {
        let spec = lookup_function("IF").expect("IF");
        assert!(!spec.accepts(1));
        assert!(spec.accepts(2));
        assert!(spec.accepts(3));
        assert!(!spec.accepts(4));
    }
}
