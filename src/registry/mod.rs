//! C5: the conversion registry.
//!
//! Stores conversion rules indexed by the canonical dimsvar key of their
//! target. Each rule carries an ordered list of source slots, an optional
//! gating predicate, an optional human description, and a kernel closure
//! that fills the target buffer from the (already coerced) sources.

pub mod catalogue;
pub mod kernels;

use std::fmt::Write as _;

use indexmap::IndexMap;

use crate::config::HarpOptionsHandle;
use crate::dims::{DataType, DimensionKind, MAX_DIMS};
use crate::error::HarpError;
use crate::variable::Variable;

/// The canonical `(dim-signature, name)` identifier used to index the
/// registry and the planner's visited map: a fixed-width tag of dimension
/// codes followed by the variable name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DimsvarKey {
    pub name: String,
    pub dims: Vec<DimensionKind>,
}

impl DimsvarKey {
    pub fn new(name: impl Into<String>, dims: Vec<DimensionKind>) -> Result<Self, HarpError> {
        let name = name.into();
        if dims.len() > MAX_DIMS {
            return Err(HarpError::invalid_argument(format!(
                "dimsvar key for '{name}' has {} dims, exceeds MAX_DIMS={MAX_DIMS}",
                dims.len()
            )));
        }
        Ok(Self { name, dims })
    }

    /// Canonical tag: `MAX_DIMS` code characters (padded with spaces) then
    /// the variable name, matching the external dimsvar_name format.
    pub fn tag(&self) -> String {
        let mut s = String::with_capacity(MAX_DIMS + self.name.len());
        for d in &self.dims {
            s.push(d.code());
        }
        for _ in self.dims.len()..MAX_DIMS {
            s.push(' ');
        }
        s.push_str(&self.name);
        s
    }

    pub fn printed(&self) -> String {
        let dims_str = self
            .dims
            .iter()
            .map(|d| d.printed_name())
            .collect::<Vec<_>>()
            .join(",");
        format!("{} {{{dims_str}}}", self.name)
    }
}

/// One positional source a rule needs, independently coerced to its declared
/// type and unit before the kernel is invoked.
#[derive(Clone)]
pub struct SourceSlot {
    pub name: String,
    pub dims: Vec<DimensionKind>,
    pub dtype: DataType,
    pub unit: Option<String>,
    /// `None` = any independent-axis length accepted; `Some(n)` = must match exactly.
    pub independent_length: Option<usize>,
}

impl SourceSlot {
    pub fn new(name: impl Into<String>, dims: Vec<DimensionKind>, dtype: DataType, unit: Option<&str>) -> Self {
        Self {
            name: name.into(),
            dims,
            dtype,
            unit: unit.map(str::to_string),
            independent_length: None,
        }
    }

    pub fn with_independent_length(mut self, len: usize) -> Self {
        self.independent_length = Some(len);
        self
    }

    pub fn key(&self) -> DimsvarKey {
        DimsvarKey::new(self.name.clone(), self.dims.clone()).expect("validated at registration time")
    }
}

/// A pure function that fills `target`'s buffer from the already-coerced
/// `sources`, in the rule's declared source order. Must tolerate being
/// called with a zero-length target.
pub type Kernel = std::sync::Arc<dyn Fn(&mut Variable, &[Variable]) -> Result<(), HarpError> + Send + Sync>;

/// A gating predicate consulted against process-wide options.
pub type EnabledPredicate = std::sync::Arc<dyn Fn(&HarpOptionsHandle) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Rule {
    pub target_name: String,
    pub target_dtype: DataType,
    pub target_unit: Option<String>,
    pub target_dims: Vec<DimensionKind>,
    pub target_independent_length: Option<usize>,
    pub sources: Vec<SourceSlot>,
    pub description: Option<String>,
    pub enabled: Option<EnabledPredicate>,
    pub kernel: Kernel,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("target_name", &self.target_name)
            .field("target_dims", &self.target_dims)
            .field("sources", &self.sources.len())
            .field("description", &self.description)
            .finish()
    }
}

impl Rule {
    pub fn target_key(&self) -> DimsvarKey {
        DimsvarKey::new(self.target_name.clone(), self.target_dims.clone())
            .expect("validated at registration time")
    }

    pub fn is_enabled(&self, options: &HarpOptionsHandle) -> bool {
        self.enabled.as_ref().map(|p| p(options)).unwrap_or(true)
    }
}

/// A builder for one rule; returned by [`ConversionRegistry::register`] so
/// callers can attach source slots and metadata before the rule is sealed.
pub struct RuleBuilder {
    rule: Rule,
}

impl RuleBuilder {
    pub fn add_source(mut self, source: SourceSlot) -> Self {
        self.rule.sources.push(source);
        self
    }

    pub fn set_description(mut self, text: impl Into<String>) -> Self {
        self.rule.description = Some(text.into());
        self
    }

    pub fn set_enabled(mut self, predicate: EnabledPredicate) -> Self {
        self.rule.enabled = Some(predicate);
        self
    }

    pub fn build(self) -> Rule {
        self.rule
    }
}

/// Table keyed by dimsvar tag, whose value is a non-empty ordered list of
/// rules producing that key.
#[derive(Default)]
pub struct ConversionRegistry {
    rules_by_key: IndexMap<String, Vec<Rule>>,
}

impl ConversionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin registering a rule for `target_name`/`target_dims`; chain
    /// `.add_source(..)` calls on the returned builder, then call
    /// [`Self::insert`] with the built rule.
    pub fn builder(
        target_name: impl Into<String>,
        target_dtype: DataType,
        target_unit: Option<&str>,
        target_dims: Vec<DimensionKind>,
        target_independent_length: Option<usize>,
        kernel: Kernel,
    ) -> RuleBuilder {
        RuleBuilder {
            rule: Rule {
                target_name: target_name.into(),
                target_dtype,
                target_unit: target_unit.map(str::to_string),
                target_dims,
                target_independent_length,
                sources: Vec::new(),
                description: None,
                enabled: None,
                kernel,
            },
        }
    }

    pub fn insert(&mut self, rule: Rule) {
        let key = rule.target_key().tag();
        self.rules_by_key.entry(key).or_default().push(rule);
    }

    pub fn lookup(&self, key: &DimsvarKey) -> Option<&[Rule]> {
        self.rules_by_key.get(&key.tag()).map(Vec::as_slice)
    }

    pub fn iterate(&self) -> impl Iterator<Item = (&str, &Rule)> {
        self.rules_by_key
            .iter()
            .flat_map(|(k, rules)| rules.iter().map(move |r| (k.as_str(), r)))
    }

    /// After bulk registration, sort rules within each key group (stable,
    /// deterministic) and re-sort the key groups themselves by
    /// `(variable_name, dimsvar_key)` for deterministic documentation export.
    pub fn sort(&mut self) {
        self.rules_by_key.sort_by(|k1, _, k2, _| {
            let name1 = &k1[MAX_DIMS..];
            let name2 = &k2[MAX_DIMS..];
            name1.cmp(name2).then_with(|| k1.cmp(k2))
        });
    }

    pub fn num_keys(&self) -> usize {
        self.rules_by_key.len()
    }
}

/// Render the source-slot signature the way the documentation routine does:
/// `name {dims} [unit] (dtype)`.
pub fn format_source_slot(slot: &SourceSlot) -> String {
    let mut out = String::new();
    let dims_str = slot
        .dims
        .iter()
        .map(|d| d.printed_name())
        .collect::<Vec<_>>()
        .join(",");
    let unit_str = slot.unit.as_deref().unwrap_or("");
    let _ = write!(out, "{} {{{dims_str}}} [{unit_str}] ({})", slot.name, slot.dtype);
    out
}
