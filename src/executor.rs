//! C7: the executor.
//!
//! Walks a resolved [`PlanNode`] tree, fetching or recursively synthesising
//! each source into a scoped temporary, coercing it to the rule's declared
//! `(dtype, unit)`, and invoking the kernel. Never mutates the caller's
//! product; `add_derived` is the only entry point that writes back.

use error_stack::ResultExt;

use crate::config::HarpOptionsHandle;
use crate::dims::{DataType, DimensionKind};
use crate::error::{HarpError, HarpResult};
use crate::planner::{self, PlanNode};
use crate::product::Product;
use crate::registry::{ConversionRegistry, DimsvarKey};
use crate::units::{BuiltinUnitTable, UnitCoercionService};
use crate::variable::Variable;

/// Derive `name` with dim signature `dims` (and, for an independent axis,
/// `independent_length`) from `product`, optionally coercing the result to
/// `dtype`/`unit` if the caller needs something other than what the chosen
/// rule (or the variable already on the product) naturally produces.
///
/// Every failure along the way is reported against `name`, so a caller
/// debugging a deep rule chain sees which variable it was trying to get in
/// the first place, not just which source two levels down came up short.
#[tracing::instrument(skip(product, registry, options), fields(variable = name, plan_depth = tracing::field::Empty))]
pub fn derive(
    product: &Product,
    registry: &ConversionRegistry,
    options: &HarpOptionsHandle,
    name: &str,
    dims: Vec<DimensionKind>,
    independent_length: Option<usize>,
    dtype: Option<DataType>,
    unit: Option<&str>,
) -> HarpResult<Variable> {
    // 1. already present: clone and coerce.
    if let Some(existing) = product.get_variable_by_name(name) {
        if existing.has_dimension_signature(&dims, independent_length) {
            let mut v = existing.copy();
            coerce(&mut v, dtype, unit).attach_printable_lazy(|| format!("while coercing existing variable '{name}'"))?;
            return Ok(v);
        }
    }

    let key = DimsvarKey::new(name, dims).attach_printable_lazy(|| format!("while deriving '{name}'"))?;
    let plan_tree = planner::plan(product, registry, options, &key, independent_length)
        .attach_printable_lazy(|| format!("while planning a derivation for '{}'", key.printed()))?;
    tracing::Span::current().record("plan_depth", plan_depth(&plan_tree));
    let mut v = execute_plan(product, registry, options, &plan_tree)
        .attach_printable_lazy(|| format!("while executing the derivation plan for '{}'", key.printed()))?;
    coerce(&mut v, dtype, unit).attach_printable_lazy(|| format!("while coercing the derived result for '{}'", key.printed()))?;
    Ok(v)
}

fn plan_depth(node: &PlanNode) -> usize {
    match node {
        PlanNode::Existing { .. } => 0,
        PlanNode::Derived { sources, .. } => 1 + sources.iter().map(plan_depth).max().unwrap_or(0),
    }
}

/// If `name` already exists with the exact signature, coerce it in place
/// and return. Otherwise derive it, drop any differently-shaped variable
/// of the same name, and insert the result.
pub fn add_derived(
    product: &mut Product,
    registry: &ConversionRegistry,
    options: &HarpOptionsHandle,
    name: &str,
    dims: Vec<DimensionKind>,
    independent_length: Option<usize>,
    dtype: Option<DataType>,
    unit: Option<&str>,
) -> HarpResult<()> {
    if let Some(existing) = product.get_variable_by_name(name) {
        if existing.has_dimension_signature(&dims, independent_length) {
            let mut v = existing.copy();
            coerce(&mut v, dtype, unit).attach_printable_lazy(|| format!("while coercing existing variable '{name}'"))?;
            product
                .replace_variable(v)
                .attach_printable_lazy(|| format!("while replacing existing variable '{name}'"))?;
            return Ok(());
        }
    }

    let derived = derive(product, registry, options, name, dims, independent_length, dtype, unit)?;
    if product.has_variable(name) {
        product
            .remove_by_name(name)
            .attach_printable_lazy(|| format!("while dropping the old shape of '{name}' before replacing it"))?;
    }
    product
        .add_variable(derived)
        .attach_printable_lazy(|| format!("while inserting the derived result for '{name}'"))
}

fn execute_plan(
    product: &Product,
    registry: &ConversionRegistry,
    options: &HarpOptionsHandle,
    node: &PlanNode,
) -> Result<Variable, HarpError> {
    match node {
        PlanNode::Existing { key, .. } => product
            .get_variable_by_name(&key.name)
            .map(Variable::copy)
            .ok_or_else(|| HarpError::variable_not_found(&key.name, &key.dims)),
        PlanNode::Derived { key, independent_length, rule, sources } => {
            // Source materialisation proceeds left-to-right in declared order.
            let mut prepared_sources = Vec::with_capacity(sources.len());
            for (slot, source_plan) in rule.sources.iter().zip(sources.iter()) {
                // Consult the product directly first, per the documented contract,
                // rather than always re-deriving what execute_plan's own
                // `Existing` branch would also return.
                let mut source_var = if let Some(existing) = product.get_variable_by_name(&slot.name) {
                    if existing.has_dimension_signature(&slot.dims, slot.independent_length) {
                        existing.copy()
                    } else {
                        execute_plan(product, registry, options, source_plan)?
                    }
                } else {
                    execute_plan(product, registry, options, source_plan)?
                };
                coerce(&mut source_var, Some(slot.dtype), slot.unit.as_deref())?;
                prepared_sources.push(source_var);
            }

            let mut target = allocate_target(product, key, *independent_length, rule.target_dtype)?;
            (rule.kernel)(&mut target, &prepared_sources)?;
            if let Some(unit) = &rule.target_unit {
                target.set_unit(Some(unit.clone()))?;
            }
            Ok(target)
        }
    }
}

/// Build the zeroed target variable the kernel will fill, with lengths
/// drawn from the product's named dimensions (a `time` dimension of
/// length 0 is treated as 1) and the requested independent length.
fn allocate_target(
    product: &Product,
    key: &DimsvarKey,
    independent_length: Option<usize>,
    dtype: DataType,
) -> Result<Variable, HarpError> {
    let mut lengths = Vec::with_capacity(key.dims.len());
    for kind in &key.dims {
        let len = match kind {
            DimensionKind::Independent => independent_length.ok_or_else(|| {
                HarpError::invalid_argument(format!(
                    "cannot allocate target '{}': independent axis length is unknown",
                    key.name
                ))
            })?,
            DimensionKind::Time => {
                let len = product.dimension_length(DimensionKind::Time);
                if len == 0 {
                    1
                } else {
                    len
                }
            }
            other => {
                let len = product.dimension_length(*other);
                if len == 0 {
                    return Err(HarpError::invalid_argument(format!(
                        "cannot allocate target '{}': product does not depend on dimension '{other}'",
                        key.name
                    )));
                }
                len
            }
        };
        lengths.push(len);
    }
    Variable::new(key.name.clone(), dtype, key.dims.clone(), lengths)
}

fn coerce(v: &mut Variable, dtype: Option<DataType>, unit: Option<&str>) -> Result<(), HarpError> {
    let svc = BuiltinUnitTable;
    if let Some(unit) = unit {
        if v.unit.as_deref() != Some(unit) {
            svc.convert_unit(v, unit)?;
        }
    }
    if let Some(dtype) = dtype {
        if v.dtype() != dtype {
            svc.convert_type(v, dtype)?;
        }
    }
    Ok(())
}
