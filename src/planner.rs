//! C6: the planner.
//!
//! Recursively searches the registry for the cheapest rule tree that
//! derives a requested `(name, dim signature)`, avoiding cycles and
//! bounding both the remaining budget and the recursion depth. The result
//! is a [`Plan`] tree the executor can walk without touching the registry
//! again.

use std::collections::HashMap;

use crate::config::HarpOptionsHandle;
use crate::product::Product;
use crate::registry::{ConversionRegistry, DimsvarKey, Rule};

/// Per-key cycle-avoidance marker, mirroring the three-state `skip` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    OnStack,
    Unavailable,
}

/// One node of a resolved derivation plan.
#[derive(Debug, Clone)]
pub enum PlanNode {
    /// The target is already present on the product with a compatible signature.
    Existing { key: DimsvarKey, independent_length: Option<usize> },
    /// The target must be derived by applying `rule` to `sources`, in order.
    Derived {
        key: DimsvarKey,
        independent_length: Option<usize>,
        rule: Rule,
        sources: Vec<PlanNode>,
    },
}

impl PlanNode {
    pub fn key(&self) -> &DimsvarKey {
        match self {
            PlanNode::Existing { key, .. } => key,
            PlanNode::Derived { key, .. } => key,
        }
    }
}

/// Outcome of [`find`], mirroring the four-way lattice the planner's
/// recursive search returns at each key.
#[derive(Debug, Clone)]
enum FindOutcome {
    Found { cost: u64, plan: PlanNode },
    Missing,
    Cycle,
    OverBudget,
}

/// Build a plan deriving `key` (with the given requested independent
/// length, if any) against `product`, searching `registry` and gated by
/// `options`. Runs with an unbounded budget, per the documented top-level
/// contract; only `max_planner_depth` bounds the search.
pub fn plan(
    product: &Product,
    registry: &ConversionRegistry,
    options: &HarpOptionsHandle,
    key: &DimsvarKey,
    independent_length: Option<usize>,
) -> Result<PlanNode, crate::error::HarpError> {
    let mut visited = HashMap::new();
    match find(
        product,
        registry,
        options,
        key,
        independent_length,
        f64::INFINITY,
        0,
        options.max_planner_depth,
        &mut visited,
    ) {
        FindOutcome::Found { plan, .. } => Ok(plan),
        _ => Err(crate::error::HarpError::variable_not_found(&key.name, &key.dims)),
    }
}

fn product_has_existing(product: &Product, key: &DimsvarKey, independent_length: Option<usize>) -> bool {
    product
        .get_variable_by_name(&key.name)
        .map(|v| v.has_dimension_signature(&key.dims, independent_length))
        .unwrap_or(false)
}

fn find(
    product: &Product,
    registry: &ConversionRegistry,
    options: &HarpOptionsHandle,
    key: &DimsvarKey,
    independent_length: Option<usize>,
    budget: f64,
    depth: usize,
    max_depth: usize,
    visited: &mut HashMap<String, VisitState>,
) -> FindOutcome {
    // 1. already present on the product.
    if product_has_existing(product, key, independent_length) {
        return FindOutcome::Found {
            cost: 0,
            plan: PlanNode::Existing {
                key: key.clone(),
                independent_length,
            },
        };
    }

    // 2. budget/depth exhaustion.
    if budget < 1.0 || depth == max_depth {
        log::warn!("planner: over-budget at depth {depth} resolving '{}'", key.printed());
        return FindOutcome::OverBudget;
    }

    let tag = key.tag();

    // 3. unknown key: permanently unavailable.
    let Some(candidates) = registry.lookup(key) else {
        log::debug!("planner: no rule registered for '{}'", key.printed());
        visited.insert(tag, VisitState::Unavailable);
        return FindOutcome::Missing;
    };

    // 4. cached cycle/unavailable state.
    match visited.get(&tag) {
        Some(VisitState::OnStack) => return FindOutcome::Cycle,
        Some(VisitState::Unavailable) => return FindOutcome::Missing,
        None => {}
    }

    // 5. mark on-stack for the duration of this key's search.
    visited.insert(tag.clone(), VisitState::OnStack);
    let next_depth = depth + 1;

    let mut best: Option<(u64, Rule, Vec<PlanNode>)> = None;
    let mut saw_cycle = false;
    let mut saw_over_budget = false;

    for rule in candidates {
        if !rule.is_enabled(options) {
            continue;
        }
        if let (Some(requested), Some(offered)) = (independent_length, rule.target_independent_length) {
            if requested != offered {
                continue;
            }
        }

        let mut local_budget = budget - 1.0;
        let mut source_plans = Vec::with_capacity(rule.sources.len());
        let mut rule_ok = true;
        // this rule's own cost, plus the accumulated cost of every source subtree.
        let mut local_cost = 1u64;

        for source in &rule.sources {
            let source_key = source.key();
            match find(
                product,
                registry,
                options,
                &source_key,
                source.independent_length,
                local_budget,
                next_depth,
                max_depth,
                visited,
            ) {
                FindOutcome::Found { cost, plan: source_plan } => {
                    local_cost += cost;
                    local_budget -= cost as f64;
                    source_plans.push(source_plan);
                }
                FindOutcome::Cycle => {
                    saw_cycle = true;
                    rule_ok = false;
                    break;
                }
                FindOutcome::OverBudget => {
                    saw_over_budget = true;
                    rule_ok = false;
                    break;
                }
                FindOutcome::Missing => {
                    rule_ok = false;
                    break;
                }
            }
        }

        if rule_ok {
            let better = match &best {
                None => true,
                Some((best_cost, ..)) => local_cost < *best_cost,
            };
            if better {
                best = Some((local_cost, rule.clone(), source_plans));
            }
        }
    }

    // 7. restore visited state for this key before returning.
    let outcome = match best {
        Some((cost, rule, sources)) => {
            visited.remove(&tag);
            log::debug!(
                "planner: chose rule '{}' for '{}' (cost {cost})",
                rule.description.as_deref().unwrap_or("<unnamed rule>"),
                key.printed()
            );
            FindOutcome::Found {
                cost,
                plan: PlanNode::Derived {
                    key: key.clone(),
                    independent_length,
                    rule,
                    sources,
                },
            }
        }
        None if saw_over_budget => {
            visited.remove(&tag);
            FindOutcome::OverBudget
        }
        None if saw_cycle => {
            visited.remove(&tag);
            FindOutcome::Cycle
        }
        None => {
            visited.insert(tag, VisitState::Unavailable);
            FindOutcome::Missing
        }
    };
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_options_handle;
    use crate::dims::{DataType, DimensionKind};
    use crate::registry::SourceSlot;
    use std::sync::Arc;

    fn noop_kernel() -> crate::registry::Kernel {
        Arc::new(|_t, _s| Ok(()))
    }

    #[test]
    fn finds_existing_variable_at_zero_cost() {
        let mut product = Product::new();
        let mut v = crate::variable::Variable::new("x", DataType::Float64, vec![DimensionKind::Time], vec![2]).unwrap();
        v.set_data(crate::variable::DataBuffer::Float64(vec![1.0, 2.0])).unwrap();
        product.add_variable(v).unwrap();

        let registry = ConversionRegistry::new();
        let options = default_options_handle();
        let key = DimsvarKey::new("x", vec![DimensionKind::Time]).unwrap();
        let result = plan(&product, &registry, &options, &key, None).unwrap();
        assert!(matches!(result, PlanNode::Existing { .. }));
    }

    #[test]
    fn detects_self_referential_cycle_as_missing() {
        // "a" derives from "b", "b" derives from "a": neither is ever satisfiable.
        let mut registry = ConversionRegistry::new();
        let rule_a = ConversionRegistry::builder("a", DataType::Float64, None, vec![DimensionKind::Time], None, noop_kernel())
            .add_source(SourceSlot::new("b", vec![DimensionKind::Time], DataType::Float64, None))
            .build();
        let rule_b = ConversionRegistry::builder("b", DataType::Float64, None, vec![DimensionKind::Time], None, noop_kernel())
            .add_source(SourceSlot::new("a", vec![DimensionKind::Time], DataType::Float64, None))
            .build();
        registry.insert(rule_a);
        registry.insert(rule_b);

        let product = Product::new();
        let options = default_options_handle();
        let key = DimsvarKey::new("a", vec![DimensionKind::Time]).unwrap();
        let result = plan(&product, &registry, &options, &key, None);
        assert!(result.is_err());
    }

    #[test]
    fn picks_earliest_registered_rule_on_cost_tie() {
        let mut registry = ConversionRegistry::new();
        let rule1 = ConversionRegistry::builder("y", DataType::Float64, None, vec![DimensionKind::Time], None, noop_kernel())
            .add_source(SourceSlot::new("x1", vec![DimensionKind::Time], DataType::Float64, None))
            .set_description("first")
            .build();
        let rule2 = ConversionRegistry::builder("y", DataType::Float64, None, vec![DimensionKind::Time], None, noop_kernel())
            .add_source(SourceSlot::new("x2", vec![DimensionKind::Time], DataType::Float64, None))
            .set_description("second")
            .build();
        registry.insert(rule1);
        registry.insert(rule2);

        let mut product = Product::new();
        for name in ["x1", "x2"] {
            let mut v = crate::variable::Variable::new(name, DataType::Float64, vec![DimensionKind::Time], vec![1]).unwrap();
            v.set_data(crate::variable::DataBuffer::Float64(vec![1.0])).unwrap();
            product.add_variable(v).unwrap();
        }

        let options = default_options_handle();
        let key = DimsvarKey::new("y", vec![DimensionKind::Time]).unwrap();
        let result = plan(&product, &registry, &options, &key, None).unwrap();
        match result {
            PlanNode::Derived { rule, .. } => assert_eq!(rule.description.as_deref(), Some("first")),
            _ => panic!("expected a derived plan"),
        }
    }

    #[test]
    fn missing_key_reports_not_found() {
        let product = Product::new();
        let registry = ConversionRegistry::new();
        let options = default_options_handle();
        let key = DimsvarKey::new("nonexistent", vec![DimensionKind::Time]).unwrap();
        assert!(plan(&product, &registry, &options, &key, None).is_err());
    }
}
