//! The engine's public help surface: `list_conversions`, which prints the
//! registered rule catalogue (optionally filtered by name, optionally
//! narrowed to only the rules a given product could actually use).

use crate::config::HarpOptionsHandle;
use crate::planner::{self, PlanNode};
use crate::product::Product;
use crate::registry::{format_source_slot, ConversionRegistry, DimsvarKey, Rule};

fn target_signature(rule: &Rule) -> String {
    let dims_str = rule
        .target_dims
        .iter()
        .map(|d| d.printed_name())
        .collect::<Vec<_>>()
        .join(",");
    let unit_str = rule.target_unit.as_deref().unwrap_or("");
    format!("{} {{{dims_str}}} [{unit_str}] ({})", rule.target_name, rule.target_dtype)
}

/// Print every registered rule (filtered by `name` if given): a header line
/// with the target signature, each source on its own indented line, then
/// the rule's description if it has one.
pub fn list_all_conversions(registry: &ConversionRegistry, name: Option<&str>, mut print: impl FnMut(&str)) {
    for (_, rule) in registry.iterate() {
        if let Some(name) = name {
            if rule.target_name != name {
                continue;
            }
        }
        print(&target_signature(rule));
        for source in &rule.sources {
            print(&format!("    {}", format_source_slot(source)));
        }
        if let Some(description) = &rule.description {
            print(&format!("    # {description}"));
        }
    }
}

/// Print only the rules whose plan succeeds given `product`, walking the
/// chosen rule tree with one extra indent level per recursion.
pub fn list_conversions_for_product(
    product: &Product,
    registry: &ConversionRegistry,
    options: &HarpOptionsHandle,
    name: Option<&str>,
    mut print: impl FnMut(&str),
) {
    let mut seen_targets: Vec<DimsvarKey> = Vec::new();
    for (_, rule) in registry.iterate() {
        if let Some(name) = name {
            if rule.target_name != name {
                continue;
            }
        }
        let key = rule.target_key();
        if seen_targets.contains(&key) {
            continue;
        }
        seen_targets.push(key.clone());

        if let Ok(chosen) = planner::plan(product, registry, options, &key, rule.target_independent_length) {
            if let PlanNode::Derived { .. } = &chosen {
                print_plan_tree(&chosen, 0, &mut print);
            }
        }
    }
}

fn print_plan_tree(node: &PlanNode, indent: usize, print: &mut impl FnMut(&str)) {
    let pad = "    ".repeat(indent);
    match node {
        PlanNode::Existing { key, .. } => {
            print(&format!("{pad}{} (existing)", key.printed()));
        }
        PlanNode::Derived { rule, sources, .. } => {
            print(&format!("{pad}{}", target_signature(rule)));
            for source in sources {
                print_plan_tree(source, indent + 1, print);
            }
            if let Some(description) = &rule.description {
                print(&format!("{pad}    # {description}"));
            }
        }
    }
}
