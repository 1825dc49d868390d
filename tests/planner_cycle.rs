//! P7 / S6: planner cycle-avoidance and missing-key behaviour.

use std::sync::Arc;

use harp_rs::config::default_options_handle;
use harp_rs::dims::{DataType, DimensionKind};
use harp_rs::error::HarpError;
use harp_rs::executor;
use harp_rs::product::Product;
use harp_rs::registry::{ConversionRegistry, SourceSlot};

fn noop_kernel() -> harp_rs::registry::Kernel {
    Arc::new(|_target, _sources| Ok(()))
}

/// S6: a registry containing only `foo from bar` and `bar from foo`, with
/// an empty product, must report `foo` as not found and print `foo {}`.
#[test]
fn cyclic_pair_resolves_to_variable_not_found_with_expected_message() {
    let mut registry = ConversionRegistry::new();
    let foo_from_bar = ConversionRegistry::builder(
        "foo",
        DataType::Float64,
        None,
        vec![DimensionKind::Time],
        None,
        noop_kernel(),
    )
    .add_source(SourceSlot::new("bar", vec![DimensionKind::Time], DataType::Float64, None))
    .build();
    let bar_from_foo = ConversionRegistry::builder(
        "bar",
        DataType::Float64,
        None,
        vec![DimensionKind::Time],
        None,
        noop_kernel(),
    )
    .add_source(SourceSlot::new("foo", vec![DimensionKind::Time], DataType::Float64, None))
    .build();
    registry.insert(foo_from_bar);
    registry.insert(bar_from_foo);

    let product = Product::new();
    let options = default_options_handle();

    let err = executor::derive(
        &product,
        &registry,
        &options,
        "foo",
        vec![DimensionKind::Time],
        None,
        None,
        None,
    )
    .unwrap_err();

    match err.current_context() {
        HarpError::VariableNotFound { signature } => assert_eq!(signature, "foo {time}"),
        other => panic!("expected VariableNotFound, got {other:?}"),
    }
}

/// P7: a larger cyclic fragment still terminates and is reported missing,
/// rather than overflowing the stack or looping indefinitely. The fragment
/// has three mutually-referential keys plus one dead end off to the side.
#[test]
fn larger_cyclic_fragment_terminates_as_missing() {
    let mut registry = ConversionRegistry::new();
    // a <- b <- c <- a (cycle), and d <- a (depends into the cycle).
    for (target, source) in [("a", "b"), ("b", "c"), ("c", "a"), ("d", "a")] {
        let rule = ConversionRegistry::builder(
            target,
            DataType::Float64,
            None,
            vec![DimensionKind::Time],
            None,
            noop_kernel(),
        )
        .add_source(SourceSlot::new(source, vec![DimensionKind::Time], DataType::Float64, None))
        .build();
        registry.insert(rule);
    }

    let product = Product::new();
    let options = default_options_handle();

    for name in ["a", "b", "c", "d"] {
        let result = executor::derive(
            &product,
            &registry,
            &options,
            name,
            vec![DimensionKind::Time],
            None,
            None,
            None,
        );
        assert!(result.is_err(), "'{name}' should not be derivable from an empty product");
    }
}

/// A request for a key with no registered rule at all (not even a cyclic
/// one) is reported the same way: `VariableNotFound`, not a panic.
#[test]
fn unregistered_key_is_reported_missing_not_panicking() {
    let registry = ConversionRegistry::new();
    let product = Product::new();
    let options = default_options_handle();

    let err = executor::derive(
        &product,
        &registry,
        &options,
        "nonexistent",
        vec![DimensionKind::Time],
        None,
        None,
        None,
    )
    .unwrap_err();
    assert!(matches!(err.current_context(), HarpError::VariableNotFound { .. }));
}

/// P8: when two rules for the same key are both feasible, the planner must
/// prefer the one whose source subtree is cheaper to derive, not whichever
/// was registered first. One source (`cheap_source`) sits directly on the
/// product (subtree cost 0); the other (`expensive_source`) requires a
/// three-level derivation chain off the product (subtree cost 3). The
/// expensive rule is registered *first* here specifically to rule out a
/// planner that only ever breaks ties by registration order — if cost
/// weren't accumulated per source subtree, registering the 1-source
/// "expensive" rule ahead of the 1-source "cheap" rule would make the
/// flat-cost tie-break pick "expensive" instead.
#[test]
fn planner_prefers_the_cheaper_of_two_feasible_rules() {
    use harp_rs::variable::{DataBuffer, Variable};

    let mut registry = ConversionRegistry::new();

    // expensive_source requires a 3-level derivation chain: leaf -> level1 -> level2 -> expensive_source.
    for (target, source) in [("level1", "leaf"), ("level2", "level1"), ("expensive_source", "level2")] {
        let rule = ConversionRegistry::builder(
            target,
            DataType::Float64,
            None,
            vec![DimensionKind::Time],
            None,
            noop_kernel(),
        )
        .add_source(SourceSlot::new(source, vec![DimensionKind::Time], DataType::Float64, None))
        .build();
        registry.insert(rule);
    }

    let expensive = ConversionRegistry::builder(
        "target",
        DataType::Float64,
        None,
        vec![DimensionKind::Time],
        None,
        noop_kernel(),
    )
    .add_source(SourceSlot::new("expensive_source", vec![DimensionKind::Time], DataType::Float64, None))
    .set_description("expensive")
    .build();
    let cheap = ConversionRegistry::builder(
        "target",
        DataType::Float64,
        None,
        vec![DimensionKind::Time],
        None,
        noop_kernel(),
    )
    .add_source(SourceSlot::new("cheap_source", vec![DimensionKind::Time], DataType::Float64, None))
    .set_description("cheap")
    .build();
    // registered in the order that would fool a registration-order tie-break.
    registry.insert(expensive);
    registry.insert(cheap);

    let mut product = Product::new();
    for name in ["leaf", "cheap_source"] {
        let mut v = Variable::new(name, DataType::Float64, vec![DimensionKind::Time], vec![1]).unwrap();
        v.set_data(DataBuffer::Float64(vec![1.0])).unwrap();
        product.add_variable(v).unwrap();
    }

    let options = default_options_handle();
    let plan = harp_rs::planner::plan(
        &product,
        &registry,
        &options,
        &harp_rs::registry::DimsvarKey::new("target", vec![DimensionKind::Time]).unwrap(),
        None,
    )
    .unwrap();

    match plan {
        harp_rs::planner::PlanNode::Derived { rule, .. } => {
            assert_eq!(rule.description.as_deref(), Some("cheap"));
        }
        _ => panic!("expected a derived plan"),
    }
}
