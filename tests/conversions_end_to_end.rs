//! S1-S6 literal end-to-end derivation scenarios, plus the adjacent
//! invariants (P5, P6) that the bundled catalogue is expected to satisfy.

use harp_rs::config::{default_options_handle, ExtrapolationMode, HarpOptions};
use harp_rs::dims::{DataType, DimensionKind};
use harp_rs::executor;
use harp_rs::product::Product;
use harp_rs::registry::catalogue::build_default_registry;
use harp_rs::variable::{DataBuffer, Variable};

fn time_var(name: &str, unit: &str, values: Vec<f64>) -> Variable {
    let mut v = Variable::new(name, DataType::Float64, vec![DimensionKind::Time], vec![values.len()]).unwrap();
    v.set_data(DataBuffer::Float64(values)).unwrap();
    v.set_unit(Some(unit.to_string())).unwrap();
    v
}

/// S2 and P6 below exercise the "linear, extrapolate" scenario spec.md
/// describes; that behaviour is opt-in (the default is `Nan`), so these
/// build their own options handle instead of using the default one.
fn extrapolating_options_handle() -> harp_rs::config::HarpOptionsHandle {
    std::sync::Arc::new(HarpOptions {
        midpoint_extrapolation: ExtrapolationMode::Extrapolate,
        ..HarpOptions::default()
    })
}

/// S1: a `temperature {time=3}` variable in Kelvin coerces to degrees
/// Celsius by pure unit conversion, with no rule chain involved.
#[test]
fn s1_unit_coercion_only() {
    let mut product = Product::new();
    product.add_variable(time_var("temperature", "K", vec![273.15, 283.15, 293.15])).unwrap();
    let registry = build_default_registry();
    let options = default_options_handle();

    let v = executor::derive(
        &product,
        &registry,
        &options,
        "temperature",
        vec![DimensionKind::Time],
        None,
        None,
        Some("degC"),
    )
    .unwrap();
    let got = v.data().as_f64().unwrap();
    for (g, want) in got.iter().zip([0.0, 10.0, 20.0]) {
        assert!((g - want).abs() < 1e-9, "got {got:?}");
    }
}

/// S2: bounds reconstructed from midpoints `{1.0, 2.0, 4.0}` along
/// `vertical` extrapolate the edges and average the interior.
#[test]
fn s2_bounds_from_midpoints_linear_extrapolate() {
    let mut altitude = Variable::new(
        "altitude",
        DataType::Float64,
        vec![DimensionKind::Time, DimensionKind::Vertical],
        vec![1, 3],
    )
    .unwrap();
    altitude.set_data(DataBuffer::Float64(vec![1.0, 2.0, 4.0])).unwrap();
    altitude.set_unit(Some("m".to_string())).unwrap();

    let mut product = Product::new();
    product.add_variable(altitude).unwrap();

    let registry = build_default_registry();
    let options = extrapolating_options_handle();

    let v = executor::derive(
        &product,
        &registry,
        &options,
        "altitude_bounds",
        vec![DimensionKind::Time, DimensionKind::Vertical, DimensionKind::Independent],
        Some(2),
        None,
        None,
    )
    .unwrap();
    assert_eq!(v.data().as_f64().unwrap(), vec![0.5, 1.5, 1.5, 3.0, 3.0, 5.0]);
}

/// S4: a column density sums partial columns `{1, 2, 4}` to `{7}`.
#[test]
fn s4_column_from_partial_column() {
    let mut partial = Variable::new(
        "partial_column_density",
        DataType::Float64,
        vec![DimensionKind::Time, DimensionKind::Vertical],
        vec![1, 3],
    )
    .unwrap();
    partial.set_data(DataBuffer::Float64(vec![1.0, 2.0, 4.0])).unwrap();
    partial.set_unit(Some("molec/m2".to_string())).unwrap();

    let mut product = Product::new();
    product.add_variable(partial).unwrap();

    let registry = build_default_registry();
    let options = default_options_handle();

    let v = executor::derive(
        &product,
        &registry,
        &options,
        "column_density",
        vec![DimensionKind::Time],
        None,
        None,
        None,
    )
    .unwrap();
    assert_eq!(v.data().as_f64().unwrap(), vec![7.0]);
}

/// S5: flattening `vertical` into `time` reshapes `{time=2, vertical=3}`
/// row-major data into a flat `{time=6}` run, in row order.
#[test]
fn s5_flatten_dimension_reshapes_rows_into_time() {
    let mut v = Variable::new(
        "v",
        DataType::Float64,
        vec![DimensionKind::Time, DimensionKind::Vertical],
        vec![2, 3],
    )
    .unwrap();
    v.set_data(DataBuffer::Float64(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0])).unwrap();

    let mut product = Product::new();
    product.add_variable(v).unwrap();
    product.flatten_dimension(DimensionKind::Vertical).unwrap();

    assert_eq!(product.dimension_length(DimensionKind::Time), 6);
    assert_eq!(product.dimension_length(DimensionKind::Vertical), 0);
    let out = product.get_variable_by_name("v").unwrap();
    assert_eq!(out.dim_kinds, vec![DimensionKind::Time]);
    assert_eq!(out.data().as_f64().unwrap(), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
}

/// P6: applying `altitude -> altitude_bounds -> altitude` round-trips to
/// within the documented midpoint/bounds tolerance.
#[test]
fn p6_bounds_midpoint_round_trip() {
    let mut altitude = Variable::new(
        "altitude",
        DataType::Float64,
        vec![DimensionKind::Time, DimensionKind::Vertical],
        vec![1, 4],
    )
    .unwrap();
    altitude.set_data(DataBuffer::Float64(vec![0.0, 10.0, 20.0, 30.0])).unwrap();
    altitude.set_unit(Some("m".to_string())).unwrap();

    let mut product = Product::new();
    product.add_variable(altitude.clone()).unwrap();

    let registry = build_default_registry();
    let options = extrapolating_options_handle();

    let bounds = executor::derive(
        &product,
        &registry,
        &options,
        "altitude_bounds",
        vec![DimensionKind::Time, DimensionKind::Vertical, DimensionKind::Independent],
        Some(2),
        None,
        None,
    )
    .unwrap();

    let mut roundtrip_product = Product::new();
    roundtrip_product.add_variable(bounds).unwrap();

    let back = executor::derive(
        &roundtrip_product,
        &registry,
        &options,
        "altitude",
        vec![DimensionKind::Time, DimensionKind::Vertical],
        None,
        None,
        None,
    )
    .unwrap();

    let original = altitude.data().as_f64().unwrap();
    let got = back.data().as_f64().unwrap();
    for (g, want) in got.iter().zip(original.iter()) {
        assert!((g - want).abs() / want.abs().max(1.0) < 1e-9, "got {got:?}, want {original:?}");
    }
}

/// P5: deriving the same target twice — once against the bare product,
/// once against the product with the first result already added — returns
/// numerically identical buffers.
#[test]
fn p5_derivation_idempotence() {
    let mut product = Product::new();
    product.add_variable(time_var("pressure", "Pa", vec![101325.0, 50000.0])).unwrap();
    product.add_variable(time_var("temperature", "K", vec![288.15, 250.0])).unwrap();

    let registry = build_default_registry();
    let options = default_options_handle();

    let first = executor::derive(
        &product,
        &registry,
        &options,
        "number_density",
        vec![DimensionKind::Time],
        None,
        None,
        None,
    )
    .unwrap();

    let mut extended = product.clone();
    extended.add_variable(first.copy()).unwrap();

    let second = executor::derive(
        &extended,
        &registry,
        &options,
        "number_density",
        vec![DimensionKind::Time],
        None,
        None,
        None,
    )
    .unwrap();

    assert_eq!(first.data().as_f64().unwrap(), second.data().as_f64().unwrap());
}

/// Climatology rules are gated by `HarpOptions.allow_climatology`; with it
/// disabled, a product lacking a direct tropopause altitude cannot derive
/// one even though the rule exists in the registry.
#[test]
fn climatology_fallback_is_gated_by_options() {
    let mut product = Product::new();
    product.add_variable(time_var("latitude", "degree_north", vec![45.0])).unwrap();
    let registry = build_default_registry();

    let enabled = default_options_handle();
    let ok = executor::derive(
        &product,
        &registry,
        &enabled,
        "tropopause_altitude",
        vec![DimensionKind::Time],
        None,
        None,
        None,
    );
    assert!(ok.is_ok());

    let mut disabled = (*enabled).clone();
    disabled.allow_climatology = false;
    let disabled = std::sync::Arc::new(disabled);
    let err = executor::derive(
        &product,
        &registry,
        &disabled,
        "tropopause_altitude",
        vec![DimensionKind::Time],
        None,
        None,
        None,
    );
    assert!(err.is_err());
    let _ = &mut product;
}
