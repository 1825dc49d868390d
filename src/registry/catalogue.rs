//! The bundled rule catalogue: wires the kernels in [`super::kernels`] into
//! concrete [`Rule`]s and registers them on a fresh [`ConversionRegistry`].
//!
//! This is the engine's equivalent of the teacher's built-in derived
//! variable table: a fixed set of conversions shipped with the crate, with
//! room for a caller to register additional rules of their own on top.

use std::sync::Arc;

use crate::config::ExtrapolationMode;
use crate::dims::{DataType, DimensionKind};
use crate::registry::kernels::{avk, bounds, climatology, column, density, unit_expansion};
use crate::registry::{ConversionRegistry, SourceSlot};

/// Build the registry the engine ships with. Callers who need additional
/// conversions construct their own [`ConversionRegistry`] and `insert`
/// further rules; this function is a convenience starting point, not the
/// only way to populate one.
pub fn build_default_registry() -> ConversionRegistry {
    let mut registry = ConversionRegistry::new();

    register_temperature_units(&mut registry);
    register_number_density(&mut registry);
    register_species_density(&mut registry);
    register_column(&mut registry);
    register_avk(&mut registry);
    register_bounds(&mut registry);
    register_climatology(&mut registry);

    registry.sort();
    log::info!("registry: assembled catalogue with {} dimsvar keys", registry.num_keys());
    registry
}

fn register_temperature_units(registry: &mut ConversionRegistry) {
    let to_celsius = unit_expansion::affine_unit_conversion_kernel("K", "degC");
    let rule = ConversionRegistry::builder(
        "temperature",
        DataType::Float64,
        Some("degC"),
        vec![DimensionKind::Time],
        None,
        Arc::new(move |t, s| to_celsius(t, s)),
    )
    .add_source(SourceSlot::new("temperature", vec![DimensionKind::Time], DataType::Float64, Some("K")))
    .set_description("temperature in degrees Celsius from temperature in Kelvin")
    .build();
    registry.insert(rule);

    let to_kelvin = unit_expansion::affine_unit_conversion_kernel("degC", "K");
    let rule = ConversionRegistry::builder(
        "temperature",
        DataType::Float64,
        Some("K"),
        vec![DimensionKind::Time],
        None,
        Arc::new(move |t, s| to_kelvin(t, s)),
    )
    .add_source(SourceSlot::new("temperature", vec![DimensionKind::Time], DataType::Float64, Some("degC")))
    .set_description("temperature in Kelvin from temperature in degrees Celsius")
    .build();
    registry.insert(rule);
}

fn register_number_density(registry: &mut ConversionRegistry) {
    let rule = ConversionRegistry::builder(
        "number_density",
        DataType::Float64,
        Some("molec/m3"),
        vec![DimensionKind::Time, DimensionKind::Vertical],
        None,
        Arc::new(density::number_density_from_pressure_temperature),
    )
    .add_source(SourceSlot::new(
        "pressure",
        vec![DimensionKind::Time, DimensionKind::Vertical],
        DataType::Float64,
        Some("Pa"),
    ))
    .add_source(SourceSlot::new(
        "temperature",
        vec![DimensionKind::Time, DimensionKind::Vertical],
        DataType::Float64,
        Some("K"),
    ))
    .set_description("air number density from pressure and temperature via the ideal gas law")
    .build();
    registry.insert(rule);
}

fn register_species_density(registry: &mut ConversionRegistry) {
    let rule = ConversionRegistry::builder(
        "h2o_number_density",
        DataType::Float64,
        Some("molec/m3"),
        vec![DimensionKind::Time, DimensionKind::Vertical],
        None,
        Arc::new(density::species_number_density_from_vmr),
    )
    .add_source(SourceSlot::new(
        "h2o_volume_mixing_ratio",
        vec![DimensionKind::Time, DimensionKind::Vertical],
        DataType::Float64,
        Some("1"),
    ))
    .add_source(SourceSlot::new(
        "number_density",
        vec![DimensionKind::Time, DimensionKind::Vertical],
        DataType::Float64,
        Some("molec/m3"),
    ))
    .set_description("water vapour number density from its volume mixing ratio and the air number density")
    .build();
    registry.insert(rule);
}

fn register_column(registry: &mut ConversionRegistry) {
    let rule = ConversionRegistry::builder(
        "partial_column_density",
        DataType::Float64,
        Some("molec/m2"),
        vec![DimensionKind::Time, DimensionKind::Vertical],
        None,
        Arc::new(column::partial_column_from_density_and_bounds),
    )
    .add_source(SourceSlot::new(
        "number_density",
        vec![DimensionKind::Time, DimensionKind::Vertical],
        DataType::Float64,
        Some("molec/m3"),
    ))
    .add_source(SourceSlot::new(
        "altitude_bounds",
        vec![DimensionKind::Time, DimensionKind::Vertical, DimensionKind::Independent],
        DataType::Float64,
        Some("m"),
    ).with_independent_length(2))
    .set_description("partial column density from number density and layer thickness")
    .build();
    registry.insert(rule);

    let rule = ConversionRegistry::builder(
        "column_density",
        DataType::Float64,
        Some("molec/m2"),
        vec![DimensionKind::Time],
        None,
        Arc::new(column::column_from_partial_column),
    )
    .add_source(SourceSlot::new(
        "partial_column_density",
        vec![DimensionKind::Time, DimensionKind::Vertical],
        DataType::Float64,
        Some("molec/m2"),
    ))
    .set_description("total column density from summing partial column density over the vertical axis")
    .build();
    registry.insert(rule);
}

fn register_avk(registry: &mut ConversionRegistry) {
    let rule = ConversionRegistry::builder(
        "avk_corrected_partial_column_density",
        DataType::Float64,
        Some("molec/m2"),
        vec![DimensionKind::Time, DimensionKind::Vertical],
        None,
        Arc::new(avk::avk_corrected_partial_column),
    )
    .add_source(SourceSlot::new(
        "partial_column_density",
        vec![DimensionKind::Time, DimensionKind::Vertical],
        DataType::Float64,
        Some("molec/m2"),
    ))
    .add_source(SourceSlot::new(
        "column_averaging_kernel",
        vec![DimensionKind::Time, DimensionKind::Vertical, DimensionKind::Independent],
        DataType::Float64,
        Some("1"),
    ))
    .set_description("partial column density smoothed by a per-profile averaging kernel matrix")
    .build();
    registry.insert(rule);
}

fn register_bounds(registry: &mut ConversionRegistry) {
    let rule = ConversionRegistry::builder(
        "altitude",
        DataType::Float64,
        Some("m"),
        vec![DimensionKind::Time, DimensionKind::Vertical],
        None,
        Arc::new(bounds::midpoints_from_bounds),
    )
    .add_source(SourceSlot::new(
        "altitude_bounds",
        vec![DimensionKind::Time, DimensionKind::Vertical, DimensionKind::Independent],
        DataType::Float64,
        Some("m"),
    ).with_independent_length(2))
    .set_description("altitude midpoints from altitude bounds")
    .build();
    registry.insert(rule);

    // One rule per `ExtrapolationMode`, each gated on the matching option so
    // exactly one is ever feasible for a given `HarpOptions`.
    let modes: [(ExtrapolationMode, crate::registry::Kernel, &str); 3] = [
        (
            ExtrapolationMode::Nan,
            Arc::new(bounds::bounds_from_midpoints_nan),
            "altitude bounds reconstructed from altitude midpoints (edges left as NaN)",
        ),
        (
            ExtrapolationMode::Edge,
            Arc::new(bounds::bounds_from_midpoints_edge),
            "altitude bounds reconstructed from altitude midpoints (edges clamped to the outer midpoint)",
        ),
        (
            ExtrapolationMode::Extrapolate,
            Arc::new(bounds::bounds_from_midpoints_extrapolate),
            "altitude bounds reconstructed from altitude midpoints (edges extrapolated linearly)",
        ),
    ];
    for (mode, kernel, description) in modes {
        let rule = ConversionRegistry::builder(
            "altitude_bounds",
            DataType::Float64,
            Some("m"),
            vec![DimensionKind::Time, DimensionKind::Vertical, DimensionKind::Independent],
            Some(2),
            kernel,
        )
        .add_source(SourceSlot::new(
            "altitude",
            vec![DimensionKind::Time, DimensionKind::Vertical],
            DataType::Float64,
            Some("m"),
        ))
        .set_description(description)
        .set_enabled(Arc::new(move |options| options.midpoint_extrapolation == mode))
        .build();
        registry.insert(rule);
    }
}

fn register_climatology(registry: &mut ConversionRegistry) {
    let rule = ConversionRegistry::builder(
        "tropopause_altitude",
        DataType::Float64,
        Some("m"),
        vec![DimensionKind::Time],
        None,
        Arc::new(climatology::tropopause_altitude_from_latitude),
    )
    .add_source(SourceSlot::new("latitude", vec![DimensionKind::Time], DataType::Float64, Some("degree_north")))
    .set_description("tropopause altitude from a latitude-only climatological fit (fallback only)")
    .set_enabled(Arc::new(|options| options.allow_climatology))
    .build();
    registry.insert(rule);
}
