//! C3 (Product) and C8 (Product Algebra): an ordered collection of variables
//! sharing a small set of named dimension lengths, plus the operations that
//! rearrange, filter, flatten, and merge products as a whole.

use std::collections::HashMap;

use chrono::{TimeZone, Utc};

use crate::dims::DimensionKind;
use crate::error::HarpError;
use crate::variable::Variable;

/// Days between the Unix epoch and the reference epoch used for
/// `get_datetime_range` (2000-01-01T00:00:00Z).
const REFERENCE_EPOCH_UNIX_DAYS: f64 = 10957.0;

#[derive(Debug, Default, Clone)]
pub struct Product {
    variables: Vec<Variable>,
    dimension_lengths: HashMap<DimensionKind, usize>,
    pub source_product: Option<String>,
    pub history: String,
}

fn sync_dims_on_add(dims: &mut HashMap<DimensionKind, usize>, variable: &Variable) {
    for (kind, &len) in variable.dim_kinds.iter().zip(variable.dim_lengths.iter()) {
        if kind.is_named() && dims.get(kind).copied().unwrap_or(0) == 0 {
            dims.insert(*kind, len);
        }
    }
}

/// Dimensions that only the removed variable depended on are zeroed; others
/// are left untouched, mirroring the "assume it was the sole referent" rule.
fn sync_dims_on_remove(
    dims: &mut HashMap<DimensionKind, usize>,
    removed: &Variable,
    remaining: &[Variable],
) {
    let mut candidates: Vec<DimensionKind> = removed
        .dim_kinds
        .iter()
        .copied()
        .filter(|k| k.is_named())
        .collect();
    candidates.dedup();
    for kind in candidates {
        let still_used = remaining.iter().any(|v| v.dim_kinds.contains(&kind));
        if !still_used {
            dims.insert(kind, 0);
        }
    }
}

impl Product {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn dimension_length(&self, kind: DimensionKind) -> usize {
        self.dimension_lengths.get(&kind).copied().unwrap_or(0)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v.name == name)
    }

    pub fn get_variable_index_by_name(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name == name)
    }

    pub fn get_variable_by_name(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn get_variable_by_name_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.iter_mut().find(|v| v.name == name)
    }

    /// True iff no variables, or any variable has zero elements.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() || self.variables.iter().any(|v| v.num_elements() == 0)
    }

    pub fn add_variable(&mut self, variable: Variable) -> Result<(), HarpError> {
        if self.has_variable(&variable.name) {
            return Err(HarpError::invalid_argument(format!(
                "variable '{}' already exists in the product",
                variable.name
            )));
        }
        for (i, kind) in variable.dim_kinds.iter().enumerate() {
            if !kind.is_named() {
                continue;
            }
            let product_len = self.dimension_length(*kind);
            if product_len != 0 && variable.dim_lengths[i] != product_len {
                return Err(HarpError::invalid_argument(format!(
                    "dimension {} (of variable '{}') is incompatible with the product: variable = {}, product = {}",
                    kind, variable.name, variable.dim_lengths[i], product_len
                )));
            }
        }
        sync_dims_on_add(&mut self.dimension_lengths, &variable);
        self.variables.push(variable);
        Ok(())
    }

    /// Remove and return ownership of the variable, without erroring if the
    /// named dimensions it alone depended on must now be zeroed.
    pub fn detach_variable_by_name(&mut self, name: &str) -> Result<Variable, HarpError> {
        let idx = self
            .get_variable_index_by_name(name)
            .ok_or_else(|| HarpError::invalid_argument(format!("no variable named '{name}'")))?;
        let removed = self.variables.remove(idx);
        sync_dims_on_remove(&mut self.dimension_lengths, &removed, &self.variables);
        Ok(removed)
    }

    pub fn remove_by_name(&mut self, name: &str) -> Result<(), HarpError> {
        self.detach_variable_by_name(name).map(|_| ())
    }

    pub fn remove_all(&mut self) {
        self.variables.clear();
        self.dimension_lengths.clear();
    }

    /// Atomic remove-then-add at the same slot, preserving order.
    pub fn replace_variable(&mut self, variable: Variable) -> Result<(), HarpError> {
        let idx = self
            .get_variable_index_by_name(&variable.name)
            .ok_or_else(|| {
                HarpError::invalid_argument(format!("no variable named '{}' to replace", variable.name))
            })?;
        let old = self.variables.remove(idx);
        sync_dims_on_remove(&mut self.dimension_lengths, &old, &self.variables);

        for (i, kind) in variable.dim_kinds.iter().enumerate() {
            if !kind.is_named() {
                continue;
            }
            let product_len = self.dimension_length(*kind);
            if product_len != 0 && variable.dim_lengths[i] != product_len {
                return Err(HarpError::invalid_argument(format!(
                    "dimension {} (of variable '{}') is incompatible with the product",
                    kind, variable.name
                )));
            }
        }
        sync_dims_on_add(&mut self.dimension_lengths, &variable);
        self.variables.insert(idx, variable);
        Ok(())
    }

    /// Ensure the product has a `time` dimension (length 1 if absent) and
    /// that every variable has `time` as its first axis.
    pub fn make_time_dependent(&mut self) -> Result<(), HarpError> {
        let time_len = self.dimension_length(DimensionKind::Time).max(1);
        self.dimension_lengths.insert(DimensionKind::Time, time_len);
        for v in self.variables.iter_mut() {
            if v.dim_kinds.first() != Some(&DimensionKind::Time) {
                v.add_dimension(0, DimensionKind::Time, time_len)?;
            }
        }
        Ok(())
    }

    fn check_named_kind(kind: DimensionKind) -> Result<(), HarpError> {
        if !kind.is_named() {
            return Err(HarpError::invalid_argument(
                "cannot operate on the independent dimension at product scope",
            ));
        }
        Ok(())
    }

    pub fn rearrange_dimension(&mut self, kind: DimensionKind, ids: &[usize]) -> Result<(), HarpError> {
        Self::check_named_kind(kind)?;
        if ids.is_empty() {
            self.remove_all();
            return Ok(());
        }
        if self.dimension_length(kind) == 0 {
            return Err(HarpError::invalid_argument(format!(
                "product does not depend on dimension '{kind}'"
            )));
        }
        for v in self.variables.iter_mut() {
            let axes: Vec<usize> = v
                .dim_kinds
                .iter()
                .enumerate()
                .filter(|(_, k)| **k == kind)
                .map(|(i, _)| i)
                .collect();
            for axis in axes {
                v.rearrange_dimension(axis, ids)?;
            }
        }
        self.dimension_lengths.insert(kind, ids.len());
        Ok(())
    }

    pub fn filter_dimension(&mut self, kind: DimensionKind, mask: &[bool]) -> Result<(), HarpError> {
        Self::check_named_kind(kind)?;
        let ids: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();
        self.rearrange_dimension(kind, &ids)
    }

    pub fn resize_dimension(&mut self, kind: DimensionKind, new_length: usize) -> Result<(), HarpError> {
        Self::check_named_kind(kind)?;
        for v in self.variables.iter_mut() {
            let axes: Vec<usize> = v
                .dim_kinds
                .iter()
                .enumerate()
                .filter(|(_, k)| **k == kind)
                .map(|(i, _)| i)
                .collect();
            for axis in axes {
                v.resize_dimension(axis, new_length)?;
            }
        }
        self.dimension_lengths.insert(kind, new_length);
        Ok(())
    }

    pub fn remove_dimension(&mut self, kind: DimensionKind) -> Result<(), HarpError> {
        Self::check_named_kind(kind)?;
        let to_remove: Vec<String> = self
            .variables
            .iter()
            .filter(|v| v.dim_kinds.contains(&kind))
            .map(|v| v.name.clone())
            .collect();
        for name in to_remove {
            self.remove_by_name(&name)?;
        }
        self.dimension_lengths.insert(kind, 0);
        Ok(())
    }

    /// Stable-sort along the dimension of the named (one-dimensional,
    /// non-independent) variable; every variable sharing that dimension is
    /// permuted with the same index table.
    pub fn sort(&mut self, by_name: &str) -> Result<(), HarpError> {
        let comparison = self
            .get_variable_by_name(by_name)
            .ok_or_else(|| HarpError::invalid_argument(format!("no variable named '{by_name}'")))?;
        if comparison.num_dimensions() != 1 {
            return Err(HarpError::invalid_argument(
                "variable for sorting must be one-dimensional",
            ));
        }
        let kind = comparison.dim_kinds[0];
        Self::check_named_kind(kind)?;

        let mut ids: Vec<usize> = (0..comparison.num_elements()).collect();
        match comparison.data() {
            crate::variable::DataBuffer::String(v) => {
                ids.sort_by(|&a, &b| v[a].cmp(&v[b]));
            }
            buf => {
                let values = buf.as_f64().expect("non-string buffer has an f64 view");
                ids.sort_by(|&a, &b| {
                    values[a]
                        .partial_cmp(&values[b])
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            }
        }
        self.rearrange_dimension(kind, &ids)
    }

    /// Collapse `kind` into `time` for every variable.
    pub fn flatten_dimension(&mut self, kind: DimensionKind) -> Result<(), HarpError> {
        if kind == DimensionKind::Independent {
            return Err(HarpError::invalid_argument("cannot flatten the independent dimension"));
        }
        let dim_length = self.dimension_length(kind);
        if dim_length == 0 || kind == DimensionKind::Time {
            return Ok(());
        }

        if dim_length != 1 {
            if self.has_variable("index") {
                self.remove_by_name("index")?;
            }
            if self.has_variable("collocation_index") {
                self.remove_by_name("collocation_index")?;
            }
        }

        let names: Vec<String> = self.variables.iter().map(|v| v.name.clone()).collect();
        for name in names.into_iter().rev() {
            let count = {
                let v = self.get_variable_by_name(&name).expect("name came from self.variables");
                v.dim_kinds.iter().filter(|k| **k == kind).count()
            };

            if count == 0 {
                let depends_on_time = self
                    .get_variable_by_name(&name)
                    .map(|v| v.dim_kinds.first() == Some(&DimensionKind::Time))
                    .unwrap_or(false);
                if !depends_on_time {
                    continue;
                }
                let v = self.get_variable_by_name_mut(&name).unwrap();
                v.add_dimension(1, kind, dim_length)?;
            } else if count >= 2 {
                self.remove_by_name(&name)?;
                continue;
            }

            let v = self.get_variable_by_name_mut(&name).unwrap();
            let mut dim_index = v.dim_kinds.iter().position(|k| *k == kind).expect("kind present");

            if v.dim_kinds.first() != Some(&DimensionKind::Time) {
                let time_len = self.dimension_length(DimensionKind::Time).max(1);
                self.dimension_lengths.insert(DimensionKind::Time, time_len);
                let v = self.get_variable_by_name_mut(&name).unwrap();
                v.add_dimension(0, DimensionKind::Time, time_len)?;
                dim_index += 1;
            }

            let v = self.get_variable_by_name_mut(&name).unwrap();
            if dim_index != 1 {
                let mut order: Vec<usize> = Vec::with_capacity(v.num_dimensions());
                order.push(0);
                order.push(dim_index);
                for j in 2..v.num_dimensions() {
                    if j <= dim_index {
                        order.push(j - 1);
                    } else {
                        order.push(j);
                    }
                }
                v.transpose(&order)?;
            }

            v.dim_lengths[0] *= v.dim_lengths[1];
            v.dim_lengths.remove(1);
            v.dim_kinds.remove(1);
        }

        self.dimension_lengths
            .insert(DimensionKind::Time, self.dimension_length(DimensionKind::Time).max(1) * dim_length);
        self.dimension_lengths.insert(kind, 0);
        Ok(())
    }

    /// If `other` is absent: drop `index`, make time-dependent, clear
    /// `source_product`. Otherwise merge `other` into `self` along `time`.
    pub fn append(&mut self, other: Option<Product>) -> Result<(), HarpError> {
        if self.has_variable("index") {
            self.remove_by_name("index")?;
        }
        self.make_time_dependent()?;
        self.source_product = None;

        let Some(mut other) = other else {
            return Ok(());
        };

        if other.has_variable("index") {
            other.remove_by_name("index")?;
        }

        if self.variables.len() != other.variables.len() {
            return Err(HarpError::invalid_argument(
                "products don't have the same number of variables",
            ));
        }
        for v in self.variables.iter() {
            if !other.has_variable(&v.name) {
                return Err(HarpError::invalid_argument(format!(
                    "products don't both have variable '{}'",
                    v.name
                )));
            }
        }

        other.make_time_dependent()?;

        for kind in DimensionKind::named_kinds() {
            if kind == DimensionKind::Time {
                continue;
            }
            let a = self.dimension_length(kind);
            let b = other.dimension_length(kind);
            if a > b {
                other.resize_dimension(kind, a)?;
            } else if b > a {
                self.resize_dimension(kind, b)?;
            }
        }

        let names: Vec<String> = self.variables.iter().map(|v| v.name.clone()).collect();
        for name in names {
            let other_var = other
                .get_variable_by_name(&name)
                .expect("presence checked above")
                .clone();
            let v = self.get_variable_by_name_mut(&name).expect("name from self.variables");
            v.append(&other_var)?;
        }
        let new_time = self.dimension_length(DimensionKind::Time) + other.dimension_length(DimensionKind::Time);
        self.dimension_lengths.insert(DimensionKind::Time, new_time);
        Ok(())
    }

    /// `(start, stop)` in days since 2000-01-01, preferring
    /// `datetime_start`/`datetime_stop` over `datetime`.
    pub fn get_datetime_range(&self) -> Result<(f64, f64), HarpError> {
        let start = self
            .extreme_valid_value("datetime_start", true)
            .or_else(|| self.extreme_valid_value("datetime", true));
        let stop = self
            .extreme_valid_value("datetime_stop", false)
            .or_else(|| self.extreme_valid_value("datetime", false));

        match (start, stop) {
            (Some(s), Some(t)) => Ok((s, t)),
            _ => Err(HarpError::invalid_argument(
                "product has no valid datetime sample to compute a range from",
            )),
        }
    }

    fn extreme_valid_value(&self, name: &str, want_min: bool) -> Option<f64> {
        let v = self.get_variable_by_name(name)?;
        let values = v.data().as_f64()?;
        let range = v.valid_range;
        let mut best: Option<f64> = None;
        for x in values {
            if x.is_nan() {
                continue;
            }
            if let Some((lo, hi)) = range {
                if x < lo || x > hi {
                    continue;
                }
            }
            best = Some(match best {
                None => x,
                Some(b) if want_min => b.min(x),
                Some(b) => b.max(x),
            });
        }
        best
    }

    /// Prepend a history line: `YYYY-MM-DDThh:mm:ssZ [<engine>-<version>] <executable> <args...>`,
    /// quoting arguments containing whitespace or any of `; [ ] < > = !`.
    pub fn update_history(
        &mut self,
        engine_name: &str,
        engine_version: &str,
        executable: &str,
        args: &[String],
    ) -> Result<(), HarpError> {
        let now = Utc::now();
        self.update_history_at(now, engine_name, engine_version, executable, args)
    }

    fn update_history_at(
        &mut self,
        timestamp: chrono::DateTime<Utc>,
        engine_name: &str,
        engine_version: &str,
        executable: &str,
        args: &[String],
    ) -> Result<(), HarpError> {
        let quoted_args: Vec<String> = args.iter().map(|a| crate::utils::quote_if_needed(a)).collect();
        let mut line = format!(
            "{} [{engine_name}-{engine_version}] {executable}",
            timestamp.format("%Y-%m-%dT%H:%M:%SZ")
        );
        for a in quoted_args {
            line.push(' ');
            line.push_str(&a);
        }
        if self.history.is_empty() {
            self.history = line;
        } else {
            self.history = format!("{line}\n{}", self.history);
        }
        Ok(())
    }
}

/// Convert a chrono UTC datetime to fractional days since the reference
/// epoch (2000-01-01T00:00:00Z) used throughout `get_datetime_range`.
pub fn datetime_to_reference_days(dt: chrono::DateTime<Utc>) -> f64 {
    let unix_days = dt.timestamp() as f64 / 86400.0;
    unix_days - REFERENCE_EPOCH_UNIX_DAYS
}

pub fn reference_days_to_datetime(days: f64) -> chrono::DateTime<Utc> {
    let unix_seconds = (days + REFERENCE_EPOCH_UNIX_DAYS) * 86400.0;
    Utc.timestamp_opt(unix_seconds as i64, 0).unwrap()
}
