//! Blood glucose units, ranges and the mg/dL to mmol/L rewrite.

use ddi_core::Validator;

pub const MMOL_L: &str = "mmol/L";
pub const MMOL_L_LOWER: &str = "mmol/l";
pub const MG_DL: &str = "mg/dL";
pub const MG_DL_LOWER: &str = "mg/dl";
pub const UNITS: [&str; 4] = [MMOL_L, MMOL_L_LOWER, MG_DL, MG_DL_LOWER];

pub const MMOL_L_MINIMUM: f64 = 0.0;
pub const MMOL_L_MAXIMUM: f64 = 55.0;
pub const MG_DL_MINIMUM: f64 = 0.0;
pub const MG_DL_MAXIMUM: f64 = 1000.0;

pub const MMOL_L_TO_MG_DL_CONVERSION_FACTOR: f64 = 18.01559;
const MMOL_L_PRECISION_FACTOR: f64 = 100_000.0;

pub fn is_mg_dl(units: &str) -> bool {
    units == MG_DL || units == MG_DL_LOWER
}

pub fn is_mmol_l(units: &str) -> bool {
    units == MMOL_L || units == MMOL_L_LOWER
}

/// Range for `value` given its units; `None` when the units are unknown.
pub fn value_range_for_units(units: Option<&str>) -> Option<(f64, f64)> {
    match units {
        Some(u) if is_mmol_l(u) => Some((MMOL_L_MINIMUM, MMOL_L_MAXIMUM)),
        Some(u) if is_mg_dl(u) => Some((MG_DL_MINIMUM, MG_DL_MAXIMUM)),
        _ => None,
    }
}

pub fn normalize_units(units: Option<&str>) -> Option<String> {
    match units {
        Some(u) if is_mmol_l(u) || is_mg_dl(u) => Some(MMOL_L.to_string()),
        other => other.map(str::to_string),
    }
}

/// Converts mg/dL values to mmol/L, rounded to five decimals.
pub fn normalize_value_for_units(value: Option<f64>, units: Option<&str>) -> Option<f64> {
    match (value, units) {
        (Some(v), Some(u)) if is_mg_dl(u) => {
            let scaled = (v / MMOL_L_TO_MG_DL_CONVERSION_FACTOR * MMOL_L_PRECISION_FACTOR + 0.5).floor();
            Some(scaled / MMOL_L_PRECISION_FACTOR)
        }
        (value, _) => value,
    }
}

/// Shared checks for a `units` + `value` pair.
pub fn validate_units_and_value(validator: &mut Validator<'_>, units: Option<&str>, value: Option<f64>) {
    validator.string("units", units).exists().one_of(&UNITS);
    let check = validator.float("value", value).exists();
    if let Some((lower, upper)) = value_range_for_units(units) {
        check.in_range(lower, upper);
    }
}

/// Rewrites a units/value pair into mmol/L in place.
pub fn normalize_units_and_value(units: &mut Option<String>, value: &mut Option<f64>) {
    *value = normalize_value_for_units(*value, units.as_deref());
    *units = normalize_units(units.as_deref());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_mg_dl_to_mmol_l() {
        assert_eq!(normalize_value_for_units(Some(180.0), Some(MG_DL)), Some(9.99135));
        assert_eq!(normalize_value_for_units(Some(100.0), Some(MG_DL_LOWER)), Some(5.55075));
        assert_eq!(normalize_value_for_units(Some(5.5), Some(MMOL_L_LOWER)), Some(5.5));
        assert_eq!(normalize_value_for_units(None, Some(MG_DL)), None);
    }

    #[test]
    fn canonicalizes_unit_aliases() {
        assert_eq!(normalize_units(Some("mmol/l")).as_deref(), Some(MMOL_L));
        assert_eq!(normalize_units(Some("mg/dl")).as_deref(), Some(MMOL_L));
        assert_eq!(normalize_units(Some("mmol/L")).as_deref(), Some(MMOL_L));
        assert_eq!(normalize_units(Some("mmoll")).as_deref(), Some("mmoll"));
        assert_eq!(normalize_units(None), None);
    }

    #[test]
    fn range_depends_on_units() {
        assert_eq!(value_range_for_units(Some(MMOL_L)), Some((0.0, 55.0)));
        assert_eq!(value_range_for_units(Some(MG_DL)), Some((0.0, 1000.0)));
        assert_eq!(value_range_for_units(Some("mmoll")), None);
        assert_eq!(value_range_for_units(None), None);
    }
}
