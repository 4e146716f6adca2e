/// Streamflow cleaning and scaling.
///
/// Applied per gauge, always in this order:
///
/// 1. `replace_sentinel`  : `-999` becomes missing,
/// 2. `normalize_by_area` : discharge per unit basin area,
/// 3. `standardize`       : zero mean, unit sample standard deviation.
///
/// Missing values pass through every step unchanged.

use crate::model::ModelError;

/// Mean and sample standard deviation used to standardize a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Standardization {
    pub mean: f64,
    pub std_dev: f64,
}

/// Replaces every occurrence of `sentinel` with `None`. Returns how many
/// values were replaced.
pub fn replace_sentinel(values: &mut [Option<f64>], sentinel: f64) -> usize {
    let mut replaced = 0;
    for v in values.iter_mut() {
        if *v == Some(sentinel) {
            *v = None;
            replaced += 1;
        }
    }
    replaced
}

/// Divides every present value by the basin area.
pub fn normalize_by_area(values: &mut [Option<f64>], area: f64) -> Result<(), ModelError> {
    if !area.is_finite() || area <= 0.0 {
        return Err(ModelError::InvalidBasinArea(area));
    }
    for v in values.iter_mut().flatten() {
        *v /= area;
    }
    Ok(())
}

/// Mean and sample standard deviation (n - 1) of the present values.
pub fn moments(values: &[Option<f64>]) -> Result<Standardization, ModelError> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let n = present.len();
    if n < 2 {
        return Err(ModelError::DegenerateSeries { present: n });
    }

    let mean = present.iter().sum::<f64>() / n as f64;
    let variance = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std_dev = variance.sqrt();
    if !std_dev.is_finite() || std_dev == 0.0 {
        return Err(ModelError::DegenerateSeries { present: n });
    }
    Ok(Standardization { mean, std_dev })
}

/// Rescales present values to `(v - mean) / std_dev`.
pub fn standardize(values: &mut [Option<f64>]) -> Result<Standardization, ModelError> {
    let stats = moments(values)?;
    for v in values.iter_mut().flatten() {
        *v = (*v - stats.mean) / stats.std_dev;
    }
    Ok(stats)
}

/// Full streamflow preparation for one gauge. Returns the number of
/// sentinel values replaced.
pub fn prepare_streamflow(
    values: &mut [Option<f64>],
    area: f64,
    sentinel: f64,
) -> Result<usize, ModelError> {
    let replaced = replace_sentinel(values, sentinel);
    normalize_by_area(values, area)?;
    standardize(values)?;
    Ok(replaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sentinel_becomes_missing_not_zero() {
        let mut values = vec![Some(5.0), Some(-999.0), Some(7.0)];
        assert_eq!(replace_sentinel(&mut values, -999.0), 1);
        assert_eq!(values, vec![Some(5.0), None, Some(7.0)]);
    }

    #[test]
    fn test_sentinel_replacement_is_idempotent() {
        let mut once = vec![Some(-999.0), Some(1.0), None, Some(-999.0)];
        replace_sentinel(&mut once, -999.0);
        let mut twice = once.clone();
        assert_eq!(replace_sentinel(&mut twice, -999.0), 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_area_normalization() {
        let mut values = vec![Some(10.0), None, Some(25.0)];
        normalize_by_area(&mut values, 5.0).unwrap();
        assert_eq!(values, vec![Some(2.0), None, Some(5.0)]);
    }

    #[test]
    fn test_non_positive_area_is_an_error() {
        let mut values = vec![Some(10.0)];
        assert_eq!(
            normalize_by_area(&mut values, 0.0),
            Err(ModelError::InvalidBasinArea(0.0))
        );
        assert!(normalize_by_area(&mut values, -3.0).is_err());
        assert!(normalize_by_area(&mut values, f64::NAN).is_err());
        assert_eq!(values, vec![Some(10.0)]);
    }

    #[test]
    fn test_standardized_series_has_zero_mean_unit_sd() {
        let mut values: Vec<Option<f64>> = (0..500)
            .map(|i| if i % 37 == 0 { None } else { Some((i as f64 * 0.7).sin() * 40.0 + 120.0) })
            .collect();
        standardize(&mut values).unwrap();

        let stats = moments(&values).unwrap();
        assert_relative_eq!(stats.mean, 0.0, epsilon = 1e-12);
        assert_relative_eq!(stats.std_dev, 1.0, epsilon = 1e-12);
        assert!(values[0].is_none());
    }

    #[test]
    fn test_sentinel_does_not_pollute_statistics() {
        let mut with_sentinel = vec![Some(1.0), Some(-999.0), Some(3.0)];
        let mut clean = vec![Some(1.0), None, Some(3.0)];
        prepare_streamflow(&mut with_sentinel, 2.0, -999.0).unwrap();
        prepare_streamflow(&mut clean, 2.0, -999.0).unwrap();
        assert_eq!(with_sentinel, clean);
    }

    #[test]
    fn test_constant_series_is_degenerate() {
        let mut values = vec![Some(4.0); 10];
        assert_eq!(
            standardize(&mut values),
            Err(ModelError::DegenerateSeries { present: 10 })
        );
        let mut single = vec![Some(4.0), None];
        assert!(standardize(&mut single).is_err());
    }
}
