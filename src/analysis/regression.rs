/// Ordinary least squares and the coefficient of determination.
///
/// The model is `Q0 = intercept + Σ coefficient_i * feature_i`. It is fitted
/// on mean-centered data by a singular value decomposition, giving the
/// minimum-norm least-squares coefficients; the intercept is recovered from
/// the means.

use nalgebra::{DMatrix, DVector};

use crate::analysis::lags::LagTable;
use crate::model::{DateWindow, GaugeFit, GaugeId, ModelError, WindowKind};

#[derive(Debug, Clone, PartialEq)]
pub struct OlsFit {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl OlsFit {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(b, x)| b * x)
                .sum::<f64>()
    }

    pub fn predict<R: AsRef<[f64]>>(&self, x: &[R]) -> Result<Vec<f64>, ModelError> {
        x.iter()
            .map(|row| {
                let row = row.as_ref();
                if row.len() != self.coefficients.len() {
                    return Err(ModelError::DimensionMismatch {
                        expected: self.coefficients.len(),
                        got: row.len(),
                    });
                }
                Ok(self.predict_row(row))
            })
            .collect()
    }
}

/// Fits an affine least-squares model of `y` on the rows of `x`.
///
/// Any non-empty input has a solution. With fewer rows than parameters, or
/// collinear and constant columns, the minimum-norm coefficients are
/// returned: singular values below `max(n, k) * eps * σ_max` are dropped
/// from the pseudo-inverse.
pub fn fit_ols<R: AsRef<[f64]>>(x: &[R], y: &[f64]) -> Result<OlsFit, ModelError> {
    let n = y.len();
    if x.len() != n {
        return Err(ModelError::DimensionMismatch {
            expected: n,
            got: x.len(),
        });
    }
    if n == 0 {
        return Err(ModelError::EmptyWindow {
            window: WindowKind::Train,
        });
    }
    let k = x[0].as_ref().len();

    let mut x_mean = vec![0.0; k];
    for row in x {
        let row = row.as_ref();
        if row.len() != k {
            return Err(ModelError::DimensionMismatch {
                expected: k,
                got: row.len(),
            });
        }
        for (m, v) in x_mean.iter_mut().zip(row) {
            *m += v;
        }
    }
    for m in x_mean.iter_mut() {
        *m /= n as f64;
    }
    let y_mean = y.iter().sum::<f64>() / n as f64;

    let coefficients = if k == 0 {
        Vec::new()
    } else {
        let centered_x = DMatrix::from_fn(n, k, |i, j| x[i].as_ref()[j] - x_mean[j]);
        let centered_y = DVector::from_fn(n, |i, _| y[i] - y_mean);

        let svd = centered_x.svd(true, true);
        let tolerance = svd.singular_values.max() * n.max(k) as f64 * f64::EPSILON;
        let beta = svd
            .solve(&centered_y, tolerance)
            .map_err(|reason| ModelError::SolveFailed(reason.to_string()))?;
        beta.iter().copied().collect()
    };

    let intercept = y_mean
        - coefficients
            .iter()
            .zip(&x_mean)
            .map(|(b, m)| b * m)
            .sum::<f64>();

    Ok(OlsFit {
        intercept,
        coefficients,
    })
}

/// Coefficient of determination, `1 - SS_res / SS_tot`, with `SS_tot`
/// taken around the mean of `actual`.
///
/// When `actual` is constant (`SS_tot == 0`) the score is 1.0 for a perfect
/// prediction and 0.0 otherwise.
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> Result<f64, ModelError> {
    if actual.len() != predicted.len() {
        return Err(ModelError::DimensionMismatch {
            expected: actual.len(),
            got: predicted.len(),
        });
    }
    if actual.is_empty() {
        return Err(ModelError::EmptyWindow {
            window: WindowKind::Test,
        });
    }

    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// Fits one gauge on the training window and scores it on the testing window.
pub fn fit_gauge(
    gauge: &GaugeId,
    table: &LagTable,
    train: DateWindow,
    test: DateWindow,
) -> Result<GaugeFit, ModelError> {
    let (x_train, y_train) = table.window(train);
    if y_train.is_empty() {
        return Err(ModelError::EmptyWindow {
            window: WindowKind::Train,
        });
    }
    let (x_test, y_test) = table.window(test);
    if y_test.is_empty() {
        return Err(ModelError::EmptyWindow {
            window: WindowKind::Test,
        });
    }

    let fit = fit_ols(&x_train, &y_train)?;
    let predicted = fit.predict(&x_test)?;
    let r_squared = r_squared(&y_test, &predicted)?;

    Ok(GaugeFit {
        gauge: gauge.clone(),
        r_squared,
        intercept: fit.intercept,
        coefficients: fit.coefficients,
        train_rows: y_train.len(),
        test_rows: y_test.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::lags::build_lag_table;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    /// Deterministic, irregular values in [0, 1).
    fn noise(i: usize) -> f64 {
        let v = ((i as f64 + 1.0) * 12.9898).sin() * 43758.5453;
        v - v.floor()
    }

    #[test]
    fn test_fit_simple_line() {
        // y = 2 + 3x
        let x: Vec<[f64; 1]> = (1..=5).map(|i| [i as f64]).collect();
        let y = vec![5.0, 8.0, 11.0, 14.0, 17.0];
        let fit = fit_ols(&x, &y).unwrap();
        assert_relative_eq!(fit.intercept, 2.0, epsilon = 1e-10);
        assert_relative_eq!(fit.coefficients[0], 3.0, epsilon = 1e-10);
    }

    #[test]
    fn test_fit_two_regressors() {
        // y = 1 + 2*x1 - 0.5*x2
        let x: Vec<[f64; 2]> = (0..40).map(|i| [noise(i) * 10.0, noise(i + 100) * 4.0]).collect();
        let y: Vec<f64> = x.iter().map(|r| 1.0 + 2.0 * r[0] - 0.5 * r[1]).collect();
        let fit = fit_ols(&x, &y).unwrap();
        assert_relative_eq!(fit.intercept, 1.0, epsilon = 1e-8);
        assert_relative_eq!(fit.coefficients[0], 2.0, epsilon = 1e-8);
        assert_relative_eq!(fit.coefficients[1], -0.5, epsilon = 1e-8);
    }

    #[test]
    fn test_collinear_features_take_minimum_norm() {
        // x2 = 2 * x1 and y = 3 * x1: every b with b1 + 2 b2 = 3 fits exactly,
        // the smallest is (3/5, 6/5).
        let x: Vec<[f64; 2]> = (0..10).map(|i| [i as f64, 2.0 * i as f64]).collect();
        let y: Vec<f64> = (0..10).map(|i| 3.0 * i as f64).collect();
        let fit = fit_ols(&x, &y).unwrap();
        assert_relative_eq!(fit.coefficients[0], 0.6, epsilon = 1e-9);
        assert_relative_eq!(fit.coefficients[1], 1.2, epsilon = 1e-9);
        assert_relative_eq!(fit.intercept, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_constant_column_gets_zero_weight() {
        let x: Vec<[f64; 2]> = (0..10).map(|i| [i as f64, 7.0]).collect();
        let y: Vec<f64> = (0..10).map(|i| 1.0 + 2.0 * i as f64).collect();
        let fit = fit_ols(&x, &y).unwrap();
        assert_relative_eq!(fit.coefficients[0], 2.0, epsilon = 1e-9);
        assert_relative_eq!(fit.coefficients[1], 0.0, epsilon = 1e-9);
        assert_relative_eq!(fit.intercept, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fewer_rows_than_parameters_interpolates() {
        // 8 rows, 11 features: the fit passes through every training point.
        let x: Vec<[f64; 11]> = (0..8)
            .map(|i| std::array::from_fn(|j| noise(i * 11 + j) * 5.0))
            .collect();
        let y: Vec<f64> = (0..8).map(|i| noise(i + 500) * 3.0).collect();
        let fit = fit_ols(&x, &y).unwrap();
        assert_eq!(fit.coefficients.len(), 11);
        for (predicted, actual) in fit.predict(&x).unwrap().iter().zip(&y) {
            assert_relative_eq!(*predicted, *actual, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_empty_input_is_an_empty_window() {
        let x: Vec<[f64; 2]> = Vec::new();
        assert_eq!(
            fit_ols(&x, &[]),
            Err(ModelError::EmptyWindow { window: WindowKind::Train })
        );
    }

    #[test]
    fn test_r_squared_values() {
        let actual = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(r_squared(&actual, &actual).unwrap(), 1.0);
        // Predicting the mean scores zero.
        assert_relative_eq!(r_squared(&actual, &[2.5; 4]).unwrap(), 0.0);
        // Worse than the mean goes negative.
        assert!(r_squared(&actual, &[4.0, 3.0, 2.0, 1.0]).unwrap() < 0.0);
    }

    #[test]
    fn test_r_squared_constant_target() {
        assert_eq!(r_squared(&[3.0, 3.0], &[3.0, 3.0]).unwrap(), 1.0);
        assert_eq!(r_squared(&[3.0, 3.0], &[3.0, 4.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_r_squared_empty_window() {
        assert!(matches!(
            r_squared(&[], &[]),
            Err(ModelError::EmptyWindow { .. })
        ));
    }

    /// A series where Q0 is exactly affine in the lag features scores 1.0
    /// when trained and tested on the same window.
    #[test]
    fn test_perfectly_linear_series_scores_one_in_sample() {
        let n = 400;
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let dates: Vec<NaiveDate> = start.iter_days().take(n).collect();

        let p: Vec<f64> = (0..n).map(|i| noise(i) * 20.0).collect();
        let b = [0.30, 0.20, 0.10, 0.05, 0.02, 0.01];
        let c = [0.40, 0.20, 0.10, 0.05, 0.02];
        let mut q = vec![0.0; n];
        for t in 0..n {
            q[t] = if t < 5 {
                noise(t + 1000)
            } else {
                0.5 + (0..6).map(|k| b[k] * p[t - k]).sum::<f64>()
                    + (1..6).map(|k| c[k - 1] * q[t - k]).sum::<f64>()
            };
        }

        let p_opt: Vec<Option<f64>> = p.iter().copied().map(Some).collect();
        let q_opt: Vec<Option<f64>> = q.iter().copied().map(Some).collect();
        let table = build_lag_table(&dates, &p_opt, &q_opt).unwrap();
        let window = DateWindow::new(dates[0], dates[n - 1]);
        let gauge = GaugeId::parse("01013500").unwrap();

        let fit = fit_gauge(&gauge, &table, window, window).unwrap();
        assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-9);
        assert_relative_eq!(fit.intercept, 0.5, epsilon = 1e-6);
        assert_relative_eq!(fit.coefficients[0], 0.30, epsilon = 1e-6);
        assert_relative_eq!(fit.coefficients[6], 0.40, epsilon = 1e-6);
        assert_eq!(fit.train_rows, n - 5);
    }

    /// Streamflow that is flat through the whole training window still
    /// yields a score: the flow lags carry no information and get zero weight.
    #[test]
    fn test_flat_training_streamflow_is_still_scored() {
        let n = 120;
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let dates: Vec<NaiveDate> = start.iter_days().take(n).collect();
        let p: Vec<Option<f64>> = (0..n).map(|i| Some(noise(i) * 10.0)).collect();
        let q: Vec<Option<f64>> = (0..n)
            .map(|i| Some(if i < 60 { 0.25 } else { noise(i + 300) }))
            .collect();
        let table = build_lag_table(&dates, &p, &q).unwrap();
        let gauge = GaugeId::parse("01013500").unwrap();

        let train = DateWindow::new(dates[0], dates[59]);
        let test = DateWindow::new(dates[65], dates[n - 1]);
        let fit = fit_gauge(&gauge, &table, train, test).unwrap();

        assert!(fit.r_squared.is_finite());
        assert_relative_eq!(fit.intercept, 0.25, epsilon = 1e-9);
        assert!(fit.coefficients.iter().all(|b| b.abs() < 1e-9));
    }

    #[test]
    fn test_short_training_window_is_still_scored() {
        let n = 60;
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let dates: Vec<NaiveDate> = start.iter_days().take(n).collect();
        let v: Vec<Option<f64>> = (0..n).map(|i| Some(noise(i))).collect();
        let w: Vec<Option<f64>> = (0..n).map(|i| Some(noise(i + 77))).collect();
        let table = build_lag_table(&dates, &v, &w).unwrap();
        let gauge = GaugeId::parse("01013500").unwrap();

        // Rows start at day 5, so this window holds 8 rows.
        let train = DateWindow::new(dates[0], dates[12]);
        let test = DateWindow::new(dates[20], dates[n - 1]);
        let fit = fit_gauge(&gauge, &table, train, test).unwrap();
        assert_eq!(fit.train_rows, 8);
        assert!(fit.r_squared.is_finite());
    }

    #[test]
    fn test_empty_windows_are_reported() {
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let dates: Vec<NaiveDate> = start.iter_days().take(50).collect();
        let v: Vec<Option<f64>> = (0..50).map(|i| Some(noise(i))).collect();
        let table = build_lag_table(&dates, &v, &v).unwrap();
        let gauge = GaugeId::parse("01013500").unwrap();

        let inside = DateWindow::new(dates[0], dates[49]);
        let outside = DateWindow::new(
            NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(1990, 12, 31).unwrap(),
        );

        assert_eq!(
            fit_gauge(&gauge, &table, outside, inside),
            Err(ModelError::EmptyWindow { window: WindowKind::Train })
        );
        assert_eq!(
            fit_gauge(&gauge, &table, inside, outside),
            Err(ModelError::EmptyWindow { window: WindowKind::Test })
        );
    }
}
