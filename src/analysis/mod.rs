/// Time-series assembly and per-gauge modeling.
///
/// Submodules:
/// - `join`      : aligns per-gauge series onto shared date axes.
/// - `normalize` : sentinel replacement, area normalization, standardization.
/// - `lags`      : lagged feature table (P0..P5, Q0..Q5).
/// - `regression`: OLS fit and coefficient of determination.

pub mod join;
pub mod lags;
pub mod normalize;
pub mod regression;
