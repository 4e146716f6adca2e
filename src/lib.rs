/// Regional CAMELS lagged linear-regression analysis.
///
/// For every gauge in a hydrological region: join daily precipitation and
/// streamflow, normalize streamflow by basin area and standardize it, fit
/// `Q0 ~ P0..P5 + Q1..Q5` by least squares on a fixed training window, score
/// R² on a fixed testing window, and write the score into an external
/// geospatial feature table.

pub mod analysis;
pub mod config;
pub mod discovery;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod table;
