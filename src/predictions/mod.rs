//! Forecast generation, reconciliation against observed trips, and accuracy
//! reporting.

pub mod accuracy;
pub mod generator;
pub mod heatmap;
pub mod reconcile;
pub mod types;
