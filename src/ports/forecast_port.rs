//! Forecasting port.

use crate::domain::error::LedgerError;

pub trait Forecaster: Send + Sync {
    fn name(&self) -> &str;

    /// Predict the next `steps` closes following `closes`.
    fn predict(&self, closes: &[f64], steps: usize) -> Result<Vec<f64>, LedgerError>;
}
