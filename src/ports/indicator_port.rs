//! Indicator calculator port trait.

use crate::domain::bar::BarSeries;
use crate::domain::error::ReplayError;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};

/// Pluggable indicator calculator. The engine declares what it wants and
/// carries the result; it does not recompute or validate the math.
pub trait IndicatorPort {
    fn compute(
        &self,
        series: &BarSeries,
        indicator: &IndicatorType,
    ) -> Result<IndicatorSeries, ReplayError>;
}
