//! Data access port trait (the Data Provider collaborator).
//!
//! Every failure is reported as `RotatorError::DataUnavailable`; callers
//! treat it as missing data, never as a reason to retry.

use crate::domain::constituent::ConstituentRecord;
use crate::domain::error::RotatorError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::valuation::ValuationPoint;
use chrono::NaiveDate;

pub trait DataPort {
    fn get_price_series(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, RotatorError>;

    /// All membership snapshots of `index_symbol` dated on or before `as_of`.
    fn get_constituents(
        &self,
        index_symbol: &str,
        as_of: NaiveDate,
    ) -> Result<Vec<ConstituentRecord>, RotatorError>;

    fn get_valuation_series(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<ValuationPoint>, RotatorError>;

    fn list_symbols(&self) -> Result<Vec<String>, RotatorError>;

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, RotatorError>;
}
