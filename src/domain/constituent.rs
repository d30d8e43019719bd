//! Index membership over time.
//!
//! Parses symbol lists from configuration and resolves which stocks belong
//! to an index as of an evaluation date.

use chrono::NaiveDate;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstituentRecord {
    pub index_symbol: String,
    pub stock_symbol: String,
    pub stock_name: String,
    pub as_of_date: NaiveDate,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SymbolListError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, SymbolListError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(SymbolListError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(SymbolListError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// Latest snapshot date of `index_symbol` on or before `date`.
pub fn latest_snapshot_date(
    records: &[ConstituentRecord],
    index_symbol: &str,
    date: NaiveDate,
) -> Option<NaiveDate> {
    records
        .iter()
        .filter(|r| r.index_symbol == index_symbol && r.as_of_date <= date)
        .map(|r| r.as_of_date)
        .max()
}

/// Members of `index_symbol` in its latest snapshot on or before `date`,
/// sorted by stock symbol with duplicates removed.
pub fn resolve_membership<'a>(
    records: &'a [ConstituentRecord],
    index_symbol: &str,
    date: NaiveDate,
) -> Vec<&'a ConstituentRecord> {
    let Some(snapshot) = latest_snapshot_date(records, index_symbol, date) else {
        return Vec::new();
    };

    let mut members: Vec<&ConstituentRecord> = records
        .iter()
        .filter(|r| r.index_symbol == index_symbol && r.as_of_date == snapshot)
        .collect();
    members.sort_by(|a, b| a.stock_symbol.cmp(&b.stock_symbol));
    members.dedup_by(|a, b| a.stock_symbol == b.stock_symbol);
    members
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: &str, stock: &str, as_of: &str) -> ConstituentRecord {
        ConstituentRecord {
            index_symbol: index.into(),
            stock_symbol: stock.into(),
            stock_name: format!("{stock} Co"),
            as_of_date: NaiveDate::parse_from_str(as_of, "%Y-%m-%d").unwrap(),
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_symbols_basic() {
        let result = parse_symbols("399372,399374,000015").unwrap();
        assert_eq!(result, vec!["399372", "399374", "000015"]);
    }

    #[test]
    fn test_parse_symbols_trims_and_uppercases() {
        let result = parse_symbols("  spy , qqq ").unwrap();
        assert_eq!(result, vec!["SPY", "QQQ"]);
    }

    #[test]
    fn test_parse_symbols_empty_token() {
        assert!(matches!(parse_symbols("A,,B"), Err(SymbolListError::EmptyToken)));
    }

    #[test]
    fn test_parse_symbols_duplicate() {
        let result = parse_symbols("A,B,a");
        assert!(matches!(result, Err(SymbolListError::DuplicateSymbol(s)) if s == "A"));
    }

    #[test]
    fn membership_uses_latest_snapshot() {
        let records = vec![
            record("IDX", "AAA", "2023-06-01"),
            record("IDX", "BBB", "2023-06-01"),
            record("IDX", "AAA", "2023-12-01"),
            record("IDX", "CCC", "2023-12-01"),
        ];
        let members = resolve_membership(&records, "IDX", date("2024-01-05"));
        let symbols: Vec<&str> = members.iter().map(|r| r.stock_symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAA", "CCC"]);
    }

    #[test]
    fn membership_ignores_future_snapshot() {
        let records = vec![
            record("IDX", "AAA", "2023-06-01"),
            record("IDX", "ZZZ", "2024-02-01"),
        ];
        let members = resolve_membership(&records, "IDX", date("2024-01-05"));
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].stock_symbol, "AAA");
    }

    #[test]
    fn membership_empty_before_first_snapshot() {
        let records = vec![record("IDX", "AAA", "2024-06-01")];
        assert!(resolve_membership(&records, "IDX", date("2024-01-05")).is_empty());
    }

    #[test]
    fn membership_filters_by_index() {
        let records = vec![
            record("IDX", "AAA", "2023-06-01"),
            record("OTHER", "BBB", "2023-06-01"),
        ];
        let members = resolve_membership(&records, "IDX", date("2024-01-05"));
        assert_eq!(members.len(), 1);
    }

    #[test]
    fn latest_snapshot_none_for_unknown_index() {
        let records = vec![record("IDX", "AAA", "2023-06-01")];
        assert_eq!(latest_snapshot_date(&records, "NOPE", date("2024-01-01")), None);
    }
}
