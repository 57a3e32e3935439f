//! Canonical portfolio snapshots.
//!
//! The engine's extraction result is assembled into a self-contained
//! snapshot document: accounts, holdings with nested cost basis and market
//! data, cash entries, totals, and validation notes. Snapshots are
//! persisted as pretty JSON under the snapshots directory, with a
//! `latest.json` pointer and an optional holdings CSV export next to them.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extract::Extraction;

pub const SNAPSHOT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub snapshot_id: String,
    pub timestamp: String,
    pub version: String,
    pub source: Source,
    pub accounts: Vec<Account>,
    pub holdings: Vec<SnapshotHolding>,
    pub cash: Vec<CashEntry>,
    pub totals: Totals,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub broker: String,
    pub export_date: String,
    pub import_method: String,
    pub source_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub account_type: String,
    pub account_name: String,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotHolding {
    pub security_id: String,
    pub security_type: String,
    pub name: Option<String>,
    pub isin: String,
    pub quantity: Option<f64>,
    pub currency: String,
    pub account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_basis: Option<CostBasis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_data: Option<MarketData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostBasis {
    pub average_price: f64,
    pub total_cost: Option<f64>,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketData {
    pub price: Option<f64>,
    pub market_value: Option<f64>,
    pub currency: String,
    pub price_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashEntry {
    pub currency: String,
    pub amount: Option<f64>,
    pub cash_type: String,
    pub account_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Totals {
    pub base_currency: String,
    pub total_market_value: f64,
    pub total_cash: f64,
    pub total_portfolio_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub validation_status: String,
    pub validation_notes: Vec<String>,
    pub notes: String,
}

/// Assemble a canonical snapshot from an extraction run.
///
/// `now` is passed in rather than read from the clock so snapshot assembly
/// stays deterministic under test; every engine warning is carried into
/// the validation notes verbatim, never summarized away.
pub fn build_snapshot(
    extraction: &Extraction,
    source_file: &str,
    account_name: &str,
    broker: &str,
    base_currency: &str,
    now: DateTime<Utc>,
) -> Snapshot {
    let snapshot_id = now.format("%Y-%m-%d-%H%M%S").to_string();
    let account_id = format!(
        "{}_{}",
        broker.to_lowercase().replace(' ', "_"),
        account_name
    );

    let holdings: Vec<SnapshotHolding> = extraction
        .holdings
        .iter()
        .map(|h| {
            let cost_basis = h.avg_buy_price.map(|average_price| CostBasis {
                average_price,
                total_cost: h.quantity.map(|q| q * average_price),
                currency: h.currency.clone(),
            });
            let market_data = if h.current_price.is_some() || h.market_value.is_some() {
                Some(MarketData {
                    price: h.current_price,
                    market_value: h.market_value,
                    currency: h.currency.clone(),
                    price_date: now.to_rfc3339(),
                })
            } else {
                None
            };
            SnapshotHolding {
                security_id: h.isin.clone(),
                security_type: "stock".to_string(),
                name: h.name.clone(),
                isin: h.isin.clone(),
                quantity: h.quantity,
                currency: h.currency.clone(),
                account_id: account_id.clone(),
                cost_basis,
                market_data,
            }
        })
        .collect();

    let cash: Vec<CashEntry> = extraction
        .cash
        .iter()
        .map(|c| CashEntry {
            currency: c.currency.clone(),
            amount: c.amount,
            cash_type: "available".to_string(),
            account_id: account_id.clone(),
        })
        .collect();

    let total_market_value: f64 = holdings
        .iter()
        .filter_map(|h| h.market_data.as_ref().and_then(|m| m.market_value))
        .sum();
    let total_cash: f64 = cash.iter().filter_map(|c| c.amount).sum();

    let mut validation_notes = Vec::new();
    let incomplete = holdings
        .iter()
        .filter(|h| h.cost_basis.is_none() || h.market_data.is_none())
        .count();
    if incomplete > 0 {
        validation_notes.push(format!(
            "{incomplete} holdings have incomplete data (missing prices or cost basis)"
        ));
    }
    for warning in &extraction.warnings {
        validation_notes.push(format!("Parser warning: {}", warning.message));
    }

    Snapshot {
        snapshot_id,
        timestamp: now.to_rfc3339(),
        version: SNAPSHOT_VERSION.to_string(),
        source: Source {
            broker: broker.to_string(),
            export_date: now.format("%Y-%m-%d").to_string(),
            import_method: "pdf_ingestion".to_string(),
            source_file: source_file.to_string(),
        },
        accounts: vec![Account {
            account_id,
            account_type: "taxable".to_string(),
            account_name: format!("{broker} ({account_name})"),
            currency: base_currency.to_string(),
        }],
        holdings,
        cash,
        totals: Totals {
            base_currency: base_currency.to_string(),
            total_market_value,
            total_cash,
            total_portfolio_value: total_market_value + total_cash,
        },
        metadata: Metadata {
            validation_status: "pending".to_string(),
            validation_notes,
            notes: format!("Imported from {source_file}"),
        },
    }
}

/// Write the snapshot JSON under `snapshots_dir`.
pub fn write_snapshot(snapshot: &Snapshot, snapshots_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(snapshots_dir)
        .with_context(|| format!("creating {}", snapshots_dir.display()))?;
    let path = snapshots_dir.join(format!("{}.json", snapshot.snapshot_id));
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestPointer {
    pub snapshot_id: String,
    pub timestamp: String,
    pub snapshot_file: String,
}

/// Update `latest.json` to point at the most recent snapshot.
pub fn write_latest(snapshot: &Snapshot, portfolio_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(portfolio_dir)
        .with_context(|| format!("creating {}", portfolio_dir.display()))?;
    let path = portfolio_dir.join("latest.json");
    let latest = LatestPointer {
        snapshot_id: snapshot.snapshot_id.clone(),
        timestamp: snapshot.timestamp.clone(),
        snapshot_file: format!("snapshots/{}.json", snapshot.snapshot_id),
    };
    fs::write(&path, serde_json::to_string_pretty(&latest)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// Write the convenience holdings CSV for a snapshot.
pub fn write_csv_export(snapshot: &Snapshot, exports_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(exports_dir)
        .with_context(|| format!("creating {}", exports_dir.display()))?;
    let path = exports_dir.join(format!("{}_holdings.csv", snapshot.snapshot_id));
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("creating {}", path.display()))?;

    writer.write_record([
        "security_id",
        "name",
        "isin",
        "quantity",
        "currency",
        "avg_price",
        "current_price",
        "market_value",
        "cost_basis",
    ])?;
    for h in &snapshot.holdings {
        let fmt = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
        writer.write_record([
            h.security_id.clone(),
            h.name.clone().unwrap_or_default(),
            h.isin.clone(),
            fmt(h.quantity),
            h.currency.clone(),
            fmt(h.cost_basis.as_ref().map(|c| c.average_price)),
            fmt(h.market_data.as_ref().and_then(|m| m.price)),
            fmt(h.market_data.as_ref().and_then(|m| m.market_value)),
            fmt(h.cost_basis.as_ref().and_then(|c| c.total_cost)),
        ])?;
    }
    writer.flush()?;
    Ok(path)
}

/// Result of a structural snapshot check.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Structurally validate a snapshot JSON file: required keys, holdings
/// shape, totals shape. This is a sanity gate, not a schema engine.
pub fn validate_snapshot_file(path: &Path) -> Result<ValidationReport> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(validate_snapshot_value(&value))
}

pub fn validate_snapshot_value(value: &serde_json::Value) -> ValidationReport {
    let mut errors = Vec::new();

    let Some(object) = value.as_object() else {
        return ValidationReport {
            valid: false,
            errors: vec!["snapshot root is not a JSON object".to_string()],
        };
    };

    for key in [
        "snapshot_id",
        "timestamp",
        "version",
        "source",
        "accounts",
        "holdings",
        "cash",
        "totals",
        "metadata",
    ] {
        if !object.contains_key(key) {
            errors.push(format!("missing required key: {key}"));
        }
    }

    match object.get("holdings").and_then(|h| h.as_array()) {
        Some(holdings) => {
            for (i, holding) in holdings.iter().enumerate() {
                for key in ["security_id", "isin", "currency", "account_id"] {
                    if holding.get(key).and_then(|v| v.as_str()).is_none() {
                        errors.push(format!("holdings[{i}]: missing or non-string {key}"));
                    }
                }
            }
        }
        None => {
            if object.contains_key("holdings") {
                errors.push("holdings is not an array".to_string());
            }
        }
    }

    if let Some(totals) = object.get("totals") {
        for key in ["total_market_value", "total_cash", "total_portfolio_value"] {
            if totals.get(key).and_then(|v| v.as_f64()).is_none() {
                errors.push(format!("totals: missing or non-numeric {key}"));
            }
        }
    }

    if let Some(cash) = object.get("cash") {
        if !cash.is_array() {
            errors.push("cash is not an array".to_string());
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{CashPosition, ExtractedHolding, ParseWarning};
    use chrono::TimeZone;

    fn holding(isin: &str) -> ExtractedHolding {
        ExtractedHolding {
            name: Some("Apple Inc.".to_string()),
            isin: isin.to_string(),
            quantity: Some(10.0),
            avg_buy_price: Some(150.00),
            current_price: Some(175.50),
            market_value: Some(1755.00),
            currency: "EUR".to_string(),
            source_line_index: 4,
        }
    }

    fn extraction() -> Extraction {
        Extraction {
            holdings: vec![holding("US0378331005")],
            cash: Some(CashPosition {
                amount: Some(1234.56),
                currency: "EUR".to_string(),
            }),
            warnings: vec![],
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 30, 12, 30, 45).unwrap()
    }

    #[test]
    fn test_snapshot_structure_and_id() {
        let snap = build_snapshot(
            &extraction(),
            "statement.pdf",
            "main",
            "Trade Republic",
            "EUR",
            fixed_now(),
        );
        assert_eq!(snap.snapshot_id, "2026-06-30-123045");
        assert_eq!(snap.version, SNAPSHOT_VERSION);
        assert_eq!(snap.accounts.len(), 1);
        assert_eq!(snap.accounts[0].account_id, "trade_republic_main");
        assert_eq!(snap.holdings[0].account_id, "trade_republic_main");
        assert_eq!(snap.cash[0].account_id, "trade_republic_main");
    }

    #[test]
    fn test_totals() {
        let mut ex = extraction();
        ex.holdings.push(ExtractedHolding {
            market_value: Some(3762.50),
            ..holding("IE00B4L5Y983")
        });
        let snap = build_snapshot(&ex, "s.pdf", "main", "Trade Republic", "EUR", fixed_now());
        assert!((snap.totals.total_market_value - (1755.00 + 3762.50)).abs() < 0.01);
        assert!((snap.totals.total_cash - 1234.56).abs() < 0.01);
        assert!(
            (snap.totals.total_portfolio_value - (1755.00 + 3762.50 + 1234.56)).abs() < 0.01
        );
    }

    #[test]
    fn test_cost_basis_total_cost() {
        let snap = build_snapshot(
            &extraction(),
            "s.pdf",
            "main",
            "Trade Republic",
            "EUR",
            fixed_now(),
        );
        let cb = snap.holdings[0].cost_basis.as_ref().unwrap();
        assert!((cb.average_price - 150.00).abs() < 0.01);
        assert!((cb.total_cost.unwrap() - 1500.00).abs() < 0.01);
    }

    #[test]
    fn test_missing_cost_basis_and_market_data() {
        let mut ex = extraction();
        ex.holdings[0].avg_buy_price = None;
        ex.holdings[0].current_price = None;
        ex.holdings[0].market_value = None;
        let snap = build_snapshot(&ex, "s.pdf", "main", "Trade Republic", "EUR", fixed_now());
        assert!(snap.holdings[0].cost_basis.is_none());
        assert!(snap.holdings[0].market_data.is_none());
        assert!((snap.totals.total_market_value).abs() < f64::EPSILON);
        assert!(snap
            .metadata
            .validation_notes
            .iter()
            .any(|n| n.contains("incomplete data")));
    }

    #[test]
    fn test_parser_warnings_surface_in_notes() {
        let mut ex = extraction();
        ex.warnings.push(ParseWarning::new(
            "no_cash_position",
            "could not extract cash position",
            None,
        ));
        let snap = build_snapshot(&ex, "s.pdf", "main", "Trade Republic", "EUR", fixed_now());
        assert!(snap
            .metadata
            .validation_notes
            .iter()
            .any(|n| n == "Parser warning: could not extract cash position"));
    }

    #[test]
    fn test_write_and_validate_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let snap = build_snapshot(
            &extraction(),
            "s.pdf",
            "main",
            "Trade Republic",
            "EUR",
            fixed_now(),
        );
        let path = write_snapshot(&snap, &dir.path().join("snapshots")).unwrap();
        let report = validate_snapshot_file(&path).unwrap();
        assert!(report.valid, "errors: {:?}", report.errors);

        let latest = write_latest(&snap, dir.path()).unwrap();
        let raw = fs::read_to_string(latest).unwrap();
        let pointer: LatestPointer = serde_json::from_str(&raw).unwrap();
        assert_eq!(pointer.snapshot_id, snap.snapshot_id);
    }

    #[test]
    fn test_validate_flags_broken_snapshot() {
        let value = serde_json::json!({
            "snapshot_id": "x",
            "holdings": [{ "isin": "US0378331005" }]
        });
        let report = validate_snapshot_value(&value);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("timestamp")));
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("holdings[0]") && e.contains("security_id")));
    }

    #[test]
    fn test_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let snap = build_snapshot(
            &extraction(),
            "s.pdf",
            "main",
            "Trade Republic",
            "EUR",
            fixed_now(),
        );
        let path = write_csv_export(&snap, dir.path()).unwrap();
        let content = fs::read_to_string(path).unwrap();
        let mut lines = content.lines();
        assert!(lines.next().unwrap().starts_with("security_id,name,isin"));
        let row = lines.next().unwrap();
        assert!(row.contains("US0378331005"));
        assert!(row.contains("Apple Inc."));
        assert!(row.contains("1755"));
    }
}
