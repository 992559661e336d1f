//! Financial health derivation: turns a company's fact table into a fixed
//! schema of primary facts and derived ratios, with explicit provenance for
//! every missing value. Pure; the caller persists the result.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::edgar::facts::{FactRow, FactTable};

/// String sentinel standing in for an absent numeric value.
pub const SENTINEL: &str = "N/A";

/// The one reason string ever attached to a missing metric.
pub const MISSING_REASON: &str = "Unable to locate parameter in data sheets";

/// A metric value: integral for monetary primaries, floating point for
/// ratios, or the `"N/A"` sentinel when absent. Serializes as a bare number
/// or the sentinel string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Missing,
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Int(v) => serializer.serialize_i64(*v),
            MetricValue::Float(v) => serializer.serialize_f64(*v),
            MetricValue::Missing => serializer.serialize_str(SENTINEL),
        }
    }
}

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Ok(MetricValue::Int(v))
                } else if let Some(v) = n.as_f64() {
                    Ok(MetricValue::Float(v))
                } else {
                    Err(D::Error::custom("metric value out of range"))
                }
            }
            serde_json::Value::String(s) if s == SENTINEL => Ok(MetricValue::Missing),
            other => Err(D::Error::custom(format!(
                "expected number or \"N/A\", got {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricResult {
    pub value: MetricValue,
    pub definition: String,
    pub is_missing: bool,
    pub missing_reason: String,
    pub is_derived: bool,
    pub derivation_note: String,
}

impl MetricResult {
    fn present(value: MetricValue, definition: &str) -> Self {
        Self {
            value,
            definition: definition.to_string(),
            is_missing: false,
            missing_reason: SENTINEL.to_string(),
            is_derived: false,
            derivation_note: SENTINEL.to_string(),
        }
    }

    fn missing(definition: &str) -> Self {
        Self {
            value: MetricValue::Missing,
            definition: definition.to_string(),
            is_missing: true,
            missing_reason: MISSING_REASON.to_string(),
            is_derived: false,
            derivation_note: SENTINEL.to_string(),
        }
    }

    fn derived(value: f64, definition: &str, note: &str) -> Self {
        Self {
            value: MetricValue::Float(value),
            definition: definition.to_string(),
            is_missing: false,
            missing_reason: SENTINEL.to_string(),
            is_derived: true,
            derivation_note: note.to_string(),
        }
    }

    fn missing_derived(definition: &str, note: &str) -> Self {
        Self {
            value: MetricValue::Missing,
            definition: definition.to_string(),
            is_missing: true,
            missing_reason: MISSING_REASON.to_string(),
            is_derived: true,
            derivation_note: note.to_string(),
        }
    }
}

/// The fixed metric schema: nine primary facts and nine derived ratios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculatedMetrics {
    pub assets: MetricResult,
    pub liabilities: MetricResult,
    pub equity: MetricResult,
    pub revenue: MetricResult,
    pub expenses: MetricResult,
    pub net_income: MetricResult,
    pub operating_activities: MetricResult,
    pub investing_activities: MetricResult,
    pub financing_activities: MetricResult,
    pub current_ratio: MetricResult,
    pub quick_ratio: MetricResult,
    pub debt_to_equity_ratio: MetricResult,
    pub interest_coverage_ratio: MetricResult,
    pub gross_margin_ratio: MetricResult,
    pub operating_margin_ratio: MetricResult,
    pub net_margin_ratio: MetricResult,
    pub inventory_turnover_ratio: MetricResult,
    pub asset_turnover_ratio: MetricResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialHealthReport {
    /// Source rows contributing to the report, keyed by row index, kept for
    /// audit and debugging.
    pub raw: BTreeMap<String, FactRow>,
    pub calculated: CalculatedMetrics,
}

impl FinancialHealthReport {
    /// Fiscal period and year reported by the first source row, when it
    /// carries them.
    pub fn first_reporting_period(&self) -> (Option<String>, Option<i32>) {
        match self.raw.get("0") {
            Some(row) => (row.fp.clone(), row.fy),
            None => (None, None),
        }
    }
}

const ASSETS_DEF: &str = "Resources owned by a company that provide economic value.";
const LIABILITIES_DEF: &str = "Obligations or debts a company owes to others.";
const EQUITY_DEF: &str =
    "The residual interest in the company's assets after deducting liabilities.";
const REVENUE_DEF: &str = "Total income generated from the sale of goods or services.";
const EXPENSES_DEF: &str = "Costs incurred to generate revenue and operate the business.";
const NET_INCOME_DEF: &str =
    "Profit remaining after all expenses, taxes, and costs are deducted from revenue.";
const OPERATING_ACT_DEF: &str = "Cash flows from a company's primary business operations.";
const INVESTING_ACT_DEF: &str =
    "Cash flows related to the acquisition or sale of long-term assets and investments.";
const FINANCING_ACT_DEF: &str =
    "Cash flows from transactions involving debt, equity, and dividend payments.";

const CURRENT_RATIO_DEF: &str =
    "Measures a company's ability to pay short-term obligations with its current assets.";
const CURRENT_RATIO_NOTE: &str = "calculated by (current assets) / (current liabilities)";
const QUICK_RATIO_DEF: &str =
    "Assesses liquidity by comparing liquid assets to current liabilities, excluding inventory.";
const QUICK_RATIO_NOTE: &str = "calculated by (cash and cash equivalents + short term investments + account receivables) / (current liabilities)";
const DEBT_TO_EQUITY_DEF: &str =
    "Evaluates financial leverage by comparing total debt to shareholders' equity.";
const DEBT_TO_EQUITY_NOTE: &str = "calculated by (liabilities) / (stock holder equity)";
const INTEREST_COVERAGE_DEF: &str =
    "Indicates how easily a company can cover interest payments with its operating income.";
const INTEREST_COVERAGE_NOTE: &str =
    "calculated by (earnings before interest and taxes) / (interest expense)";
const GROSS_MARGIN_DEF: &str =
    "Percentage of revenue remaining after subtracting cost of goods sold.";
const GROSS_MARGIN_NOTE: &str = "calculated by (gross profit) / (revenue)";
const OPERATING_MARGIN_DEF: &str =
    "Shows the percentage of revenue left after covering operating expenses.";
const OPERATING_MARGIN_NOTE: &str = "calculated by (operating income) / (revenue)";
const NET_MARGIN_DEF: &str =
    "Represents the percentage of revenue remaining as profit after all expenses.";
const NET_MARGIN_NOTE: &str = "calculated by (net income) / (revenue)";
const INVENTORY_TURNOVER_DEF: &str =
    "Measures how efficiently a company sells and replaces its inventory over a period.";
const INVENTORY_TURNOVER_NOTE: &str = "calculated by (cost of revenue) / (inventory)";
const ASSET_TURNOVER_DEF: &str =
    "Indicates how effectively a company uses its assets to generate revenue.";
const ASSET_TURNOVER_NOTE: &str = "calculated by (revenue) / (property plant and equipment)";

fn monetary(value: f64) -> MetricValue {
    if value.fract() == 0.0 {
        MetricValue::Int(value as i64)
    } else {
        MetricValue::Float(value)
    }
}

fn retrieve_full(table: &FactTable, fact_name: &str, definition: &str) -> MetricResult {
    match table.latest(fact_name) {
        Some(v) => MetricResult::present(monetary(v), definition),
        None => MetricResult::missing(definition),
    }
}

/// Derives the full financial health report from a fact table already
/// filtered to one accession number.
pub fn derive(table: &FactTable) -> FinancialHealthReport {
    let raw = table
        .rows()
        .iter()
        .enumerate()
        .map(|(idx, row)| (idx.to_string(), row.clone()))
        .collect();

    // Primary facts, selected by maximum timestamp.
    let assets_val = table.latest("Assets");
    let equity_val = table.latest("StockholdersEquity");
    let revenue_val = table.latest("Revenues");
    let net_income_val = table.latest("NetIncomeLoss");

    let assets = retrieve_full(table, "Assets", ASSETS_DEF);
    let equity = retrieve_full(table, "StockholdersEquity", EQUITY_DEF);
    let revenue = retrieve_full(table, "Revenues", REVENUE_DEF);
    let net_income = retrieve_full(table, "NetIncomeLoss", NET_INCOME_DEF);

    let liabilities = match (assets_val, equity_val) {
        (Some(a), Some(e)) => {
            MetricResult::present(MetricValue::Int(a as i64 - e as i64), LIABILITIES_DEF)
        }
        _ => MetricResult::missing(LIABILITIES_DEF),
    };

    let expenses = match (revenue_val, net_income_val) {
        (Some(r), Some(n)) => {
            MetricResult::present(MetricValue::Int(r as i64 - n as i64), EXPENSES_DEF)
        }
        _ => MetricResult::missing(EXPENSES_DEF),
    };

    let operating_activities = retrieve_full(
        table,
        "NetCashProvidedByUsedInOperatingActivities",
        OPERATING_ACT_DEF,
    );
    let investing_activities = retrieve_full(
        table,
        "NetCashProvidedByUsedInInvestingActivities",
        INVESTING_ACT_DEF,
    );
    let financing_activities = retrieve_full(
        table,
        "NetCashProvidedByUsedInFinancingActivities",
        FINANCING_ACT_DEF,
    );

    // Intermediate values for the ratios carry no presence metadata.
    let current_assets = table.latest("AssetsCurrent");
    let current_liabilities = table.latest("LiabilitiesCurrent");
    let cash_and_equivalents = table.latest("CashAndCashEquivalentsAtCarryingValue");
    let short_term_investments = table.latest("ShortTermInvestments");
    let accounts_receivable = table.latest("AccountsReceivableNetCurrent");
    let cost_of_goods_sold = table.latest("CostOfGoodsAndServicesSold");
    let operating_income = table.latest("OperatingIncomeLoss");
    let interest_expense = table.latest("InterestAndDebtExpense");
    let gross_profit = table.latest("GrossProfit");
    let cost_of_revenue = table.latest("CostOfRevenue");
    let inventory = table.latest("InventoryNet");
    let net_ppe = table.latest("PropertyPlantAndEquipmentNet");

    let current_ratio = match (current_assets, current_liabilities) {
        (Some(ca), Some(cl)) => MetricResult::derived(ca / cl, CURRENT_RATIO_DEF, CURRENT_RATIO_NOTE),
        _ => MetricResult::missing_derived(CURRENT_RATIO_DEF, CURRENT_RATIO_NOTE),
    };

    let quick_ratio = match (
        cash_and_equivalents,
        short_term_investments,
        accounts_receivable,
        current_liabilities,
    ) {
        (Some(cash), Some(sti), Some(ar), Some(cl)) => {
            MetricResult::derived((cash + sti + ar) / cl, QUICK_RATIO_DEF, QUICK_RATIO_NOTE)
        }
        _ => MetricResult::missing_derived(QUICK_RATIO_DEF, QUICK_RATIO_NOTE),
    };

    let debt_to_equity_ratio = match (assets_val, equity_val) {
        (Some(a), Some(e)) => {
            MetricResult::derived((a - e) / e, DEBT_TO_EQUITY_DEF, DEBT_TO_EQUITY_NOTE)
        }
        _ => MetricResult::missing_derived(DEBT_TO_EQUITY_DEF, DEBT_TO_EQUITY_NOTE),
    };

    let interest_coverage_ratio = match (
        revenue_val,
        cost_of_goods_sold,
        operating_income,
        interest_expense,
    ) {
        (Some(r), Some(cogs), Some(oi), Some(ie)) => MetricResult::derived(
            (r - cogs - oi) / ie,
            INTEREST_COVERAGE_DEF,
            INTEREST_COVERAGE_NOTE,
        ),
        _ => MetricResult::missing_derived(INTEREST_COVERAGE_DEF, INTEREST_COVERAGE_NOTE),
    };

    let gross_margin_ratio = match (gross_profit, revenue_val) {
        (Some(gp), Some(r)) => MetricResult::derived(gp / r, GROSS_MARGIN_DEF, GROSS_MARGIN_NOTE),
        _ => MetricResult::missing_derived(GROSS_MARGIN_DEF, GROSS_MARGIN_NOTE),
    };

    let operating_margin_ratio = match (operating_income, revenue_val) {
        (Some(oi), Some(r)) => {
            MetricResult::derived(oi / r, OPERATING_MARGIN_DEF, OPERATING_MARGIN_NOTE)
        }
        _ => MetricResult::missing_derived(OPERATING_MARGIN_DEF, OPERATING_MARGIN_NOTE),
    };

    let net_margin_ratio = match (net_income_val, revenue_val) {
        (Some(ni), Some(r)) => MetricResult::derived(ni / r, NET_MARGIN_DEF, NET_MARGIN_NOTE),
        _ => MetricResult::missing_derived(NET_MARGIN_DEF, NET_MARGIN_NOTE),
    };

    let inventory_turnover_ratio = match (cost_of_revenue, inventory) {
        (Some(cor), Some(inv)) => {
            MetricResult::derived(cor / inv, INVENTORY_TURNOVER_DEF, INVENTORY_TURNOVER_NOTE)
        }
        _ => MetricResult::missing_derived(INVENTORY_TURNOVER_DEF, INVENTORY_TURNOVER_NOTE),
    };

    let asset_turnover_ratio = match (revenue_val, net_ppe) {
        (Some(r), Some(ppe)) => {
            MetricResult::derived(r / ppe, ASSET_TURNOVER_DEF, ASSET_TURNOVER_NOTE)
        }
        _ => MetricResult::missing_derived(ASSET_TURNOVER_DEF, ASSET_TURNOVER_NOTE),
    };

    FinancialHealthReport {
        raw,
        calculated: CalculatedMetrics {
            assets,
            liabilities,
            equity,
            revenue,
            expenses,
            net_income,
            operating_activities,
            investing_activities,
            financing_activities,
            current_ratio,
            quick_ratio,
            debt_to_equity_ratio,
            interest_coverage_ratio,
            gross_margin_ratio,
            operating_margin_ratio,
            net_margin_ratio,
            inventory_turnover_ratio,
            asset_turnover_ratio,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fact: &str, end: &str, val: f64) -> FactRow {
        FactRow {
            namespace: "us-gaap".to_string(),
            fact: fact.to_string(),
            accn: "X1".to_string(),
            end: end.to_string(),
            val,
            fp: Some("FY".to_string()),
            fy: Some(2023),
            timestamp: 0,
        }
    }

    fn table(rows: Vec<FactRow>) -> FactTable {
        FactTable::from_rows(rows, "X1").unwrap()
    }

    #[test]
    fn test_liabilities_derive_from_assets_and_equity() {
        let report = derive(&table(vec![
            row("Assets", "2023-12-31", 1000.0),
            row("StockholdersEquity", "2023-12-31", 400.0),
        ]));
        let liabilities = &report.calculated.liabilities;
        assert_eq!(liabilities.value, MetricValue::Int(600));
        assert!(!liabilities.is_missing);
        assert_eq!(liabilities.missing_reason, SENTINEL);
    }

    #[test]
    fn test_missing_constituent_marks_ratio_missing() {
        // Current assets present, current liabilities absent.
        let report = derive(&table(vec![row("AssetsCurrent", "2023-12-31", 500.0)]));
        let ratio = &report.calculated.current_ratio;
        assert!(ratio.is_missing);
        assert_eq!(ratio.value, MetricValue::Missing);
        assert_eq!(ratio.missing_reason, MISSING_REASON);
        assert!(ratio.is_derived);
    }

    #[test]
    fn test_current_ratio_is_float() {
        let report = derive(&table(vec![
            row("AssetsCurrent", "2023-12-31", 500.0),
            row("LiabilitiesCurrent", "2023-12-31", 200.0),
        ]));
        assert_eq!(
            report.calculated.current_ratio.value,
            MetricValue::Float(2.5)
        );
        assert!(report.calculated.current_ratio.is_derived);
        assert_eq!(
            report.calculated.current_ratio.derivation_note,
            CURRENT_RATIO_NOTE
        );
    }

    #[test]
    fn test_expenses_derive_from_revenue_and_net_income() {
        let report = derive(&table(vec![
            row("Revenues", "2023-12-31", 900.0),
            row("NetIncomeLoss", "2023-12-31", 150.0),
        ]));
        assert_eq!(report.calculated.expenses.value, MetricValue::Int(750));
        assert!(!report.calculated.expenses.is_derived);
        assert_eq!(
            report.calculated.net_margin_ratio.value,
            MetricValue::Float(150.0 / 900.0)
        );
    }

    #[test]
    fn test_cash_flow_facts_pass_through() {
        let report = derive(&table(vec![row(
            "NetCashProvidedByUsedInOperatingActivities",
            "2023-12-31",
            42.0,
        )]));
        assert_eq!(
            report.calculated.operating_activities.value,
            MetricValue::Int(42)
        );
        assert!(report.calculated.investing_activities.is_missing);
    }

    #[test]
    fn test_latest_period_wins() {
        let report = derive(&table(vec![
            row("Assets", "2022-12-31", 900.0),
            row("Assets", "2023-12-31", 1000.0),
        ]));
        assert_eq!(report.calculated.assets.value, MetricValue::Int(1000));
    }

    #[test]
    fn test_raw_rows_keyed_by_index() {
        let report = derive(&table(vec![
            row("Assets", "2023-12-31", 1000.0),
            row("StockholdersEquity", "2023-12-31", 400.0),
        ]));
        assert_eq!(report.raw.len(), 2);
        assert_eq!(report.raw.get("0").unwrap().fact, "Assets");
        assert_eq!(
            report.first_reporting_period(),
            (Some("FY".to_string()), Some(2023))
        );
    }

    #[test]
    fn test_metric_value_serialization() {
        assert_eq!(
            serde_json::to_string(&MetricValue::Int(600)).unwrap(),
            "600"
        );
        assert_eq!(
            serde_json::to_string(&MetricValue::Missing).unwrap(),
            "\"N/A\""
        );
        let back: MetricValue = serde_json::from_str("\"N/A\"").unwrap();
        assert_eq!(back, MetricValue::Missing);
        let back: MetricValue = serde_json::from_str("2.5").unwrap();
        assert_eq!(back, MetricValue::Float(2.5));
    }
}
