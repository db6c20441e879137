// src/backtest/catalog.rs
// Model funds and benchmark definitions

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::backtest::types::{Allocation, Benchmark, BenchmarkDefinition, FundDefinition, Rebalance};
use crate::error::{Error, Result};

/// Annual fee every built-in fund defaults to (20 bps)
pub const DEFAULT_FEE: f64 = 0.002;

/// The funds and benchmarks a backtest can be run against
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Catalog {
    pub funds: Vec<FundDefinition>,
    pub benchmarks: Vec<Benchmark>,
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog::builtin()
    }
}

impl Catalog {
    /// Load a catalog from a JSON file shaped like `{"funds": [..], "benchmarks": [..]}`
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let catalog: Catalog = serde_json::from_str(&raw)?;
        Ok(catalog)
    }

    pub fn fund(&self, id: &str) -> Result<&FundDefinition> {
        self.funds
            .iter()
            .find(|f| f.id == id)
            .ok_or_else(|| Error::UnknownFund(id.to_string()))
    }

    pub fn benchmark(&self, id: &str) -> Result<&Benchmark> {
        self.benchmarks
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| Error::UnknownBenchmark(id.to_string()))
    }

    /// Resolve benchmark ids in order, failing on the first unknown one
    pub fn resolve_benchmarks<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<&Benchmark>> {
        ids.iter().map(|id| self.benchmark(id.as_ref())).collect()
    }

    /// The five model funds and the standard benchmark set
    pub fn builtin() -> Self {
        Catalog {
            funds: builtin_funds(),
            benchmarks: builtin_benchmarks(),
        }
    }
}

fn alloc(pairs: &[(&str, f64)]) -> Allocation {
    pairs.iter().map(|(t, w)| (t.to_string(), *w)).collect()
}

fn fund(id: &str, name: &str, allocations: Allocation, risk_level: &str, description: &str) -> FundDefinition {
    FundDefinition {
        id: id.to_string(),
        name: name.to_string(),
        allocations,
        default_fee: DEFAULT_FEE,
        default_rebalance: Rebalance::Annual,
        risk_level: risk_level.to_string(),
        description: description.to_string(),
    }
}

fn builtin_funds() -> Vec<FundDefinition> {
    const F3_SMALL: f64 = 0.0302857143;

    vec![
        fund(
            "F1",
            "Fund 1 — Core Income (low risk)",
            alloc(&[
                ("LQD", 0.50), ("IEF", 0.20), ("GLD", 0.10), ("VEA", 0.10),
                ("MSFT", 0.02), ("APH", 0.02), ("GWW", 0.02), ("PH", 0.02), ("BSX", 0.02),
            ]),
            "Low",
            "Conservative income-focused portfolio with high allocation to bonds and defensive assets.",
        ),
        fund(
            "F2",
            "Fund 2 — Pro Core (~12% in 10y)",
            alloc(&[
                ("LQD", 0.30), ("IEF", 0.10), ("GLD", 0.08), ("VEA", 0.12), ("SPY", 0.12),
                ("MSFT", 0.03), ("APH", 0.03), ("GWW", 0.03), ("PH", 0.03), ("BSX", 0.03), ("ETN", 0.03),
                ("EME", 0.025), ("PWR", 0.025), ("FAST", 0.025), ("BWXT", 0.025),
            ]),
            "Moderate",
            "Balanced portfolio targeting steady growth with moderate risk exposure.",
        ),
        fund(
            "F3",
            "Fund 3 — Pro Growth 17 (RS≈3.10)",
            alloc(&[
                ("LQD", 0.098), ("IEF", 0.098), ("SPY", 0.060), ("VEA", 0.120), ("GLD", 0.112),
                ("NVDA", 0.025), ("AVGO", 0.025), ("MSFT", 0.025), ("KLAC", 0.025),
                ("CDNS", 0.025), ("ETN", 0.025), ("PH", 0.025), ("HEI", 0.025),
                ("EME", 0.025), ("PWR", 0.025), ("FAST", 0.025), ("BWXT", 0.025),
                ("IDCC", F3_SMALL), ("RDNT", F3_SMALL), ("DY", F3_SMALL), ("GPI", F3_SMALL),
                ("ACLS", F3_SMALL), ("TTMI", F3_SMALL), ("AGM", F3_SMALL),
            ]),
            "Moderate-High",
            "Growth-oriented portfolio with diversified equity exposure and moderate bond allocation.",
        ),
        fund(
            "F4",
            "Fund 4 — Redeem Surge 31 (max RS for >30%)",
            alloc(&[
                ("NVDA", 0.24), ("AVGO", 0.12), ("KLAC", 0.06), ("CDNS", 0.06),
                ("IDCC", 0.0125), ("RDNT", 0.0125), ("ACLS", 0.0125), ("GPI", 0.0125),
                ("VWO", 0.32), ("GLD", 0.15),
            ]),
            "High",
            "High-growth aggressive portfolio with significant technology and emerging market exposure.",
        ),
        fund(
            "F5",
            "Fund 5 — Bridge Growth 26 (between F3 & F4)",
            alloc(&[
                ("NVDA", 0.10), ("AVGO", 0.07), ("KLAC", 0.06), ("CDNS", 0.05), ("MSFT", 0.05),
                ("ETN", 0.05), ("EME", 0.04), ("PWR", 0.04), ("FAST", 0.025), ("BWXT", 0.025),
                ("IDCC", 0.06), ("RDNT", 0.06), ("ACLS", 0.06), ("GPI", 0.05), ("AGM", 0.05),
                ("TTMI", 0.05), ("VEA", 0.08), ("GLD", 0.04), ("VWO", 0.02), ("LQD", 0.012),
                ("IEF", 0.008),
            ]),
            "High",
            "Bridge portfolio between moderate-high and high risk, balancing growth with some stability.",
        ),
    ]
}

fn builtin_benchmarks() -> Vec<Benchmark> {
    let single = |id: &str, name: &str| Benchmark {
        id: id.to_string(),
        name: name.to_string(),
        definition: BenchmarkDefinition::Single { ticker: id.to_string() },
    };
    let mix = |id: &str, name: &str, weights: &[(&str, f64)]| Benchmark {
        id: id.to_string(),
        name: name.to_string(),
        definition: BenchmarkDefinition::Mix { weights: alloc(weights) },
    };

    vec![
        single("SPY", "S&P 500 (SPY)"),
        single("GLD", "Gold (GLD)"),
        single("VEA", "Developed ex-US (VEA)"),
        single("VWO", "Emerging (VWO)"),
        single("IEF", "UST 7–10y (IEF)"),
        single("LQD", "US IG Corp (LQD)"),
        mix("60/40", "60/40 (SPY/IEF)", &[("SPY", 0.6), ("IEF", 0.4)]),
        mix("80/20", "80/20 (SPY/IEF)", &[("SPY", 0.8), ("IEF", 0.2)]),
        mix("40/60", "40/60 (SPY/IEF)", &[("SPY", 0.4), ("IEF", 0.6)]),
        mix(
            "ALL_WEATHER_LITE",
            "All-weather lite (35 SPY / 35 IEF / 30 GLD)",
            &[("SPY", 0.35), ("IEF", 0.35), ("GLD", 0.30)],
        ),
        mix(
            "EQ_GLD_70_30",
            "Equity + Gold (70 SPY / 30 GLD)",
            &[("SPY", 0.70), ("GLD", 0.30)],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_fund_weights_are_near_normalized() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.funds.len(), 5);
        for f in &catalog.funds {
            let total: f64 = f.allocations.values().sum();
            assert!((total - 1.0).abs() < 1e-6, "{} sums to {}", f.id, total);
            assert_eq!(f.default_fee, DEFAULT_FEE);
            assert_eq!(f.default_rebalance, Rebalance::Annual);
        }
    }

    #[test]
    fn test_lookup() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.fund("F4").unwrap().allocations["VWO"], 0.32);
        assert!(matches!(catalog.fund("F9"), Err(Error::UnknownFund(_))));

        let b = catalog.benchmark("60/40").unwrap();
        assert_eq!(b.definition.tickers(), vec!["IEF", "SPY"]);
        assert!(matches!(catalog.benchmark("QQQ"), Err(Error::UnknownBenchmark(_))));
    }

    #[test]
    fn test_resolve_benchmarks_fails_fast() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.resolve_benchmarks(&["SPY", "GLD"]).unwrap().len(), 2);
        let err = catalog.resolve_benchmarks(&["SPY", "NOPE", "GLD"]).unwrap_err();
        assert_eq!(err.to_string(), Error::UnknownBenchmark("NOPE".into()).to_string());
    }

    #[test]
    fn test_from_json_file() {
        let dir = std::env::temp_dir().join(format!("catalog-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("catalog.json");
        std::fs::write(
            &path,
            r#"{
                "funds": [{"id": "X1", "name": "Test", "allocations": {"SPY": 1.0}, "defaultFee": 0.0}],
                "benchmarks": [{"id": "GLD", "name": "Gold", "definition": {"type": "single", "ticker": "GLD"}}]
            }"#,
        )
        .unwrap();

        let catalog = Catalog::from_json_file(&path).unwrap();
        let fund = catalog.fund("X1").unwrap();
        assert_eq!(fund.default_rebalance, Rebalance::Annual);
        assert!(fund.risk_level.is_empty());
        assert!(catalog.benchmark("GLD").is_ok());

        std::fs::remove_dir_all(&dir).ok();
    }
}
