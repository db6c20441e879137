// src/backtest/weighting.rs
// Restricting target allocations to the tickers that actually have data

use std::collections::BTreeSet;

use crate::backtest::types::Allocation;

/// Keep only tickers in `keep` with strictly positive weight, rescaled to
/// sum to 1.
///
/// Returns an empty allocation when nothing survives or the surviving weights
/// sum to zero or less. Callers treat that as "no viable allocation".
pub fn renormalize<S: AsRef<str>>(weights: &Allocation, keep: &[S]) -> Allocation {
    let keep: BTreeSet<&str> = keep.iter().map(|t| t.as_ref()).collect();

    let filtered: Allocation = weights
        .iter()
        .filter(|(ticker, &w)| keep.contains(ticker.as_str()) && w > 0.0)
        .map(|(ticker, &w)| (ticker.clone(), w))
        .collect();

    let total: f64 = filtered.values().sum();
    if total <= 0.0 || !total.is_finite() {
        return Allocation::new();
    }

    filtered
        .into_iter()
        .map(|(ticker, w)| (ticker, w / total))
        .collect()
}

/// Split an allocation into parallel ticker and weight vectors
pub fn split_allocation(alloc: &Allocation) -> (Vec<String>, Vec<f64>) {
    alloc.iter().map(|(t, &w)| (t.clone(), w)).unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn alloc(pairs: &[(&str, f64)]) -> Allocation {
        pairs.iter().map(|(t, w)| (t.to_string(), *w)).collect()
    }

    #[test]
    fn test_renormalize_drops_missing_tickers() {
        let w = alloc(&[("LQD", 0.5), ("IEF", 0.2), ("GLD", 0.3)]);
        let r = renormalize(&w, &["LQD", "GLD"]);
        assert_eq!(r.len(), 2);
        assert!((r["LQD"] - 0.625).abs() < 1e-12);
        assert!((r["GLD"] - 0.375).abs() < 1e-12);
    }

    #[test]
    fn test_renormalize_drops_non_positive_weights() {
        let w = alloc(&[("A", 0.0), ("B", -1.0), ("C", 2.0)]);
        let r = renormalize(&w, &["A", "B", "C"]);
        assert_eq!(r, alloc(&[("C", 1.0)]));
    }

    #[test]
    fn test_renormalize_empty_cases() {
        let w = alloc(&[("A", 0.0), ("B", -0.5)]);
        assert!(renormalize(&w, &["A", "B"]).is_empty());
        assert!(renormalize(&alloc(&[("A", 1.0)]), &["Z"]).is_empty());
        assert!(renormalize(&Allocation::new(), &["A"]).is_empty());
    }

    #[test]
    fn test_split_allocation_is_ordered() {
        let (tickers, weights) = split_allocation(&alloc(&[("B", 0.4), ("A", 0.6)]));
        assert_eq!(tickers, vec!["A", "B"]);
        assert_eq!(weights, vec![0.6, 0.4]);
    }

    proptest! {
        #[test]
        fn prop_renormalized_weights_sum_to_one(
            raw in proptest::collection::btree_map("[A-E]", -1.0f64..5.0, 0..5),
            keep in proptest::collection::vec("[A-E]", 0..5),
        ) {
            let r = renormalize(&raw, &keep);
            let viable = raw.iter().any(|(t, &w)| w > 0.0 && keep.contains(t));
            if viable {
                let total: f64 = r.values().sum();
                prop_assert!((total - 1.0).abs() < 1e-9);
                prop_assert!(r.values().all(|&w| w > 0.0));
            } else {
                prop_assert!(r.is_empty());
            }
        }
    }
}
