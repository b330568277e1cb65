//! Stratified train / held-out partitioning.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unit of partitioning.
///
/// `Row` treats every (order, item) row independently. Items of one order
/// share the order's outcome, so `Row` can place near-duplicates on both
/// sides of the split; `Order` keeps all rows of an order together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    #[default]
    Row,
    Order,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `units` with `rng` and move `round(len * fraction)` of them to the held-out side.
fn take_fraction<T>(mut units: Vec<T>, fraction: f64, rng: &mut StdRng) -> (Vec<T>, Vec<T>) {
    units.shuffle(rng);
    let n_test = ((units.len() as f64) * fraction).round() as usize;
    let train = units.split_off(n_test.min(units.len()));
    (train, units)
}

/// Row indices of the two partitions, preserving the label proportions.
///
/// `groups[i]` is the order id of row `i`; it is only consulted for
/// [`SplitStrategy::Order`], where an order's label is that of its rows.
pub fn stratified_split(
    labels: &[bool],
    groups: &[&str],
    strategy: SplitStrategy,
    test_fraction: f64,
    seed: u64,
) -> Result<Split> {
    if !(0.0..1.0).contains(&test_fraction) {
        bail!("test fraction must be in [0, 1), got {}", test_fraction);
    }
    if groups.len() != labels.len() {
        bail!("{} group keys for {} labels", groups.len(), labels.len());
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    match strategy {
        SplitStrategy::Row => {
            for class in [false, true] {
                let rows: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
                let (tr, te) = take_fraction(rows, test_fraction, &mut rng);
                train.extend(tr);
                test.extend(te);
            }
        }
        SplitStrategy::Order => {
            // BTreeMap keeps group iteration order independent of hashing.
            let mut by_group: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
            for (i, g) in groups.iter().enumerate() {
                by_group.entry(*g).or_default().push(i);
            }
            for class in [false, true] {
                let members: Vec<Vec<usize>> = by_group
                    .values()
                    .filter(|rows| labels[rows[0]] == class)
                    .cloned()
                    .collect();
                let (tr, te) = take_fraction(members, test_fraction, &mut rng);
                train.extend(tr.into_iter().flatten());
                test.extend(te.into_iter().flatten());
            }
        }
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(Split { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn labels(n_late: usize, n_on_time: usize) -> Vec<bool> {
        let mut l = vec![true; n_late];
        l.extend(vec![false; n_on_time]);
        l
    }

    #[test]
    fn test_row_split_preserves_proportions() {
        let y = labels(20, 80);
        let ids: Vec<String> = (0..y.len()).map(|i| format!("o{}", i)).collect();
        let groups: Vec<&str> = ids.iter().map(String::as_str).collect();

        let split = stratified_split(&y, &groups, SplitStrategy::Row, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 20);
        assert_eq!(split.train.len(), 80);
        assert_eq!(split.test.iter().filter(|&&i| y[i]).count(), 4);
        assert_eq!(split.train.iter().filter(|&&i| y[i]).count(), 16);
    }

    #[test]
    fn test_split_is_partition() {
        let y = labels(13, 31);
        let groups = vec!["x"; y.len()];
        let split = stratified_split(&y, &groups, SplitStrategy::Row, 0.25, 1).unwrap();
        let all: HashSet<usize> = split.train.iter().chain(&split.test).copied().collect();
        assert_eq!(all.len(), y.len());
        assert_eq!(split.train.len() + split.test.len(), y.len());
    }

    #[test]
    fn test_same_seed_same_split() {
        let y = labels(30, 70);
        let groups = vec!["x"; y.len()];
        let a = stratified_split(&y, &groups, SplitStrategy::Row, 0.2, 42).unwrap();
        let b = stratified_split(&y, &groups, SplitStrategy::Row, 0.2, 42).unwrap();
        let c = stratified_split(&y, &groups, SplitStrategy::Row, 0.2, 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_order_split_keeps_orders_together() {
        // 40 orders with 3 items each, every fourth order late
        let mut y = Vec::new();
        let mut ids = Vec::new();
        for order in 0..40 {
            for _ in 0..3 {
                y.push(order % 4 == 0);
                ids.push(format!("order-{:02}", order));
            }
        }
        let groups: Vec<&str> = ids.iter().map(String::as_str).collect();

        let split = stratified_split(&y, &groups, SplitStrategy::Order, 0.2, 42).unwrap();
        let train_orders: HashSet<&str> = split.train.iter().map(|&i| groups[i]).collect();
        let test_orders: HashSet<&str> = split.test.iter().map(|&i| groups[i]).collect();
        assert!(train_orders.is_disjoint(&test_orders));
        assert_eq!(test_orders.len(), 8);
        assert_eq!(split.test.iter().filter(|&&i| y[i]).count(), 2 * 3);
    }

    #[test]
    fn test_single_class_split() {
        let y = vec![false; 10];
        let groups = vec!["x"; 10];
        let split = stratified_split(&y, &groups, SplitStrategy::Row, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 2);
    }

    #[test]
    fn test_rejects_bad_fraction() {
        assert!(stratified_split(&[true], &["a"], SplitStrategy::Row, 1.5, 0).is_err());
    }
}
