//! External agreement metrics between a clustering and ground-truth classes.
//!
//! All functions take `(labels_true, labels_pred)` and ignore label values,
//! only the partition they induce matters. Entropies use natural logs.

use crate::error::{Error, Result};
use crate::Labels;
use std::collections::HashMap;

/// Contingency table between two labelings.
struct Contingency {
    n: usize,
    cells: Vec<Vec<usize>>,
    rows: Vec<usize>,
    cols: Vec<usize>,
}

impl Contingency {
    fn new(labels_true: &Labels, labels_pred: &Labels) -> Result<Self> {
        if labels_true.len() != labels_pred.len() {
            return Err(Error::DimensionMismatch {
                expected: labels_true.len(),
                found: labels_pred.len(),
            });
        }

        let true_index = dense_index(labels_true);
        let pred_index = dense_index(labels_pred);
        let mut cells = vec![vec![0usize; pred_index.len()]; true_index.len()];
        for (t, p) in labels_true.iter().zip(labels_pred.iter()) {
            cells[true_index[t]][pred_index[p]] += 1;
        }
        let rows = cells.iter().map(|r| r.iter().sum()).collect();
        let cols = (0..pred_index.len())
            .map(|j| cells.iter().map(|r| r[j]).sum())
            .collect();

        Ok(Self {
            n: labels_true.len(),
            cells,
            rows,
            cols,
        })
    }

    fn mutual_info(&self) -> f64 {
        let n = self.n as f64;
        let mut mi = 0.0;
        for (i, row) in self.cells.iter().enumerate() {
            for (j, &nij) in row.iter().enumerate() {
                if nij == 0 {
                    continue;
                }
                let nij = nij as f64;
                mi += nij / n * (nij * n / (self.rows[i] as f64 * self.cols[j] as f64)).ln();
            }
        }
        mi.max(0.0)
    }
}

fn dense_index(labels: &Labels) -> HashMap<usize, usize> {
    let mut index = HashMap::new();
    for &label in labels {
        let next = index.len();
        index.entry(label).or_insert(next);
    }
    index
}

fn entropy(counts: &[usize]) -> f64 {
    let n: usize = counts.iter().sum();
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.ln()
        })
        .sum()
}

fn comb2(n: usize) -> f64 {
    let n = n as f64;
    n * (n - 1.0) / 2.0
}

/// Rand index adjusted for chance. 1.0 for identical partitions.
pub fn adjusted_rand_score(labels_true: &Labels, labels_pred: &Labels) -> Result<f64> {
    let table = Contingency::new(labels_true, labels_pred)?;
    let n = table.n;

    // Trivial partitions agree perfectly
    if n == 0
        || (table.rows.len() == table.cols.len()
            && (table.rows.len() == 1 || table.rows.len() == n))
    {
        return Ok(1.0);
    }

    let sum_cells: f64 = table.cells.iter().flatten().map(|&c| comb2(c)).sum();
    let sum_rows: f64 = table.rows.iter().map(|&c| comb2(c)).sum();
    let sum_cols: f64 = table.cols.iter().map(|&c| comb2(c)).sum();
    let expected = sum_rows * sum_cols / comb2(n);
    let max_index = (sum_rows + sum_cols) / 2.0;

    if max_index == expected {
        return Ok(1.0);
    }
    Ok((sum_cells - expected) / (max_index - expected))
}

/// `(homogeneity, completeness, v_measure)` with beta = 1.
pub fn homogeneity_completeness_v_measure(
    labels_true: &Labels,
    labels_pred: &Labels,
) -> Result<(f64, f64, f64)> {
    let table = Contingency::new(labels_true, labels_pred)?;
    if table.n == 0 {
        return Ok((1.0, 1.0, 1.0));
    }

    let entropy_true = entropy(&table.rows);
    let entropy_pred = entropy(&table.cols);
    let mi = table.mutual_info();

    let homogeneity = if entropy_true > 0.0 { mi / entropy_true } else { 1.0 };
    let completeness = if entropy_pred > 0.0 { mi / entropy_pred } else { 1.0 };
    let v_measure = if homogeneity + completeness > 0.0 {
        2.0 * homogeneity * completeness / (homogeneity + completeness)
    } else {
        0.0
    };

    Ok((homogeneity, completeness, v_measure))
}

pub fn completeness_score(labels_true: &Labels, labels_pred: &Labels) -> Result<f64> {
    homogeneity_completeness_v_measure(labels_true, labels_pred).map(|(_, c, _)| c)
}

/// Geometric mean of pairwise precision and recall.
pub fn fowlkes_mallows_score(labels_true: &Labels, labels_pred: &Labels) -> Result<f64> {
    let table = Contingency::new(labels_true, labels_pred)?;
    let n = table.n as f64;

    let tk: f64 = table.cells.iter().flatten().map(|&c| (c * c) as f64).sum::<f64>() - n;
    let pk: f64 = table.cols.iter().map(|&c| (c * c) as f64).sum::<f64>() - n;
    let qk: f64 = table.rows.iter().map(|&c| (c * c) as f64).sum::<f64>() - n;

    if tk == 0.0 {
        return Ok(0.0);
    }
    Ok((tk / pk).sqrt() * (tk / qk).sqrt())
}

/// Mutual information adjusted for chance, normalized by the arithmetic mean
/// of the two entropies.
pub fn adjusted_mutual_info_score(labels_true: &Labels, labels_pred: &Labels) -> Result<f64> {
    let table = Contingency::new(labels_true, labels_pred)?;
    let n = table.n;

    if n == 0
        || (table.rows.len() == table.cols.len()
            && (table.rows.len() == 1 || table.rows.len() == n))
    {
        return Ok(1.0);
    }

    let mi = table.mutual_info();
    let emi = expected_mutual_info(&table.rows, &table.cols, n);
    let normalizer = (entropy(&table.rows) + entropy(&table.cols)) / 2.0;

    let mut denominator = normalizer - emi;
    // Keep the sign, avoid dividing by ~0
    let eps = f64::EPSILON;
    if denominator < 0.0 {
        denominator = denominator.min(-eps);
    } else {
        denominator = denominator.max(eps);
    }
    Ok((mi - emi) / denominator)
}

/// Expected mutual information under the hypergeometric permutation model.
fn expected_mutual_info(rows: &[usize], cols: &[usize], n: usize) -> f64 {
    let ln_fact = ln_factorials(n);
    let nf = n as f64;
    let mut emi = 0.0;

    for &a in rows {
        for &b in cols {
            let start = (a + b).saturating_sub(n).max(1);
            let end = a.min(b);
            for nij in start..=end {
                let nij_f = nij as f64;
                let term1 = nij_f / nf;
                let term2 = (nf * nij_f).ln() - (a as f64 * b as f64).ln();
                let log_term3 = ln_fact[a] + ln_fact[b] + ln_fact[n - a] + ln_fact[n - b]
                    - ln_fact[n]
                    - ln_fact[nij]
                    - ln_fact[a - nij]
                    - ln_fact[b - nij]
                    - ln_fact[n + nij - a - b];
                emi += term1 * term2 * log_term3.exp();
            }
        }
    }
    emi
}

fn ln_factorials(n: usize) -> Vec<f64> {
    let mut table = Vec::with_capacity(n + 1);
    table.push(0.0);
    let mut acc = 0.0;
    for i in 1..=n {
        acc += (i as f64).ln();
        table.push(acc);
    }
    table
}
