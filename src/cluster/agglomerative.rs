use crate::error::{Error, Result};
use crate::metrics::{Distance, DistanceMatrix};
use crate::{Labels, Matrix};

/// Rule for the distance between two merged groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Linkage {
    /// Closest pair of members.
    Single,
    /// Farthest pair of members.
    Complete,
    /// Mean over all member pairs.
    Average,
    /// Increase in within-cluster variance. Euclidean only.
    Ward,
}

impl Linkage {
    pub fn name(&self) -> &'static str {
        match self {
            Linkage::Single => "single",
            Linkage::Complete => "complete",
            Linkage::Average => "average",
            Linkage::Ward => "ward",
        }
    }

    /// Lance-Williams update: distance from `k` to the union of `i` and `j`.
    fn update(&self, d_ki: f64, d_kj: f64, d_ij: f64, n_i: usize, n_j: usize, n_k: usize) -> f64 {
        match self {
            Linkage::Single => d_ki.min(d_kj),
            Linkage::Complete => d_ki.max(d_kj),
            Linkage::Average => (n_i as f64 * d_ki + n_j as f64 * d_kj) / (n_i + n_j) as f64,
            Linkage::Ward => {
                let (n_i, n_j, n_k) = (n_i as f64, n_j as f64, n_k as f64);
                let value = ((n_i + n_k) * d_ki * d_ki + (n_j + n_k) * d_kj * d_kj
                    - n_k * d_ij * d_ij)
                    / (n_i + n_j + n_k);
                value.max(0.0).sqrt()
            }
        }
    }
}

/// One step of the merge history.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Merge {
    /// Representative sample index of each merged group.
    pub clusters: (usize, usize),
    pub distance: f64,
    /// Size of the resulting group.
    pub size: usize,
}

/// Bottom-up hierarchical clustering stopped at `n_clusters` groups.
#[derive(Clone, Debug)]
pub struct AgglomerativeClustering {
    pub labels: Option<Labels>,
    pub merges: Option<Vec<Merge>>,
    n_clusters: usize,
    linkage: Linkage,
    distance: Distance,
}

impl AgglomerativeClustering {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            labels: None,
            merges: None,
            n_clusters,
            linkage: Linkage::Ward,
            distance: Distance::Euclidean,
        }
    }

    pub fn linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    pub fn distance(mut self, distance: Distance) -> Self {
        self.distance = distance;
        self
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    pub fn fit(&mut self, x: &Matrix) -> Result<()> {
        let n = x.nrows();
        if n == 0 || x.ncols() == 0 {
            return Err(Error::DataFormat(
                "input matrix must have at least one sample and one feature".to_string(),
            ));
        }
        if self.n_clusters == 0 || self.n_clusters > n {
            return Err(Error::invalid(
                "n_clusters",
                format!("must be in 1..={}, got {}", n, self.n_clusters),
            ));
        }
        if self.linkage == Linkage::Ward && self.distance != Distance::Euclidean {
            return Err(Error::invalid(
                "linkage",
                format!("ward requires euclidean distance, got {}", self.distance.name()),
            ));
        }

        let pairwise = DistanceMatrix::new(x, self.distance);
        let mut d: Vec<f64> = (0..n).flat_map(|i| pairwise.row(i).to_vec()).collect();

        let mut active = vec![true; n];
        let mut size = vec![1usize; n];
        let mut owner: Vec<usize> = (0..n).collect();
        let mut merges = Vec::with_capacity(n - self.n_clusters);

        // Nearest active neighbor with a larger index, per row
        let mut nn: Vec<(f64, usize)> = (0..n).map(|i| row_min(&d, &active, n, i)).collect();

        let mut remaining = n;
        while remaining > self.n_clusters {
            let (i, (dist, j)) = nn
                .iter()
                .enumerate()
                .filter(|(i, (_, j))| active[*i] && *j < n)
                .fold(None, |best: Option<(usize, (f64, usize))>, (i, &cand)| match best {
                    Some((_, (bd, _))) if bd <= cand.0 => best,
                    _ => Some((i, cand)),
                })
                .ok_or_else(|| Error::DataFormat("no mergeable pair left".to_string()))?;

            for k in 0..n {
                if !active[k] || k == i || k == j {
                    continue;
                }
                let updated = self.linkage.update(
                    d[k * n + i],
                    d[k * n + j],
                    dist,
                    size[i],
                    size[j],
                    size[k],
                );
                d[k * n + i] = updated;
                d[i * n + k] = updated;
            }

            active[j] = false;
            size[i] += size[j];
            for o in owner.iter_mut() {
                if *o == j {
                    *o = i;
                }
            }
            merges.push(Merge {
                clusters: (i, j),
                distance: dist,
                size: size[i],
            });
            remaining -= 1;

            nn[i] = row_min(&d, &active, n, i);
            for k in 0..n {
                if !active[k] || k == i {
                    continue;
                }
                if nn[k].1 == i || nn[k].1 == j {
                    nn[k] = row_min(&d, &active, n, k);
                } else if k < i {
                    let candidate = d[k * n + i];
                    if candidate < nn[k].0 || (candidate == nn[k].0 && i < nn[k].1) {
                        nn[k] = (candidate, i);
                    }
                }
            }
        }

        // Dense labels in order of first appearance
        let mut relabel = vec![usize::MAX; n];
        let mut next = 0;
        let labels: Labels = owner
            .iter()
            .map(|&o| {
                if relabel[o] == usize::MAX {
                    relabel[o] = next;
                    next += 1;
                }
                relabel[o]
            })
            .collect();

        self.labels = Some(labels);
        self.merges = Some(merges);
        Ok(())
    }

    pub fn fit_predict(&mut self, x: &Matrix) -> Result<Labels> {
        self.fit(x)?;
        self.labels.clone().ok_or(Error::NotFitted)
    }
}

/// Smallest distance from `i` to an active `j > i`; `(INFINITY, n)` if none.
fn row_min(d: &[f64], active: &[bool], n: usize, i: usize) -> (f64, usize) {
    let mut best = (f64::INFINITY, n);
    for j in (i + 1)..n {
        if active[j] && d[i * n + j] < best.0 {
            best = (d[i * n + j], j);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::count_clusters;
    use ndarray::array;

    fn three_groups() -> Matrix {
        array![
            [1.0, 1.0],
            [1.1, 1.1],
            [1.2, 1.0],
            [5.0, 5.0],
            [5.1, 5.1],
            [5.0, 5.2],
            [3.0, 3.0],
            [3.1, 3.0],
            [3.0, 3.1]
        ]
    }

    #[test]
    fn test_every_linkage_recovers_groups() {
        let x = three_groups();
        for linkage in [Linkage::Single, Linkage::Complete, Linkage::Average, Linkage::Ward] {
            let mut agglo = AgglomerativeClustering::new(3).linkage(linkage);
            let labels = agglo.fit_predict(&x).unwrap();
            assert_eq!(labels, array![0, 0, 0, 1, 1, 1, 2, 2, 2], "{:?}", linkage);
        }
    }

    #[test]
    fn test_merge_history() {
        let x = three_groups();
        let mut agglo = AgglomerativeClustering::new(1).linkage(Linkage::Average);
        agglo.fit(&x).unwrap();

        let merges = agglo.merges.as_ref().unwrap();
        assert_eq!(merges.len(), x.nrows() - 1);
        assert_eq!(merges.last().unwrap().size, x.nrows());
        // Average linkage distances are monotone
        for pair in merges.windows(2) {
            assert!(pair[1].distance >= pair[0].distance - 1e-12);
        }
        assert_eq!(count_clusters(agglo.labels.as_ref().unwrap()), 1);
    }

    #[test]
    fn test_single_linkage_chains() {
        // A chain of close points plus one far point
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [20.0]];
        let mut agglo = AgglomerativeClustering::new(2).linkage(Linkage::Single);
        let labels = agglo.fit_predict(&x).unwrap();
        assert_eq!(labels, array![0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_cosine_distance() {
        // Same direction, different magnitude
        let x = array![[1.0, 0.0], [5.0, 0.1], [0.0, 1.0], [0.1, 7.0]];
        let mut agglo = AgglomerativeClustering::new(2)
            .linkage(Linkage::Complete)
            .distance(Distance::Cosine);
        let labels = agglo.fit_predict(&x).unwrap();
        assert_eq!(labels, array![0, 0, 1, 1]);
    }

    #[test]
    fn test_ward_requires_euclidean() {
        let x = three_groups();
        let mut agglo = AgglomerativeClustering::new(3)
            .linkage(Linkage::Ward)
            .distance(Distance::Manhattan);
        assert!(matches!(agglo.fit(&x), Err(Error::InvalidParameter { name: "linkage", .. })));
    }

    #[test]
    fn test_too_many_clusters() {
        let x = array![[0.0], [1.0]];
        assert!(AgglomerativeClustering::new(3).fit(&x).is_err());
    }

    #[test]
    fn test_one_cluster_per_sample() {
        let x = array![[0.0], [1.0], [2.0]];
        let labels = AgglomerativeClustering::new(3).fit_predict(&x).unwrap();
        assert_eq!(labels, array![0, 1, 2]);
    }
}
