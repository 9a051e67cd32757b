use crate::Matrix;
use ndarray::ArrayView1;

/// Pairwise dissimilarity between two samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Distance {
    Euclidean,
    Manhattan,
    /// `1 - cos(a, b)`; a zero vector is treated as unit-norm.
    Cosine,
}

impl Distance {
    pub const ALL: [Distance; 3] = [Distance::Euclidean, Distance::Manhattan, Distance::Cosine];

    pub fn compute(&self, a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
        match self {
            Distance::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f64>()
                .sqrt(),
            Distance::Manhattan => a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum(),
            Distance::Cosine => {
                let dot = a.dot(b);
                let norm_a = nonzero(a.dot(a).sqrt());
                let norm_b = nonzero(b.dot(b).sqrt());
                (1.0 - dot / (norm_a * norm_b)).max(0.0)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Distance::Euclidean => "euclidean",
            Distance::Manhattan => "manhattan",
            Distance::Cosine => "cosine",
        }
    }
}

fn nonzero(norm: f64) -> f64 {
    if norm == 0.0 { 1.0 } else { norm }
}

/// Dense symmetric matrix of distances between every pair of rows.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    n: usize,
    data: Vec<f64>,
}

impl DistanceMatrix {
    pub fn new(x: &Matrix, metric: Distance) -> Self {
        let n = x.nrows();
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            let row_i = x.row(i);
            for j in (i + 1)..n {
                let d = metric.compute(&row_i, &x.row(j));
                data[i * n + j] = d;
                data[j * n + i] = d;
            }
        }
        Self { n, data }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_distances() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        assert!((Distance::Euclidean.compute(&a.view(), &b.view()) - 5.0).abs() < 1e-12);
        assert!((Distance::Manhattan.compute(&a.view(), &b.view()) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_distance() {
        let a = array![1.0, 0.0];
        let b = array![0.0, 2.0];
        let c = array![2.0, 0.0];
        assert!((Distance::Cosine.compute(&a.view(), &b.view()) - 1.0).abs() < 1e-12);
        assert!(Distance::Cosine.compute(&a.view(), &c.view()).abs() < 1e-12);
    }

    #[test]
    fn test_matrix_symmetric() {
        let x = array![[0.0, 0.0], [1.0, 0.0], [0.0, 2.0]];
        let dm = DistanceMatrix::new(&x, Distance::Euclidean);
        assert_eq!(dm.len(), 3);
        assert_eq!(dm.get(0, 0), 0.0);
        assert_eq!(dm.get(1, 2), dm.get(2, 1));
        assert!((dm.get(0, 2) - 2.0).abs() < 1e-12);
    }
}
