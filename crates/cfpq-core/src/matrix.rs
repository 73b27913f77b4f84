//! Boolean matrix backends
//!
//! Every automaton and fixpoint in the crate works through the [`BoolMatrix`]
//! capability set: Kronecker product, element-wise OR, boolean matrix
//! multiplication and non-zero iteration. Two backends are provided:
//!
//! - [`SparseBoolMatrix`]: one sorted column set per row, good for the very
//!   sparse adjacency matrices of real graphs
//! - [`DenseBoolMatrix`]: packed `u64` bit rows, good for small dense closures

use std::collections::BTreeSet;
use std::fmt::Debug;

/// Boolean semiring matrix operations
pub trait BoolMatrix: Clone + Debug + PartialEq + Send + Sync {
    /// All-false matrix of the given shape
    fn zeros(rows: usize, cols: usize) -> Self;

    /// `(rows, cols)`
    fn shape(&self) -> (usize, usize);

    fn get(&self, i: usize, j: usize) -> bool;

    /// Set entry `(i, j)`; returns true if it was previously unset
    fn set(&mut self, i: usize, j: usize) -> bool;

    /// Number of true entries
    fn nnz(&self) -> usize;

    /// Column indices of the true entries in row `i`, ascending
    fn row(&self, i: usize) -> Vec<usize>;

    /// `self |= other`; returns true if any entry changed
    fn or_assign(&mut self, other: &Self) -> bool;

    /// Boolean product `self · other`
    fn mul(&self, other: &Self) -> Self;

    /// Kronecker product; entry `(i·r + k, j·c + l)` is `self[i, j] ∧ other[k, l]`
    /// where `(r, c)` is the shape of `other`
    fn kron(&self, other: &Self) -> Self;

    fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.set(i, i);
        }
        m
    }

    fn from_pairs(rows: usize, cols: usize, pairs: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut m = Self::zeros(rows, cols);
        for (i, j) in pairs {
            m.set(i, j);
        }
        m
    }

    /// All true entries in row-major order
    fn nonzero(&self) -> Vec<(usize, usize)> {
        let (rows, _) = self.shape();
        (0..rows)
            .flat_map(|i| self.row(i).into_iter().map(move |j| (i, j)))
            .collect()
    }

    fn is_zero(&self) -> bool {
        self.nnz() == 0
    }

    /// Row vector times matrix: `result[j] = ∃i. v[i] ∧ self[i, j]`
    fn vec_mul(&self, v: &[bool]) -> Vec<bool> {
        let (rows, cols) = self.shape();
        assert_eq!(v.len(), rows, "vector length does not match matrix rows");
        let mut out = vec![false; cols];
        for (i, &active) in v.iter().enumerate() {
            if !active {
                continue;
            }
            for j in self.row(i) {
                out[j] = true;
            }
        }
        out
    }
}

/// Row-set sparse boolean matrix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseBoolMatrix {
    cols: usize,
    data: Vec<BTreeSet<usize>>,
    nnz: usize,
}

impl BoolMatrix for SparseBoolMatrix {
    fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            cols,
            data: vec![BTreeSet::new(); rows],
            nnz: 0,
        }
    }

    fn shape(&self) -> (usize, usize) {
        (self.data.len(), self.cols)
    }

    fn get(&self, i: usize, j: usize) -> bool {
        self.data[i].contains(&j)
    }

    fn set(&mut self, i: usize, j: usize) -> bool {
        assert!(j < self.cols, "column {} out of bounds ({})", j, self.cols);
        let inserted = self.data[i].insert(j);
        if inserted {
            self.nnz += 1;
        }
        inserted
    }

    fn nnz(&self) -> usize {
        self.nnz
    }

    fn row(&self, i: usize) -> Vec<usize> {
        self.data[i].iter().copied().collect()
    }

    fn or_assign(&mut self, other: &Self) -> bool {
        assert_eq!(self.shape(), other.shape(), "shape mismatch in or_assign");
        let before = self.nnz;
        for (i, row) in other.data.iter().enumerate() {
            for &j in row {
                if self.data[i].insert(j) {
                    self.nnz += 1;
                }
            }
        }
        self.nnz != before
    }

    fn mul(&self, other: &Self) -> Self {
        assert_eq!(self.cols, other.data.len(), "shape mismatch in mul");
        let mut out = Self::zeros(self.data.len(), other.cols);
        for (i, row) in self.data.iter().enumerate() {
            for &k in row {
                for &j in &other.data[k] {
                    out.set(i, j);
                }
            }
        }
        out
    }

    fn kron(&self, other: &Self) -> Self {
        let (r, c) = other.shape();
        let mut out = Self::zeros(self.data.len() * r, self.cols * c);
        for (i, row) in self.data.iter().enumerate() {
            for &j in row {
                for (k, other_row) in other.data.iter().enumerate() {
                    for &l in other_row {
                        out.set(i * r + k, j * c + l);
                    }
                }
            }
        }
        out
    }
}

const WORD_BITS: usize = 64;

/// Bit-packed dense boolean matrix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseBoolMatrix {
    rows: usize,
    cols: usize,
    words_per_row: usize,
    bits: Vec<u64>,
}

impl DenseBoolMatrix {
    fn word_row(&self, i: usize) -> &[u64] {
        &self.bits[i * self.words_per_row..(i + 1) * self.words_per_row]
    }
}

impl BoolMatrix for DenseBoolMatrix {
    fn zeros(rows: usize, cols: usize) -> Self {
        let words_per_row = cols.div_ceil(WORD_BITS);
        Self {
            rows,
            cols,
            words_per_row,
            bits: vec![0; rows * words_per_row],
        }
    }

    fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn get(&self, i: usize, j: usize) -> bool {
        let word = self.bits[i * self.words_per_row + j / WORD_BITS];
        word & (1 << (j % WORD_BITS)) != 0
    }

    fn set(&mut self, i: usize, j: usize) -> bool {
        assert!(j < self.cols, "column {} out of bounds ({})", j, self.cols);
        let word = &mut self.bits[i * self.words_per_row + j / WORD_BITS];
        let mask = 1u64 << (j % WORD_BITS);
        let was_unset = *word & mask == 0;
        *word |= mask;
        was_unset
    }

    fn nnz(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    fn row(&self, i: usize) -> Vec<usize> {
        let mut out = Vec::new();
        for (w, &word) in self.word_row(i).iter().enumerate() {
            let mut word = word;
            while word != 0 {
                let bit = word.trailing_zeros() as usize;
                out.push(w * WORD_BITS + bit);
                word &= word - 1;
            }
        }
        out
    }

    fn or_assign(&mut self, other: &Self) -> bool {
        assert_eq!(self.shape(), other.shape(), "shape mismatch in or_assign");
        let mut changed = false;
        for (dst, &src) in self.bits.iter_mut().zip(&other.bits) {
            let merged = *dst | src;
            changed |= merged != *dst;
            *dst = merged;
        }
        changed
    }

    fn mul(&self, other: &Self) -> Self {
        assert_eq!(self.cols, other.rows, "shape mismatch in mul");
        let mut out = Self::zeros(self.rows, other.cols);
        let wpr = out.words_per_row;
        for i in 0..self.rows {
            for k in self.row(i) {
                let src = other.word_row(k);
                let dst = &mut out.bits[i * wpr..(i + 1) * wpr];
                for (d, s) in dst.iter_mut().zip(src) {
                    *d |= s;
                }
            }
        }
        out
    }

    fn kron(&self, other: &Self) -> Self {
        let (r, c) = other.shape();
        let mut out = Self::zeros(self.rows * r, self.cols * c);
        let other_nonzero = other.nonzero();
        for (i, j) in self.nonzero() {
            for &(k, l) in &other_nonzero {
                out.set(i * r + k, j * c + l);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_backend<M: BoolMatrix>() {
        // 0 -> 1 -> 2
        let a = M::from_pairs(3, 3, [(0, 1), (1, 2)]);
        assert_eq!(a.nnz(), 2);
        assert!(a.get(0, 1));
        assert!(!a.get(1, 0));

        let sq = a.mul(&a);
        assert_eq!(sq.nonzero(), vec![(0, 2)]);

        let mut b = a.clone();
        assert!(b.or_assign(&sq));
        assert!(!b.or_assign(&sq));
        assert_eq!(b.nnz(), 3);

        let id = M::identity(2);
        let k = a.kron(&id);
        assert_eq!(k.shape(), (6, 6));
        // a[0,1] ∧ id[1,1] -> (0*2+1, 1*2+1)
        assert!(k.get(1, 3));
        assert!(k.get(0, 2));
        assert!(!k.get(0, 3));
        assert_eq!(k.nnz(), 4);

        assert_eq!(a.vec_mul(&[true, false, false]), vec![false, true, false]);
        assert!(M::zeros(0, 0).is_zero());
    }

    #[test]
    fn test_sparse_backend() {
        check_backend::<SparseBoolMatrix>();
    }

    #[test]
    fn test_dense_backend() {
        check_backend::<DenseBoolMatrix>();
    }

    #[test]
    fn test_dense_spans_multiple_words() {
        let mut m = DenseBoolMatrix::zeros(2, 130);
        assert!(m.set(1, 129));
        assert!(!m.set(1, 129));
        m.set(1, 3);
        assert_eq!(m.row(1), vec![3, 129]);
        assert_eq!(m.nnz(), 2);
    }

    #[test]
    fn test_backends_agree_on_products() {
        let pairs = [(0, 3), (3, 1), (1, 1), (2, 0), (3, 2)];
        let s = SparseBoolMatrix::from_pairs(4, 4, pairs);
        let d = DenseBoolMatrix::from_pairs(4, 4, pairs);
        assert_eq!(s.mul(&s).nonzero(), d.mul(&d).nonzero());
        assert_eq!(s.kron(&s).nonzero(), d.kron(&d).nonzero());
    }
}
