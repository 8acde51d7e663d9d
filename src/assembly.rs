//! Per-step global stiffness and load assembly.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::element::BarElement;
use crate::errors::AnalysisError;
use crate::geometry::Force;

/// Translational direction of a nodal degree of freedom.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Global X direction.
    X,
    /// Global Y direction.
    Y,
}

impl Axis {
    /// Global degree of freedom of `node` along this axis.
    #[must_use]
    pub fn dof(self, node: usize) -> usize {
        match self {
            Axis::X => 2 * node,
            Axis::Y => 2 * node + 1,
        }
    }
}

/// Fill statistics for an assembled stiffness matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sparsity {
    /// Stored coefficients.
    pub non_zero: usize,
    /// Entries in the equivalent dense matrix.
    pub total: usize,
    /// Share of the dense matrix that is not stored, in percent.
    pub percent_sparse: f64,
}

/// Global system for a single solve: sparse stiffness, dense load, fixed DOFs.
///
/// Build one per step, sized to the current node count, and discard it after
/// solving. Nothing is cached between steps.
///
/// # Examples
/// ```
/// use trusslab::{force, point, BarElement, BarProperties, GlobalAssembly, Node};
///
/// let nodes = vec![Node::new(point(0.0, 0.0)), Node::new(point(1.0, 0.0))];
/// let bar = BarElement::new(0, 1, &nodes, BarProperties::steel(0.01)).unwrap();
///
/// let mut assembly = GlobalAssembly::new(nodes.len());
/// assembly.fix_node(0).unwrap();
/// assembly.add_element(&bar).unwrap();
/// assembly.apply_force(1, force(1.0e6, 0.0)).unwrap();
/// assert_eq!(assembly.stiffness_entry(2, 2), 2.0e9);
/// assert_eq!(assembly.stiffness_entry(0, 2), 0.0);
/// ```
#[derive(Clone, Debug)]
pub struct GlobalAssembly {
    /// Number of nodes the system was sized for.
    node_count: usize,
    /// One column map per row; absent entries are zero.
    stiffness: Vec<BTreeMap<usize, f64>>,
    /// Global load vector.
    load: DVector<f64>,
    /// Constrained degrees of freedom.
    fixed: BTreeSet<usize>,
}

impl GlobalAssembly {
    /// Create an empty system with two degrees of freedom per node.
    #[must_use]
    pub fn new(node_count: usize) -> Self {
        let size = 2 * node_count;
        Self {
            node_count,
            stiffness: vec![BTreeMap::new(); size],
            load: DVector::zeros(size),
            fixed: BTreeSet::new(),
        }
    }

    /// Number of nodes the system was sized for.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of degrees of freedom.
    #[must_use]
    pub fn size(&self) -> usize {
        self.load.len()
    }

    /// Fail when `dof` lies outside the system.
    fn check_dof(&self, dof: usize) -> Result<(), AnalysisError> {
        if dof < self.size() {
            Ok(())
        } else {
            Err(AnalysisError::DofOutOfRange {
                dof,
                size: self.size(),
            })
        }
    }

    /// Scatter an element's cached stiffness into the global matrix.
    ///
    /// Entries whose row or column is already fixed are skipped, so fix
    /// boundary DOFs before scattering. Failed elements contribute nothing.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::DofOutOfRange`] when the element addresses a node
    /// beyond the size of this system.
    pub fn add_element(&mut self, element: &BarElement) -> Result<(), AnalysisError> {
        let indices = element.global_dof_indices();
        for &dof in &indices {
            self.check_dof(dof)?;
        }
        if element.is_failed() {
            return Ok(());
        }
        let local = element.local_stiffness();
        for (i, &row) in indices.iter().enumerate() {
            if self.fixed.contains(&row) {
                continue;
            }
            for (j, &col) in indices.iter().enumerate() {
                if self.fixed.contains(&col) {
                    continue;
                }
                *self.stiffness[row].entry(col).or_insert(0.0) += local[(i, j)];
            }
        }
        Ok(())
    }

    /// Add a nodal force; components acting on fixed DOFs are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::DofOutOfRange`] when `node` is outside the system.
    pub fn apply_force(&mut self, node: usize, load: Force) -> Result<(), AnalysisError> {
        for (axis, component) in [(Axis::X, load.x), (Axis::Y, load.y)] {
            let dof = axis.dof(node);
            self.check_dof(dof)?;
            if !self.fixed.contains(&dof) {
                self.load[dof] += component;
            }
        }
        Ok(())
    }

    /// Constrain both degrees of freedom of `node`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::DofOutOfRange`] when `node` is outside the system.
    pub fn fix_node(&mut self, node: usize) -> Result<(), AnalysisError> {
        self.fix_dof(node, Axis::X)?;
        self.fix_dof(node, Axis::Y)
    }

    /// Constrain a single degree of freedom of `node`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::DofOutOfRange`] when `node` is outside the system.
    pub fn fix_dof(&mut self, node: usize, axis: Axis) -> Result<(), AnalysisError> {
        let dof = axis.dof(node);
        self.check_dof(dof)?;
        self.fixed.insert(dof);
        Ok(())
    }

    /// Whether `dof` is constrained.
    #[must_use]
    pub fn is_fixed(&self, dof: usize) -> bool {
        self.fixed.contains(&dof)
    }

    /// Constrained degrees of freedom in ascending order.
    pub fn fixed_dofs(&self) -> impl Iterator<Item = usize> + '_ {
        self.fixed.iter().copied()
    }

    /// Assembled load vector.
    #[must_use]
    pub fn load(&self) -> &DVector<f64> {
        &self.load
    }

    /// Accumulated stiffness at `(row, col)`, zero when nothing was stored.
    #[must_use]
    pub fn stiffness_entry(&self, row: usize, col: usize) -> f64 {
        self.stiffness
            .get(row)
            .and_then(|columns| columns.get(&col))
            .copied()
            .unwrap_or(0.0)
    }

    /// Expand the sparse stiffness into a square dense matrix.
    #[must_use]
    pub fn to_dense(&self) -> DMatrix<f64> {
        let size = self.size();
        let mut dense = DMatrix::zeros(size, size);
        for (row, columns) in self.stiffness.iter().enumerate() {
            for (&col, &value) in columns {
                dense[(row, col)] = value;
            }
        }
        dense
    }

    /// Report how much of the dense matrix is actually stored.
    #[must_use]
    pub fn sparsity(&self) -> Sparsity {
        let non_zero = self.stiffness.iter().map(BTreeMap::len).sum();
        let total = self.size() * self.size();
        let percent_sparse = if total == 0 {
            100.0
        } else {
            100.0 * (1.0 - non_zero as f64 / total as f64)
        };
        Sparsity {
            non_zero,
            total,
            percent_sparse,
        }
    }

    /// Drop all stiffness and loads while keeping the fixed DOFs.
    pub fn reset(&mut self) {
        for columns in &mut self.stiffness {
            columns.clear();
        }
        self.load.fill(0.0);
    }
}
