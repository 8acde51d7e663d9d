//! Dense direct solve of an assembled system.
//!
//! Boundary conditions are enforced with the penalty method and the system is
//! reduced by Gaussian elimination with partial pivoting. The whole solve is
//! redone from scratch for every step.

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::assembly::GlobalAssembly;
use crate::element::nodal_displacement;
use crate::geometry::Displacement;

/// Numerical constants used by [`Solver`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Diagonal stiffness placed on every fixed degree of freedom.
    pub penalty: f64,
    /// Pivots smaller than this fraction of the largest free diagonal are
    /// treated as zero.
    pub pivot_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            penalty: 1.0e20,
            pivot_tolerance: 1.0e-12,
        }
    }
}

/// Result of a single solve.
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    /// Displacement of every degree of freedom, `[u0x, u0y, u1x, ...]`.
    pub displacements: DVector<f64>,
    /// Degrees of freedom whose pivot vanished and were forced to zero.
    ///
    /// A non-empty list means part of the mesh is disconnected or a mechanism.
    pub indeterminate_dofs: Vec<usize>,
}

impl Solution {
    /// Whether every degree of freedom was resolved.
    #[must_use]
    pub fn is_determinate(&self) -> bool {
        self.indeterminate_dofs.is_empty()
    }

    /// Displacement of a single node.
    #[must_use]
    pub fn node_displacement(&self, node: usize) -> Displacement {
        nodal_displacement(&self.displacements, node)
    }
}

/// Penalty-method Gaussian elimination solver.
///
/// # Examples
/// ```
/// use trusslab::{force, point, BarElement, BarProperties, GlobalAssembly, Node, Solver};
///
/// let nodes = vec![Node::new(point(0.0, 0.0)), Node::new(point(1.0, 0.0))];
/// let mut bar = BarElement::new(0, 1, &nodes, BarProperties::steel(0.01)).unwrap();
/// bar.refresh_geometry(&nodes).unwrap();
///
/// let mut assembly = GlobalAssembly::new(2);
/// assembly.fix_node(0).unwrap();
/// assembly.add_element(&bar).unwrap();
/// assembly.apply_force(1, force(1.0e6, 0.0)).unwrap();
///
/// let solution = Solver::default().solve(&assembly);
/// assert!((solution.displacements[2] - 5.0e-4).abs() < 1.0e-12);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Solver {
    /// Penalty and tolerance.
    config: SolverConfig,
}

impl Solver {
    /// Create a solver with explicit constants.
    #[must_use]
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Constants in use.
    #[must_use]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Densify the system and apply the penalty to every fixed DOF.
    ///
    /// Each fixed row and column is zeroed, its diagonal set to the penalty and
    /// its load cleared, which fully decouples it from the free DOFs.
    #[must_use]
    pub fn effective_system(&self, assembly: &GlobalAssembly) -> (DMatrix<f64>, DVector<f64>) {
        let mut stiffness = assembly.to_dense();
        let mut load = assembly.load().clone();
        for dof in assembly.fixed_dofs() {
            stiffness.row_mut(dof).fill(0.0);
            stiffness.column_mut(dof).fill(0.0);
            stiffness[(dof, dof)] = self.config.penalty;
            load[dof] = 0.0;
        }
        (stiffness, load)
    }

    /// Absolute pivot threshold for `assembly`.
    ///
    /// Round-off left on a mechanism pivot grows with the stiffness of the
    /// surrounding bars, so the tolerance is scaled by the largest diagonal of
    /// the free DOFs. Penalty diagonals are not part of the scale.
    #[must_use]
    pub fn pivot_threshold(&self, assembly: &GlobalAssembly) -> f64 {
        let scale = (0..assembly.size())
            .filter(|&dof| !assembly.is_fixed(dof))
            .map(|dof| assembly.stiffness_entry(dof, dof).abs())
            .fold(0.0, f64::max);
        if scale > 0.0 {
            self.config.pivot_tolerance * scale
        } else {
            self.config.pivot_tolerance
        }
    }

    /// Solve for the full displacement vector, fixed DOFs included.
    #[must_use]
    pub fn solve(&self, assembly: &GlobalAssembly) -> Solution {
        let threshold = self.pivot_threshold(assembly);
        let (stiffness, load) = self.effective_system(assembly);
        let solution = eliminate(stiffness, load, threshold);
        debug!(
            "solved {} degrees of freedom ({} fixed, pivot threshold {:.3e})",
            solution.displacements.len(),
            assembly.fixed_dofs().count(),
            threshold
        );
        if !solution.is_determinate() {
            warn!(
                "{} degrees of freedom are indeterminate and were set to zero: {:?}",
                solution.indeterminate_dofs.len(),
                solution.indeterminate_dofs
            );
        }
        solution
    }
}

/// Gaussian elimination with partial pivoting followed by back substitution.
///
/// Pivots below `tolerance` are skipped rather than reported as errors; the
/// matching unknowns come back as zero and are listed in the solution.
fn eliminate(mut a: DMatrix<f64>, mut b: DVector<f64>, tolerance: f64) -> Solution {
    let n = b.len();

    for k in 0..n.saturating_sub(1) {
        let mut pivot_row = k;
        let mut pivot = a[(k, k)].abs();
        for i in (k + 1)..n {
            if a[(i, k)].abs() > pivot {
                pivot = a[(i, k)].abs();
                pivot_row = i;
            }
        }
        if pivot_row != k {
            a.swap_rows(k, pivot_row);
            b.swap_rows(k, pivot_row);
        }
        if a[(k, k)].abs() < tolerance {
            continue;
        }
        for i in (k + 1)..n {
            let factor = a[(i, k)] / a[(k, k)];
            if factor == 0.0 {
                continue;
            }
            a[(i, k)] = 0.0;
            for j in (k + 1)..n {
                let upper = a[(k, j)];
                a[(i, j)] -= factor * upper;
            }
            let upper = b[k];
            b[i] -= factor * upper;
        }
    }

    let mut x = DVector::zeros(n);
    let mut indeterminate_dofs = Vec::new();
    for i in (0..n).rev() {
        if a[(i, i)].abs() < tolerance {
            indeterminate_dofs.push(i);
            continue;
        }
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum -= a[(i, j)] * x[j];
        }
        x[i] = sum / a[(i, i)];
    }
    indeterminate_dofs.reverse();

    Solution {
        displacements: x,
        indeterminate_dofs,
    }
}

/// Euclidean norm of `K * x - F`.
#[must_use]
pub fn residual_norm(stiffness: &DMatrix<f64>, x: &DVector<f64>, load: &DVector<f64>) -> f64 {
    (stiffness * x - load).norm()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::element::{BarElement, BarProperties};
    use crate::geometry::{force, point};
    use crate::mesh::Node;

    #[test]
    fn pivoting_handles_zero_leading_entry() {
        let solver = Solver::default();
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]);
        let b = DVector::from_vec(vec![2.0, 3.0]);
        let solution = eliminate(a, b, 1.0e-12);
        assert_eq!(solution.displacements, DVector::from_vec(vec![3.0, 2.0]));
        assert!(solution.is_determinate());
    }

    #[test]
    fn elimination_solves_general_system() {
        let solver = Solver::default();
        let a = DMatrix::from_row_slice(3, 3, &[2.0, 1.0, -1.0, -3.0, -1.0, 2.0, -2.0, 1.0, 2.0]);
        let b = DVector::from_vec(vec![8.0, -11.0, -3.0]);
        let x = eliminate(a, b, 1.0e-12).displacements;
        assert_relative_eq!(x[0], 2.0, epsilon = 1.0e-12);
        assert_relative_eq!(x[1], 3.0, epsilon = 1.0e-12);
        assert_relative_eq!(x[2], -1.0, epsilon = 1.0e-12);
    }

    #[test]
    fn singular_rows_are_zeroed_and_reported() {
        let solver = Solver::default();
        let a = DMatrix::from_row_slice(3, 3, &[4.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0]);
        let b = DVector::from_vec(vec![8.0, 1.0, 6.0]);
        let solution = eliminate(a, b, 1.0e-12);
        assert_eq!(solution.displacements, DVector::from_vec(vec![2.0, 0.0, 3.0]));
        assert_eq!(solution.indeterminate_dofs, vec![1]);
    }

    #[test]
    fn penalty_decouples_fixed_dofs() {
        let nodes = vec![Node::new(point(0.0, 0.0)), Node::new(point(1.0, 1.0))];
        let mut bar = BarElement::new(0, 1, &nodes, BarProperties::default()).unwrap();
        bar.refresh_geometry(&nodes).unwrap();
        let mut assembly = GlobalAssembly::new(2);
        assembly.add_element(&bar).unwrap();
        assembly.fix_node(0).unwrap();
        assembly.apply_force(0, force(10.0, 10.0)).unwrap();

        let solver = Solver::default();
        let (k, f) = solver.effective_system(&assembly);
        for other in 1..4 {
            assert_eq!(k[(0, other)], 0.0);
            assert_eq!(k[(other, 0)], 0.0);
        }
        assert_eq!(k[(0, 0)], 1.0e20);
        assert_eq!(k[(1, 1)], 1.0e20);
        assert_eq!(f[0], 0.0);
        assert_eq!(f[1], 0.0);
    }

    #[test]
    fn axial_bar_matches_closed_form() {
        let nodes = vec![Node::new(point(0.0, 0.0)), Node::new(point(1.0, 0.0))];
        let bar = BarElement::new(0, 1, &nodes, BarProperties::steel(0.01)).unwrap();
        let mut assembly = GlobalAssembly::new(2);
        assembly.fix_node(0).unwrap();
        assembly.fix_dof(1, crate::assembly::Axis::Y).unwrap();
        assembly.add_element(&bar).unwrap();
        assembly.apply_force(1, force(1.0e6, 0.0)).unwrap();

        let solver = Solver::default();
        let solution = solver.solve(&assembly);
        assert!(solution.is_determinate());
        let tip = solution.node_displacement(1);
        assert_relative_eq!(tip.x, 5.0e-4, max_relative = 1.0e-9);
        assert!(tip.y.abs() < 1.0e-12);
        assert!(solution.node_displacement(0).magnitude() < 1.0e-6);

        let (k, f) = solver.effective_system(&assembly);
        assert!(residual_norm(&k, &solution.displacements, &f) < 1.0e-6);
    }

    #[test]
    fn transverse_mechanism_is_reported() {
        let nodes = vec![Node::new(point(0.0, 0.0)), Node::new(point(1.0, 0.0))];
        let bar = BarElement::new(0, 1, &nodes, BarProperties::steel(0.01)).unwrap();
        let mut assembly = GlobalAssembly::new(2);
        assembly.fix_node(0).unwrap();
        assembly.add_element(&bar).unwrap();
        assembly.apply_force(1, force(1.0e6, 5.0)).unwrap();

        let solution = Solver::default().solve(&assembly);
        assert_eq!(solution.indeterminate_dofs, vec![3]);
        assert_eq!(solution.displacements[3], 0.0);
        assert_relative_eq!(solution.displacements[2], 5.0e-4, max_relative = 1.0e-9);
    }

    #[test]
    fn pivot_threshold_scales_with_free_stiffness() {
        let nodes = vec![Node::new(point(0.0, 0.0)), Node::new(point(1.0, 0.0))];
        let bar = BarElement::new(0, 1, &nodes, BarProperties::steel(0.01)).unwrap();
        let mut assembly = GlobalAssembly::new(2);
        assembly.fix_node(0).unwrap();
        assembly.add_element(&bar).unwrap();

        let solver = Solver::default();
        assert_relative_eq!(solver.pivot_threshold(&assembly), 1.0e-12 * 2.0e9);
        assert_eq!(solver.pivot_threshold(&GlobalAssembly::new(2)), 1.0e-12);
    }

    #[test]
    fn round_off_pivot_reads_as_mechanism() {
        // A stiff DOF next to a pivot that is pure elimination noise.
        let a = DMatrix::from_row_slice(2, 2, &[2.0e9, 0.0, 0.0, 1.0e-6]);
        let b = DVector::from_vec(vec![2.0e3, 1.0e3]);
        let solution = eliminate(a, b, 1.0e-12 * 2.0e9);
        assert_eq!(solution.indeterminate_dofs, vec![1]);
        assert_eq!(solution.displacements[1], 0.0);
        assert_relative_eq!(solution.displacements[0], 1.0e-6);
    }

    #[test]
    fn config_fills_missing_fields() {
        let config: SolverConfig = serde_json::from_str(r#"{ "penalty": 1e18 }"#).unwrap();
        assert_eq!(config.penalty, 1.0e18);
        assert_eq!(config.pivot_tolerance, 1.0e-12);
        assert_eq!(Solver::new(config).config().penalty, 1.0e18);
    }
}
