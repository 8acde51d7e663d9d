//! Caller-owned mesh and the per-step analysis driver.

use std::collections::BTreeSet;

use log::{debug, warn};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Dfs;
use serde::{Deserialize, Serialize};

use crate::assembly::{Axis, GlobalAssembly, Sparsity};
use crate::element::{BarElement, BarProperties};
use crate::errors::{AnalysisError, MeshError};
use crate::geometry::{Displacement, Force, Point};
use crate::solver::{Solution, Solver};
use crate::strain::{evaluate_strains, StrainStats};

/// A pin joint. A fixed node has both displacements held at zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Current position in metres.
    #[serde(flatten)]
    pub position: Point,
    /// Whether both degrees of freedom are constrained.
    #[serde(default)]
    pub fixed: bool,
}

impl Node {
    /// Create a free node.
    #[must_use]
    pub const fn new(position: Point) -> Self {
        Self {
            position,
            fixed: false,
        }
    }

    /// Create a fully constrained node.
    #[must_use]
    pub const fn fixed(position: Point) -> Self {
        Self {
            position,
            fixed: true,
        }
    }
}

/// A force applied to one node for one step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodalLoad {
    /// Loaded node.
    pub node: usize,
    /// Applied force in newtons.
    pub force: Force,
}

impl NodalLoad {
    /// Create a load on `node`.
    #[must_use]
    pub const fn new(node: usize, force: Force) -> Self {
        Self { node, force }
    }
}

/// Everything produced by one [`Mesh::step`].
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome {
    /// Solved displacements and indeterminate DOFs.
    pub solution: Solution,
    /// Strain summary after failure evaluation.
    pub stats: StrainStats,
    /// Fill of the assembled stiffness matrix.
    pub sparsity: Sparsity,
}

impl StepOutcome {
    /// Displacement of a single node.
    #[must_use]
    pub fn node_displacement(&self, node: usize) -> Displacement {
        self.solution.node_displacement(node)
    }
}

/// Nodes and bars of a truss.
///
/// Both collections are public so a driver can move nodes, toggle supports or
/// append and prune bars between steps. Bars refer to nodes by index only.
///
/// # Examples
/// ```
/// use trusslab::{force, point, BarProperties, Mesh, NodalLoad, Solver};
///
/// let mut mesh = Mesh::new();
/// let base = mesh.add_fixed_node(point(0.0, 0.0));
/// let tip = mesh.add_node(point(1.0, 0.0));
/// mesh.add_element(base, tip, BarProperties::steel(0.01)).unwrap();
///
/// let loads = [NodalLoad::new(tip, force(1.0e6, 0.0))];
/// let outcome = mesh.step(&loads, &Solver::default()).unwrap();
/// assert!((outcome.node_displacement(tip).x - 5.0e-4).abs() < 1.0e-12);
/// assert_eq!(outcome.stats.failed_count, 0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    /// Node sequence addressed by index.
    pub nodes: Vec<Node>,
    /// Bar sequence.
    pub elements: Vec<BarElement>,
    /// Single-direction constraints on otherwise free nodes.
    dof_constraints: BTreeSet<(usize, Axis)>,
}

impl Mesh {
    /// Create an empty mesh.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of bars, failed ones included.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Number of failed bars.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.elements.iter().filter(|bar| bar.is_failed()).count()
    }

    /// Append a free node and return its index.
    pub fn add_node(&mut self, position: Point) -> usize {
        self.nodes.push(Node::new(position));
        self.nodes.len() - 1
    }

    /// Append a fixed node and return its index.
    pub fn add_fixed_node(&mut self, position: Point) -> usize {
        self.nodes.push(Node::fixed(position));
        self.nodes.len() - 1
    }

    /// Borrow a node mutably or report that it does not exist.
    fn node_mut(&mut self, node: usize) -> Result<&mut Node, MeshError> {
        self.nodes.get_mut(node).ok_or(MeshError::UnknownNode(node))
    }

    /// Move a node. The bar's as-built length is unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::UnknownNode`] when `node` is out of range.
    pub fn move_node(&mut self, node: usize, position: Point) -> Result<(), MeshError> {
        self.node_mut(node)?.position = position;
        Ok(())
    }

    /// Set or clear the full support at a node.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::UnknownNode`] when `node` is out of range.
    pub fn set_fixed(&mut self, node: usize, fixed: bool) -> Result<(), MeshError> {
        self.node_mut(node)?.fixed = fixed;
        Ok(())
    }

    /// Constrain one direction of a node, e.g. for a roller support.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::UnknownNode`] when `node` is out of range.
    pub fn fix_dof(&mut self, node: usize, axis: Axis) -> Result<(), MeshError> {
        if node >= self.nodes.len() {
            return Err(MeshError::UnknownNode(node));
        }
        self.dof_constraints.insert((node, axis));
        Ok(())
    }

    /// Remove a single-direction constraint. Returns whether it was present.
    pub fn release_dof(&mut self, node: usize, axis: Axis) -> bool {
        self.dof_constraints.remove(&(node, axis))
    }

    /// Connect two nodes with a new bar and return its index.
    ///
    /// # Errors
    ///
    /// Returns a [`MeshError`] for unknown or identical nodes and for invalid properties.
    pub fn add_element(
        &mut self,
        n1: usize,
        n2: usize,
        properties: BarProperties,
    ) -> Result<usize, MeshError> {
        let element = BarElement::new(n1, n2, &self.nodes, properties)?;
        self.elements.push(element);
        Ok(self.elements.len() - 1)
    }

    /// Remove a bar, shifting later bars down by one.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::UnknownElement`] when `element` is out of range.
    pub fn remove_element(&mut self, element: usize) -> Result<BarElement, MeshError> {
        if element >= self.elements.len() {
            return Err(MeshError::UnknownElement(element));
        }
        Ok(self.elements.remove(element))
    }

    /// Keep only the bars for which `keep` returns `true`.
    pub fn retain_elements<F>(&mut self, keep: F)
    where
        F: FnMut(&BarElement) -> bool,
    {
        self.elements.retain(keep);
    }

    /// Nodes that no chain of intact bars ties to a fixed node.
    ///
    /// Only fully fixed nodes anchor a chain. A roller alone still leaves a
    /// rigid-body motion free, so a chain hanging from one is listed.
    #[must_use]
    pub fn unsupported_nodes(&self) -> Vec<usize> {
        let mut graph = UnGraph::<usize, usize>::with_capacity(self.nodes.len(), self.elements.len());
        for index in 0..self.nodes.len() {
            graph.add_node(index);
        }
        for (index, element) in self.elements.iter().enumerate() {
            let (n1, n2) = element.nodes();
            if !element.is_failed() && n1 < self.nodes.len() && n2 < self.nodes.len() {
                graph.add_edge(NodeIndex::new(n1), NodeIndex::new(n2), index);
            }
        }

        let supports = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.fixed)
            .map(|(index, _)| index);

        let mut dfs = Dfs::empty(&graph);
        for support in supports {
            dfs.move_to(NodeIndex::new(support));
            while dfs.next(&graph).is_some() {}
        }
        (0..self.nodes.len())
            .filter(|&index| !dfs.discovered.contains(index))
            .collect()
    }

    /// Run one assemble, solve and evaluate cycle against the current state.
    ///
    /// Geometry and stiffness of intact bars are refreshed first, so nodes may
    /// have moved since the previous step. Bars that exceed their yield stress
    /// are marked failed and stay failed.
    ///
    /// # Errors
    ///
    /// Returns an [`AnalysisError`] when a bar or load references a node that
    /// is not part of the mesh.
    pub fn step(&mut self, loads: &[NodalLoad], solver: &Solver) -> Result<StepOutcome, AnalysisError> {
        for (index, element) in self.elements.iter_mut().enumerate() {
            if !element.is_failed() {
                element
                    .refresh_geometry(&self.nodes)
                    .map_err(|error| AnalysisError::for_element(index, error))?;
            }
        }

        let mut assembly = GlobalAssembly::new(self.nodes.len());
        for (index, node) in self.nodes.iter().enumerate() {
            if node.fixed {
                assembly.fix_node(index)?;
            }
        }
        for &(node, axis) in &self.dof_constraints {
            assembly.fix_dof(node, axis)?;
        }
        for element in self.elements.iter().filter(|bar| !bar.is_failed()) {
            assembly.add_element(element)?;
        }
        for load in loads {
            assembly.apply_force(load.node, load.force)?;
        }

        let sparsity = assembly.sparsity();
        debug!(
            "assembled {} nodes, {} bars ({} stored coefficients, {:.1}% sparse)",
            assembly.node_count(),
            self.elements.len(),
            sparsity.non_zero,
            sparsity.percent_sparse
        );

        let solution = solver.solve(&assembly);
        if !solution.is_determinate() {
            let unsupported = self.unsupported_nodes();
            if !unsupported.is_empty() {
                warn!("nodes without a load path to a support: {unsupported:?}");
            }
        }

        let stats = evaluate_strains(&mut self.elements, &self.nodes, &solution.displacements)?;
        debug!(
            "max strain {:.3e}, energy {:.3e} J, {} failed, {} active",
            stats.max_strain,
            stats.total_strain_energy,
            stats.failed_count,
            stats.active_element_count
        );

        Ok(StepOutcome {
            solution,
            stats,
            sparsity,
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::geometry::{force, point};

    fn triangle() -> Mesh {
        let mut mesh = Mesh::new();
        let a = mesh.add_fixed_node(point(0.0, 0.0));
        let b = mesh.add_node(point(2.0, 0.0));
        let c = mesh.add_node(point(1.0, 1.0));
        mesh.fix_dof(b, Axis::Y).unwrap();
        for (start, end) in [(a, b), (b, c), (a, c)] {
            mesh.add_element(start, end, BarProperties::steel(0.005)).unwrap();
        }
        mesh
    }

    #[test]
    fn symmetric_triangle_shares_load_evenly() {
        let mut mesh = triangle();
        let outcome = mesh
            .step(&[NodalLoad::new(2, force(0.0, -1.0e5))], &Solver::default())
            .unwrap();
        assert!(outcome.solution.is_determinate());
        let left = mesh.elements[2].axial_force();
        let right = mesh.elements[1].axial_force();
        assert_relative_eq!(left, right, max_relative = 1.0e-6);
        // Strain is measured on the deformed length, so diagonals carry a small
        // second-order term on top of the linear answer.
        assert_relative_eq!(left, -1.0e5 / 2.0_f64.sqrt(), max_relative = 1.0e-3);
        assert_relative_eq!(mesh.elements[0].axial_force(), 5.0e4, max_relative = 1.0e-6);
        assert!(outcome.node_displacement(0).magnitude() < 1.0e-6);
        assert!(outcome.node_displacement(1).y.abs() < 1.0e-6);
    }

    #[test]
    fn unloaded_mesh_stays_put() {
        let mut mesh = triangle();
        let outcome = mesh.step(&[], &Solver::default()).unwrap();
        assert!(outcome.solution.displacements.iter().all(|u| *u == 0.0));
        assert!(outcome.stats.max_strain < 1.0e-15);
        assert!(outcome.stats.total_strain_energy < 1.0e-15);
    }

    #[test]
    fn rigid_rotation_leaves_bars_unstrained() {
        let mut mesh = Mesh::new();
        let hub = mesh.add_fixed_node(point(0.0, 0.0));
        let blade = mesh.add_node(point(1.0, 0.0));
        let brace = mesh.add_node(point(0.0, 1.0));
        mesh.add_element(hub, blade, BarProperties::default()).unwrap();
        mesh.add_element(hub, brace, BarProperties::default()).unwrap();
        mesh.add_element(blade, brace, BarProperties::default()).unwrap();

        let angle: f64 = 0.7;
        for node in &mut mesh.nodes {
            let Point { x, y } = node.position;
            node.position = point(
                x * angle.cos() - y * angle.sin(),
                x * angle.sin() + y * angle.cos(),
            );
        }
        let outcome = mesh.step(&[], &Solver::default()).unwrap();
        assert!(outcome.stats.max_strain < 1.0e-12);
        assert_relative_eq!(mesh.elements[0].direction().0, angle.cos(), epsilon = 1.0e-12);
        assert_relative_eq!(mesh.elements[2].original_length(), 2.0_f64.sqrt());
    }

    #[test]
    fn failed_bars_drop_out_of_later_steps() {
        let mut mesh = Mesh::new();
        let base = mesh.add_fixed_node(point(0.0, 0.0));
        let tip = mesh.add_node(point(1.0, 0.0));
        mesh.fix_dof(tip, Axis::Y).unwrap();
        mesh.add_element(base, tip, BarProperties::steel(0.01)).unwrap();
        let solver = Solver::default();

        let broken = mesh
            .step(&[NodalLoad::new(tip, force(3.0e6, 0.0))], &solver)
            .unwrap();
        assert_eq!(broken.stats.newly_failed, vec![0]);
        assert_eq!(mesh.failed_count(), 1);

        let after = mesh
            .step(&[NodalLoad::new(tip, force(1.0, 0.0))], &solver)
            .unwrap();
        assert_eq!(after.sparsity.non_zero, 0);
        assert_eq!(after.solution.indeterminate_dofs, vec![2]);
        assert_eq!(after.stats.failed_count, 1);
        assert_eq!(after.stats.active_element_count, 0);
        assert_eq!(after.stats.total_strain_energy, 0.0);
    }

    #[test]
    fn unsupported_nodes_follow_intact_bars() {
        let mut mesh = triangle();
        let island_a = mesh.add_node(point(5.0, 0.0));
        let island_b = mesh.add_node(point(6.0, 0.0));
        mesh.add_element(island_a, island_b, BarProperties::default()).unwrap();
        assert_eq!(mesh.unsupported_nodes(), vec![island_a, island_b]);

        mesh.set_fixed(0, false).unwrap();
        mesh.release_dof(1, Axis::Y);
        assert_eq!(mesh.unsupported_nodes(), vec![0, 1, 2, island_a, island_b]);
    }

    #[test]
    fn rollers_alone_do_not_anchor_a_chain() {
        let mut mesh = Mesh::new();
        let roller = mesh.add_node(point(0.0, 0.0));
        let hanging = mesh.add_node(point(0.0, -1.0));
        mesh.fix_dof(roller, Axis::Y).unwrap();
        mesh.add_element(roller, hanging, BarProperties::default()).unwrap();
        assert_eq!(mesh.unsupported_nodes(), vec![roller, hanging]);

        mesh.set_fixed(roller, true).unwrap();
        assert!(mesh.unsupported_nodes().is_empty());
    }

    #[test]
    fn pruning_and_editing() {
        let mut mesh = triangle();
        mesh.retain_elements(|bar| bar.nodes() != (1, 2));
        assert_eq!(mesh.element_count(), 2);
        let removed = mesh.remove_element(0).unwrap();
        assert_eq!(removed.nodes(), (0, 1));
        assert_eq!(mesh.remove_element(9), Err(MeshError::UnknownElement(9)));
        assert_eq!(mesh.move_node(7, point(0.0, 0.0)), Err(MeshError::UnknownNode(7)));
        assert_eq!(mesh.fix_dof(7, Axis::X), Err(MeshError::UnknownNode(7)));
    }

    #[test]
    fn dangling_element_is_reported() {
        let mut mesh = triangle();
        mesh.nodes.pop();
        let error = mesh.step(&[], &Solver::default()).expect_err("node 2 was removed");
        assert!(matches!(error, AnalysisError::UnknownNode { element: 1, node: 2 }));
    }

    #[test]
    fn loads_on_unknown_nodes_are_rejected() {
        let mut mesh = triangle();
        let error = mesh
            .step(&[NodalLoad::new(3, force(1.0, 0.0))], &Solver::default())
            .expect_err("no node 3");
        assert!(matches!(error, AnalysisError::DofOutOfRange { dof: 6, size: 6 }));
    }
}
