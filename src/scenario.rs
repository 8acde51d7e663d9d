//! Scenario documents: a mesh, its supports and a load ramp.
//!
//! Scenarios are plain JSON so drivers and tests can share setups:
//!
//! ```json
//! {
//!   "nodes": [{ "x": 0.0, "y": 0.0, "fixed": true }, { "x": 1.0, "y": 0.0 }],
//!   "elements": [{ "n1": 0, "n2": 1, "elastic_modulus": 2e11, "area": 0.01, "yield_stress": 2.5e8 }],
//!   "fixed_dofs": [{ "node": 1, "axis": "y" }],
//!   "loads": [{ "node": 1, "fx": 1e6, "fy": 0.0 }],
//!   "steps": 4
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::assembly::Axis;
use crate::element::BarProperties;
use crate::errors::{AnalysisError, MeshError};
use crate::geometry::{force, point};
use crate::mesh::{Mesh, NodalLoad, Node};
use crate::solver::{Solver, SolverConfig};

/// A bar in a scenario document.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementSpec {
    /// First node index.
    pub n1: usize,
    /// Second node index.
    pub n2: usize,
    /// Material and section.
    #[serde(flatten)]
    pub properties: BarProperties,
}

/// A single-direction support in a scenario document.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DofSpec {
    /// Constrained node.
    pub node: usize,
    /// Constrained direction.
    pub axis: Axis,
}

/// A full-scale nodal load in a scenario document.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadSpec {
    /// Loaded node.
    pub node: usize,
    /// Force along X in newtons.
    #[serde(default)]
    pub fx: f64,
    /// Force along Y in newtons.
    #[serde(default)]
    pub fy: f64,
}

/// Default number of load steps.
fn one_step() -> usize {
    1
}

/// A complete analysis setup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Initial node positions and full supports.
    pub nodes: Vec<Node>,
    /// Bars connecting the nodes.
    pub elements: Vec<ElementSpec>,
    /// Roller supports.
    #[serde(default)]
    pub fixed_dofs: Vec<DofSpec>,
    /// Loads reached at the final step.
    #[serde(default)]
    pub loads: Vec<LoadSpec>,
    /// Number of steps used to ramp the loads from zero to full scale.
    #[serde(default = "one_step")]
    pub steps: usize,
    /// Solver constants.
    #[serde(default)]
    pub solver: SolverConfig,
}

impl Scenario {
    /// Parse a scenario from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Scenario`] when the text is not a valid scenario.
    pub fn from_json(text: &str) -> Result<Self, AnalysisError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize the scenario as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Scenario`] if serialization fails.
    pub fn to_json(&self) -> Result<String, AnalysisError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build a fresh mesh from the document.
    ///
    /// # Errors
    ///
    /// Returns a [`MeshError`] when a bar or support references an unknown node
    /// or carries invalid properties.
    pub fn build_mesh(&self) -> Result<Mesh, MeshError> {
        let mut mesh = Mesh::new();
        mesh.nodes = self.nodes.clone();
        for element in &self.elements {
            mesh.add_element(element.n1, element.n2, element.properties)?;
        }
        for dof in &self.fixed_dofs {
            mesh.fix_dof(dof.node, dof.axis)?;
        }
        Ok(mesh)
    }

    /// Number of steps, never less than one.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.max(1)
    }

    /// Loads for `step` (zero based), scaled linearly so the last step is full scale.
    #[must_use]
    pub fn loads_at(&self, step: usize) -> Vec<NodalLoad> {
        let factor = (step + 1) as f64 / self.step_count() as f64;
        self.loads
            .iter()
            .map(|load| NodalLoad::new(load.node, force(load.fx, load.fy).scaled(factor)))
            .collect()
    }

    /// Solver configured with this scenario's constants.
    #[must_use]
    pub fn solver(&self) -> Solver {
        Solver::new(self.solver)
    }

    /// A single steel bar pulled along its axis.
    ///
    /// The free end rolls along X; `tip_load` is applied there.
    #[must_use]
    pub fn cantilever(tip_load: f64, steps: usize) -> Self {
        Self {
            nodes: vec![Node::fixed(point(0.0, 0.0)), Node::new(point(1.0, 0.0))],
            elements: vec![ElementSpec {
                n1: 0,
                n2: 1,
                properties: BarProperties::steel(0.01),
            }],
            fixed_dofs: vec![DofSpec {
                node: 1,
                axis: Axis::Y,
            }],
            loads: vec![LoadSpec {
                node: 1,
                fx: tip_load,
                fy: 0.0,
            }],
            steps,
            solver: SolverConfig::default(),
        }
    }

    /// A two-chord timber-like bridge with alternating diagonals.
    ///
    /// Both end verticals are fully fixed and every free node carries
    /// `deck_load` newtons downward.
    #[must_use]
    pub fn bridge(segments: usize, deck_load: f64, steps: usize) -> Self {
        const SEGMENT_WIDTH: f64 = 2.0;
        const DEPTH: f64 = 1.0;
        const CHORD_TOP: BarProperties = BarProperties {
            elastic_modulus: 5.0e9,
            area: 0.010,
            yield_stress: 80.0e6,
        };
        const CHORD_BOTTOM: BarProperties = BarProperties {
            area: 0.008,
            ..CHORD_TOP
        };
        const VERTICAL: BarProperties = BarProperties {
            area: 0.006,
            ..CHORD_TOP
        };
        const DIAGONAL: BarProperties = BarProperties {
            area: 0.005,
            yield_stress: 64.0e6,
            ..CHORD_TOP
        };

        let segments = segments.max(1);
        let mut nodes = Vec::with_capacity(2 * (segments + 1));
        for panel in 0..=segments {
            let x = panel as f64 * SEGMENT_WIDTH;
            let anchored = panel == 0 || panel == segments;
            nodes.push(Node {
                position: point(x, DEPTH),
                fixed: anchored,
            });
            nodes.push(Node {
                position: point(x, 0.0),
                fixed: anchored,
            });
        }

        let bar = |n1: usize, n2: usize, properties: BarProperties| ElementSpec {
            n1,
            n2,
            properties,
        };
        let mut elements = Vec::new();
        for panel in 0..=segments {
            let top = 2 * panel;
            let bottom = top + 1;
            elements.push(bar(top, bottom, VERTICAL));
            if panel < segments {
                let next_top = top + 2;
                let next_bottom = bottom + 2;
                elements.push(bar(top, next_top, CHORD_TOP));
                elements.push(bar(bottom, next_bottom, CHORD_BOTTOM));
                if panel % 2 == 0 {
                    elements.push(bar(top, next_bottom, DIAGONAL));
                } else {
                    elements.push(bar(bottom, next_top, DIAGONAL));
                }
            }
        }

        let loads = nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| !node.fixed)
            .map(|(node, _)| LoadSpec {
                node,
                fx: 0.0,
                fy: -deck_load,
            })
            .collect();

        Self {
            nodes,
            elements,
            fixed_dofs: Vec::new(),
            loads,
            steps,
            solver: SolverConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn parses_minimal_document() {
        let scenario = Scenario::from_json(
            r#"{
                "nodes": [{ "x": 0, "y": 0, "fixed": true }, { "x": 1, "y": 0 }],
                "elements": [{ "n1": 0, "n2": 1, "area": 0.02 }],
                "loads": [{ "node": 1, "fx": 10.0 }]
            }"#,
        )
        .unwrap();
        assert_eq!(scenario.steps, 1);
        assert_eq!(scenario.solver, SolverConfig::default());
        assert!(scenario.nodes[0].fixed);
        assert!(!scenario.nodes[1].fixed);
        assert_eq!(scenario.elements[0].properties.area, 0.02);
        assert_eq!(scenario.elements[0].properties.elastic_modulus, 200.0e9);
        assert_eq!(scenario.loads[0].fy, 0.0);
    }

    #[test]
    fn malformed_json_is_reported() {
        let error = Scenario::from_json("{ \"nodes\": 3 }").expect_err("bad document");
        assert!(matches!(error, AnalysisError::Scenario(_)));
    }

    #[test]
    fn json_roundtrip_preserves_document() {
        let scenario = Scenario::cantilever(1.0e6, 3);
        let text = scenario.to_json().unwrap();
        assert!(text.contains("\"axis\": \"y\""));
        assert_eq!(Scenario::from_json(&text).unwrap(), scenario);
    }

    #[test]
    fn loads_ramp_to_full_scale() {
        let scenario = Scenario::cantilever(1.0e6, 4);
        assert_relative_eq!(scenario.loads_at(0)[0].force.x, 2.5e5);
        assert_relative_eq!(scenario.loads_at(3)[0].force.x, 1.0e6);
        let degenerate = Scenario {
            steps: 0,
            ..Scenario::cantilever(1.0e6, 0)
        };
        assert_eq!(degenerate.step_count(), 1);
        assert_relative_eq!(degenerate.loads_at(0)[0].force.x, 1.0e6);
    }

    #[test]
    fn bridge_topology() {
        let scenario = Scenario::bridge(4, 1_000.0, 1);
        assert_eq!(scenario.nodes.len(), 10);
        assert_eq!(scenario.elements.len(), 5 + 3 * 4);
        assert_eq!(scenario.loads.len(), 6);
        let mesh = scenario.build_mesh().unwrap();
        assert!(mesh.unsupported_nodes().is_empty());
    }

    #[test]
    fn bad_references_fail_to_build() {
        let mut scenario = Scenario::cantilever(1.0, 1);
        scenario.fixed_dofs.push(DofSpec {
            node: 4,
            axis: Axis::X,
        });
        assert_eq!(scenario.build_mesh().unwrap_err(), MeshError::UnknownNode(4));
    }
}
