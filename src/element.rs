//! Axial two-node bar element with a brittle failure state.

use log::info;
use nalgebra::{DVector, SMatrix};
use serde::{Deserialize, Serialize};

use crate::errors::{MeshError, PropertyError};
use crate::geometry::{Displacement, Point};
use crate::mesh::Node;

/// Shortest length used as a divisor; coincident nodes are clamped to it.
pub const MIN_LENGTH: f64 = 1.0e-6;

/// Element stiffness in global coordinates, ordered `[u1x, u1y, u2x, u2y]`.
pub type LocalStiffness = SMatrix<f64, 4, 4>;

/// Material and section properties of a bar.
///
/// Missing fields deserialize to [`BarProperties::default`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarProperties {
    /// Young's modulus in pascals.
    pub elastic_modulus: f64,
    /// Cross-sectional area in square metres.
    pub area: f64,
    /// Stress magnitude in pascals above which the bar breaks.
    pub yield_stress: f64,
}

impl BarProperties {
    /// Create a validated set of bar properties.
    ///
    /// # Errors
    ///
    /// Returns a [`PropertyError`] when any value is zero or negative.
    ///
    /// # Examples
    /// ```
    /// use trusslab::{BarProperties, PropertyError};
    ///
    /// assert!(BarProperties::new(200.0e9, 0.01, 250.0e6).is_ok());
    /// assert_eq!(
    ///     BarProperties::new(200.0e9, 0.0, 250.0e6),
    ///     Err(PropertyError::NonPositiveArea(0.0))
    /// );
    /// ```
    pub fn new(elastic_modulus: f64, area: f64, yield_stress: f64) -> Result<Self, PropertyError> {
        let properties = Self {
            elastic_modulus,
            area,
            yield_stress,
        };
        properties.validate()?;
        Ok(properties)
    }

    /// Structural steel (E = 200 GPa, yield = 250 MPa) with the given area.
    #[must_use]
    pub const fn steel(area: f64) -> Self {
        Self {
            elastic_modulus: 200.0e9,
            area,
            yield_stress: 250.0e6,
        }
    }

    /// Check that every property is strictly positive.
    ///
    /// # Errors
    ///
    /// Returns the first offending property as a [`PropertyError`].
    pub fn validate(&self) -> Result<(), PropertyError> {
        if !is_positive(self.area) {
            return Err(PropertyError::NonPositiveArea(self.area));
        }
        if !is_positive(self.elastic_modulus) {
            return Err(PropertyError::NonPositiveElasticModulus(
                self.elastic_modulus,
            ));
        }
        if !is_positive(self.yield_stress) {
            return Err(PropertyError::NonPositiveYieldStress(self.yield_stress));
        }
        Ok(())
    }

    /// Axial stiffness `E * A / length`.
    #[must_use]
    pub fn axial_stiffness(&self, length: f64) -> f64 {
        self.elastic_modulus * self.area / length
    }
}

/// Strictly positive and not NaN.
fn is_positive(value: f64) -> bool {
    !value.is_nan() && value > 0.0
}

impl Default for BarProperties {
    fn default() -> Self {
        Self::steel(0.01)
    }
}

/// Structural state of a bar. `Failed` is terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementState {
    /// The bar carries load.
    #[default]
    Intact,
    /// The bar has broken and no longer contributes stiffness or energy.
    Failed,
}

/// A pin-jointed bar connecting two nodes of a caller-owned node sequence.
///
/// The element stores node indices only. Geometry is resolved against the
/// node slice handed to [`BarElement::refresh_geometry`] and
/// [`BarElement::evaluate_strain`], so nodes may be moved freely between steps.
#[derive(Clone, Debug, PartialEq)]
pub struct BarElement {
    /// Index of the first node.
    n1: usize,
    /// Index of the second node.
    n2: usize,
    /// Material and section.
    properties: BarProperties,
    /// Current (clamped) length.
    length: f64,
    /// As-built length, the strain reference for the element's lifetime.
    original_length: f64,
    /// Direction cosine along X.
    cos: f64,
    /// Direction cosine along Y.
    sin: f64,
    /// Cached stiffness from the last refresh.
    stiffness: LocalStiffness,
    /// Engineering strain from the last evaluation.
    strain: f64,
    /// Axial stress from the last evaluation.
    stress: f64,
    /// Intact or failed.
    state: ElementState,
}

impl BarElement {
    /// Create a bar between `n1` and `n2`, capturing its as-built length.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::UnknownNode`] when either index is out of range,
    /// [`MeshError::SelfConnectedElement`] when both ends are the same node and
    /// [`MeshError::InvalidProperties`] for non-physical properties.
    ///
    /// # Examples
    /// ```
    /// use trusslab::{point, BarElement, BarProperties, Node};
    ///
    /// let nodes = vec![Node::new(point(0.0, 0.0)), Node::new(point(3.0, 4.0))];
    /// let bar = BarElement::new(0, 1, &nodes, BarProperties::steel(0.01)).unwrap();
    /// assert_eq!(bar.original_length(), 5.0);
    /// assert_eq!(bar.global_dof_indices(), [0, 1, 2, 3]);
    /// ```
    pub fn new(
        n1: usize,
        n2: usize,
        nodes: &[Node],
        properties: BarProperties,
    ) -> Result<Self, MeshError> {
        properties.validate()?;
        if n1 == n2 {
            return Err(MeshError::SelfConnectedElement(n1));
        }
        let mut element = Self {
            n1,
            n2,
            properties,
            length: 0.0,
            original_length: 0.0,
            cos: 0.0,
            sin: 0.0,
            stiffness: LocalStiffness::zeros(),
            strain: 0.0,
            stress: 0.0,
            state: ElementState::Intact,
        };
        element.refresh_geometry(nodes)?;
        element.original_length = element.length;
        Ok(element)
    }

    /// Node indices `(n1, n2)`.
    #[must_use]
    pub fn nodes(&self) -> (usize, usize) {
        (self.n1, self.n2)
    }

    /// Material and section properties.
    #[must_use]
    pub fn properties(&self) -> &BarProperties {
        &self.properties
    }

    /// Replace the material and section properties, e.g. to reinforce a bar.
    ///
    /// The cached stiffness is stale until the next [`refresh_geometry`](Self::refresh_geometry).
    ///
    /// # Errors
    ///
    /// Returns a [`PropertyError`] when the new properties are not physical.
    pub fn set_properties(&mut self, properties: BarProperties) -> Result<(), PropertyError> {
        properties.validate()?;
        self.properties = properties;
        Ok(())
    }

    /// Resolve both end nodes against `nodes`.
    fn endpoints<'a>(&self, nodes: &'a [Node]) -> Result<(&'a Node, &'a Node), MeshError> {
        let start = nodes.get(self.n1).ok_or(MeshError::UnknownNode(self.n1))?;
        let end = nodes.get(self.n2).ok_or(MeshError::UnknownNode(self.n2))?;
        Ok((start, end))
    }

    /// Recompute length, direction cosines and stiffness from current node positions.
    ///
    /// Must run before every assembly pass since nodes may have moved.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::UnknownNode`] when an end node no longer exists.
    pub fn refresh_geometry(&mut self, nodes: &[Node]) -> Result<(), MeshError> {
        let (start, end) = self.endpoints(nodes)?;
        let delta = end.position.to_vector() - start.position.to_vector();
        self.length = delta.norm().max(MIN_LENGTH);
        self.cos = delta.x / self.length;
        self.sin = delta.y / self.length;

        let c = self.cos;
        let s = self.sin;
        let c2 = c * c;
        let s2 = s * s;
        let cs = c * s;
        self.stiffness = self.properties.axial_stiffness(self.length)
            * LocalStiffness::from_row_slice(&[
                c2, cs, -c2, -cs, //
                cs, s2, -cs, -s2, //
                -c2, -cs, c2, cs, //
                -cs, -s2, cs, s2,
            ]);
        Ok(())
    }

    /// Global degrees of freedom addressed by rows and columns of [`local_stiffness`](Self::local_stiffness).
    #[must_use]
    pub fn global_dof_indices(&self) -> [usize; 4] {
        [2 * self.n1, 2 * self.n1 + 1, 2 * self.n2, 2 * self.n2 + 1]
    }

    /// Stiffness computed by the last [`refresh_geometry`](Self::refresh_geometry).
    #[must_use]
    pub fn local_stiffness(&self) -> &LocalStiffness {
        &self.stiffness
    }

    /// Compute strain and stress from a solved displacement vector.
    ///
    /// Displacement entries missing from a short vector count as zero. Crossing
    /// the yield stress flips the element to [`ElementState::Failed`]; this is the
    /// only place failure is decided and it is never undone.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::UnknownNode`] when an end node no longer exists.
    pub fn evaluate_strain(
        &mut self,
        nodes: &[Node],
        displacements: &DVector<f64>,
    ) -> Result<f64, MeshError> {
        let (start, end) = self.endpoints(nodes)?;
        let deformed_start: Point = start
            .position
            .displaced(nodal_displacement(displacements, self.n1));
        let deformed_end: Point = end
            .position
            .displaced(nodal_displacement(displacements, self.n2));
        let deformed_length = deformed_start.distance_to(deformed_end);

        self.strain = (deformed_length - self.original_length) / self.original_length;
        self.stress = self.properties.elastic_modulus * self.strain;

        if self.stress.abs() > self.properties.yield_stress && !self.is_failed() {
            self.state = ElementState::Failed;
            info!(
                "bar {}-{} failed at stress {:.3e} Pa (yield {:.3e} Pa)",
                self.n1, self.n2, self.stress, self.properties.yield_stress
            );
        }
        Ok(self.strain)
    }

    /// Stored elastic energy `0.5 * E * strain^2 * A * L0`, zero once failed.
    #[must_use]
    pub fn strain_energy(&self) -> f64 {
        if self.is_failed() {
            return 0.0;
        }
        0.5 * self.properties.elastic_modulus
            * self.strain
            * self.strain
            * self.properties.area
            * self.original_length
    }

    /// `|stress| / yield stress`; values above one mean the bar has broken.
    #[must_use]
    pub fn stress_ratio(&self) -> f64 {
        self.stress.abs() / self.properties.yield_stress
    }

    /// Strain at which the bar yields.
    #[must_use]
    pub fn yield_strain(&self) -> f64 {
        self.properties.yield_stress / self.properties.elastic_modulus
    }

    /// Axial force carried at the last evaluation, tension positive.
    #[must_use]
    pub fn axial_force(&self) -> f64 {
        self.stress * self.properties.area
    }

    /// Current length from the last refresh.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Length captured at construction.
    #[must_use]
    pub fn original_length(&self) -> f64 {
        self.original_length
    }

    /// Direction cosines `(c, s)` from the last refresh.
    #[must_use]
    pub fn direction(&self) -> (f64, f64) {
        (self.cos, self.sin)
    }

    /// Strain from the last evaluation.
    #[must_use]
    pub fn strain(&self) -> f64 {
        self.strain
    }

    /// Stress from the last evaluation.
    #[must_use]
    pub fn stress(&self) -> f64 {
        self.stress
    }

    /// Current structural state.
    #[must_use]
    pub fn state(&self) -> ElementState {
        self.state
    }

    /// Whether the bar has broken.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.state == ElementState::Failed
    }
}

/// Read the displacement of `node` from a full vector, treating missing entries as zero.
#[must_use]
pub fn nodal_displacement(displacements: &DVector<f64>, node: usize) -> Displacement {
    let component = |dof: usize| displacements.get(dof).copied().unwrap_or(0.0);
    Displacement::new(component(2 * node), component(2 * node + 1))
}
