//! Error types produced while editing or analysing a truss mesh.

use thiserror::Error;

/// Error returned when bar properties are not physically meaningful.
#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum PropertyError {
    /// Returned when the cross-sectional area is zero or negative.
    #[error("area must be positive (received {0})")]
    NonPositiveArea(f64),
    /// Returned when the elastic modulus is zero or negative.
    #[error("elastic modulus must be positive (received {0})")]
    NonPositiveElasticModulus(f64),
    /// Returned when the yield stress is zero or negative.
    #[error("yield stress must be positive (received {0})")]
    NonPositiveYieldStress(f64),
}

/// Error returned when editing a [`Mesh`](crate::Mesh) with invalid indices or values.
///
/// # Examples
///
/// ```
/// use trusslab::{point, BarProperties, Mesh, MeshError};
///
/// let mut mesh = Mesh::new();
/// let a = mesh.add_node(point(0.0, 0.0));
/// let error = mesh
///     .add_element(a, 7, BarProperties::steel(0.01))
///     .expect_err("unknown node is rejected");
/// assert_eq!(error, MeshError::UnknownNode(7));
/// ```
#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum MeshError {
    /// Returned when a node index does not address an entry of the node sequence.
    #[error("node {0} does not exist in this mesh")]
    UnknownNode(usize),
    /// Returned when an element index does not address an entry of the element sequence.
    #[error("element {0} does not exist in this mesh")]
    UnknownElement(usize),
    /// Returned when both ends of a bar reference the same node.
    #[error("element cannot connect node {0} to itself")]
    SelfConnectedElement(usize),
    /// Returned when the supplied bar properties are invalid.
    #[error(transparent)]
    InvalidProperties(#[from] PropertyError),
}

/// Error returned when an analysis step cannot be carried out.
///
/// Numerical trouble (short bars, singular pivots) never ends up here; it is
/// clamped or reported through [`Solution`](crate::Solution).
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Returned when an element references a node that is no longer in the sequence.
    #[error("element {element} references missing node {node}")]
    UnknownNode {
        /// Index of the offending element.
        element: usize,
        /// Node index that could not be resolved.
        node: usize,
    },
    /// Returned when a degree of freedom falls outside the assembled system.
    #[error("degree of freedom {dof} is outside a system of size {size}")]
    DofOutOfRange {
        /// Requested global degree of freedom.
        dof: usize,
        /// Number of degrees of freedom in the system.
        size: usize,
    },
    /// Returned when mesh data is inconsistent.
    #[error("invalid mesh: {0}")]
    Mesh(#[from] MeshError),
    /// Returned when a scenario document cannot be parsed.
    #[error("unable to parse scenario: {0}")]
    Scenario(#[from] serde_json::Error),
}

impl AnalysisError {
    /// Attach the index of the element whose node lookup failed.
    pub(crate) fn for_element(element: usize, error: MeshError) -> Self {
        match error {
            MeshError::UnknownNode(node) => AnalysisError::UnknownNode { element, node },
            other => AnalysisError::Mesh(other),
        }
    }
}
