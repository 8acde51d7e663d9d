#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]
#![doc = include_str!("../README.md")]

pub mod assembly;
pub mod element;
pub mod errors;
pub mod geometry;
pub mod heatmap;
pub mod mesh;
pub mod scenario;
pub mod solver;
pub mod strain;

pub use assembly::{Axis, GlobalAssembly, Sparsity};
pub use element::{BarElement, BarProperties, ElementState, LocalStiffness, MIN_LENGTH};
pub use errors::{AnalysisError, MeshError, PropertyError};
pub use geometry::{displacement, force, point, Displacement, Force, Point};
pub use heatmap::{heatmap_color, HeatColor};
pub use mesh::{Mesh, NodalLoad, Node, StepOutcome};
pub use scenario::Scenario;
pub use solver::{residual_norm, Solution, Solver, SolverConfig};
pub use strain::{evaluate_strains, StrainStats};
