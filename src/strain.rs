//! Mesh-wide strain evaluation and summary statistics.

use nalgebra::DVector;
use serde::Serialize;

use crate::element::BarElement;
use crate::errors::AnalysisError;
use crate::mesh::Node;

/// Summary of one strain evaluation pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StrainStats {
    /// Largest strain magnitude among bars evaluated this pass.
    pub max_strain: f64,
    /// Energy stored in bars that are still intact.
    pub total_strain_energy: f64,
    /// Bars failed after this pass, including earlier failures.
    pub failed_count: usize,
    /// Bars still intact after this pass.
    pub active_element_count: usize,
    /// Indices of bars that broke during this pass.
    pub newly_failed: Vec<usize>,
}

/// Evaluate every intact bar against `displacements` and aggregate the results.
///
/// Bars that were already failed are counted but not re-evaluated. A bar that
/// breaks during this pass contributes to `max_strain` but not to the energy.
///
/// # Errors
///
/// Returns [`AnalysisError::UnknownNode`] when a bar references a node that is
/// not in `nodes`.
pub fn evaluate_strains(
    elements: &mut [BarElement],
    nodes: &[Node],
    displacements: &DVector<f64>,
) -> Result<StrainStats, AnalysisError> {
    let mut stats = StrainStats::default();
    for (index, element) in elements.iter_mut().enumerate() {
        if element.is_failed() {
            stats.failed_count += 1;
            continue;
        }
        let strain = element
            .evaluate_strain(nodes, displacements)
            .map_err(|error| AnalysisError::for_element(index, error))?;
        stats.max_strain = stats.max_strain.max(strain.abs());
        if element.is_failed() {
            stats.failed_count += 1;
            stats.newly_failed.push(index);
        } else {
            stats.total_strain_energy += element.strain_energy();
        }
    }
    stats.active_element_count = elements.len() - stats.failed_count;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::element::BarProperties;
    use crate::geometry::point;

    fn fan() -> (Vec<Node>, Vec<BarElement>) {
        let nodes = vec![
            Node::new(point(0.0, 0.0)),
            Node::new(point(1.0, 0.0)),
            Node::new(point(0.0, 1.0)),
        ];
        let elements = vec![
            BarElement::new(0, 1, &nodes, BarProperties::steel(0.01)).unwrap(),
            BarElement::new(0, 2, &nodes, BarProperties::steel(0.01)).unwrap(),
        ];
        (nodes, elements)
    }

    #[test]
    fn aggregates_energy_and_peak_strain() {
        let (nodes, mut elements) = fan();
        let u = DVector::from_vec(vec![0.0, 0.0, 5.0e-4, 0.0, 0.0, -2.0e-4]);
        let stats = evaluate_strains(&mut elements, &nodes, &u).unwrap();
        assert_relative_eq!(stats.max_strain, 5.0e-4, epsilon = 1.0e-12);
        let expected = 0.5 * 200.0e9 * 0.01 * (5.0e-4_f64.powi(2) + 2.0e-4_f64.powi(2));
        assert_relative_eq!(stats.total_strain_energy, expected, max_relative = 1.0e-6);
        assert_eq!(stats.failed_count, 0);
        assert_eq!(stats.active_element_count, 2);
        assert!(stats.newly_failed.is_empty());
    }

    #[test]
    fn new_failures_are_counted_without_energy() {
        let (nodes, mut elements) = fan();
        let u = DVector::from_vec(vec![0.0, 0.0, 2.0e-3, 0.0, 0.0, 1.0e-4]);
        let stats = evaluate_strains(&mut elements, &nodes, &u).unwrap();
        assert_eq!(stats.newly_failed, vec![0]);
        assert_eq!(stats.failed_count, 1);
        assert_eq!(stats.active_element_count, 1);
        assert_relative_eq!(stats.max_strain, 2.0e-3, epsilon = 1.0e-12);
        assert_relative_eq!(
            stats.total_strain_energy,
            elements[1].strain_energy(),
            max_relative = 1.0e-12
        );

        let again = evaluate_strains(&mut elements, &nodes, &DVector::zeros(6)).unwrap();
        assert_eq!(again.failed_count, 1);
        assert!(again.newly_failed.is_empty());
        assert_eq!(again.total_strain_energy, 0.0);
        assert!(elements[0].is_failed());
    }

    #[test]
    fn missing_nodes_name_the_element() {
        let (mut nodes, mut elements) = fan();
        nodes.pop();
        let error = evaluate_strains(&mut elements, &nodes, &DVector::zeros(6))
            .expect_err("dangling node detected");
        assert!(matches!(
            error,
            AnalysisError::UnknownNode {
                element: 1,
                node: 2
            }
        ));
    }
}
