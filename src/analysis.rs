use log::info;
use serde::Serialize;
use trusslab::{heatmap_color, AnalysisError, Scenario, StrainStats};

/// Result of one load step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSummary {
    /// Zero-based step number.
    pub step: usize,
    /// Fraction of the full-scale loads applied in this step.
    pub load_factor: f64,
    /// Largest nodal displacement magnitude in metres.
    pub max_displacement: f64,
    /// Highest stress ratio among bars still intact after the step.
    pub peak_stress_ratio: f64,
    /// Degrees of freedom the solver could not resolve.
    pub indeterminate_dofs: usize,
    /// Strain and failure summary.
    pub stats: StrainStats,
}

/// State of one bar after the final step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSummary {
    /// Bar index.
    pub index: usize,
    /// Connected nodes.
    pub nodes: (usize, usize),
    /// Axial stress in pascals.
    pub stress: f64,
    /// Stress over yield stress.
    pub stress_ratio: f64,
    /// Whether the bar has broken.
    pub failed: bool,
    /// Heat-map colour for the stress ratio.
    pub color: String,
}

/// Everything printed for a scenario run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    /// Node count of the mesh.
    pub node_count: usize,
    /// Per-step results in order.
    pub steps: Vec<StepSummary>,
    /// Final bar states.
    pub bars: Vec<BarSummary>,
}

/// Ramp the scenario loads over its steps, solving once per step.
///
/// Failed bars stay failed across steps, so a ramp shows progressive collapse.
pub fn run_scenario(scenario: &Scenario) -> Result<ScenarioReport, AnalysisError> {
    let mut mesh = scenario.build_mesh()?;
    let solver = scenario.solver();
    let step_count = scenario.step_count();

    let mut steps = Vec::with_capacity(step_count);
    for step in 0..step_count {
        let outcome = mesh.step(&scenario.loads_at(step), &solver)?;
        if !outcome.stats.newly_failed.is_empty() {
            info!(
                "step {}: bars {:?} failed ({} of {} remain)",
                step,
                outcome.stats.newly_failed,
                outcome.stats.active_element_count,
                mesh.element_count()
            );
        }
        let max_displacement = (0..mesh.node_count())
            .map(|node| outcome.node_displacement(node).magnitude())
            .fold(0.0, f64::max);
        let peak_stress_ratio = mesh
            .elements
            .iter()
            .filter(|bar| !bar.is_failed())
            .map(|bar| bar.stress_ratio())
            .fold(0.0, f64::max);
        steps.push(StepSummary {
            step,
            load_factor: (step + 1) as f64 / step_count as f64,
            max_displacement,
            peak_stress_ratio,
            indeterminate_dofs: outcome.solution.indeterminate_dofs.len(),
            stats: outcome.stats,
        });
    }

    let bars = mesh
        .elements
        .iter()
        .enumerate()
        .map(|(index, bar)| BarSummary {
            index,
            nodes: bar.nodes(),
            stress: bar.stress(),
            stress_ratio: bar.stress_ratio(),
            failed: bar.is_failed(),
            color: heatmap_color(bar.stress_ratio()).to_string(),
        })
        .collect();

    Ok(ScenarioReport {
        node_count: mesh.node_count(),
        steps,
        bars,
    })
}
