use crate::analysis::ScenarioReport;
use std::fmt::Write;

/// Render a textual summary of a scenario run.
///
/// One line per load step, then the final state of every bar with its
/// heat-map colour so the numbers can be matched against a rendering.
#[must_use]
pub fn render_report(report: &ScenarioReport) -> String {
    let mut output = String::new();

    writeln!(
        &mut output,
        "Truss analysis: {} nodes, {} bars, {} load steps",
        report.node_count,
        report.bars.len(),
        report.steps.len()
    )
    .expect("writing to string cannot fail");

    for step in &report.steps {
        writeln!(
            &mut output,
            "step {:>3} (load x{:.2}): max |u| = {:.3e} m, max strain = {:.3e}, energy = {:.3e} J, peak ratio = {:.2}, failed = {}/{}",
            step.step,
            step.load_factor,
            step.max_displacement,
            step.stats.max_strain,
            step.stats.total_strain_energy,
            step.peak_stress_ratio,
            step.stats.failed_count,
            step.stats.failed_count + step.stats.active_element_count
        )
        .expect("writing to string cannot fail");
        if step.indeterminate_dofs > 0 {
            writeln!(
                &mut output,
                "          warning: {} indeterminate degrees of freedom",
                step.indeterminate_dofs
            )
            .expect("writing to string cannot fail");
        }
    }

    output.push_str("Final bar states:\n");
    for bar in &report.bars {
        let state = if bar.failed { "FAILED" } else { "intact" };
        writeln!(
            &mut output,
            "  bar {:>3} ({:>3}-{:<3}) {} stress = {:+.3e} Pa, ratio = {:.2}, colour = {}",
            bar.index, bar.nodes.0, bar.nodes.1, state, bar.stress, bar.stress_ratio, bar.color
        )
        .expect("writing to string cannot fail");
    }

    output
}
