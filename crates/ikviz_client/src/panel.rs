//! Text rendering of the status line and the results panel.

use ikviz::float_fmt::fmt_label;
use ikviz::model::{SceneModel, SolverOutcome};

pub fn status_line(model: &SceneModel, notice: Option<&str>) -> String {
    let target = model.target();
    let coords: Vec<String> = ikviz::model::Axis::ALL
        .iter()
        .map(|&axis| {
            let input = target.axis(axis);
            let mut text = format!("{axis}={}", input.raw());
            if !input.is_current() {
                match input.value() {
                    Some(v) => text.push_str(&format!(" (using {})", fmt_label(v))),
                    None => text.push_str(" (no value)"),
                }
            }
            text
        })
        .collect();

    let mut line = format!(
        "[{}] {} | {} | step {}",
        model.connection(),
        coords.join(" "),
        model.configuration().describe(),
        model.input_step(),
    );
    if let Some(notice) = notice {
        line.push_str(" | ");
        line.push_str(notice);
    }
    line
}

/// Angles with two decimals, then chain points; failures are shown verbatim.
pub fn results_panel(outcome: &SolverOutcome) -> Vec<String> {
    match outcome {
        SolverOutcome::None => vec!["no result yet".to_string()],
        SolverOutcome::Pending { request } => vec![format!("waiting for solver ({request})")],
        SolverOutcome::Failure { message } => vec![message.clone()],
        SolverOutcome::Success(solution) => {
            let mut lines: Vec<String> = solution
                .theta_deg
                .iter()
                .enumerate()
                .map(|(i, theta)| format!("θ{}: {}°", i + 1, fmt_label(*theta)))
                .collect();
            if let Some(chain) = &solution.chain {
                lines.extend(chain.iter().enumerate().map(|(i, p)| {
                    format!(
                        "T0_{}: ({}, {}, {})",
                        i + 1,
                        fmt_label(p[0]),
                        fmt_label(p[1]),
                        fmt_label(p[2])
                    )
                }));
            }
            lines
        }
    }
}
