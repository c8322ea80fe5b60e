//! Formatted terminal output.
//!
//! We keep formatting code in one place so the math and fitting code stays
//! clean, and output changes are localized.

use crate::app::pipeline::RunOutput;
use crate::domain::FitConfig;
use crate::fit::ModelRanking;
use crate::models::TitrationModel;

/// Format the run summary: dataset, then per model the fitted parameters.
pub fn format_fit_summary(run: &RunOutput, config: &FitConfig) -> String {
    let mut out = String::new();
    let dataset = run.session.dataset();

    out.push_str("=== tfit - titration binding fit ===\n");
    out.push_str(&format!("Input: {}\n", config.input.display()));
    out.push_str(&format!(
        "Points: {} ({} rows read, {} skipped) | signals: {}\n",
        dataset.data_points(),
        run.rows_read,
        run.row_errors.len(),
        dataset.signal_count()
    ));
    out.push_str(&format!(
        "Host column: {} | optimizer: {:?}\n",
        if run.session.host_is_conc1() { "conc1" } else { "conc2" },
        config.optimizer.strategy
    ));
    if !config.inactive.is_empty() {
        let names: Vec<&str> = config
            .inactive
            .iter()
            .filter_map(|&c| run.signal_names.get(c).map(String::as_str))
            .collect();
        out.push_str(&format!("Inactive: {}\n", names.join(", ")));
    }

    for (model, outcome) in run.session.models().iter().zip(&run.outcomes) {
        out.push_str(&format!(
            "\n{} [{:?}, {} iterations] SSE={:.4e}{}\n",
            model.name(),
            outcome.status,
            outcome.iters,
            outcome.total_error,
            if outcome.corrupt { "  (unphysical speciation!)" } else { "" }
        ));
        out.push_str(&format_constants(model));
        out.push_str(&format_signals(model, &run.signal_names));
    }

    out
}

fn format_constants(model: &TitrationModel) -> String {
    let mut out = String::new();
    for (name, log_k) in model.kind().constant_names().iter().zip(model.constants()) {
        out.push_str(&format!("  log {name:<4} = {log_k:>8.4}   ({name} = {:.4e} M^-1)\n", 10f64.powf(*log_k)));
    }
    out
}

fn format_signals(model: &TitrationModel, names: &[String]) -> String {
    let mut out = String::new();
    let constant_names = model.kind().constant_names();

    out.push_str(&format!("  {:<12} {:>12}", "signal", "pure"));
    for name in constant_names {
        out.push_str(&format!(" {:>12}", format!("δ({name})")));
    }
    out.push_str(&format!(" {:>12}\n", "SSE"));

    for c in 0..model.signal_count() {
        let label = names.get(c).map_or("?", String::as_str);
        out.push_str(&format!("  {:<12} {:>12.6}", truncate(label, 12), model.pure_signal(c)));
        for which in 0..constant_names.len() {
            let (_, value) = model.pair(which, c);
            out.push_str(&format!(" {value:>12.6}"));
        }
        if model.active_signals()[c] {
            out.push_str(&format!(" {:>12.4e}\n", model.sum_of_errors(c)));
        } else {
            out.push_str(&format!(" {:>12}\n", "inactive"));
        }
    }
    out
}

/// Format the model comparison table, marking the preferred model.
pub fn format_rankings(rankings: &[ModelRanking], preferred: Option<&ModelRanking>) -> String {
    let mut out = String::new();
    out.push_str("Model comparison (BIC, lower is better):\n");
    out.push_str(&format!(
        "  {:<16} {:>12} {:>12} {:>12} {:>5} {:>5}\n",
        "model", "SSE", "RMSE", "BIC", "n", "k"
    ));
    for r in rankings {
        let chosen = if preferred.is_some_and(|p| p.kind == r.kind) { "*" } else { " " };
        out.push_str(&format!(
            "{chosen} {:<16} {:>12.4e} {:>12.4e} {:>12.3} {:>5} {:>5}\n",
            r.kind.display_name(),
            r.sse,
            r.rmse,
            r.bic,
            r.n,
            r.k
        ));
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(max.saturating_sub(1)).collect();
        t.push('…');
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;

    #[test]
    fn rankings_mark_preferred_model() {
        let one = ModelRanking {
            kind: ModelKind::OneOne,
            sse: 1e-6,
            rmse: 1e-3,
            bic: -50.0,
            n: 10,
            k: 3,
            corrupt: false,
        };
        let two = ModelRanking {
            kind: ModelKind::TwoOneOneOne,
            bic: -49.0,
            k: 5,
            ..one.clone()
        };
        let text = format_rankings(&[one.clone(), two], Some(&one));
        assert!(text.contains("* 1:1-Model"));
        assert!(text.contains("  2:1/1:1-Model"));
    }

    #[test]
    fn long_labels_are_truncated() {
        assert_eq!(truncate("chemical_shift_a", 8), "chemica…");
        assert_eq!(truncate("H1", 8), "H1");
    }
}
