use chalk_core::{MemoryStore, MemorySummary, SimilarRun};
use chalk_query::SearchResult;
use chalk_scheduler::RunOutcome;

use super::OutputFormat;

pub fn format_outcome(outcome: &RunOutcome, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(outcome).unwrap_or_default(),
        OutputFormat::Markdown => outcome.to_markdown(),
        OutputFormat::Text => format_outcome_text(outcome),
    }
}

fn format_outcome_text(outcome: &RunOutcome) -> String {
    let mut out = String::new();
    for line in &outcome.log {
        out.push_str(&format!("  {line}\n"));
    }
    out.push('\n');
    out.push_str(&format!(
        "Status: {} after {} ticks\n",
        outcome.status, outcome.ticks
    ));
    out.push_str(&format!("Score:  {}\n", outcome.score));
    out.push_str(&format!("Agents: {}\n", outcome.agents_used.join(", ")));
    out.push_str(&format!(
        "Keys:   {}\n",
        outcome.state.keys().collect::<Vec<_>>().join(", ")
    ));
    out
}

pub fn format_similar(runs: &[SimilarRun], fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(runs).unwrap_or_default(),
        OutputFormat::Text | OutputFormat::Markdown => {
            if runs.is_empty() {
                return "No past runs found.\n".to_string();
            }
            let mut out = String::new();
            for s in runs {
                let stack = if s.run.tech_stack.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", s.run.tech_stack.join(", "))
                };
                out.push_str(&format!(
                    "{:.2}  {}{stack}  score {}  {}\n",
                    s.similarity,
                    s.run.prompt,
                    s.run.score,
                    s.run.time.format("%Y-%m-%d %H:%M")
                ));
            }
            out
        }
    }
}

pub fn format_search_results(results: &[SearchResult], fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(results).unwrap_or_default(),
        OutputFormat::Text | OutputFormat::Markdown => {
            let mut out = String::new();
            for r in results {
                out.push_str(&format!("{:.4}  {}  {}\n", r.score, r.doc_id, r.snippet));
            }
            out
        }
    }
}

pub fn format_stats(summary: &MemorySummary, memory: &MemoryStore, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => {
            let agents: serde_json::Map<String, serde_json::Value> = summary
                .agents
                .iter()
                .map(|(id, record)| {
                    (
                        id.clone(),
                        serde_json::json!({
                            "invocations": record.invocations,
                            "successes": record.successes,
                            "failures": record.failures,
                            "score_bonus": record.score_bonus,
                            "success_rate": memory.success_rate(id),
                        }),
                    )
                })
                .collect();
            let stats = serde_json::json!({
                "runs": summary.runs,
                "decisions": summary.decisions,
                "agents": agents,
            });
            serde_json::to_string_pretty(&stats).unwrap_or_default()
        }
        OutputFormat::Text | OutputFormat::Markdown => {
            let mut out = String::new();
            out.push_str("Chalk Statistics\n");
            out.push_str("================\n");
            out.push_str(&format!("Runs:       {}\n", summary.runs));
            out.push_str(&format!("Decisions:  {}\n", summary.decisions));
            if summary.agents.is_empty() {
                return out;
            }
            out.push_str("\nBy Agent:\n");
            for (id, record) in &summary.agents {
                out.push_str(&format!(
                    "  {id}: {} runs, {} ok, {} failed, bonus {:+.3}, rate {:.3}\n",
                    record.invocations,
                    record.successes,
                    record.failures,
                    record.score_bonus,
                    memory.success_rate(id)
                ));
            }
            out
        }
    }
}
