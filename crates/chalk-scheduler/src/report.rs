use std::path::Path;

use crate::scheduler::RunOutcome;

impl RunOutcome {
    /// Render the run report: prompt, score, agents used, final state keys
    /// and the full log.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        let name = self.state.name().unwrap_or("run");
        md.push_str(&format!("# Agent Run Report: {name}\n\n"));
        md.push_str(&format!("Prompt: {}\n", self.state.prompt().unwrap_or_default()));
        md.push_str(&format!("Score: {}\n", self.score));
        md.push_str(&format!("Status: {} after {} ticks\n", self.status, self.ticks));
        md.push_str(&format!(
            "Agents Used ({}): {}\n",
            self.agents_used.len(),
            self.agents_used.join(", ")
        ));
        if self.persistence_degraded {
            md.push_str("\nWarning: memory could not be saved during this run.\n");
        }

        md.push_str("\n## Final State Keys\n\n");
        md.push_str(&self.state.keys().collect::<Vec<_>>().join(", "));
        md.push('\n');

        md.push_str("\n## Log\n\n");
        for line in &self.log {
            md.push_str(line);
            md.push('\n');
        }

        md
    }

    /// Write [`to_markdown`](Self::to_markdown) to `path`.
    pub fn write_report(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_markdown())
    }
}
