use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which pages a render request should regenerate for a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderCommand {
    Project,
    Both,
    Home,
    Search,
}

impl RenderCommand {
    /// Promote `Project` to `Both`; any other combination keeps the wider
    /// of the two commands. Used by SECRETARY when coalescing bursts.
    pub fn promote(self, other: RenderCommand) -> RenderCommand {
        use RenderCommand::*;
        match (self, other) {
            (Both, _) | (_, Both) => Both,
            (Project, Project) => Project,
            (a, b) if a == b => a,
            _ => Both,
        }
    }
}

/// A package queued for re-render, persisted by SECRETARY across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewritePending {
    pub package: String,
    pub added_at: DateTime<Utc>,
    pub command: RenderCommand,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_promotes_to_both() {
        assert_eq!(
            RenderCommand::Project.promote(RenderCommand::Both),
            RenderCommand::Both
        );
        assert_eq!(
            RenderCommand::Both.promote(RenderCommand::Project),
            RenderCommand::Both
        );
    }

    #[test]
    fn identical_commands_are_unchanged() {
        assert_eq!(
            RenderCommand::Project.promote(RenderCommand::Project),
            RenderCommand::Project
        );
        assert_eq!(
            RenderCommand::Home.promote(RenderCommand::Home),
            RenderCommand::Home
        );
    }

    #[test]
    fn unrelated_commands_promote_to_both() {
        assert_eq!(
            RenderCommand::Home.promote(RenderCommand::Search),
            RenderCommand::Both
        );
    }
}
