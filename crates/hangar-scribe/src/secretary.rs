use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use hangar_config::Config;
use hangar_oracle::{OracleClient, OracleOp, OracleReply};
use hangar_transport::push_pull::PullChannel;
use hangar_transport::value::Value;
use hangar_transport::{Message, TransportError};
use hangar_types::{RenderCommand, RewritePending};

use crate::writer::Scribe;

#[derive(Debug, Clone)]
pub struct SecretaryOptions {
    pub debounce: Duration,
    pub poll_interval: Duration,
}

impl SecretaryOptions {
    pub fn from_config(config: &Config) -> Self {
        SecretaryOptions { debounce: config.render.debounce, poll_interval: Duration::from_secs(1) }
    }
}

struct Pending {
    added_instant: Instant,
    added_at: DateTime<Utc>,
    command: RenderCommand,
}

fn parse_command(label: &str) -> Option<RenderCommand> {
    match label {
        "Home" => Some(RenderCommand::Home),
        "Search" => Some(RenderCommand::Search),
        "Project" => Some(RenderCommand::Project),
        "Both" => Some(RenderCommand::Both),
        _ => None,
    }
}

fn apply(pending: &mut HashMap<String, Pending>, package: String, command: RenderCommand) {
    pending
        .entry(package)
        .and_modify(|existing| existing.command = existing.command.promote(command))
        .or_insert(Pending { added_instant: Instant::now(), added_at: Utc::now(), command });
}

/// Rows whose debounce interval has elapsed, removed from `pending`.
fn drain_due(pending: &mut HashMap<String, Pending>, debounce: Duration) -> Vec<(String, RenderCommand)> {
    let due: Vec<String> = pending
        .iter()
        .filter(|(_, p)| p.added_instant.elapsed() >= debounce)
        .map(|(package, _)| package.clone())
        .collect();
    due.into_iter()
        .filter_map(|package| pending.remove(&package).map(|p| (package, p.command)))
        .collect()
}

fn load_pending(oracle: &OracleClient, debounce: Duration) -> HashMap<String, Pending> {
    let rows = match oracle.submit(OracleOp::LoadRewritesPending) {
        Ok(OracleReply::Rewrites(rows)) => rows,
        Ok(_) => {
            tracing::warn!("unexpected oracle reply loading pending rewrites");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to load pending rewrites, starting with an empty set");
            Vec::new()
        }
    };

    // Entries that survived a restart were already due (or nearly so)
    // before the master stopped; treat them as immediately eligible rather
    // than making them wait out a fresh debounce window.
    let backdated = Instant::now().checked_sub(debounce).unwrap_or_else(Instant::now);
    rows.into_iter()
        .map(|row| (row.package, Pending { added_instant: backdated, added_at: row.added_at, command: row.command }))
        .collect()
}

fn persist(oracle: &OracleClient, pending: &HashMap<String, Pending>) {
    let rows: Vec<RewritePending> = pending
        .iter()
        .map(|(package, p)| RewritePending { package: package.clone(), added_at: p.added_at, command: p.command })
        .collect();
    if let Err(e) = oracle.submit(OracleOp::SaveRewritesPending { rows }) {
        tracing::warn!(error = %e, "failed to persist pending rewrites");
    }
}

/// Drive SECRETARY forever: fold incoming `RENDER` requests into the
/// debounce map, flush whatever has aged past `debounce` to SCRIBE, and
/// persist the map whenever it changes. Returns (after a final persist)
/// once `render_pull`'s sender is dropped, or once SUPERVISOR's `control`
/// sends `QUIT`. While paused, due entries are still tracked but not
/// flushed, so a `Pause` never loses a pending render.
pub fn run(oracle: OracleClient, scribe: Scribe, render_pull: PullChannel, control: PullChannel, options: SecretaryOptions) {
    let mut pending = load_pending(&oracle, options.debounce);
    let mut paused = false;

    loop {
        loop {
            match render_pull.try_pull() {
                Ok(Some(message)) => handle_message(&mut pending, message),
                Ok(None) => break,
                Err(TransportError::Disconnected) => {
                    persist(&oracle, &pending);
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "secretary failed to pull a render request");
                    break;
                }
            }
        }

        loop {
            match control.try_pull() {
                Ok(Some(msg)) => match msg.tag.as_str() {
                    "PAUSE" => paused = true,
                    "RESUME" => paused = false,
                    "QUIT" => {
                        persist(&oracle, &pending);
                        return;
                    }
                    other => tracing::warn!(tag = other, "secretary received an unrecognized control message"),
                },
                Ok(None) => break,
                Err(TransportError::Disconnected) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "secretary failed to pull a control message");
                    break;
                }
            }
        }

        if !paused {
            let due = drain_due(&mut pending, options.debounce);
            if !due.is_empty() {
                for (package, command) in &due {
                    if let Err(e) = scribe.render(package, *command) {
                        tracing::warn!(error = %e, package, "scribe render failed");
                    }
                }
                persist(&oracle, &pending);
            }
        }

        std::thread::sleep(options.poll_interval);
    }
}

fn handle_message(pending: &mut HashMap<String, Pending>, message: Message) {
    if let ("RENDER", [Value::Str(package), Value::Str(label)]) = (message.tag.as_str(), message.args.as_slice()) {
        match parse_command(label) {
            Some(command) => apply(pending, package.clone(), command),
            None => tracing::warn!(label, "unrecognized render command"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_promotes_project_to_both_on_repeat() {
        let mut pending = HashMap::new();
        apply(&mut pending, "numpy".into(), RenderCommand::Project);
        apply(&mut pending, "numpy".into(), RenderCommand::Home);
        assert_eq!(pending["numpy"].command, RenderCommand::Both);
    }

    #[test]
    fn drain_due_only_removes_aged_entries() {
        let mut pending = HashMap::new();
        pending.insert(
            "fresh".to_string(),
            Pending { added_instant: Instant::now(), added_at: Utc::now(), command: RenderCommand::Project },
        );
        let due = drain_due(&mut pending, Duration::from_secs(30));
        assert!(due.is_empty());
        assert!(pending.contains_key("fresh"));
    }

    #[test]
    fn drain_due_removes_entries_past_the_debounce_window() {
        let mut pending = HashMap::new();
        let stale = Instant::now().checked_sub(Duration::from_secs(60)).unwrap();
        pending.insert("numpy".to_string(), Pending { added_instant: stale, added_at: Utc::now(), command: RenderCommand::Both });
        let due = drain_due(&mut pending, Duration::from_secs(30));
        assert_eq!(due, vec![("numpy".to_string(), RenderCommand::Both)]);
        assert!(pending.is_empty());
    }

    #[test]
    fn parse_command_rejects_unknown_labels() {
        assert!(parse_command("Nonsense").is_none());
    }
}
