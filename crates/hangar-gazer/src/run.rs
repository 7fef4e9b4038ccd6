use std::time::{Duration, Instant};

use hangar_oracle::{OracleClient, OracleOp, OracleReply};
use hangar_retry::{RetryPolicy, RetryStrategyConfig, calculate_delay};
use hangar_transport::push_pull::PullChannel;
use hangar_transport::TransportError;

use crate::apply::apply_event;
use crate::client::UpstreamClient;
use crate::error::GazerError;
use crate::reconcile::reconcile_all;

pub struct GazerOptions {
    pub reconcile_interval: Duration,
    pub poll_backoff: RetryStrategyConfig,
}

impl Default for GazerOptions {
    fn default() -> Self {
        GazerOptions {
            reconcile_interval: Duration::from_secs(6 * 60 * 60),
            poll_backoff: RetryPolicy::Conservative.to_config(),
        }
    }
}

impl GazerOptions {
    /// Every field here is independent of `hangar.toml` except the master
    /// timeout, which bounds how long a single poll waits on ORACLE before
    /// the retry loop treats it as a failed attempt.
    pub fn from_config(config: &hangar_config::Config) -> Self {
        GazerOptions {
            poll_backoff: RetryStrategyConfig {
                max_delay: config.timeouts.master_timeout,
                ..RetryPolicy::Default.to_config()
            },
            ..GazerOptions::default()
        }
    }
}

/// Fetch and apply every event newer than ORACLE's stored serial. Returns
/// the number of events applied.
pub fn poll_once(oracle: &OracleClient, upstream: &UpstreamClient) -> Result<usize, GazerError> {
    let since = match oracle.submit(OracleOp::GetConfiguration)? {
        OracleReply::Config(config) => config.pypi_serial,
        _ => unreachable!("GetConfiguration always returns OracleReply::Config"),
    };

    let events = upstream.fetch_events(since)?;
    for event in &events {
        apply_event(oracle, event)?;
    }
    Ok(events.len())
}

/// Drive GAZER forever: poll, back off on failure, and periodically run a
/// full-catalogue reconciliation. `on_fatal` is called (and this function
/// returns) when ORACLE rejects a serial as non-increasing — the caller is
/// expected to ask SUPERVISOR to begin shutdown. `control` carries
/// SUPERVISOR's `PAUSE`/`RESUME`/`QUIT`: while paused, polling is skipped;
/// `QUIT` (or the sender dropping) ends the loop.
pub fn run(oracle: OracleClient, upstream: UpstreamClient, control: PullChannel, options: GazerOptions, on_fatal: impl Fn(&GazerError)) {
    let mut attempt = 0u32;
    let mut last_reconcile = Instant::now();
    let mut paused = false;

    loop {
        loop {
            match control.try_pull() {
                Ok(Some(msg)) => match msg.tag.as_str() {
                    "PAUSE" => paused = true,
                    "RESUME" => paused = false,
                    "QUIT" => return,
                    other => tracing::warn!(tag = other, "gazer received an unrecognized control message"),
                },
                Ok(None) => break,
                Err(TransportError::Disconnected) => return,
                Err(e) => {
                    tracing::warn!(error = %e, "gazer failed to pull a control message");
                    break;
                }
            }
        }

        if paused {
            std::thread::sleep(Duration::from_secs(1));
            continue;
        }

        match poll_once(&oracle, &upstream) {
            Ok(found) => {
                attempt = 0;
                if found > 0 {
                    tracing::info!(found, "applied upstream events");
                }
            }
            Err(GazerError::NonIncreasingSerial { serial }) => {
                tracing::error!(serial, "oracle rejected serial as non-increasing, requesting shutdown");
                on_fatal(&GazerError::NonIncreasingSerial { serial });
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "gazer poll failed, backing off");
                let delay = calculate_delay(&options.poll_backoff, attempt);
                std::thread::sleep(delay);
                attempt += 1;
                continue;
            }
        }

        if last_reconcile.elapsed() >= options.reconcile_interval {
            match upstream.fetch_catalogue() {
                Ok(catalogue) => {
                    if let Err(e) = reconcile_all(&oracle, &catalogue) {
                        tracing::warn!(error = %e, "reconciliation pass failed");
                    }
                    last_reconcile = Instant::now();
                }
                Err(e) => tracing::warn!(error = %e, "failed to fetch full catalogue for reconciliation"),
            }
        }

        std::thread::sleep(Duration::from_secs(1));
    }
}
