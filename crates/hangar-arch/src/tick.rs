use std::time::Duration;

use hangar_config::Config;
use hangar_oracle::{OracleClient, OracleOp, OracleReply};
use hangar_transport::push_pull::{PullChannel, PushChannel};
use hangar_transport::message::{Message, encode_payload};
use hangar_transport::TransportError;

use crate::error::ArchError;
use crate::plan::truncate_top_k;

pub struct ArchOptions {
    pub tick_interval: Duration,
    pub idle_interval: Duration,
    pub queue_top_k: usize,
}

impl ArchOptions {
    pub fn from_config(config: &Config) -> Self {
        ArchOptions {
            tick_interval: config.arch.tick_interval,
            idle_interval: config.arch.idle_interval,
            queue_top_k: config.arch.queue_top_k,
        }
    }
}

impl Default for ArchOptions {
    fn default() -> Self {
        ArchOptions {
            tick_interval: Duration::from_secs(5),
            idle_interval: Duration::from_secs(60),
            queue_top_k: 10_000,
        }
    }
}

/// Fetch the current pending queue, truncate each ABI to `queue_top_k`
/// (logging what was cut), and publish the result to DRIVER. Returns
/// whether the published snapshot was non-empty, which the caller uses to
/// decide the next tick's pacing.
pub fn tick(oracle: &OracleClient, driver: &PushChannel, queue_top_k: usize) -> Result<bool, ArchError> {
    let snapshot = match oracle.submit(OracleOp::GetPendingQueue)? {
        OracleReply::Queue(snapshot) => snapshot,
        _ => unreachable!("GetPendingQueue always returns OracleReply::Queue"),
    };

    let (truncated, dropped) = truncate_top_k(snapshot, queue_top_k);
    for (abi, cut) in &dropped {
        tracing::debug!(abi, cut, queue_top_k, "pending queue truncated to top-K for ABI");
    }

    let found_work = !truncated.is_empty();
    let msg = Message::new("QUEUE", vec![encode_payload(&truncated)])?;
    driver.push(msg)?;
    Ok(found_work)
}

/// Drive ARCH forever: tick, publish, and pace the next tick based on
/// whether the previous one found pending work — `tick_interval` while
/// busy, backing off by doubling toward `idle_interval` while quiet. This
/// is the same shape as a retry backoff curve, applied to scheduling
/// instead of error recovery.
///
/// `control` carries SUPERVISOR's `PAUSE`/`RESUME`/`QUIT`: paused ticks are
/// skipped (but still paced), and `QUIT` (or the sender dropping) ends the
/// loop.
pub fn run(oracle: OracleClient, driver: PushChannel, control: PullChannel, options: ArchOptions) {
    let mut current = options.tick_interval;
    let mut paused = false;

    loop {
        loop {
            match control.try_pull() {
                Ok(Some(msg)) => match msg.tag.as_str() {
                    "PAUSE" => paused = true,
                    "RESUME" => paused = false,
                    "QUIT" => return,
                    other => tracing::warn!(tag = other, "arch received an unrecognized control message"),
                },
                Ok(None) => break,
                Err(TransportError::Disconnected) => return,
                Err(e) => {
                    tracing::warn!(error = %e, "arch failed to pull a control message");
                    break;
                }
            }
        }

        if paused {
            std::thread::sleep(options.tick_interval);
            continue;
        }

        match tick(&oracle, &driver, options.queue_top_k) {
            Ok(true) => {
                current = options.tick_interval;
            }
            Ok(false) => {
                current = (current * 2).min(options.idle_interval);
            }
            Err(e) => {
                tracing::warn!(error = %e, "arch tick failed");
                current = (current * 2).min(options.idle_interval);
            }
        }

        std::thread::sleep(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_match_spec_defaults() {
        let opts = ArchOptions::default();
        assert_eq!(opts.tick_interval, Duration::from_secs(5));
        assert_eq!(opts.idle_interval, Duration::from_secs(60));
        assert_eq!(opts.queue_top_k, 10_000);
    }

    #[test]
    fn from_config_reads_arch_section() {
        let mut config = Config::default();
        config.arch.tick_interval = Duration::from_secs(2);
        config.arch.queue_top_k = 500;
        let opts = ArchOptions::from_config(&config);
        assert_eq!(opts.tick_interval, Duration::from_secs(2));
        assert_eq!(opts.queue_top_k, 500);
    }
}
