use std::time::Duration;

use hangar_config::Config;
use hangar_driver::DriverHandle;
use hangar_oracle::{OracleClient, OracleOp, OracleReply};
use hangar_transport::message::encode_payload;
use hangar_transport::push_pull::PushChannel;
use hangar_transport::value::Value;
use hangar_transport::Message;
use hangar_types::FarmStatus;

use crate::error::BigBroError;

pub struct BigBroOptions {
    pub stats_interval: Duration,
}

impl BigBroOptions {
    pub fn from_config(config: &Config) -> Self {
        BigBroOptions { stats_interval: config.bigbro.stats_interval }
    }
}

impl Default for BigBroOptions {
    fn default() -> Self {
        BigBroOptions { stats_interval: Duration::from_secs(5 * 60) }
    }
}

fn active_slave_count(driver: &DriverHandle) -> Result<usize, BigBroError> {
    let (_, reply) = driver.submit(None, Message::bare("STATS")?)?;
    match reply.args.as_slice() {
        [Value::Int(count)] => Ok(*count as usize),
        _ => Err(BigBroError::UnexpectedReply),
    }
}

/// Gather ORACLE's SQL-aggregated counters, ARCH's per-ABI queue depth, and
/// DRIVER's live session count into one [`FarmStatus`] snapshot.
pub fn collect(oracle: &OracleClient, driver: &DriverHandle) -> Result<FarmStatus, BigBroError> {
    let stats = match oracle.submit(OracleOp::GetStatistics)? {
        OracleReply::Stats(stats) => stats,
        _ => unreachable!("GetStatistics always returns OracleReply::Stats"),
    };
    let queue = match oracle.submit(OracleOp::GetPendingQueue)? {
        OracleReply::Queue(snapshot) => snapshot,
        _ => unreachable!("GetPendingQueue always returns OracleReply::Queue"),
    };
    let queue_by_abi = queue.by_abi.iter().map(|(abi, rows)| (abi.clone(), rows.len())).collect();
    let active_slaves = active_slave_count(driver)?;

    Ok(FarmStatus {
        total_packages: stats.total_packages,
        total_versions: stats.total_versions,
        total_files: stats.total_files,
        total_builds: stats.total_builds,
        disk_usage_bytes: stats.disk_usage_bytes,
        queue_by_abi,
        active_slaves,
    })
}

/// One tick: collect a snapshot, nudge SCRIBE to refresh the home page, and
/// publish the snapshot to SUPERVISOR's status channel for monitors.
pub fn tick(
    oracle: &OracleClient,
    driver: &DriverHandle,
    secretary: &PushChannel,
    status: &PushChannel,
) -> Result<FarmStatus, BigBroError> {
    let snapshot = collect(oracle, driver)?;

    let render = Message::new("RENDER", vec![Value::Str(String::new()), Value::Str("Home".into())])?;
    if let Err(e) = secretary.push(render) {
        tracing::warn!(error = %e, "failed to notify secretary of a statistics-driven home refresh");
    }

    let published = Message::new("STATUS", vec![encode_payload(&snapshot)])?;
    status.push(published)?;

    Ok(snapshot)
}

/// Drive BIG_BRO forever: tick every `stats_interval`, logging (but not
/// stopping on) a failed round since the next tick will simply retry.
pub fn run(oracle: OracleClient, driver: DriverHandle, secretary: PushChannel, status: PushChannel, options: BigBroOptions) {
    loop {
        match tick(&oracle, &driver, &secretary, &status) {
            Ok(snapshot) => {
                tracing::debug!(
                    packages = snapshot.total_packages,
                    pending = snapshot.total_pending(),
                    active_slaves = snapshot.active_slaves,
                    "published farm status"
                );
            }
            Err(e) => tracing::warn!(error = %e, "bigbro tick failed"),
        }
        std::thread::sleep(options.stats_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_match_the_five_minute_default() {
        let opts = BigBroOptions::default();
        assert_eq!(opts.stats_interval, Duration::from_secs(300));
    }

    #[test]
    fn from_config_reads_the_bigbro_section() {
        let mut config = Config::default();
        config.bigbro.stats_interval = Duration::from_secs(30);
        let opts = BigBroOptions::from_config(&config);
        assert_eq!(opts.stats_interval, Duration::from_secs(30));
    }
}
