use hangar_driver::DriverHandle;
use hangar_transport::push_pull::PushChannel;
use hangar_transport::value::Value;
use hangar_transport::Message;

use crate::error::SupervisorError;

/// One `PushChannel` per managed task's control inbox, plus DRIVER's own
/// request channel (DRIVER already owns a state thread reachable through
/// [`DriverHandle`], so it doesn't need a separate control channel). This is
/// the same "one sender per tracked unit" bookkeeping shape used for lock
/// holders elsewhere in this workspace's lineage, generalized from tracked
/// processes to tracked tasks.
#[derive(Clone)]
pub struct TaskRegistry {
    pub gazer: PushChannel,
    pub arch: PushChannel,
    pub secretary: PushChannel,
    pub driver: DriverHandle,
}

impl TaskRegistry {
    fn broadcast(&self, tag: &'static str) -> Result<(), SupervisorError> {
        let message = Message::bare(tag)?;
        self.gazer.push(message.clone())?;
        self.arch.push(message.clone())?;
        self.secretary.push(message)?;
        self.driver.submit(None, Message::bare(tag)?)?;
        Ok(())
    }

    pub fn pause(&self) -> Result<(), SupervisorError> {
        self.broadcast("PAUSE")
    }

    pub fn resume(&self) -> Result<(), SupervisorError> {
        self.broadcast("RESUME")
    }

    /// Orders the graceful shutdown sequence described in the supervision
    /// model: GAZER and ARCH stop admitting new work immediately; DRIVER
    /// keeps serving in-flight sessions until they finish or its own
    /// `shutdown_grace` elapses; SECRETARY persists its debounce map before
    /// exiting. The ORACLE pool is stopped last by the caller, once every
    /// task here has actually returned.
    pub fn quit(&self) -> Result<(), SupervisorError> {
        self.broadcast("QUIT")
    }

    pub fn kill(&self, slave_id: u64) -> Result<(), SupervisorError> {
        self.driver.submit(None, Message::new("KILL", vec![Value::Str(slave_id.to_string())])?)?;
        Ok(())
    }
}
