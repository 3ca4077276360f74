//! Command dispatch: subscriber requests become adapter calls. Unknown
//! names and malformed payloads fail before the lock is even taken.

use tracing::warn;

use relay_link::VehicleCommand;

use crate::SharedLink;

#[derive(Clone)]
pub struct CommandDispatcher {
    link: SharedLink,
}

impl CommandDispatcher {
    pub fn new(link: SharedLink) -> Self {
        Self { link }
    }

    /// Returns the acknowledgment value for the requesting client. Never
    /// panics or propagates adapter failures.
    pub fn dispatch(&self, command: &str, params: &serde_json::Value) -> bool {
        let Some(cmd) = VehicleCommand::parse(command, params) else {
            warn!("rejected command {command:?}: unknown name or bad params");
            return false;
        };
        match self.link.lock().unwrap().send_command(&cmd) {
            Ok(()) => true,
            Err(e) => {
                warn!("command {} failed at the link: {e}", cmd.name());
                false
            }
        }
    }
}
