use crate::transport::constants::LOG_TARGET;
use crate::transport::error::TransportError;
use crate::transport::{Callback, Message};

/// Delivery observer that logs every outcome when debug logging is on and does nothing
/// otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct DebugCallback {
    debug: bool,
}

impl DebugCallback {
    pub(crate) fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl Callback for DebugCallback {
    fn success(&self, message: &Message) {
        if self.debug {
            log::info!(target: LOG_TARGET, "event success event={}", payload(message));
        }
    }

    fn failure(&self, message: &Message, error: &TransportError) {
        if self.debug {
            log::error!(
                target: LOG_TARGET,
                "event failure event={} error={error}",
                payload(message)
            );
        }
    }
}

fn payload(message: &Message) -> String {
    serde_json::to_string(message)
        .unwrap_or_else(|err| format!("<unserializable {} message: {err}>", message.kind()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{captured_for_current_thread, install_capture_logger};
    use crate::transport::error::network_error;
    use crate::transport::Track;
    use log::Level;

    fn signup() -> Message {
        Message::from(Track {
            message_id: "msg-1".into(),
            anonymous_id: "anon_1".into(),
            event: "signup".into(),
            ..Default::default()
        })
    }

    #[test]
    fn silent_without_debug() {
        install_capture_logger();
        let callback = DebugCallback::new(false);
        callback.success(&signup());
        callback.failure(&signup(), &network_error("offline"));
        assert!(captured_for_current_thread().is_empty());
    }

    #[test]
    fn logs_outcomes_with_payload_when_debugging() {
        install_capture_logger();
        let callback = DebugCallback::new(true);
        callback.success(&signup());
        callback.failure(&signup(), &network_error("offline"));

        let records = captured_for_current_thread();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.target == "cf-analytics"));

        assert_eq!(records[0].level, Level::Info);
        assert!(records[0].message.contains("event success"));
        assert!(records[0].message.contains("\"event\":\"signup\""));

        assert_eq!(records[1].level, Level::Error);
        assert!(records[1].message.contains("event failure"));
        assert!(records[1].message.contains("offline (transport/network)"));
    }
}
