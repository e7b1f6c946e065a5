//! Callback-style completion for callers that do not await the engines.

use crate::error::PushError;

/// Completion callbacks of a registration call. Exactly one fires per call.
pub trait RegistrationListener: Send + Sync {
    fn on_complete(&self);

    fn on_failed(&self, reason: &str);
}

/// Completion callbacks of an unregistration call. Exactly one fires per call.
pub trait UnregistrationListener: Send + Sync {
    fn on_complete(&self);

    fn on_failed(&self, reason: &str);
}

pub(crate) fn notify_registration(listener: &dyn RegistrationListener, result: Result<(), PushError>) {
    match result {
        Ok(()) => listener.on_complete(),
        Err(e) => listener.on_failed(&e.to_string()),
    }
}

pub(crate) fn notify_unregistration(
    listener: &dyn UnregistrationListener,
    result: Result<(), PushError>,
) {
    match result {
        Ok(()) => listener.on_complete(),
        Err(e) => listener.on_failed(&e.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Records every callback it receives.
    #[derive(Default)]
    pub struct RecordingListener {
        pub events: Mutex<Vec<String>>,
    }

    impl RecordingListener {
        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn record(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl RegistrationListener for RecordingListener {
        fn on_complete(&self) {
            self.record("complete".into());
        }

        fn on_failed(&self, reason: &str) {
            self.record(format!("failed: {}", reason));
        }
    }

    impl UnregistrationListener for RecordingListener {
        fn on_complete(&self) {
            self.record("complete".into());
        }

        fn on_failed(&self, reason: &str) {
            self.record(format!("failed: {}", reason));
        }
    }
}
