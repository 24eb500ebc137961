/// EventLog receives human-readable outcomes of backend operations, keyed by the event id the
/// producer attached to the object. Objects without an event id are not reported.
pub trait EventLog: Send + Sync {
    fn info(&self, event_id: &str, status: &str, message: &str);
    fn debug(&self, event_id: &str, status: &str, message: &str);
    fn error(&self, event_id: &str, status: &str, message: &str);
}

/// Writes the audit trail to the process logger.
pub struct SlogEventLog {
    logger: slog::Logger,
}

impl SlogEventLog {
    pub fn new(logger: slog::Logger) -> Self {
        SlogEventLog {
            logger: logger.new(slog::o!("Component" => "EventLog")),
        }
    }
}

impl EventLog for SlogEventLog {
    fn info(&self, event_id: &str, status: &str, message: &str) {
        if !event_id.is_empty() {
            slog::info!(self.logger, "{}", message; "EventId" => event_id, "Status" => status);
        }
    }

    fn debug(&self, event_id: &str, status: &str, message: &str) {
        if !event_id.is_empty() {
            slog::debug!(self.logger, "{}", message; "EventId" => event_id, "Status" => status);
        }
    }

    fn error(&self, event_id: &str, status: &str, message: &str) {
        if !event_id.is_empty() {
            slog::error!(self.logger, "{}", message; "EventId" => event_id, "Status" => status);
        }
    }
}
