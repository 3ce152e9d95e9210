//! Metrics instrumentation for the Qyun client.
//!
//! Uses the `metrics` facade; nothing is recorded unless the application
//! installs a recorder.

use metrics::counter;

/// Metric names.
pub mod names {
    pub const STREAM_CONNECTS_TOTAL: &str = "qyun_stream_connects_total";
    pub const STREAM_RECONNECTS_TOTAL: &str = "qyun_stream_reconnects_total";
    pub const MESSAGES_SENT_TOTAL: &str = "qyun_messages_sent_total";
    pub const MESSAGES_SENT_BYTES: &str = "qyun_messages_sent_bytes";
    pub const MESSAGES_RECEIVED_TOTAL: &str = "qyun_messages_received_total";
    pub const SEND_FAILURES_TOTAL: &str = "qyun_send_failures_total";
    pub const REQUESTS_TOTAL: &str = "qyun_requests_total";
}

/// Describe the client metrics to the installed recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(
        names::STREAM_CONNECTS_TOTAL,
        "Total number of stream connections opened"
    );
    metrics::describe_counter!(
        names::STREAM_RECONNECTS_TOTAL,
        "Stream sessions replaced because of a channel switch or a lost connection"
    );
    metrics::describe_counter!(
        names::MESSAGES_SENT_TOTAL,
        "Messages flushed over stream connections"
    );
    metrics::describe_counter!(
        names::MESSAGES_SENT_BYTES,
        "Payload bytes flushed over stream connections"
    );
    metrics::describe_counter!(
        names::MESSAGES_RECEIVED_TOTAL,
        "Messages received by listeners"
    );
    metrics::describe_counter!(names::SEND_FAILURES_TOTAL, "Failed stream sends");
    metrics::describe_counter!(names::REQUESTS_TOTAL, "One-shot requests performed");
}

/// Record a new stream connection.
pub fn record_connect(role: &'static str) {
    counter!(names::STREAM_CONNECTS_TOTAL, "role" => role).increment(1);
}

/// Record a replaced send session.
pub fn record_reconnect() {
    counter!(names::STREAM_RECONNECTS_TOTAL).increment(1);
}

/// Record a flushed message.
pub fn record_sent(bytes: usize) {
    counter!(names::MESSAGES_SENT_TOTAL).increment(1);
    counter!(names::MESSAGES_SENT_BYTES).increment(bytes as u64);
}

/// Record a received message.
pub fn record_received() {
    counter!(names::MESSAGES_RECEIVED_TOTAL).increment(1);
}

/// Record a failed stream send.
pub fn record_send_failure(kind: &'static str) {
    counter!(names::SEND_FAILURES_TOTAL, "kind" => kind).increment(1);
}

/// Record a one-shot request outcome.
pub fn record_request(operation: &'static str, outcome: &'static str) {
    counter!(names::REQUESTS_TOTAL, "operation" => operation, "outcome" => outcome).increment(1);
}
