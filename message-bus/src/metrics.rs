//! Process-wide Prometheus collectors for announcements
//!
//! Labels use the subject prefix of the message type (`ledger.blocks`,
//! `ledger.transactions`, `ledger.mining`) and, for counters, an outcome.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter_vec, CounterVec,
    HistogramVec, IntCounterVec,
};

lazy_static! {
    /// Announcements sent, by subject prefix and outcome (`success`, `error`)
    pub static ref ANNOUNCE_TOTAL: CounterVec = register_counter_vec!(
        "ledger_bus_announce_total",
        "Announcements sent",
        &["subject", "outcome"]
    )
    .unwrap();

    /// Time to deliver an announcement to NATS, retries included
    pub static ref ANNOUNCE_DURATION: HistogramVec = register_histogram_vec!(
        "ledger_bus_announce_duration_seconds",
        "Announcement delivery time in seconds, retries included",
        &["subject"]
    )
    .unwrap();

    /// In-process announcements that found no receiver
    pub static ref LOCAL_UNHEARD_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ledger_bus_local_unheard_total",
        "In-process announcements sent with no receiver",
        &["subject"]
    )
    .unwrap();

    /// Announcements consumed, by subject prefix and outcome (`handled`, `parse_error`)
    pub static ref CONSUME_TOTAL: CounterVec = register_counter_vec!(
        "ledger_bus_consume_total",
        "Announcements consumed by subscribers",
        &["subject", "outcome"]
    )
    .unwrap();

    /// Handler time per consumed announcement
    pub static ref HANDLE_DURATION: HistogramVec = register_histogram_vec!(
        "ledger_bus_handle_duration_seconds",
        "Subscriber handler time in seconds",
        &["subject"]
    )
    .unwrap();

    /// NATS connection attempts, by result (`connected`, `failed`)
    pub static ref NATS_CONNECTIONS: CounterVec = register_counter_vec!(
        "ledger_bus_nats_connections_total",
        "NATS connection attempts",
        &["result"]
    )
    .unwrap();
}
