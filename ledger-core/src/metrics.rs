//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//! Every collector is registered in the instance's own registry, so several
//! ledgers (or tests) can coexist in one process.
//!
//! # Metrics
//!
//! - `ledger_transactions_submitted_total` - Transfers accepted into the pending pool
//! - `ledger_blocks_mined_total` - Blocks sealed and persisted
//! - `ledger_mining_duration_seconds` - Histogram of nonce-search durations
//! - `ledger_chain_length` - Blocks in the confirmed chain
//! - `ledger_pending_transactions` - Size of the pending pool
//! - `ledger_sync_warnings_total` - Store failures degraded to stale reads, by store

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Transfers accepted
    pub transactions_submitted: IntCounter,

    /// Blocks persisted by this process
    pub blocks_mined: IntCounter,

    /// Mining duration histogram
    pub mining_duration: Histogram,

    /// Confirmed chain length
    pub chain_length: IntGauge,

    /// Pending pool size
    pub pending_transactions: IntGauge,

    /// Sync warnings, labelled by store
    pub sync_warnings: IntCounterVec,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transactions_submitted = IntCounter::new(
            "ledger_transactions_submitted_total",
            "Transfers accepted into the pending pool",
        )?;
        registry.register(Box::new(transactions_submitted.clone()))?;

        let blocks_mined =
            IntCounter::new("ledger_blocks_mined_total", "Blocks sealed and persisted")?;
        registry.register(Box::new(blocks_mined.clone()))?;

        let mining_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_mining_duration_seconds",
                "Histogram of nonce-search durations",
            )
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]),
        )?;
        registry.register(Box::new(mining_duration.clone()))?;

        let chain_length = IntGauge::new("ledger_chain_length", "Blocks in the confirmed chain")?;
        registry.register(Box::new(chain_length.clone()))?;

        let pending_transactions =
            IntGauge::new("ledger_pending_transactions", "Size of the pending pool")?;
        registry.register(Box::new(pending_transactions.clone()))?;

        let sync_warnings = IntCounterVec::new(
            Opts::new(
                "ledger_sync_warnings_total",
                "Store failures degraded to stale reads",
            ),
            &["store"],
        )?;
        registry.register(Box::new(sync_warnings.clone()))?;

        Ok(Self {
            transactions_submitted,
            blocks_mined,
            mining_duration,
            chain_length,
            pending_transactions,
            sync_warnings,
            registry,
        })
    }

    /// Record an accepted transfer
    pub fn record_submission(&self) {
        self.transactions_submitted.inc();
    }

    /// Record a persisted block and how long sealing took
    pub fn record_block_mined(&self, duration_seconds: f64) {
        self.blocks_mined.inc();
        self.mining_duration.observe(duration_seconds);
    }

    /// Update chain length gauge
    pub fn set_chain_length(&self, length: usize) {
        self.chain_length.set(length as i64);
    }

    /// Update pending pool gauge
    pub fn set_pending(&self, count: usize) {
        self.pending_transactions.set(count as i64);
    }

    /// Record a degraded read against `store` ("chain" or "pending")
    pub fn record_sync_warning(&self, store: &str) {
        self.sync_warnings.with_label_values(&[store]).inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
