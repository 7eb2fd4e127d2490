//! Entry points for a deferred task runner
//!
//! Each task wraps one ledger operation and turns every outcome, errors
//! included, into a serializable [`TaskReport`]. Nothing escapes the task
//! boundary, so a runner can log or store the report as-is.

use crate::{
    amount::AmountInput,
    ledger::{BatchItemResult, CacheRefresh, Ledger, TransferRequest},
    mining::MiningOutcome,
    types::{BlockView, TransactionView},
    Error,
};
use serde::Serialize;
use tracing::{error, info};

/// Operation-specific payload of a report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskData {
    /// Newly mined block
    Block {
        /// The block
        block: BlockView,
    },
    /// Accepted transfer
    Transaction {
        /// The transfer
        transaction: TransactionView,
        /// Pending list mirrored
        mirrored: bool,
        /// Announcement published
        announced: bool,
    },
    /// Chain validation
    Validation {
        /// Linkage and hashes hold
        is_valid: bool,
        /// Blocks checked
        chain_length: u64,
    },
    /// Cache refresh
    Cache(CacheRefresh),
    /// Batch submission
    Batch {
        /// Per-item outcome
        results: Vec<BatchItemResult>,
        /// Items submitted
        total: usize,
        /// Items accepted
        success_count: usize,
    },
}

/// Outcome of a task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    /// Whether the operation did its job
    pub success: bool,
    /// Human-readable summary
    pub message: String,
    /// Payload when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<TaskData>,
    /// Error text on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Worker that ran the task
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
}

impl TaskReport {
    fn ok(message: impl Into<String>, data: TaskData) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
            worker: None,
        }
    }

    fn declined(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: None,
            worker: None,
        }
    }

    fn failed(context: &str, err: &Error) -> Self {
        error!(task = context, error = %err, "Task failed");
        Self {
            success: false,
            message: format!("{} failed: {}", context, err),
            data: None,
            error: Some(err.to_string()),
            worker: None,
        }
    }

    fn on_worker(mut self, worker: &str) -> Self {
        self.worker = Some(worker.to_string());
        self
    }
}

const NOTHING_TO_MINE: &str = "No pending transactions to mine";

/// Mine pending transactions. A reward is paid only when requested and an
/// address is given.
pub async fn mine_block_task(
    ledger: &Ledger,
    reward_address: Option<&str>,
    include_reward: bool,
) -> TaskReport {
    let include_reward = include_reward && reward_address.is_some();

    match ledger.mine(reward_address, include_reward).await {
        Ok(MiningOutcome::Sealed(block)) => {
            info!(block_index = block.index, include_reward, "Mining task completed");
            TaskReport::ok(
                format!("Block #{} mined", block.index),
                TaskData::Block {
                    block: block.to_view(),
                },
            )
        }
        Ok(MiningOutcome::NothingToMine) => TaskReport::declined(NOTHING_TO_MINE),
        Err(e) => TaskReport::failed("mining", &e),
    }
}

/// Periodic mining without reward, confirming whatever is pending
pub async fn auto_mine_task(ledger: &Ledger, worker: &str) -> TaskReport {
    let report = match ledger.mine(None, false).await {
        Ok(MiningOutcome::Sealed(block)) => {
            info!(worker, block_index = block.index, "Auto-mined block");
            TaskReport::ok(
                format!("Block #{} mined automatically without reward", block.index),
                TaskData::Block {
                    block: block.to_view(),
                },
            )
        }
        Ok(MiningOutcome::NothingToMine) => TaskReport::declined(NOTHING_TO_MINE),
        Err(e) => TaskReport::failed("auto-mining", &e),
    };
    report.on_worker(worker)
}

/// Submit one transfer
pub async fn process_transaction_task(
    ledger: &Ledger,
    sender: &str,
    recipient: &str,
    amount: impl Into<AmountInput>,
) -> TaskReport {
    match ledger.submit(sender, recipient, amount).await {
        Ok(receipt) => TaskReport::ok(
            "Transaction added",
            TaskData::Transaction {
                transaction: receipt.transaction.to_view(),
                mirrored: receipt.mirrored,
                announced: receipt.announced,
            },
        ),
        Err(e) => TaskReport::failed("transaction", &e),
    }
}

/// Validate the stored chain
pub async fn validate_chain_task(ledger: &Ledger) -> TaskReport {
    let chain = ledger.read_chain();
    let is_valid = crate::validation::is_chain_valid(&chain);
    TaskReport::ok(
        if is_valid { "Chain is valid" } else { "Chain is invalid" },
        TaskData::Validation {
            is_valid,
            chain_length: chain.len() as u64,
        },
    )
}

/// Rewrite the cached chain summary and pending list
pub async fn update_cache_task(ledger: &Ledger) -> TaskReport {
    match ledger.refresh_cache().await {
        Ok(refresh) => TaskReport::ok("Cache updated", TaskData::Cache(refresh)),
        Err(Error::BlockNotFound(_)) => TaskReport::declined("Chain has no blocks"),
        Err(e) => TaskReport::failed("cache update", &e),
    }
}

/// Submit several transfers; the task succeeds even if items fail
pub async fn batch_process_transactions_task(
    ledger: &Ledger,
    requests: Vec<TransferRequest>,
) -> TaskReport {
    let total = requests.len();
    let results = ledger.submit_batch(requests).await;
    let success_count = results.iter().filter(|r| r.receipt.is_some()).count();

    TaskReport::ok(
        format!("Processed {}/{} transactions", success_count, total),
        TaskData::Batch {
            results,
            total,
            success_count,
        },
    )
}
