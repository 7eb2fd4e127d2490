//! Financial report over the confirmed chain
//!
//! Volume counts user transfers only. System transfers are split into
//! genesis allocations (block 0) and mining rewards (every later block).

use crate::{
    amount,
    balance::balance_of,
    types::{normalize_address, Block, TransactionView, SYSTEM_SENDER},
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Addresses listed in [`FinancialReport::top_addresses`]
pub const TOP_ADDRESSES: usize = 10;

/// Days covered by [`FinancialReport::daily_statistics`]
pub const DAILY_WINDOW_DAYS: i64 = 7;

/// Transfers listed in [`FinancialReport::recent_transactions`]
pub const RECENT_TRANSACTIONS: usize = 10;

/// Chain-wide totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Blocks including genesis
    pub total_blocks: u64,
    /// Every transaction, system transfers included
    pub total_transactions: u64,
    /// User transfers only
    pub user_transactions: u64,
    /// Sum of user transfer amounts (base units)
    pub total_volume: String,
    /// Display form of `total_volume`
    pub total_volume_formatted: String,
    /// System transfers in blocks after genesis (base units)
    pub total_rewards: String,
    /// Display form of `total_rewards`
    pub total_rewards_formatted: String,
    /// System transfers in block 0 (base units)
    pub genesis_allocations: String,
    /// Display form of `genesis_allocations`
    pub genesis_allocations_formatted: String,
    /// Distinct addresses seen, system sender excluded
    pub unique_addresses: usize,
    /// Transactions per block, rounded to two places
    pub average_transactions_per_block: f64,
}

/// One row of the balance leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBalance {
    /// Address (canonical lowercase)
    pub address: String,
    /// Balance in base units
    pub balance: String,
    /// Display form of `balance`
    pub balance_formatted: String,
}

/// User activity on one calendar day (UTC)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStatistics {
    /// Day
    pub date: NaiveDate,
    /// Blocks created that day
    pub blocks: u64,
    /// User transfers that day
    pub transactions: u64,
    /// Volume in base units
    pub volume: String,
    /// Display form of `volume`
    pub volume_formatted: String,
}

/// Full report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialReport {
    /// Reference time for the daily window
    pub generated_at: DateTime<Utc>,
    /// Totals
    pub summary: ReportSummary,
    /// Largest positive balances, descending
    pub top_addresses: Vec<AddressBalance>,
    /// Last seven days, oldest first, days without activity included
    pub daily_statistics: Vec<DailyStatistics>,
    /// Newest confirmed transfers first
    pub recent_transactions: Vec<TransactionView>,
}

/// Build the report as of `now`
pub fn financial_report(chain: &[Block], now: DateTime<Utc>) -> FinancialReport {
    let mut total_transactions = 0u64;
    let mut user_transactions = 0u64;
    let mut volume = 0u128;
    let mut rewards = 0u128;
    let mut genesis = 0u128;
    let mut addresses = BTreeSet::new();

    let today = now.date_naive();
    let first_day = today - Duration::days(DAILY_WINDOW_DAYS - 1);
    let mut daily: BTreeMap<NaiveDate, (u64, u64, u128)> = (0..DAILY_WINDOW_DAYS)
        .map(|offset| (first_day + Duration::days(offset), (0, 0, 0)))
        .collect();

    for block in chain {
        let day = daily.get_mut(&block.timestamp.date_naive());
        if let Some(day) = day {
            day.0 += 1;
        }

        for tx in &block.transactions {
            total_transactions += 1;
            addresses.insert(normalize_address(&tx.recipient));

            if tx.is_system() {
                if block.index == 0 {
                    genesis = genesis.saturating_add(tx.amount);
                } else {
                    rewards = rewards.saturating_add(tx.amount);
                }
                continue;
            }

            addresses.insert(normalize_address(&tx.sender));
            user_transactions += 1;
            volume = volume.saturating_add(tx.amount);

            if let Some(day) = daily.get_mut(&tx.timestamp.date_naive()) {
                day.1 += 1;
                day.2 = day.2.saturating_add(tx.amount);
            }
        }
    }
    addresses.remove(&normalize_address(SYSTEM_SENDER));

    let mut top_addresses: Vec<(String, i128)> = addresses
        .iter()
        .map(|address| (address.clone(), balance_of(chain, address)))
        .filter(|(_, balance)| *balance > 0)
        .collect();
    top_addresses.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_addresses.truncate(TOP_ADDRESSES);

    let recent_transactions = chain
        .iter()
        .rev()
        .flat_map(|block| block.transactions.iter().rev())
        .filter(|tx| !tx.is_system())
        .take(RECENT_TRANSACTIONS)
        .map(|tx| tx.to_view())
        .collect();

    let average = if chain.is_empty() {
        0.0
    } else {
        ((total_transactions as f64 / chain.len() as f64) * 100.0).round() / 100.0
    };

    FinancialReport {
        generated_at: now,
        summary: ReportSummary {
            total_blocks: chain.len() as u64,
            total_transactions,
            user_transactions,
            total_volume: volume.to_string(),
            total_volume_formatted: format_unsigned(volume),
            total_rewards: rewards.to_string(),
            total_rewards_formatted: format_unsigned(rewards),
            genesis_allocations: genesis.to_string(),
            genesis_allocations_formatted: format_unsigned(genesis),
            unique_addresses: addresses.len(),
            average_transactions_per_block: average,
        },
        top_addresses: top_addresses
            .into_iter()
            .map(|(address, balance)| AddressBalance {
                address,
                balance: balance.to_string(),
                balance_formatted: amount::format(balance),
            })
            .collect(),
        daily_statistics: daily
            .into_iter()
            .map(|(date, (blocks, transactions, volume))| DailyStatistics {
                date,
                blocks,
                transactions,
                volume: volume.to_string(),
                volume_formatted: format_unsigned(volume),
            })
            .collect(),
        recent_transactions,
    }
}

fn format_unsigned(value: u128) -> String {
    amount::format(i128::try_from(value).unwrap_or(i128::MAX))
}
