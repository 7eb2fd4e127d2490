//! Property-based tests for ledger invariants
//!
//! - Chain linkage: blocks sealed in sequence always validate
//! - Difficulty: sealed hashes carry the required zero prefix
//! - Balance additivity: the sum over all addresses is the system issuance
//! - Amount codec: decimal round-trip and the base-unit threshold

use ledger_core::{
    amount::{self, BASE_UNITS_PER_TOKEN, BASE_UNIT_THRESHOLD},
    balance::{balance_of, history_of},
    events::BusEventChannel,
    genesis::genesis_block,
    mining::{mine_block, Reward},
    pending::MemoryPendingStore,
    storage::RocksChainStore,
    validation::is_chain_valid,
    Block, Config, Direction, Ledger, Transaction, SYSTEM_SENDER,
};
use message_bus::LocalBus;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

const ADDRESSES: [&str; 4] = ["alice", "bob", "carol", "dave"];

/// Strategy for generating addresses in mixed case
fn address_strategy() -> impl Strategy<Value = String> {
    (0..ADDRESSES.len(), any::<bool>()).prop_map(|(i, upper)| {
        if upper {
            ADDRESSES[i].to_uppercase()
        } else {
            ADDRESSES[i].to_string()
        }
    })
}

/// Strategy for generating user transfers
fn transfer_strategy() -> impl Strategy<Value = Transaction> {
    (address_strategy(), address_strategy(), 1u64..1_000_000u64)
        .prop_map(|(sender, recipient, amount)| Transaction::new(sender, recipient, amount as u128))
}

/// Strategy for generating per-block transfer lists
fn blocks_strategy() -> impl Strategy<Value = Vec<Vec<Transaction>>> {
    prop::collection::vec(prop::collection::vec(transfer_strategy(), 0..4), 1..5)
}

/// Mine `blocks` on top of an empty genesis, rewarding `alice` each time
fn build_chain(blocks: Vec<Vec<Transaction>>, difficulty: u32, reward: u128) -> Vec<Block> {
    let mut chain = vec![genesis_block(None)];
    for pending in blocks {
        let previous = chain.last().unwrap().clone();
        let reward = Some(Reward {
            address: "alice".to_string(),
            amount: reward,
        });
        let block = mine_block(&pending, reward, &previous, difficulty)
            .into_block()
            .unwrap();
        chain.push(block);
    }
    chain
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: a chain built by mining is valid and meets the difficulty
    #[test]
    fn prop_mined_chain_is_valid(blocks in blocks_strategy(), difficulty in 0u32..=2) {
        let chain = build_chain(blocks, difficulty, 10);

        prop_assert!(is_chain_valid(&chain));
        let prefix = "0".repeat(difficulty as usize);
        for (i, block) in chain.iter().enumerate().skip(1) {
            prop_assert_eq!(block.index, i as u64);
            prop_assert_eq!(&block.previous_hash, &chain[i - 1].hash);
            prop_assert!(block.hash.starts_with(&prefix));
            prop_assert!(block.transactions.last().unwrap().is_system());
        }
    }

    /// Property: user transfers net to zero; balances sum to what the system issued
    #[test]
    fn prop_balances_sum_to_issuance(blocks in blocks_strategy(), reward in 0u128..1_000) {
        let mined = blocks.len() as i128;
        let chain = build_chain(blocks, 0, reward);

        let total: i128 = ADDRESSES.iter().map(|a| balance_of(&chain, a)).sum();
        prop_assert_eq!(total, mined * reward as i128);
        prop_assert_eq!(balance_of(&chain, SYSTEM_SENDER), -(mined * reward as i128));
    }

    /// Property: balances and history ignore address case
    #[test]
    fn prop_balance_case_insensitive(blocks in blocks_strategy(), i in 0..ADDRESSES.len()) {
        let chain = build_chain(blocks, 0, 5);
        let lower = ADDRESSES[i];
        let upper = lower.to_uppercase();

        prop_assert_eq!(balance_of(&chain, lower), balance_of(&chain, &upper));
        prop_assert_eq!(history_of(&chain, lower).len(), history_of(&chain, &upper).len());
    }

    /// Property: history replays to the balance
    #[test]
    fn prop_history_replays_to_balance(blocks in blocks_strategy(), i in 0..ADDRESSES.len()) {
        let chain = build_chain(blocks, 0, 7);
        let address = ADDRESSES[i];

        let replayed: i128 = history_of(&chain, address)
            .iter()
            .map(|entry| match entry.direction {
                Direction::Sent => -entry.transaction.signed_amount(),
                Direction::Received => entry.transaction.signed_amount(),
            })
            .sum();
        prop_assert_eq!(replayed, balance_of(&chain, address));
    }

    /// Property: decimals with at most 18 fraction digits survive the codec
    #[test]
    fn prop_amount_round_trip(mantissa in -10_000_000_000i64..10_000_000_000i64, scale in 0u32..=18) {
        let value = Decimal::new(mantissa, scale);
        let base_units = amount::to_base_units(value).unwrap();
        prop_assert_eq!(amount::from_base_units(base_units).unwrap(), value);
    }

    /// Property: integers up to 10^10 are tokens, larger ones are base units
    #[test]
    fn prop_parse_amount_threshold(value in 1i64..i64::MAX) {
        let parsed = amount::parse_amount(value).unwrap();
        if (value as i128) > BASE_UNIT_THRESHOLD {
            prop_assert_eq!(parsed, value as i128);
            prop_assert_eq!(amount::parse_amount(value.to_string()).unwrap(), value as i128);
        } else {
            prop_assert_eq!(parsed, value as i128 * BASE_UNITS_PER_TOKEN);
        }
    }

    /// Property: formatting then parsing a display amount is lossless
    #[test]
    fn prop_format_parses_back(base_units in 0i128..1_000_000_000_000_000_000_000i128) {
        let text = amount::format(base_units);
        prop_assert!(!text.contains('e'));
        let back = amount::to_base_units(text.parse::<Decimal>().unwrap()).unwrap();
        prop_assert_eq!(back, base_units);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// Property: accepted transfers are mined in submission order
    #[test]
    fn prop_submitted_transfers_mined_in_order(transfers in prop::collection::vec(transfer_strategy(), 1..6)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let temp_dir = tempfile::tempdir().unwrap();
            let mut config = Config::default();
            config.data_dir = temp_dir.path().to_path_buf();

            let ledger = Ledger::new(
                Arc::new(RocksChainStore::open(&config).unwrap()),
                Arc::new(MemoryPendingStore::default()),
                Arc::new(BusEventChannel::new(Arc::new(LocalBus::new(16)))),
                1,
                0,
            )
            .unwrap();
            ledger.bootstrap(None).await.unwrap();

            let mut hashes = Vec::new();
            for tx in &transfers {
                let amount = tx.amount.to_string();
                let receipt = ledger.submit(&tx.sender, &tx.recipient, amount.as_str()).await.unwrap();
                hashes.push(receipt.hash);
            }

            let block = ledger.mine(None, false).await.unwrap().into_block().unwrap();
            let mined: Vec<String> = block.transactions.iter().map(|t| t.calculate_hash()).collect();
            prop_assert_eq!(&mined, &hashes);

            prop_assert!(ledger.pending_transactions().await.is_empty());
            Ok(())
        })?;
    }
}
