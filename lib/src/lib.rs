//! Finds, among the most recent blocks of a ledger reachable via JSON-RPC, the window of
//! `window_size` consecutive blocks whose transactions moved the highest total value.
//!
//! Blocks are fetched going back from the head and sent over a channel to a pool of workers
//! summing the transaction values with arbitrary precision, once every block is summed the
//! heaviest window is searched with a running sum.
//!
//! ```no_run
//! use blocks_window::{Config, HttpLedger};
//! use std::sync::Arc;
//!
//! let mut config = Config::new("https://eth.getblock.io/mainnet/");
//! config.window_size = 10;
//! let ledger = Arc::new(HttpLedger::from_config(&config).unwrap());
//! let report = blocks_window::find_heaviest_window(&config, ledger).unwrap();
//! println!("{}", report);
//! ```

use log::info;
use std::sync::mpsc::sync_channel;
use std::sync::Arc;
use std::time::Instant;

mod config;
mod error;
mod ledger;
mod report;
mod rpc;
mod stages;
mod window;

pub use config::Config;
pub use error::{Error, Operation};
pub use ledger::{LedgerClient, Transaction, TransactionBatch};
pub use num_bigint::BigUint;
pub use report::Report;
pub use rpc::HttpLedger;
pub use stages::parse_value;
pub use window::{max_window, WindowResult, WindowSums};

/// Fetch `config.total_count()` blocks from `client` going back from its head and return the
/// first block and total value of the heaviest `config.window_size` long window.
///
/// Any failure (network, protocol, unparsable value) aborts the whole computation.
pub fn find_heaviest_window<C: LedgerClient + 'static>(
    config: &Config,
    client: Arc<C>,
) -> Result<Report, Error> {
    let now = Instant::now();
    let total_count = config.total_count()?;
    let slots = usize::try_from(total_count)
        .map_err(|_| Error::InvalidConfig(format!("cannot hold {} totals", total_count)))?;
    info!(
        "searching heaviest window of {} blocks among {} candidates, fetching {} blocks",
        config.window_size, config.depth_count, total_count
    );

    let sum = stages::Sum::new(config.workers)?;
    let (send, recv) = sync_channel(config.channels_size);
    let fetch = stages::Fetch::new(client, total_count, config.fetchers, send);
    let totals = sum.run(recv, slots);

    // a fetch error is the cause of a missing total, report it first
    let head = fetch.join()?;
    let totals = totals?;

    // window_size <= total_count, fits in usize
    let window = max_window(&totals, config.window_size as usize)?;
    let report = Report::new(head, window)?;
    info!("found {:?} in {:?}", report, now.elapsed());
    Ok(report)
}

#[cfg(test)]
mod inner_test {
    use super::*;
    use std::collections::HashMap;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use test_log::test;

    /// In memory ledger with blocks `head, head - 1, ...` holding the given transaction values
    #[derive(Debug, Default)]
    pub struct MemLedger {
        pub head: u64,
        pub blocks: HashMap<u64, TransactionBatch>,
        pub fail_head: bool,
        pub fail_block: Option<u64>,
        /// Sleep before answering a block that doesn't fail
        pub delay: Option<Duration>,
        /// Number of `block_transactions` calls received
        pub calls: AtomicUsize,
    }

    impl MemLedger {
        pub fn with_values(head: u64, values: &[&[&str]]) -> Self {
            let blocks = values
                .iter()
                .enumerate()
                .map(|(offset, values)| {
                    let batch = values.iter().copied().collect::<TransactionBatch>();
                    (head - offset as u64, batch)
                })
                .collect();
            MemLedger {
                head,
                blocks,
                ..Default::default()
            }
        }
    }

    impl LedgerClient for MemLedger {
        fn head_block_number(&self) -> Result<u64, Error> {
            if self.fail_head {
                let e = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
                return Err(Error::network(Operation::HeadLookup, e));
            }
            Ok(self.head)
        }

        fn block_transactions(&self, number: u64) -> Result<TransactionBatch, Error> {
            let operation = Operation::BlockFetch(number);
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_block == Some(number) {
                let e = io::Error::new(io::ErrorKind::TimedOut, "timed out");
                return Err(Error::network(operation, e));
            }
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            self.blocks
                .get(&number)
                .cloned()
                .ok_or_else(|| Error::protocol(operation, "missing or null result"))
        }
    }

    pub fn test_conf(window_size: u64, depth_count: u64) -> Config {
        let mut config = Config::new("http://localhost:8545");
        config.window_size = window_size;
        config.depth_count = depth_count;
        config
    }

    #[test]
    fn test_scenario() {
        // totals 7, 3, 9 for blocks 100, 99, 98
        let ledger = MemLedger::with_values(0x64, &[&["0x7"], &["1", "0x2"], &["9"]]);
        let report = find_heaviest_window(&test_conf(2, 2), Arc::new(ledger)).unwrap();
        assert_eq!(report.block_number, 0x63);
        assert_eq!(report.total_value, BigUint::from(12u32));
        assert_eq!(
            report.to_string(),
            "Block number: 0x63, total transactions value: 12"
        );
    }

    #[test]
    fn test_tie_reports_oldest() {
        let ledger = MemLedger::with_values(10, &[&["10"], &["5"], &["0x5"], &["0xa"]]);
        let report = find_heaviest_window(&test_conf(2, 3), Arc::new(ledger)).unwrap();
        assert_eq!(report.block_number, 8);
        assert_eq!(report.total_value, BigUint::from(15u32));
    }

    #[test]
    fn test_single_candidate() {
        let ledger = MemLedger::with_values(5, &[&["1"], &[], &["0x1a", "26"]]);
        let report = find_heaviest_window(&test_conf(3, 1), Arc::new(ledger)).unwrap();
        assert_eq!(report.block_number, 5);
        assert_eq!(report.total_value, BigUint::from(53u32));
    }

    #[test]
    fn test_empty_blocks() {
        let ledger = MemLedger::with_values(3, &[&[], &[], &[], &[]]);
        let report = find_heaviest_window(&test_conf(2, 3), Arc::new(ledger)).unwrap();
        assert_eq!(report.block_number, 1);
        assert_eq!(report.total_value, BigUint::from(0u32));
    }

    #[test]
    fn test_independent_of_scheduling() {
        let values: Vec<Vec<String>> = (0..30u64)
            .map(|i| {
                (0..(i % 4))
                    .map(|j| {
                        let v = (i * 7919 + j * 104_729) % 1000;
                        if j % 2 == 0 {
                            format!("{:#x}", v)
                        } else {
                            v.to_string()
                        }
                    })
                    .collect()
            })
            .collect();
        let values: Vec<Vec<&str>> = values
            .iter()
            .map(|v| v.iter().map(String::as_str).collect())
            .collect();
        let values: Vec<&[&str]> = values.iter().map(Vec::as_slice).collect();
        let ledger = Arc::new(MemLedger::with_values(1_000_000, &values));

        let mut conf = test_conf(5, 26);
        let expected = find_heaviest_window(&conf, ledger.clone()).unwrap();
        for workers in 1..=4 {
            for fetchers in 1..=3 {
                for channels_size in [0, 1, 8] {
                    conf.workers = workers;
                    conf.fetchers = fetchers;
                    conf.channels_size = channels_size;
                    let report = find_heaviest_window(&conf, ledger.clone()).unwrap();
                    assert_eq!(report, expected, "{:?}", conf);
                }
            }
        }
    }

    #[test]
    fn test_head_failure() {
        let mut ledger = MemLedger::with_values(100, &[&["1"], &["2"], &["3"]]);
        ledger.fail_head = true;
        match find_heaviest_window(&test_conf(2, 2), Arc::new(ledger)) {
            Err(Error::Network { operation, .. }) => assert_eq!(operation, Operation::HeadLookup),
            other => panic!("expected network error, got {:?}", other),
        }
    }

    #[test]
    fn test_block_failure() {
        for fetchers in 1..=2 {
            let mut ledger = MemLedger::with_values(100, &[&["1"], &["2"], &["3"]]);
            ledger.fail_block = Some(98);
            let mut conf = test_conf(2, 2);
            conf.fetchers = fetchers;
            match find_heaviest_window(&conf, Arc::new(ledger)) {
                Err(Error::Network { operation, .. }) => {
                    assert_eq!(operation, Operation::BlockFetch(98))
                }
                other => panic!("expected network error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_parallel_fetch_stops_on_error() {
        // head 10000, the head block fails, 1000 blocks requested
        let empty: Vec<&[&str]> = (0..1000).map(|_| &[][..]).collect();
        let mut ledger = MemLedger::with_values(10_000, &empty);
        ledger.fail_block = Some(10_000);
        ledger.delay = Some(Duration::from_millis(2));
        let ledger = Arc::new(ledger);

        let mut conf = test_conf(100, 901);
        conf.fetchers = 2;
        match find_heaviest_window(&conf, ledger.clone()) {
            Err(Error::Network { operation, .. }) => {
                assert_eq!(operation, Operation::BlockFetch(10_000))
            }
            other => panic!("expected network error, got {:?}", other),
        }
        let calls = ledger.calls.load(Ordering::SeqCst);
        assert!(calls < 50, "{} blocks requested after the failure", calls);
    }

    #[test]
    fn test_missing_block() {
        let ledger = MemLedger::with_values(100, &[&["1"], &["2"]]);
        match find_heaviest_window(&test_conf(2, 2), Arc::new(ledger)) {
            Err(Error::Protocol { operation, .. }) => {
                assert_eq!(operation, Operation::BlockFetch(98))
            }
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[test]
    fn test_value_parse_failure() {
        let ledger = MemLedger::with_values(100, &[&["1"], &["2", "0xnope"], &["3"]]);
        match find_heaviest_window(&test_conf(2, 2), Arc::new(ledger)) {
            Err(Error::ValueParse {
                block_number,
                tx_index,
                value,
            }) => {
                assert_eq!(block_number, 99);
                assert_eq!(tx_index, 1);
                assert_eq!(value, "0xnope");
            }
            other => panic!("expected value parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_config() {
        let ledger = Arc::new(MemLedger::with_values(100, &[&["1"]]));
        let result = find_heaviest_window(&test_conf(0, 2), ledger.clone());
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
        let result = find_heaviest_window(&test_conf(1, 0), ledger);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
