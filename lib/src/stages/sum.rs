use crate::stages::FetchedBlock;
use crate::Error;
use log::{debug, info, trace};
use num_bigint::BigUint;
use num_traits::{Num, Zero};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::OnceLock;
use std::time::Instant;

/// Sums transaction values of the received blocks on a dedicated pool of `workers` threads
pub struct Sum {
    pool: ThreadPool,
}

/// Pre-sized buffer of per-block totals indexed by offset, every slot can be written only once
struct BlockTotals(Vec<OnceLock<BigUint>>);

impl BlockTotals {
    fn new(total_count: usize) -> Self {
        BlockTotals((0..total_count).map(|_| OnceLock::new()).collect())
    }

    fn set(&self, offset: u64, total: BigUint) -> Result<(), Error> {
        let slot = usize::try_from(offset)
            .ok()
            .and_then(|i| self.0.get(i))
            .ok_or_else(|| Error::Pipeline(format!("offset {} out of range", offset)))?;
        slot.set(total)
            .map_err(|_| Error::Pipeline(format!("offset {} written twice", offset)))
    }

    fn into_vec(self) -> Result<Vec<BigUint>, Error> {
        self.0
            .into_iter()
            .enumerate()
            .map(|(offset, slot)| {
                slot.into_inner()
                    .ok_or_else(|| Error::Pipeline(format!("missing total for offset {}", offset)))
            })
            .collect()
    }
}

impl Sum {
    pub fn new(workers: usize) -> Result<Self, Error> {
        // a dedicated pool avoids deadlocks with library consumers using the global rayon pool
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("sum-{}", i))
            .build()?;
        Ok(Self { pool })
    }

    /// Drain `receiver` until every sender is dropped and return the totals ordered by offset.
    ///
    /// Returns only when all workers are done, on the first error the remaining blocks are not
    /// processed and the receiver is dropped.
    pub fn run(
        &self,
        receiver: Receiver<FetchedBlock>,
        total_count: usize,
    ) -> Result<Vec<BigUint>, Error> {
        info!(
            "starting sum of {} blocks, workers: {}",
            total_count,
            self.pool.current_num_threads()
        );
        let now = Instant::now();
        let totals = BlockTotals::new(total_count);
        let total_txs = AtomicUsize::new(0);

        self.pool.install(|| {
            receiver
                .into_iter()
                .par_bridge()
                .try_for_each(|block: FetchedBlock| {
                    let total = block_total(&block)?;
                    debug!(
                        "block {:#x} offset {} txs: {} total: {}",
                        block.number,
                        block.offset,
                        block.transactions.len(),
                        total
                    );
                    total_txs.fetch_add(block.transactions.len(), Ordering::Relaxed);
                    totals.set(block.offset, total)
                })
        })?;

        info!(
            "ending sum total txs: {} elapsed: {:?}",
            total_txs.load(Ordering::Relaxed),
            now.elapsed()
        );
        totals.into_vec()
    }
}

/// Sum of the values of every transaction in the block, fails on the first unparsable value
pub fn block_total(block: &FetchedBlock) -> Result<BigUint, Error> {
    let mut total = BigUint::zero();
    for (tx_index, tx) in block.transactions.iter().enumerate() {
        let value = parse_value(&tx.value).ok_or_else(|| Error::ValueParse {
            block_number: block.number,
            tx_index,
            value: tx.value.clone(),
        })?;
        trace!("block {:#x} tx #{} value {}", block.number, tx_index, value);
        total += value;
    }
    Ok(total)
}

/// Parse a non-negative integer literal, hexadecimal if prefixed by `0x` or `0X`, else decimal
pub fn parse_value(literal: &str) -> Option<BigUint> {
    let (digits, radix) = match literal
        .strip_prefix("0x")
        .or_else(|| literal.strip_prefix("0X"))
    {
        Some(hex) => (hex, 16),
        None => (literal, 10),
    };
    // `from_str_radix` also accepts `+` and `_`, which are not valid here
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    BigUint::from_str_radix(digits, radix).ok()
}
