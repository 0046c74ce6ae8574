use crate::ledger::{LedgerClient, TransactionBatch};
use crate::{Error, Operation};
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// The transactions of the block at `offset` from the head, as sent to the sum stage
#[derive(Debug)]
pub struct FetchedBlock {
    pub offset: u64,
    pub number: u64,
    pub transactions: TransactionBatch,
}

/// Fetches `total_count` blocks going back from the head and sends them on the channel.
///
/// The channel is closed when every sender clone is dropped, either after the last block or on
/// the first error.
pub struct Fetch {
    join: Option<JoinHandle<Result<u64, Error>>>,
}

impl Drop for Fetch {
    fn drop(&mut self) {
        if let Some(jh) = self.join.take() {
            if jh.join().is_err() {
                error!("fetch thread panicked");
            }
        }
    }
}

impl Fetch {
    pub fn new<C: LedgerClient + 'static>(
        client: Arc<C>,
        total_count: u64,
        fetchers: usize,
        sender: SyncSender<FetchedBlock>,
    ) -> Self {
        Self {
            join: Some(std::thread::spawn(move || {
                info!("starting fetch of {} blocks, fetchers: {}", total_count, fetchers);
                let now = Instant::now();

                let head = client.head_block_number()?;
                info!("head block is {:#x}", head);
                if head < total_count - 1 {
                    return Err(Error::protocol(
                        Operation::HeadLookup,
                        format!("head {:#x} is too low to fetch {} blocks", head, total_count),
                    ));
                }

                let busy_time = if fetchers <= 1 {
                    let early_stop = AtomicBool::new(false);
                    fetch_offsets(&*client, head, 0..total_count, &sender, &early_stop)?
                } else {
                    fetch_parallel(&*client, head, total_count, fetchers as u64, sender)?
                };

                info!(
                    "ending fetch, elapsed: {:?} busy time: {:?}",
                    now.elapsed(),
                    busy_time
                );
                Ok(head)
            })),
        }
    }

    /// Wait for the fetch to end and return the head block number
    pub fn join(mut self) -> Result<u64, Error> {
        self.join
            .take()
            .ok_or_else(|| Error::Pipeline("fetch already joined".into()))?
            .join()
            .map_err(|_| Error::Pipeline("fetch thread panicked".into()))?
    }
}

/// Split offsets round-robin between `fetchers` threads sharing the client, the first failing
/// thread stops the others before their next request
fn fetch_parallel<C: LedgerClient>(
    client: &C,
    head: u64,
    total_count: u64,
    fetchers: u64,
    sender: SyncSender<FetchedBlock>,
) -> Result<Duration, Error> {
    let early_stop = AtomicBool::new(false);
    std::thread::scope(|scope| {
        let early_stop = &early_stop;
        let handles: Vec<_> = (0..fetchers.min(total_count))
            .map(|start| {
                let sender = sender.clone();
                let offsets = (start..total_count).step_by(fetchers as usize);
                scope.spawn(move || fetch_offsets(client, head, offsets, &sender, early_stop))
            })
            .collect();
        drop(sender);

        let mut busy_time = Duration::default();
        let mut first_error = None;
        for handle in handles {
            match handle.join() {
                Ok(Ok(elapsed)) => busy_time += elapsed,
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(_) => {
                    first_error.get_or_insert(Error::Pipeline("fetch thread panicked".into()));
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(busy_time),
        }
    })
}

/// Returns the time spent waiting the node, stops early without error if the receiver hung up
/// or `early_stop` is set. Sets `early_stop` on failure.
fn fetch_offsets<C: LedgerClient + ?Sized>(
    client: &C,
    head: u64,
    offsets: impl Iterator<Item = u64>,
    sender: &SyncSender<FetchedBlock>,
    early_stop: &AtomicBool,
) -> Result<Duration, Error> {
    let mut busy_time = Duration::default();
    for offset in offsets {
        if early_stop.load(Ordering::Relaxed) {
            debug!("another fetcher failed, stopping fetch at offset {}", offset);
            break;
        }
        let number = head - offset;
        let now = Instant::now();
        let transactions = match client.block_transactions(number) {
            Ok(transactions) => transactions,
            Err(e) => {
                early_stop.store(true, Ordering::Relaxed);
                return Err(e);
            }
        };
        busy_time += now.elapsed();
        debug!(
            "fetched block {:#x} offset {} txs: {}",
            number,
            offset,
            transactions.len()
        );
        let block = FetchedBlock {
            offset,
            number,
            transactions,
        };
        if sender.send(block).is_err() {
            debug!("receiver hung up, stopping fetch at offset {}", offset);
            break;
        }
    }
    Ok(busy_time)
}
