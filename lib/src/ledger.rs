use crate::Error;
use serde::Deserialize;

/// A transaction as returned by `eth_getBlockByNumber` with full transaction objects,
/// only the transferred `value` is kept
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Transaction {
    /// Integer literal, `0x` prefixed hexadecimal or decimal
    pub value: String,
}

impl Transaction {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Transaction {
            value: value.into(),
        }
    }
}

/// The transactions of one block, in any order
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct TransactionBatch(pub Vec<Transaction>);

impl TransactionBatch {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.0.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for TransactionBatch {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        TransactionBatch(iter.into_iter().map(Transaction::new).collect())
    }
}

/// The remote node the blocks are fetched from.
///
/// Implementations are shared between fetch threads, so they must be `Sync`.
/// Any error returned is fatal for the computation, retrying is up to the implementation.
pub trait LedgerClient: Send + Sync {
    /// Number of the most recent block
    fn head_block_number(&self) -> Result<u64, Error>;

    /// All the transactions of block `number`
    fn block_transactions(&self, number: u64) -> Result<TransactionBatch, Error>;
}
