//! Error taxonomy.
//!
//! Each rule family gets its own `thiserror` enum. Two of those enums are
//! public boundaries that callers actually match on: [`ValidationError`]
//! (transaction- and block-level consensus rules) and [`MempoolError`].
//! Lower-level enums (encoding, crypto, chain storage) fold into those
//! boundaries via `#[error(transparent)]` + `#[from]` rather than being
//! flattened into one giant enum.

use thiserror::Error;

use crate::types::{Hash256, OutPoint};

/// Failures decoding wire-format bytes (varints, Base58Check, fixed-size fields).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum EncodingError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("non-canonical varint encoding")]
    NonCanonicalVarint,
    #[error("invalid encoding")]
    InvalidEncoding,
    #[error("trailing bytes after decoding")]
    TrailingBytes,
}

/// Failures in signature/key handling.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CryptoError {
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("signature does not verify against the claimed public key")]
    SignatureVerificationFailed,
}

/// Transaction-level consensus rule violations (spec: transaction validation steps).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TransactionError {
    #[error("transaction has no inputs")]
    NoInputs,
    #[error("transaction has no outputs")]
    NoOutputs,
    #[error("transaction exceeds the maximum serialized size")]
    TooLarge,
    #[error("transaction references an unknown or already-spent output: {0}")]
    MissingUtxo(OutPoint),
    #[error("transaction spends an immature coinbase output: {0}")]
    ImmatureCoinbase(OutPoint),
    #[error("duplicate input within a single transaction: {0}")]
    DuplicateInput(OutPoint),
    #[error("sum of output values exceeds the maximum supply")]
    OutputOverflow,
    #[error("output value is negative")]
    NegativeOutput,
    #[error("sum of inputs is less than sum of outputs")]
    InsufficientInputValue,
    #[error("script/signature check failed for input {0}")]
    ScriptVerificationFailed(OutPoint),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Block-level consensus rule violations (spec: block validation steps).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum BlockError {
    #[error("unsupported block version")]
    BadVersion,
    #[error("block has no transactions")]
    EmptyBlock,
    #[error("first transaction is not a coinbase")]
    MissingCoinbase,
    #[error("non-first transaction claims to be a coinbase")]
    UnexpectedCoinbase,
    #[error("duplicate transaction id within block: {0}")]
    DuplicateTransaction(Hash256),
    #[error("merkle root does not match block contents")]
    BadMerkleRoot,
    #[error("block exceeds the maximum serialized size")]
    TooLarge,
    #[error("proof of work does not meet the required target")]
    InsufficientWork,
    #[error("block does not extend the current tip: expected prev hash {expected}, got {actual}")]
    BadPrevHash { expected: Hash256, actual: Hash256 },
    #[error("difficulty target {actual:#x} does not match expected {expected:#x}")]
    BadDifficulty { expected: u32, actual: u32 },
    #[error("block timestamp is not after the median time of the last 11 blocks")]
    TimestampTooOld,
    #[error("block timestamp is too far in the future")]
    TimestampTooNew,
    #[error("coinbase pays out more than the block reward plus fees")]
    BadCoinbaseValue,
    #[error("double spend within block for output {0}")]
    DoubleSpendWithinBlock(OutPoint),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

/// Public validation boundary: anything that can go wrong validating a
/// transaction or a block against chain state.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ValidationError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error(transparent)]
    Block(#[from] BlockError),
}

/// Public mempool boundary.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum MempoolError {
    #[error("transaction already in the mempool: {0}")]
    AlreadyExists(Hash256),
    #[error("mempool double spend: input {outpoint} already claimed by {existing_txid}")]
    MempoolDoubleSpend {
        outpoint: OutPoint,
        existing_txid: Hash256,
    },
    #[error("fee rate too low to be accepted into a full mempool")]
    FeeTooLow,
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<TransactionError> for MempoolError {
    fn from(err: TransactionError) -> Self {
        MempoolError::Validation(ValidationError::Transaction(err))
    }
}

/// Chain storage / coordinator failures (connect, disconnect, reorg).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ChainError {
    #[error("block height {height} does not follow current tip height {tip_height}")]
    HeightMismatch { height: u64, tip_height: u64 },
    #[error("block {0} already present in the chain")]
    DuplicateBlock(Hash256),
    #[error("chain is empty, nothing to disconnect")]
    EmptyChain,
    #[error("block {0} not found")]
    BlockNotFound(Hash256),
    #[error("block {0} does not extend any known block")]
    OrphanBlock(Hash256),
    #[error("undo data missing for block {0}")]
    UndoDataMissing(Hash256),
    #[error("no common ancestor found between current tip and candidate fork")]
    NoCommonAncestor,
    #[error("invalid hash160 hex: {0}")]
    InvalidRecipient(String),
    #[error("UTXO already exists: {0}")]
    DuplicateUtxo(OutPoint),
    #[error("UTXO missing: {0}")]
    MissingUtxo(OutPoint),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
