//! Error taxonomy for the payroll contract.
//!
//! Every entry point that can fail returns `Result<_, PayrollError>` under
//! `#[handle_result]`; an `Err` panics with the message below and the runtime
//! discards all state written during the call.

use near_sdk::FunctionError;
use thiserror::Error;

#[derive(Error, FunctionError, Debug, Clone, PartialEq, Eq)]
pub enum PayrollError {
    // ----- validation -----
    #[error("Length mismatch")]
    LengthMismatch,
    #[error("Invalid batch size: {0}")]
    InvalidBatchSize(usize),
    #[error("Invalid ciphertext")]
    InvalidCiphertext,
    #[error("Invalid index: {index} (batch has {record_count} records)")]
    InvalidIndex { index: u32, record_count: u32 },

    // ----- protocol -----
    #[error("Unknown request: {0}")]
    UnknownRequest(String),
    #[error("Decoded {actual} cleartexts, expected {expected}")]
    DecodeLengthMismatch { expected: u32, actual: usize },
    #[error("Malformed cleartexts")]
    MalformedCleartexts,
    #[error("Not decrypted")]
    NotDecrypted,
    #[error("Batch not found: {0}")]
    BatchNotFound(u64),
    #[error("Decrypted amounts overflow")]
    AmountOverflow,
    #[error("Invalid decryption proof")]
    InvalidDecryptionProof,

    // ----- authorization -----
    #[error("Only owner")]
    OnlyOwner,
    #[error("Only the decryption oracle can call this")]
    UnauthorizedOracle,
    #[error("Oracle public key must be 32 bytes")]
    InvalidOraclePublicKey,

    // ----- funds -----
    #[error("No excess balance")]
    NoExcessBalance,
}
