//! Encrypted salary records and the oracle's cleartext payloads.
//!
//! Handles and proofs are produced off-chain by the FHE client and are opaque
//! here: only their presence is checked. Cryptographic validity is the
//! oracle's concern once it tries to decrypt them.

use borsh::BorshDeserialize;
use near_sdk::json_types::Base64VecU8;
use near_sdk::{near, AccountId};

use crate::errors::PayrollError;

/// Largest batch accepted by `submit_salary_batch`
pub const MAX_BATCH_SIZE: usize = 50;

/// All-zero implicit account. A recipient that decrypts to this value is
/// never paid.
pub const ZERO_RECIPIENT: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// One employee's encrypted recipient and salary, as submitted
#[near(serializers = [borsh, json])]
#[derive(Clone, Debug, PartialEq)]
pub struct EncryptedRecord {
    /// Ciphertext handle of the recipient account
    pub address_ciphertext: Base64VecU8,
    /// Input proof bound to `address_ciphertext`
    pub address_proof: Base64VecU8,
    /// Ciphertext handle of the salary (yoctoNEAR)
    pub amount_ciphertext: Base64VecU8,
    /// Input proof bound to `amount_ciphertext`
    pub amount_proof: Base64VecU8,
}

impl EncryptedRecord {
    /// Structural check only: every handle and proof must be non-empty.
    pub fn validate(&self) -> Result<(), PayrollError> {
        let well_formed = !self.address_ciphertext.0.is_empty()
            && !self.address_proof.0.is_empty()
            && !self.amount_ciphertext.0.is_empty()
            && !self.amount_proof.0.is_empty();

        if well_formed {
            Ok(())
        } else {
            Err(PayrollError::InvalidCiphertext)
        }
    }
}

/// Handle/proof pair handed to the oracle for one field of one record
#[near(serializers = [json])]
#[derive(Clone, Debug, PartialEq)]
pub struct CiphertextInput {
    pub handle: Base64VecU8,
    pub proof: Base64VecU8,
}

/// Zip the four parallel submission arrays into records.
///
/// Checks run in a fixed order: array lengths, batch size, then each record.
pub fn assemble_records(
    address_ciphertexts: Vec<Base64VecU8>,
    amount_ciphertexts: Vec<Base64VecU8>,
    address_proofs: Vec<Base64VecU8>,
    amount_proofs: Vec<Base64VecU8>,
) -> Result<Vec<EncryptedRecord>, PayrollError> {
    let len = address_ciphertexts.len();
    if amount_ciphertexts.len() != len || address_proofs.len() != len || amount_proofs.len() != len
    {
        return Err(PayrollError::LengthMismatch);
    }
    if len == 0 || len > MAX_BATCH_SIZE {
        return Err(PayrollError::InvalidBatchSize(len));
    }

    let records: Vec<EncryptedRecord> = address_ciphertexts
        .into_iter()
        .zip(address_proofs)
        .zip(amount_ciphertexts.into_iter().zip(amount_proofs))
        .map(
            |((address_ciphertext, address_proof), (amount_ciphertext, amount_proof))| {
                EncryptedRecord {
                    address_ciphertext,
                    address_proof,
                    amount_ciphertext,
                    amount_proof,
                }
            },
        )
        .collect();

    records.iter().try_for_each(EncryptedRecord::validate)?;
    Ok(records)
}

/// Decode the oracle's address payload: Borsh `Vec<String>` in record order.
pub fn decode_addresses(payload: &[u8]) -> Result<Vec<String>, PayrollError> {
    Vec::<String>::try_from_slice(payload).map_err(|_| PayrollError::MalformedCleartexts)
}

/// Decode the oracle's amount payload: Borsh `Vec<u128>` (yoctoNEAR) in record order.
pub fn decode_amounts(payload: &[u8]) -> Result<Vec<u128>, PayrollError> {
    Vec::<u128>::try_from_slice(payload).map_err(|_| PayrollError::MalformedCleartexts)
}

/// Sum of decrypted salaries
pub fn checked_total(amounts: &[u128]) -> Result<u128, PayrollError> {
    amounts
        .iter()
        .try_fold(0u128, |total, amount| total.checked_add(*amount))
        .ok_or(PayrollError::AmountOverflow)
}

/// Parse a decrypted identity into an account that can receive funds.
/// Returns `None` for the zero sentinel and for anything that is not a valid
/// NEAR account id.
pub fn payable_recipient(identity: &str) -> Option<AccountId> {
    if identity == ZERO_RECIPIENT {
        return None;
    }
    identity.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(byte: u8) -> Base64VecU8 {
        Base64VecU8(vec![byte; 32])
    }

    fn blobs(n: usize) -> Vec<Base64VecU8> {
        (0..n).map(|i| blob(i as u8 + 1)).collect()
    }

    #[test]
    fn test_assemble_keeps_submission_order() {
        let records = assemble_records(blobs(3), blobs(3), blobs(3), blobs(3)).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].address_ciphertext, blob(1));
        assert_eq!(records[2].amount_proof, blob(3));
    }

    #[test]
    fn test_length_mismatch_checked_before_size() {
        assert_eq!(
            assemble_records(blobs(2), blobs(3), blobs(3), blobs(3)),
            Err(PayrollError::LengthMismatch)
        );
        assert_eq!(
            assemble_records(blobs(0), blobs(0), blobs(0), blobs(1)),
            Err(PayrollError::LengthMismatch)
        );
    }

    #[test]
    fn test_batch_size_bounds() {
        assert_eq!(
            assemble_records(vec![], vec![], vec![], vec![]),
            Err(PayrollError::InvalidBatchSize(0))
        );
        assert_eq!(
            assemble_records(blobs(51), blobs(51), blobs(51), blobs(51)),
            Err(PayrollError::InvalidBatchSize(51))
        );
        assert!(assemble_records(blobs(50), blobs(50), blobs(50), blobs(50)).is_ok());
        assert!(assemble_records(blobs(1), blobs(1), blobs(1), blobs(1)).is_ok());
    }

    #[test]
    fn test_empty_handle_or_proof_rejected() {
        let mut proofs = blobs(2);
        proofs[1] = Base64VecU8(vec![]);

        assert_eq!(
            assemble_records(blobs(2), blobs(2), blobs(2), proofs),
            Err(PayrollError::InvalidCiphertext)
        );
    }

    #[test]
    fn test_decode_payloads() {
        let addresses = vec!["alice.near".to_string(), "bob.near".to_string()];
        let encoded = borsh::to_vec(&addresses).unwrap();
        assert_eq!(decode_addresses(&encoded).unwrap(), addresses);

        let amounts: Vec<u128> = vec![10, 20];
        let encoded = borsh::to_vec(&amounts).unwrap();
        assert_eq!(decode_amounts(&encoded).unwrap(), amounts);

        assert_eq!(decode_amounts(&[1, 2, 3]), Err(PayrollError::MalformedCleartexts));
    }

    #[test]
    fn test_checked_total() {
        assert_eq!(checked_total(&[1, 2, 3]), Ok(6));
        assert_eq!(checked_total(&[u128::MAX, 1]), Err(PayrollError::AmountOverflow));
    }

    #[test]
    fn test_payable_recipient() {
        assert!(payable_recipient("alice.near").is_some());
        assert!(payable_recipient(ZERO_RECIPIENT).is_none());
        assert!(payable_recipient("Not An Account!").is_none());
        assert!(payable_recipient("").is_none());
    }
}
