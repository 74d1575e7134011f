//! Caller checks and the reserved-funds invariant.
//!
//! The contract balance always covers `storage stake + reserved_balance`,
//! where `reserved_balance` is the sum of `funds_held` over batches that have
//! not been settled. Anything above that is surplus the owner may withdraw.

use near_sdk::env;
use near_sdk::json_types::Base64VecU8;

use crate::errors::PayrollError;
use crate::requests::decryption_message;
use crate::ConfidentialPayroll;

/// Length of an ed25519 signature carried in a callback `proof`
const SIGNATURE_LEN: usize = 64;

impl ConfidentialPayroll {
    pub(crate) fn assert_owner(&self) -> Result<(), PayrollError> {
        if env::predecessor_account_id() == self.owner {
            Ok(())
        } else {
            Err(PayrollError::OnlyOwner)
        }
    }

    pub(crate) fn assert_oracle(&self) -> Result<(), PayrollError> {
        if env::predecessor_account_id() == self.oracle {
            Ok(())
        } else {
            Err(PayrollError::UnauthorizedOracle)
        }
    }

    /// Check the oracle's signature over `request_id || cleartexts`.
    /// Without a configured key the proof is accepted as opaque.
    pub(crate) fn verify_decryption_proof(
        &self,
        request_id: &str,
        cleartexts: &[u8],
        proof: &[u8],
    ) -> Result<(), PayrollError> {
        let Some(public_key) = self.oracle_public_key.as_ref() else {
            return Ok(());
        };

        let signature: &[u8; SIGNATURE_LEN] = proof
            .try_into()
            .map_err(|_| PayrollError::InvalidDecryptionProof)?;
        let message = decryption_message(request_id, cleartexts);

        if env::ed25519_verify(signature, &message, public_key) {
            Ok(())
        } else {
            Err(PayrollError::InvalidDecryptionProof)
        }
    }

    /// Balance not needed for storage staking or for unsettled batches
    pub(crate) fn excess_balance(&self) -> u128 {
        let storage_stake = env::storage_byte_cost()
            .as_yoctonear()
            .saturating_mul(u128::from(env::storage_usage()));

        env::account_balance()
            .as_yoctonear()
            .saturating_sub(storage_stake)
            .saturating_sub(self.reserved_balance)
    }
}

/// Validate an optional 32-byte ed25519 oracle key.
pub fn parse_oracle_key(key: Option<Base64VecU8>) -> Result<Option<[u8; 32]>, PayrollError> {
    key.map(|key| {
        <[u8; 32]>::try_from(key.0.as_slice()).map_err(|_| PayrollError::InvalidOraclePublicKey)
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_oracle_key() {
        assert_eq!(parse_oracle_key(None), Ok(None));
        assert_eq!(parse_oracle_key(Some(Base64VecU8(vec![9; 32]))), Ok(Some([9; 32])));
        assert_eq!(
            parse_oracle_key(Some(Base64VecU8(vec![9; 31]))),
            Err(PayrollError::InvalidOraclePublicKey)
        );
    }
}
