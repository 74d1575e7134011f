//! # Confidential Payroll Contract for NEAR Protocol
//!
//! Pays salaries to a batch of recipients whose account ids and amounts stay
//! encrypted until an off-chain decryption oracle reveals them.
//!
//! ## Flow
//! 1. Company submits up to 50 encrypted (recipient, salary) records with the
//!    total payroll attached as deposit
//! 2. Contract issues two decryption requests per batch (addresses, amounts)
//!    and announces them as events
//! 3. Oracle answers each request through its callback, in either order
//! 4. Whichever callback completes the pair settles the batch: one transfer
//!    per recipient, failures logged per recipient instead of aborting
//!
//! ## Funds
//! Deposits of unsettled batches are reserved. Unpaid salaries, refunded
//! transfers and stray deposits become surplus that only the owner can
//! withdraw.

use near_sdk::borsh::BorshSerialize;
use near_sdk::json_types::{Base64VecU8, U128};
use near_sdk::store::LookupMap;
use near_sdk::{env, near, AccountId, BorshStorageKey, NearToken, PanicOnDefault, Promise};

pub mod batch;
pub mod errors;
pub mod events;
pub mod guard;
pub mod records;
pub mod requests;
pub mod settlement;

use batch::{BatchStatus, BatchView, DecryptedEmployee, SalaryBatch};
use errors::PayrollError;
use events::PayrollEvent;
use records::{assemble_records, checked_total, decode_addresses, decode_amounts, CiphertextInput};
use requests::{DecryptionRequest, RequestKind, RequestTracker};

/// Storage keys for collections
#[derive(BorshStorageKey, BorshSerialize)]
#[borsh(crate = "near_sdk::borsh")]
pub enum StorageKey {
    Batches,
    DecryptionRequests,
}

/// Main payroll contract
#[near(contract_state)]
#[derive(PanicOnDefault)]
pub struct ConfidentialPayroll {
    /// Company owner (surplus withdrawals, administration)
    pub owner: AccountId,
    /// Only account allowed to deliver decryption results
    pub oracle: AccountId,
    /// ed25519 key the oracle signs cleartexts with, if enforced
    pub oracle_public_key: Option<[u8; 32]>,

    /// All batches ever submitted, by id
    pub batches: LookupMap<u64, SalaryBatch>,
    /// Decryption requests, outstanding and resolved
    pub requests: RequestTracker,

    /// Id the next submitted batch receives
    pub next_batch_id: u64,
    /// Sum of `funds_held` over unsettled batches
    pub reserved_balance: u128,
}

#[near]
impl ConfidentialPayroll {
    /// Initialize the contract
    #[init]
    pub fn new(owner: AccountId, oracle: AccountId, oracle_public_key: Option<Base64VecU8>) -> Self {
        let oracle_public_key = guard::parse_oracle_key(oracle_public_key)
            .unwrap_or_else(|e| env::panic_str(&e.to_string()));

        env::log_str(&format!(
            "Confidential payroll initialized (owner: {}, oracle: {})",
            owner, oracle
        ));

        Self {
            owner,
            oracle,
            oracle_public_key,
            batches: LookupMap::new(StorageKey::Batches),
            requests: RequestTracker::new(StorageKey::DecryptionRequests),
            next_batch_id: 1,
            reserved_balance: 0,
        }
    }

    // ==================== COMPANY OPERATIONS ====================

    /// Submit an encrypted salary batch. The attached deposit funds it.
    ///
    /// The four arrays are parallel: entry `i` of each belongs to employee `i`.
    /// Returns the new batch id.
    #[payable]
    #[handle_result]
    pub fn submit_salary_batch(
        &mut self,
        encrypted_addresses: Vec<Base64VecU8>,
        encrypted_amounts: Vec<Base64VecU8>,
        address_proofs: Vec<Base64VecU8>,
        amount_proofs: Vec<Base64VecU8>,
    ) -> Result<u64, PayrollError> {
        let records = assemble_records(
            encrypted_addresses,
            encrypted_amounts,
            address_proofs,
            amount_proofs,
        )?;

        let submitter = env::predecessor_account_id();
        let funds_supplied = env::attached_deposit().as_yoctonear();
        let batch_id = self.next_batch_id;
        self.next_batch_id += 1;

        let mut batch = SalaryBatch::new(
            batch_id,
            submitter.clone(),
            records,
            funds_supplied,
            env::block_timestamp(),
        );
        batch.address_request_id = self.requests.issue(batch_id, RequestKind::Addresses);
        batch.amount_request_id = self.requests.issue(batch_id, RequestKind::Amounts);
        let record_count = batch.record_count;

        PayrollEvent::SalaryBatchSubmitted {
            batch_id,
            submitter: &submitter,
            record_count,
            funds_supplied: U128(funds_supplied),
        }
        .emit();
        for (request_id, kind) in [
            (&batch.address_request_id, RequestKind::Addresses),
            (&batch.amount_request_id, RequestKind::Amounts),
        ] {
            PayrollEvent::DecryptionRequested {
                batch_id,
                request_id,
                kind,
            }
            .emit();
        }

        self.batches.insert(batch_id, batch);
        self.reserved_balance += funds_supplied;

        env::log_str(&format!(
            "Salary batch {} submitted by {}: {} records, {} yoctoNEAR",
            batch_id, submitter, record_count, funds_supplied
        ));

        Ok(batch_id)
    }

    // ==================== ORACLE CALLBACKS ====================

    /// Oracle delivers the decrypted recipients of a batch.
    ///
    /// `cleartexts` is the Borsh encoding of `Vec<String>` in record order.
    #[handle_result]
    pub fn address_decrypt_callback(
        &mut self,
        request_id: String,
        cleartexts: Base64VecU8,
        proof: Base64VecU8,
    ) -> Result<(), PayrollError> {
        let batch_id = self.authorize_callback(&request_id, RequestKind::Addresses, &cleartexts, &proof)?;
        let addresses = decode_addresses(&cleartexts.0)?;

        let batch = self.batch_mut(batch_id)?;
        batch.expect_cleartext_count(addresses.len())?;
        batch.record_addresses(addresses);
        let ready = batch.is_ready_to_settle();

        self.complete_request(batch_id, &request_id, RequestKind::Addresses, ready);
        Ok(())
    }

    /// Oracle delivers the decrypted salaries of a batch.
    ///
    /// `cleartexts` is the Borsh encoding of `Vec<u128>` (yoctoNEAR) in record order.
    #[handle_result]
    pub fn amount_decrypt_callback(
        &mut self,
        request_id: String,
        cleartexts: Base64VecU8,
        proof: Base64VecU8,
    ) -> Result<(), PayrollError> {
        let batch_id = self.authorize_callback(&request_id, RequestKind::Amounts, &cleartexts, &proof)?;
        let amounts = decode_amounts(&cleartexts.0)?;
        let total_amount = checked_total(&amounts)?;

        let batch = self.batch_mut(batch_id)?;
        batch.expect_cleartext_count(amounts.len())?;
        batch.record_amounts(amounts, total_amount);
        let ready = batch.is_ready_to_settle();

        self.complete_request(batch_id, &request_id, RequestKind::Amounts, ready);
        Ok(())
    }

    // ==================== OWNER OPERATIONS ====================

    /// Send everything above storage stake and unsettled batch funds to the owner.
    /// Returns the amount withdrawn.
    #[handle_result]
    pub fn withdraw_excess(&mut self) -> Result<U128, PayrollError> {
        self.assert_owner()?;

        let excess = self.excess_balance();
        if excess == 0 {
            return Err(PayrollError::NoExcessBalance);
        }

        Promise::new(self.owner.clone()).transfer(NearToken::from_yoctonear(excess));

        PayrollEvent::ExcessWithdrawn {
            owner: &self.owner,
            amount: U128(excess),
        }
        .emit();
        env::log_str(&format!("Withdrew {} yoctoNEAR excess to {}", excess, self.owner));

        Ok(U128(excess))
    }

    /// Point the callbacks at a new oracle account (owner only)
    #[handle_result]
    pub fn set_oracle(&mut self, oracle: AccountId) -> Result<(), PayrollError> {
        self.assert_owner()?;
        env::log_str(&format!("Oracle set to {}", oracle));
        self.oracle = oracle;
        Ok(())
    }

    /// Require (or stop requiring) signed decryption proofs (owner only)
    #[handle_result]
    pub fn set_oracle_public_key(
        &mut self,
        oracle_public_key: Option<Base64VecU8>,
    ) -> Result<(), PayrollError> {
        self.assert_owner()?;
        self.oracle_public_key = guard::parse_oracle_key(oracle_public_key)?;
        env::log_str(&format!(
            "Oracle proof verification {}",
            if self.oracle_public_key.is_some() { "enabled" } else { "disabled" }
        ));
        Ok(())
    }

    /// Transfer ownership
    #[handle_result]
    pub fn transfer_ownership(&mut self, new_owner: AccountId) -> Result<(), PayrollError> {
        self.assert_owner()?;
        env::log_str(&format!("Ownership transferred to {}", new_owner));
        self.owner = new_owner;
        Ok(())
    }

    // ==================== VIEW METHODS ====================

    pub fn get_batch_status(&self, batch_id: u64) -> Option<BatchStatus> {
        self.batches.get(&batch_id).map(SalaryBatch::status)
    }

    pub fn get_batch(&self, batch_id: u64) -> Option<BatchView> {
        self.batches.get(&batch_id).map(SalaryBatch::view)
    }

    /// Decrypted recipient and salary of employee `index` (settled batches only)
    #[handle_result]
    pub fn get_decrypted_employee(
        &self,
        batch_id: u64,
        index: u32,
    ) -> Result<DecryptedEmployee, PayrollError> {
        self.batches
            .get(&batch_id)
            .ok_or(PayrollError::BatchNotFound(batch_id))?
            .decrypted_employee(index)
    }

    /// Recipients and amounts that were not paid, as parallel lists
    pub fn get_failed_transfers(&self, batch_id: u64) -> Option<(Vec<String>, Vec<U128>)> {
        self.batches.get(&batch_id).map(SalaryBatch::failed_transfer_lists)
    }

    pub fn get_decryption_request(&self, request_id: String) -> Option<DecryptionRequest> {
        self.requests.get(&request_id).cloned()
    }

    /// Ciphertext handles and proofs the oracle must decrypt for `request_id`,
    /// in record order
    pub fn get_request_handles(&self, request_id: String) -> Option<Vec<CiphertextInput>> {
        let request = self.requests.get(&request_id)?;
        let batch = self.batches.get(&request.batch_id)?;

        let inputs = batch
            .records
            .iter()
            .map(|record| match request.kind {
                RequestKind::Addresses => CiphertextInput {
                    handle: record.address_ciphertext.clone(),
                    proof: record.address_proof.clone(),
                },
                RequestKind::Amounts => CiphertextInput {
                    handle: record.amount_ciphertext.clone(),
                    proof: record.amount_proof.clone(),
                },
            })
            .collect();
        Some(inputs)
    }

    pub fn get_next_batch_id(&self) -> u64 {
        self.next_batch_id
    }

    pub fn get_reserved_balance(&self) -> U128 {
        U128(self.reserved_balance)
    }

    pub fn get_owner(&self) -> AccountId {
        self.owner.clone()
    }

    pub fn get_oracle(&self) -> AccountId {
        self.oracle.clone()
    }

    pub fn get_oracle_public_key(&self) -> Option<Base64VecU8> {
        self.oracle_public_key.map(|key| Base64VecU8(key.to_vec()))
    }
}

// ==================== INTERNAL METHODS ====================

impl ConfidentialPayroll {
    /// Caller, request and proof checks shared by both callbacks.
    /// Returns the batch the request belongs to. Mutates nothing.
    fn authorize_callback(
        &self,
        request_id: &str,
        kind: RequestKind,
        cleartexts: &Base64VecU8,
        proof: &Base64VecU8,
    ) -> Result<u64, PayrollError> {
        self.assert_oracle()?;
        let batch_id = self.requests.outstanding(request_id, kind)?.batch_id;
        self.verify_decryption_proof(request_id, &cleartexts.0, &proof.0)?;
        Ok(batch_id)
    }

    fn batch_mut(&mut self, batch_id: u64) -> Result<&mut SalaryBatch, PayrollError> {
        self.batches
            .get_mut(&batch_id)
            .ok_or(PayrollError::BatchNotFound(batch_id))
    }

    /// Consume the request, announce it, and settle if this callback
    /// completed the pair.
    fn complete_request(&mut self, batch_id: u64, request_id: &str, kind: RequestKind, ready: bool) {
        self.requests.consume(request_id);

        PayrollEvent::DecryptionFulfilled {
            batch_id,
            request_id,
            kind,
        }
        .emit();
        env::log_str(&format!("Batch {}: {:?} decrypted", batch_id, kind));

        if ready {
            self.settle(batch_id);
        }
    }
}
