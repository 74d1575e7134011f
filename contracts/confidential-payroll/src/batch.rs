//! Salary batch ledger entries and their read views.

use near_sdk::json_types::U128;
use near_sdk::{near, AccountId};

use crate::errors::PayrollError;
use crate::records::EncryptedRecord;

/// Why a recipient was not paid
#[near(serializers = [borsh, json])]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferFailure {
    /// Decrypted identity is the zero sentinel or not a valid account id
    InvalidRecipient,
    /// Batch had too little left to cover this salary
    Underfunded,
}

#[near(serializers = [borsh])]
#[derive(Clone, Debug, PartialEq)]
pub struct FailedTransfer {
    pub recipient: String,
    pub amount: u128,
    pub reason: TransferFailure,
}

/// Where a batch is in the decrypt/settle lifecycle
#[near(serializers = [json])]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchPhase {
    /// Neither field decrypted yet
    Open,
    /// Amounts known, waiting for addresses
    AddressesPending,
    /// Addresses known, waiting for amounts
    AmountsPending,
    BothDecrypted,
    Processed,
}

/// One submitted payroll batch
#[near(serializers = [borsh])]
#[derive(Clone, Debug)]
pub struct SalaryBatch {
    pub id: u64,
    pub submitter: AccountId,
    pub record_count: u32,
    pub records: Vec<EncryptedRecord>,
    /// Attached deposit at submission, never amended
    pub funds_supplied: u128,
    /// Part of `funds_supplied` not yet sent to a recipient
    pub funds_held: u128,
    pub address_request_id: String,
    pub amount_request_id: String,
    pub addresses_decrypted: bool,
    pub amounts_decrypted: bool,
    pub is_processed: bool,
    pub decrypted_addresses: Vec<String>,
    pub decrypted_amounts: Vec<u128>,
    pub total_amount: u128,
    pub failed_transfers: Vec<FailedTransfer>,
    pub submitted_at: u64,
    pub processed_at: Option<u64>,
}

impl SalaryBatch {
    pub fn new(
        id: u64,
        submitter: AccountId,
        records: Vec<EncryptedRecord>,
        funds_supplied: u128,
        submitted_at: u64,
    ) -> Self {
        Self {
            id,
            submitter,
            record_count: records.len() as u32,
            records,
            funds_supplied,
            funds_held: funds_supplied,
            address_request_id: String::new(),
            amount_request_id: String::new(),
            addresses_decrypted: false,
            amounts_decrypted: false,
            is_processed: false,
            decrypted_addresses: Vec::new(),
            decrypted_amounts: Vec::new(),
            total_amount: 0,
            failed_transfers: Vec::new(),
            submitted_at,
            processed_at: None,
        }
    }

    pub fn phase(&self) -> BatchPhase {
        match (self.is_processed, self.addresses_decrypted, self.amounts_decrypted) {
            (true, _, _) => BatchPhase::Processed,
            (false, true, true) => BatchPhase::BothDecrypted,
            (false, true, false) => BatchPhase::AmountsPending,
            (false, false, true) => BatchPhase::AddressesPending,
            (false, false, false) => BatchPhase::Open,
        }
    }

    /// Both halves decrypted and not yet settled
    pub fn is_ready_to_settle(&self) -> bool {
        self.addresses_decrypted && self.amounts_decrypted && !self.is_processed
    }

    /// Check a decoded payload has one entry per record.
    pub fn expect_cleartext_count(&self, actual: usize) -> Result<(), PayrollError> {
        if actual == self.record_count as usize {
            Ok(())
        } else {
            Err(PayrollError::DecodeLengthMismatch {
                expected: self.record_count,
                actual,
            })
        }
    }

    pub fn record_addresses(&mut self, addresses: Vec<String>) {
        self.decrypted_addresses = addresses;
        self.addresses_decrypted = true;
    }

    pub fn record_amounts(&mut self, amounts: Vec<u128>, total_amount: u128) {
        self.decrypted_amounts = amounts;
        self.total_amount = total_amount;
        self.amounts_decrypted = true;
    }

    pub fn status(&self) -> BatchStatus {
        BatchStatus {
            is_processed: self.is_processed,
            addresses_decrypted: self.addresses_decrypted,
            amounts_decrypted: self.amounts_decrypted,
            total_amount: U128(self.total_amount),
        }
    }

    pub fn decrypted_employee(&self, index: u32) -> Result<DecryptedEmployee, PayrollError> {
        if !self.is_processed {
            return Err(PayrollError::NotDecrypted);
        }
        if index >= self.record_count {
            return Err(PayrollError::InvalidIndex {
                index,
                record_count: self.record_count,
            });
        }

        let i = index as usize;
        Ok(DecryptedEmployee {
            recipient: self.decrypted_addresses[i].clone(),
            amount: U128(self.decrypted_amounts[i]),
        })
    }

    /// Failed recipients and amounts as two parallel vectors
    pub fn failed_transfer_lists(&self) -> (Vec<String>, Vec<U128>) {
        self.failed_transfers
            .iter()
            .map(|failure| (failure.recipient.clone(), U128(failure.amount)))
            .unzip()
    }

    pub fn view(&self) -> BatchView {
        BatchView {
            id: self.id,
            submitter: self.submitter.clone(),
            record_count: self.record_count,
            phase: self.phase(),
            funds_supplied: U128(self.funds_supplied),
            funds_held: U128(self.funds_held),
            total_amount: U128(self.total_amount),
            address_request_id: self.address_request_id.clone(),
            amount_request_id: self.amount_request_id.clone(),
            failed_transfer_count: self.failed_transfers.len() as u32,
            submitted_at: self.submitted_at,
            processed_at: self.processed_at,
        }
    }
}

/// Polling tuple for the UI
#[near(serializers = [json])]
#[derive(Clone, Debug, PartialEq)]
pub struct BatchStatus {
    pub is_processed: bool,
    pub addresses_decrypted: bool,
    pub amounts_decrypted: bool,
    pub total_amount: U128,
}

#[near(serializers = [json])]
#[derive(Clone, Debug, PartialEq)]
pub struct DecryptedEmployee {
    pub recipient: String,
    pub amount: U128,
}

/// Public summary of a batch (no ciphertexts, no plaintexts)
#[near(serializers = [json])]
#[derive(Clone, Debug, PartialEq)]
pub struct BatchView {
    pub id: u64,
    pub submitter: AccountId,
    pub record_count: u32,
    pub phase: BatchPhase,
    pub funds_supplied: U128,
    pub funds_held: U128,
    pub total_amount: U128,
    pub address_request_id: String,
    pub amount_request_id: String,
    pub failed_transfer_count: u32,
    pub submitted_at: u64,
    pub processed_at: Option<u64>,
}
