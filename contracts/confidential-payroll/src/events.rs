//! NEP-297 events for indexers and the decryption oracle.
//!
//! Logged as `EVENT_JSON:{"standard":"confidential-payroll","version":"1.0.0","event":...,"data":...}`.

use near_sdk::json_types::U128;
use near_sdk::{env, log, AccountId};
use serde::Serialize;

use crate::batch::TransferFailure;
use crate::requests::RequestKind;

pub const EVENT_STANDARD: &str = "confidential-payroll";
pub const EVENT_VERSION: &str = "1.0.0";

#[derive(Serialize, Debug)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum PayrollEvent<'a> {
    SalaryBatchSubmitted {
        batch_id: u64,
        submitter: &'a AccountId,
        record_count: u32,
        funds_supplied: U128,
    },
    /// The oracle picks up ciphertexts for `request_id` from here
    DecryptionRequested {
        batch_id: u64,
        request_id: &'a str,
        kind: RequestKind,
    },
    DecryptionFulfilled {
        batch_id: u64,
        request_id: &'a str,
        kind: RequestKind,
    },
    SalaryBatchProcessed {
        batch_id: u64,
        total_amount: U128,
        dispatched: u32,
        failed: u32,
    },
    SalaryTransferFailed {
        batch_id: u64,
        recipient: &'a str,
        amount: U128,
        reason: TransferFailure,
    },
    ExcessWithdrawn {
        owner: &'a AccountId,
        amount: U128,
    },
}

#[derive(Serialize)]
struct EventLog<'a> {
    standard: &'static str,
    version: &'static str,
    #[serde(flatten)]
    event: &'a PayrollEvent<'a>,
}

impl PayrollEvent<'_> {
    pub fn emit(&self) {
        let entry = EventLog {
            standard: EVENT_STANDARD,
            version: EVENT_VERSION,
            event: self,
        };
        let json = serde_json::to_string(&entry)
            .unwrap_or_else(|_| env::panic_str("Failed to serialize event"));
        log!("EVENT_JSON:{}", json);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use near_sdk::test_utils::{get_logs, VMContextBuilder};
    use near_sdk::testing_env;

    #[test]
    fn test_event_format() {
        testing_env!(VMContextBuilder::new().build());
        let submitter: AccountId = "company.near".parse().unwrap();

        PayrollEvent::SalaryBatchSubmitted {
            batch_id: 1,
            submitter: &submitter,
            record_count: 3,
            funds_supplied: U128(3),
        }
        .emit();

        let logs = get_logs();
        assert_eq!(logs.len(), 1);
        let json = logs[0].strip_prefix("EVENT_JSON:").unwrap();
        let value: serde_json::Value = serde_json::from_str(json).unwrap();

        assert_eq!(value["standard"], "confidential-payroll");
        assert_eq!(value["version"], "1.0.0");
        assert_eq!(value["event"], "salary_batch_submitted");
        assert_eq!(value["data"]["batch_id"], 1);
        assert_eq!(value["data"]["submitter"], "company.near");
        assert_eq!(value["data"]["funds_supplied"], "3");
    }

    #[test]
    fn test_every_event_is_logged() {
        testing_env!(VMContextBuilder::new().build());
        let owner: AccountId = "company.near".parse().unwrap();

        PayrollEvent::DecryptionFulfilled {
            batch_id: 2,
            request_id: "ab12",
            kind: RequestKind::Amounts,
        }
        .emit();
        PayrollEvent::SalaryTransferFailed {
            batch_id: 2,
            recipient: "ghost",
            amount: U128(7),
            reason: TransferFailure::InvalidRecipient,
        }
        .emit();
        PayrollEvent::ExcessWithdrawn {
            owner: &owner,
            amount: U128(1),
        }
        .emit();

        let events: Vec<serde_json::Value> = get_logs()
            .iter()
            .map(|l| serde_json::from_str(l.strip_prefix("EVENT_JSON:").unwrap()).unwrap())
            .collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["data"]["kind"], "Amounts");
        assert_eq!(events[1]["event"], "salary_transfer_failed");
        assert_eq!(events[1]["data"]["reason"], "InvalidRecipient");
        assert_eq!(events[2]["data"]["owner"], "company.near");
    }
}
