//! Settlement: paying out a batch once both halves are decrypted.
//!
//! Recipients are isolated from each other. An unpayable recipient or an
//! underfunded salary is written to the batch's failed-transfer log and the
//! loop moves on. The batch is marked processed in the same call regardless.
//!
//! Payouts are plain transfers with no callback, so settling a full batch
//! costs one receipt per payee. A transfer the runtime refuses is refunded to
//! this contract and ends up as withdrawable surplus.

use near_sdk::json_types::U128;
use near_sdk::{env, AccountId, NearToken, Promise};

use crate::batch::{FailedTransfer, TransferFailure};
use crate::events::PayrollEvent;
use crate::records::payable_recipient;
use crate::ConfidentialPayroll;

/// Outcome of walking a batch's decrypted recipients against its funds
#[derive(Debug, Default, PartialEq)]
pub struct SettlementPlan {
    pub payouts: Vec<(AccountId, u128)>,
    pub failures: Vec<FailedTransfer>,
    /// Funds left in the batch after every payout
    pub remaining: u128,
}

/// Decide, in record order, which recipients get paid.
///
/// A salary is only paid out of what is left of `funds_held`, so a batch
/// can never draw on funds reserved for another batch.
pub fn plan_settlement(recipients: &[String], amounts: &[u128], funds_held: u128) -> SettlementPlan {
    let mut plan = SettlementPlan {
        remaining: funds_held,
        ..Default::default()
    };

    for (identity, &amount) in recipients.iter().zip(amounts) {
        let failure = match payable_recipient(identity) {
            None => Some(TransferFailure::InvalidRecipient),
            Some(_) if amount > plan.remaining => Some(TransferFailure::Underfunded),
            Some(_) if amount == 0 => None,
            Some(account) => {
                plan.remaining -= amount;
                plan.payouts.push((account, amount));
                None
            }
        };

        if let Some(reason) = failure {
            plan.failures.push(FailedTransfer {
                recipient: identity.clone(),
                amount,
                reason,
            });
        }
    }

    plan
}

impl ConfidentialPayroll {
    /// Pay out `batch_id`. Runs at most once per batch; any later trigger
    /// is a no-op.
    pub(crate) fn settle(&mut self, batch_id: u64) {
        let Some(batch) = self.batches.get_mut(&batch_id) else {
            return;
        };
        if !batch.is_ready_to_settle() {
            return;
        }

        let plan = plan_settlement(
            &batch.decrypted_addresses,
            &batch.decrypted_amounts,
            batch.funds_held,
        );

        // The whole batch leaves the reserve: dispatched salaries are gone,
        // whatever is left becomes withdrawable surplus.
        self.reserved_balance = self
            .reserved_balance
            .checked_sub(batch.funds_held)
            .unwrap_or_else(|| env::panic_str("Reserved balance underflow"));

        batch.funds_held = plan.remaining;
        batch.failed_transfers.extend(plan.failures.iter().cloned());
        batch.is_processed = true;
        batch.processed_at = Some(env::block_timestamp());
        let total_amount = batch.total_amount;

        for failure in &plan.failures {
            PayrollEvent::SalaryTransferFailed {
                batch_id,
                recipient: &failure.recipient,
                amount: U128(failure.amount),
                reason: failure.reason,
            }
            .emit();
        }

        for (recipient, amount) in &plan.payouts {
            Promise::new(recipient.clone()).transfer(NearToken::from_yoctonear(*amount));
        }

        PayrollEvent::SalaryBatchProcessed {
            batch_id,
            total_amount: U128(total_amount),
            dispatched: plan.payouts.len() as u32,
            failed: plan.failures.len() as u32,
        }
        .emit();

        env::log_str(&format!(
            "Batch {} processed: {} transfers dispatched, {} failed, {} left as surplus",
            batch_id,
            plan.payouts.len(),
            plan.failures.len(),
            plan.remaining
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ZERO_RECIPIENT;
    use near_sdk::json_types::Base64VecU8;
    use near_sdk::test_utils::VMContextBuilder;
    use near_sdk::testing_env;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_plan_pays_everyone_when_funded() {
        let plan = plan_settlement(&ids(&["a.near", "b.near", "c.near"]), &[10, 5, 15], 30);

        assert_eq!(plan.payouts.len(), 3);
        assert_eq!(plan.payouts[1], ("b.near".parse().unwrap(), 5));
        assert!(plan.failures.is_empty());
        assert_eq!(plan.remaining, 0);
    }

    #[test]
    fn test_plan_isolates_invalid_recipient() {
        let plan = plan_settlement(&ids(&[ZERO_RECIPIENT, "b.near", "c.near"]), &[10, 5, 15], 30);

        assert_eq!(plan.payouts.len(), 2);
        assert_eq!(
            plan.failures,
            vec![FailedTransfer {
                recipient: ZERO_RECIPIENT.to_string(),
                amount: 10,
                reason: TransferFailure::InvalidRecipient,
            }]
        );
        // Unpaid salary stays with the batch
        assert_eq!(plan.remaining, 10);
    }

    #[test]
    fn test_plan_never_overdraws_batch() {
        let plan = plan_settlement(&ids(&["a.near", "b.near", "c.near"]), &[10, 25, 5], 20);

        assert_eq!(
            plan.payouts,
            vec![("a.near".parse().unwrap(), 10), ("c.near".parse().unwrap(), 5)]
        );
        assert_eq!(plan.failures.len(), 1);
        assert_eq!(plan.failures[0].reason, TransferFailure::Underfunded);
        assert_eq!(plan.failures[0].amount, 25);
        assert_eq!(plan.remaining, 5);
    }

    #[test]
    fn test_plan_skips_zero_salary() {
        let plan = plan_settlement(&ids(&["a.near"]), &[0], 0);

        assert!(plan.payouts.is_empty());
        assert!(plan.failures.is_empty());
    }

    #[test]
    #[should_panic(expected = "Reserved balance underflow")]
    fn test_settle_panics_on_reserve_underflow() {
        let company: AccountId = "company.near".parse().unwrap();
        let mut builder = VMContextBuilder::new();
        builder
            .predecessor_account_id(company.clone())
            .attached_deposit(NearToken::from_yoctonear(30));
        testing_env!(builder.build());

        let mut contract =
            ConfidentialPayroll::new(company, "oracle.near".parse().unwrap(), None);
        let blob = || vec![Base64VecU8(vec![1; 32])];
        let batch_id = contract
            .submit_salary_batch(blob(), blob(), blob(), blob())
            .unwrap();

        let batch = contract.batches.get_mut(&batch_id).unwrap();
        batch.record_addresses(ids(&["a.near"]));
        batch.record_amounts(vec![10], 10);
        // Reserve no longer covers the batch's deposit
        contract.reserved_balance = 0;

        contract.settle(batch_id);
    }
}
