//! Decryption request tracking.
//!
//! Each batch issues one request per encrypted field. The oracle answers a
//! request by id; an id resolves exactly once and resolved requests are kept
//! for audit rather than deleted.

use near_sdk::store::LookupMap;
use near_sdk::{env, near, IntoStorageKey};
use sha2::{Digest, Sha256};

use crate::errors::PayrollError;

/// Domain prefix for request id derivation
const REQUEST_ID_DOMAIN: &[u8] = b"confidential-payroll:request:v1:";

/// Domain prefix for the message the oracle signs over its cleartexts
const DECRYPTION_DOMAIN: &[u8] = b"confidential-payroll:decryption:v1:";

/// Which half of a batch a request decrypts
#[near(serializers = [borsh, json])]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    Addresses,
    Amounts,
}

impl RequestKind {
    fn tag(self) -> u8 {
        match self {
            RequestKind::Addresses => 0,
            RequestKind::Amounts => 1,
        }
    }
}

/// Outstanding or resolved decryption request
#[near(serializers = [borsh, json])]
#[derive(Clone, Debug, PartialEq)]
pub struct DecryptionRequest {
    pub request_id: String,
    pub batch_id: u64,
    pub kind: RequestKind,
    /// Set by the one callback that consumed this request
    pub resolved: bool,
    /// Block timestamp at issue (nanoseconds)
    pub requested_at: u64,
}

#[near(serializers = [borsh])]
pub struct RequestTracker {
    requests: LookupMap<String, DecryptionRequest>,
    /// Bumped on every issued request so ids never repeat
    nonce: u64,
}

impl RequestTracker {
    pub fn new<S: IntoStorageKey>(prefix: S) -> Self {
        Self {
            requests: LookupMap::new(prefix),
            nonce: 0,
        }
    }

    /// Register a new request for `kind` of `batch_id` and return its id.
    pub fn issue(&mut self, batch_id: u64, kind: RequestKind) -> String {
        self.nonce += 1;
        let request_id = self.derive_request_id(batch_id, kind);

        let request = DecryptionRequest {
            request_id: request_id.clone(),
            batch_id,
            kind,
            resolved: false,
            requested_at: env::block_timestamp(),
        };
        self.requests.insert(request_id.clone(), request);

        request_id
    }

    /// Look up an unresolved request of the expected kind.
    ///
    /// Unknown ids, resolved ids, and ids of the other kind are all
    /// indistinguishable to the caller.
    pub fn outstanding(
        &self,
        request_id: &str,
        kind: RequestKind,
    ) -> Result<&DecryptionRequest, PayrollError> {
        self.requests
            .get(request_id)
            .filter(|request| !request.resolved && request.kind == kind)
            .ok_or_else(|| PayrollError::UnknownRequest(request_id.to_string()))
    }

    /// Mark a request resolved. Only called after `outstanding` succeeded.
    pub fn consume(&mut self, request_id: &str) {
        if let Some(request) = self.requests.get_mut(request_id) {
            request.resolved = true;
        }
    }

    pub fn get(&self, request_id: &str) -> Option<&DecryptionRequest> {
        self.requests.get(request_id)
    }

    fn derive_request_id(&self, batch_id: u64, kind: RequestKind) -> String {
        let mut hasher = Sha256::new();
        hasher.update(REQUEST_ID_DOMAIN);
        hasher.update(batch_id.to_le_bytes());
        hasher.update([kind.tag()]);
        hasher.update(self.nonce.to_le_bytes());
        hasher.update(env::block_timestamp().to_le_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16])
    }
}

/// Message the oracle signs to prove `cleartexts` answer `request_id`:
/// `sha256(domain || request_id || cleartexts)`.
pub fn decryption_message(request_id: &str, cleartexts: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(DECRYPTION_DOMAIN);
    hasher.update(request_id.as_bytes());
    hasher.update(cleartexts);
    let result = hasher.finalize();
    let mut message = [0u8; 32];
    message.copy_from_slice(&result);
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use near_sdk::test_utils::VMContextBuilder;
    use near_sdk::testing_env;

    fn tracker() -> RequestTracker {
        testing_env!(VMContextBuilder::new().build());
        RequestTracker::new(b"r".to_vec())
    }

    #[test]
    fn test_issue_unique_ids() {
        let mut tracker = tracker();

        let a = tracker.issue(1, RequestKind::Addresses);
        let b = tracker.issue(1, RequestKind::Amounts);
        let c = tracker.issue(2, RequestKind::Addresses);

        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_outstanding_checks_kind() {
        let mut tracker = tracker();
        let id = tracker.issue(7, RequestKind::Amounts);

        assert_eq!(tracker.outstanding(&id, RequestKind::Amounts).unwrap().batch_id, 7);
        assert_eq!(
            tracker.outstanding(&id, RequestKind::Addresses),
            Err(PayrollError::UnknownRequest(id.clone()))
        );
        assert!(tracker.outstanding("deadbeef", RequestKind::Amounts).is_err());
    }

    #[test]
    fn test_consume_is_final() {
        let mut tracker = tracker();
        let id = tracker.issue(3, RequestKind::Addresses);

        tracker.consume(&id);

        assert!(tracker.outstanding(&id, RequestKind::Addresses).is_err());
        // Kept for audit
        assert!(tracker.get(&id).unwrap().resolved);
    }

    #[test]
    fn test_decryption_message_binds_request() {
        let payload = [1u8, 2, 3];
        assert_ne!(
            decryption_message("aa", &payload),
            decryption_message("bb", &payload)
        );
        assert_ne!(decryption_message("aa", &payload), decryption_message("aa", &[1]));
    }
}
