//! Per-row integrity screening.
//!
//! [`screen_row`] classifies one stored rule without touching storage;
//! [`screen_rows`] folds a batch into the rows to keep, the rows rejected as
//! corrupted, and the first fatal error (after which nothing more is checked).

use rbacload_core::{PolicyId, RuleId};

use crate::error::LoadError;
use crate::record::{RuleRecord, RuleScope};
use crate::signature::SignatureVerifier;

/// A row whose signature did not match its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub scope: RuleScope,
    pub rule_id: RuleId,
    pub policy_id: PolicyId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome<R> {
    Kept(R),
    Rejected(Rejection),
    Fatal(LoadError),
}

pub fn screen_row<R, V>(verifier: &V, record: R) -> RowOutcome<R>
where
    R: RuleRecord,
    V: SignatureVerifier,
{
    match verifier.verify(&record, record.signature()) {
        Ok(true) => RowOutcome::Kept(record),
        Ok(false) => RowOutcome::Rejected(Rejection {
            scope: R::SCOPE,
            rule_id: record.rule_id(),
            policy_id: record.policy_id(),
        }),
        Err(e) => RowOutcome::Fatal(LoadError::verification(R::SCOPE, record.rule_id(), e)),
    }
}

/// Result of screening a batch of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screened<R> {
    pub kept: Vec<R>,
    pub rejected: Vec<Rejection>,
    pub fatal: Option<LoadError>,
}

impl<R> Default for Screened<R> {
    fn default() -> Self {
        Self {
            kept: Vec::new(),
            rejected: Vec::new(),
            fatal: None,
        }
    }
}

impl<R> Screened<R> {
    /// Fold outcomes in order, stopping at the first fatal one.
    pub fn reduce<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = RowOutcome<R>>,
    {
        let mut screened = Self::default();
        for outcome in outcomes {
            match outcome {
                RowOutcome::Kept(r) => screened.kept.push(r),
                RowOutcome::Rejected(rejection) => screened.rejected.push(rejection),
                RowOutcome::Fatal(e) => {
                    screened.fatal = Some(e);
                    break;
                }
            }
        }
        screened
    }

    /// Log every rejection at error level.
    pub fn log_rejections(&self) {
        for r in &self.rejected {
            tracing::error!(
                scope = %r.scope,
                rule_id = %r.rule_id,
                policy_id = %r.policy_id,
                "rule record data corrupted; skipping"
            );
        }
    }

    pub fn into_result(self) -> Result<Vec<R>, LoadError> {
        match self.fatal {
            Some(e) => Err(e),
            None => Ok(self.kept),
        }
    }
}

/// Screen a batch lazily: rows after a fatal outcome are never verified.
pub fn screen_rows<R, V, I>(verifier: &V, records: I) -> Screened<R>
where
    R: RuleRecord,
    V: SignatureVerifier,
    I: IntoIterator<Item = R>,
{
    Screened::reduce(records.into_iter().map(|r| screen_row(verifier, r)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::GlobalRuleRecord;
    use crate::roles::Role;
    use crate::signature::{Keyring, SignatureError, SigningKey};
    use proptest::prelude::*;

    fn keyring() -> Keyring {
        Keyring::new(SigningKey::new("k1", vec![0x42u8; 32]).unwrap(), vec![])
    }

    fn signed(keyring: &Keyring, policy_id: PolicyId, role: &'static str) -> GlobalRuleRecord {
        GlobalRuleRecord::new(RuleId::new(), policy_id, Role::new(role))
            .signed(keyring)
            .unwrap()
    }

    #[test]
    fn valid_row_is_kept() {
        let keyring = keyring();
        let row = signed(&keyring, PolicyId::new(), "read");
        assert_eq!(screen_row(&keyring, row.clone()), RowOutcome::Kept(row));
    }

    #[test]
    fn tampered_row_is_rejected_with_identity() {
        let keyring = keyring();
        let mut row = signed(&keyring, PolicyId::new(), "read");
        row.role = Role::new("manage-permission");
        match screen_row(&keyring, row.clone()) {
            RowOutcome::Rejected(r) => {
                assert_eq!(r.rule_id, row.id);
                assert_eq!(r.policy_id, row.policy_id);
                assert_eq!(r.scope, RuleScope::Global);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn verifier_failure_is_fatal() {
        let row = signed(&keyring(), PolicyId::new(), "read");
        match screen_row(&Keyring::empty(), row.clone()) {
            RowOutcome::Fatal(LoadError::Verification {
                rule_id, source, ..
            }) => {
                assert_eq!(rule_id, row.id);
                assert_eq!(source, SignatureError::NoKeys);
            }
            other => panic!("expected fatal, got {other:?}"),
        }
    }

    #[test]
    fn reduce_stops_at_first_fatal() {
        let outcomes = vec![
            RowOutcome::Kept(1),
            RowOutcome::Fatal(LoadError::PolicyNotFound("x".into())),
            RowOutcome::Kept(2),
        ];
        let screened = Screened::reduce(outcomes);
        assert_eq!(screened.kept, vec![1]);
        assert!(screened.fatal.is_some());
        assert!(screened.into_result().is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: whatever subset of rows is tampered, exactly the untouched
        /// rows are kept and exactly the tampered ones are rejected.
        #[test]
        fn tampered_rows_never_kept(mask in prop::collection::vec(any::<bool>(), 0..24)) {
            let keyring = keyring();
            let policy_id = PolicyId::new();
            let rows: Vec<GlobalRuleRecord> = mask
                .iter()
                .map(|tamper| {
                    let mut row = signed(&keyring, policy_id, "read");
                    if *tamper {
                        row.role = Role::new("write");
                    }
                    row
                })
                .collect();

            let screened = screen_rows(&keyring, rows.clone());
            prop_assert!(screened.fatal.is_none());

            for (row, tampered) in rows.iter().zip(&mask) {
                let kept = screened.kept.iter().any(|k| k.id == row.id);
                let rejected = screened.rejected.iter().any(|r| r.rule_id == row.id);
                prop_assert_eq!(kept, !*tampered);
                prop_assert_eq!(rejected, *tampered);
            }
        }
    }
}
