//! Policy loading: per-scope rule loaders and the orchestrating [`PolicyLoader`].

pub mod global;
pub mod policy;
pub mod project;
pub mod strategy;

pub use global::GlobalRuleLoader;
pub use policy::PolicyLoader;
pub use project::ProjectRuleLoader;
pub use strategy::LoadStrategy;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use rbacload_core::RuleId;

    use crate::signature::{Keyring, Signable, SignatureError, SignatureVerifier, SigningKey};
    use crate::store::InMemoryRbacStore;

    pub fn keyring() -> Keyring {
        Keyring::new(SigningKey::new("current", vec![0x42u8; 32]).unwrap(), vec![])
    }

    pub fn store() -> Arc<InMemoryRbacStore> {
        Arc::new(InMemoryRbacStore::new())
    }

    /// Delegates to a keyring but errors out on one specific rule.
    #[derive(Debug, Clone)]
    pub struct BrokenOn {
        pub rule_id: RuleId,
        pub keyring: Keyring,
    }

    impl SignatureVerifier for BrokenOn {
        fn verify<R: Signable>(&self, record: &R, stored_signature: &[u8]) -> Result<bool, SignatureError> {
            // Rule content embeds the rule id.
            let content = record.canonical_content()?;
            let needle = format!("\"id\":\"{}\"", self.rule_id);
            if String::from_utf8_lossy(&content).contains(&needle) {
                return Err(SignatureError::Serialization("broken on purpose".to_string()));
            }
            self.keyring.verify(record, stored_signature)
        }
    }
}
