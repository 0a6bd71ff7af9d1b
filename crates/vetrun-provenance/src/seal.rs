//! Per-run provenance seal
//!
//! Tagged values leave the guest interpreter as JSON. The seal is a random
//! nonce handed to the guest for one execution only, so a tag that generated
//! code writes by hand cannot pass as one produced by an intercepted call.

use crate::context::{InterceptTarget, OverrideContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vetrun_artifact::SealVerifier;

/// Random nonce identifying one execution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvenanceSeal(String);

impl ProvenanceSeal {
    /// Fresh random seal
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Seal text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Override contexts that were active for one execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContexts {
    contexts: Vec<OverrideContext>,
    seal: ProvenanceSeal,
    call_counts: BTreeMap<String, u64>,
}

impl RunContexts {
    /// Snapshot of `contexts` with a fresh seal
    #[must_use]
    pub fn new(contexts: Vec<OverrideContext>) -> Self {
        Self {
            contexts,
            seal: ProvenanceSeal::generate(),
            call_counts: BTreeMap::new(),
        }
    }

    /// Contexts, outermost first
    #[inline]
    #[must_use]
    pub fn contexts(&self) -> &[OverrideContext] {
        &self.contexts
    }

    /// Seal handed to the guest
    #[inline]
    #[must_use]
    pub fn seal(&self) -> &ProvenanceSeal {
        &self.seal
    }

    /// Distinct intercepted functions
    #[must_use]
    pub fn targets(&self) -> Vec<InterceptTarget> {
        let mut targets: Vec<InterceptTarget> = Vec::new();
        for target in self.contexts.iter().flat_map(OverrideContext::targets) {
            if !targets.contains(target) {
                targets.push(target.clone());
            }
        }
        targets
    }

    /// Whether `function` was intercepted during the run
    #[must_use]
    pub fn intercepts(&self, function: &str) -> bool {
        self.contexts.iter().any(|c| c.intercepts(function))
    }

    /// Record how often each intercepted function was called
    pub fn record_calls(&mut self, counts: BTreeMap<String, u64>) {
        for (function, count) in counts {
            *self.call_counts.entry(function).or_insert(0) += count;
        }
    }

    /// Calls per intercepted function
    #[inline]
    #[must_use]
    pub fn call_counts(&self) -> &BTreeMap<String, u64> {
        &self.call_counts
    }
}

impl SealVerifier for RunContexts {
    fn accepts(&self, seal: &str, created_by: &str) -> bool {
        seal == self.seal.as_str() && self.intercepts(created_by)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seals_are_unique() {
        assert_ne!(ProvenanceSeal::generate(), ProvenanceSeal::generate());
    }

    #[test]
    fn verifier_needs_seal_and_intercepted_function() {
        let contexts = RunContexts::new(vec![OverrideContext::statistics()]);
        let seal = contexts.seal().as_str().to_string();
        assert!(contexts.accepts(&seal, "ttest_ind"));
        assert!(!contexts.accepts("guessed", "ttest_ind"));
        assert!(!contexts.accepts(&seal, "my_fake_test"));
    }

    #[test]
    fn call_counts_accumulate() {
        let mut contexts = RunContexts::new(vec![]);
        contexts.record_calls(BTreeMap::from([("f_oneway".to_string(), 2)]));
        contexts.record_calls(BTreeMap::from([("f_oneway".to_string(), 1)]));
        assert_eq!(contexts.call_counts()["f_oneway"], 3);
    }
}
