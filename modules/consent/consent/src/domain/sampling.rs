//! Page-view sampling.

use std::sync::Arc;

use consent_sdk::RegulationKind;

use super::ports::SamplingPolicy;
use super::storage::{ConsentStorage, SamplingDecision};

/// Samples with probability `sample_rate`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSampling;

impl SamplingPolicy for RandomSampling {
    fn sample(&self, sample_rate: f64) -> bool {
        if sample_rate >= 1.0 {
            return true;
        }
        if sample_rate <= 0.0 {
            return false;
        }
        rand::random::<f64>() < sample_rate
    }
}

/// Fixed answer, whatever the rate.
#[derive(Debug, Clone, Copy)]
pub struct FixedSampling(pub bool);

impl SamplingPolicy for FixedSampling {
    fn sample(&self, _sample_rate: f64) -> bool {
        self.0
    }
}

/// Applies a [`SamplingPolicy`] once per regulation and sample rate.
///
/// The decision is persisted and reused until the backend changes the rate,
/// so a device stays in or out of the sample across sessions.
pub struct SamplingGate {
    policy: Arc<dyn SamplingPolicy>,
    storage: ConsentStorage,
}

impl SamplingGate {
    #[must_use]
    pub fn new(policy: Arc<dyn SamplingPolicy>, storage: ConsentStorage) -> Self {
        Self { policy, storage }
    }

    /// Whether page views for `kind` are reported at `sample_rate`.
    pub fn admits(&self, kind: RegulationKind, sample_rate: f64) -> bool {
        match self.storage.sampling(kind) {
            #[allow(clippy::float_cmp)]
            Ok(Some(decision)) if decision.rate == sample_rate => return decision.sampled,
            Ok(_) => {}
            Err(e) => tracing::warn!(regulation = %kind, error = %e, "Failed to read sampling decision"),
        }

        let sampled = self.policy.sample(sample_rate);
        let decision = SamplingDecision {
            rate: sample_rate,
            sampled,
        };
        if let Err(e) = self.storage.save_sampling(kind, decision) {
            tracing::warn!(regulation = %kind, error = %e, "Failed to persist sampling decision");
        }
        tracing::debug!(regulation = %kind, sample_rate, sampled, "Sampling decision taken");
        sampled
    }

    /// Last decision for `kind`, forwarded on store-choice.
    #[must_use]
    pub fn last_decision(&self, kind: RegulationKind) -> Option<SamplingDecision> {
        self.storage.sampling(kind).ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::infra::storage::InMemoryLocalStore;

    struct CountingPolicy {
        calls: AtomicUsize,
        answer: bool,
    }

    impl SamplingPolicy for CountingPolicy {
        fn sample(&self, _sample_rate: f64) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    #[test]
    fn decision_is_reused_while_rate_is_unchanged() {
        let policy = Arc::new(CountingPolicy {
            calls: AtomicUsize::new(0),
            answer: true,
        });
        let storage = ConsentStorage::new(Arc::new(InMemoryLocalStore::new()));
        let gate = SamplingGate::new(policy.clone(), storage);

        assert!(gate.admits(RegulationKind::Gdpr, 0.3));
        assert!(gate.admits(RegulationKind::Gdpr, 0.3));
        assert_eq!(policy.calls.load(Ordering::SeqCst), 1);

        assert!(gate.admits(RegulationKind::Gdpr, 0.4));
        assert!(gate.admits(RegulationKind::Ccpa, 0.4));
        assert_eq!(policy.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn random_sampling_honours_bounds() {
        assert!(RandomSampling.sample(1.0));
        assert!(!RandomSampling.sample(0.0));
    }
}
