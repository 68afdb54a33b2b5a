use crate::feature::FeatureDefinition;

/// FeatureStore is an interface for a configuration snapshot that holds feature definitions.
///
/// Implementations must behave as an immutable snapshot for the duration of an evaluation call,
/// so that every feature in a batch is read from the same configuration. [crate::FeatureFlagsConfig]
/// is the default implementation.
pub trait FeatureStore {
    /// Retrieve the definition of the feature with key `feature_key`.
    fn feature(&self, feature_key: &str) -> Option<&FeatureDefinition>;

    /// Every feature key the snapshot knows about.
    fn feature_keys(&self) -> Vec<&str>;
}

/// AssignmentSink receives variant assignments the evaluator computed but the user context did not
/// yet record, so the session layer can persist them.
///
/// Persisting is an optimization: assignments are deterministic and recomputing them is always
/// safe.
pub trait AssignmentSink {
    /// Record that `user_id` was assigned `variant` for `feature_key`.
    fn persist_variant(&mut self, user_id: &str, feature_key: &str, variant: &str);
}
