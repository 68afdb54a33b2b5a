use std::collections::HashMap;
use std::fmt;

use log::debug;
use serde::{Serialize, Serializer};

use crate::context::UserContext;
use crate::feature::FeatureDefinition;
use crate::hash::{assign_variant, is_in_rollout};
use crate::store::{AssignmentSink, FeatureStore};

/// Evaluate the feature `feature_key` for the specified [UserContext].
///
/// The definition is read from `store`, which must act as a single immutable snapshot. An unknown
/// key is not an error: it evaluates as disabled with [Reason::NotFound].
///
/// The evaluator never writes anything. If it computes a variant the user has not recorded yet,
/// the result reports it through [EvaluationResult::is_new_assignment] and persisting it is left to
/// the caller (see [persist_new_assignments]).
pub fn evaluate(
    store: &dyn FeatureStore,
    feature_key: &str,
    user: &UserContext,
) -> EvaluationResult {
    match store.feature(feature_key) {
        Some(feature) => evaluate_definition(feature, feature_key, user),
        None => {
            debug!("feature {} not found", feature_key);
            EvaluationResult::disabled(Reason::NotFound)
        }
    }
}

/// Evaluate an already resolved feature definition.
///
/// Rules are applied in a fixed order: group bypass, then the global enabled flag, then the
/// rollout percentage, then variant selection. Membership in one of the feature's `userGroups`
/// grants access even when the feature is disabled or the user falls outside the rollout.
pub fn evaluate_definition(
    feature: &FeatureDefinition,
    feature_key: &str,
    user: &UserContext,
) -> EvaluationResult {
    let group_bypass = match feature.required_groups() {
        Some(_) if feature.grants_group_access(user) => true,
        Some(_) if !feature.enabled => {
            return EvaluationResult::disabled(Reason::UserNotInRequiredGroup)
        }
        Some(_) => false,
        None if !feature.enabled => return EvaluationResult::disabled(Reason::GloballyDisabled),
        None => false,
    };

    if !group_bypass && !is_in_rollout(user.user_id(), feature_key, feature.rollout_percent()) {
        return EvaluationResult::disabled(Reason::NotInRollout);
    }

    if !feature.has_variants() {
        return EvaluationResult::enabled();
    }

    resolve_variant(feature, feature_key, user)
}

fn resolve_variant(
    feature: &FeatureDefinition,
    feature_key: &str,
    user: &UserContext,
) -> EvaluationResult {
    if let Some(persisted) = user.variant(feature_key) {
        return EvaluationResult::with_variant(persisted, false);
    }

    // A group-bypassed user may sit outside the rollout, in which case hashing places them
    // nowhere; access has already been granted, so they get the fallback variant instead.
    let variant = assign_variant(
        user.user_id(),
        feature_key,
        feature.variants(),
        feature.rollout_percent(),
    )
    .or_else(|| feature.fallback_variant());

    match variant {
        Some(variant) => EvaluationResult::with_variant(variant, true),
        None => EvaluationResult::enabled(),
    }
}

/// Evaluate several features for one user against one snapshot.
///
/// Every feature is evaluated independently, so each entry is identical to what [evaluate] returns
/// for that key. Duplicate keys collapse into a single entry.
pub fn evaluate_all<I, S>(
    store: &dyn FeatureStore,
    feature_keys: I,
    user: &UserContext,
) -> HashMap<String, EvaluationResult>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    feature_keys
        .into_iter()
        .map(|key| {
            let key = key.as_ref();
            (key.to_string(), evaluate(store, key, user))
        })
        .collect()
}

/// Evaluate every feature the snapshot defines.
pub fn evaluate_every_feature(
    store: &dyn FeatureStore,
    user: &UserContext,
) -> HashMap<String, EvaluationResult> {
    evaluate_all(store, store.feature_keys(), user)
}

/// Hands every variant that evaluation would assign, but that `user` has not recorded yet, to
/// `sink`. Returns how many assignments were persisted.
pub fn persist_new_assignments(
    store: &dyn FeatureStore,
    user: &UserContext,
    sink: &mut dyn AssignmentSink,
) -> usize {
    let mut persisted = 0;
    for feature_key in store.feature_keys() {
        let result = evaluate(store, feature_key, user);
        if let (true, Some(variant)) = (result.is_new_assignment(), result.variant.as_deref()) {
            sink.persist_variant(user.user_id(), feature_key, variant);
            persisted += 1;
        }
    }
    persisted
}

/// The outcome of evaluating one feature for one user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EvaluationResult {
    /// Whether the feature is active for the user.
    pub enabled: bool,

    /// The experiment variant the user sees. Only set for enabled features that define variants.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,

    /// Why the result came out this way. Diagnostic only.
    pub reason: Reason,

    #[serde(skip)]
    new_assignment: bool,
}

impl EvaluationResult {
    /// Returns a disabled result with no variant.
    pub fn disabled(reason: Reason) -> Self {
        EvaluationResult {
            enabled: false,
            variant: None,
            reason,
            new_assignment: false,
        }
    }

    /// Returns an enabled result for a feature without variants.
    pub fn enabled() -> Self {
        EvaluationResult {
            enabled: true,
            variant: None,
            reason: Reason::Enabled,
            new_assignment: false,
        }
    }

    fn with_variant(variant: &str, new_assignment: bool) -> Self {
        EvaluationResult {
            enabled: true,
            variant: Some(variant.to_string()),
            reason: Reason::EnabledWithVariant,
            new_assignment,
        }
    }

    /// True if the variant was computed during this evaluation rather than read from the user's
    /// persisted assignments.
    pub fn is_new_assignment(&self) -> bool {
        self.new_assignment
    }
}

/// Reason describes which rule decided an evaluation. It serializes as its [Reason::as_str] text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reason {
    /// No definition exists for the requested key.
    NotFound,
    /// The feature is disabled and restricted to groups the user is not in.
    UserNotInRequiredGroup,
    /// The feature is disabled for everyone.
    GloballyDisabled,
    /// The user's hash falls outside the rollout percentage.
    NotInRollout,
    /// The feature is on and the user was given a variant.
    EnabledWithVariant,
    /// The feature is on and defines no variants.
    Enabled,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::NotFound => "not found",
            Reason::UserNotInRequiredGroup => "user not in required group",
            Reason::GloballyDisabled => "globally disabled",
            Reason::NotInRollout => "not in rollout",
            Reason::EnabledWithVariant => "enabled with variant",
            Reason::Enabled => "enabled",
        }
    }
}

impl Serialize for Reason {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
