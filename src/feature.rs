use serde::{Deserialize, Serialize};

use crate::context::UserContext;
use crate::hash::FULL_ROLLOUT;

/// The configuration of a single feature flag, as it appears in a config snapshot.
///
/// Definitions are assumed to have passed [crate::FeatureFlagsConfig::validate] before they reach
/// the evaluator: `rollout` is within `0..=100` and `variants`, when present, is non-empty.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDefinition {
    pub enabled: bool,

    // Wider than a percentage so validation can report any out-of-range integer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_groups: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FeatureDefinition {
    /// A feature that is on for everyone.
    pub fn enabled() -> Self {
        FeatureDefinition {
            enabled: true,
            ..Default::default()
        }
    }

    /// A feature that is off unless a group rule grants access.
    pub fn disabled() -> Self {
        FeatureDefinition::default()
    }

    pub fn with_rollout(mut self, rollout: u8) -> Self {
        self.rollout = Some(i64::from(rollout));
        self
    }

    pub fn with_variants<I, S>(mut self, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variants = Some(variants.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_default_variant(mut self, variant: impl Into<String>) -> Self {
        self.default_variant = Some(variant.into());
        self
    }

    pub fn with_user_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_groups = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The configured rollout percentage, or 100 when none is set.
    ///
    /// Validated definitions are always within `0..=100`; anything else is clamped to that range.
    pub fn rollout_percent(&self) -> u8 {
        match self.rollout {
            Some(rollout) => rollout.clamp(0, i64::from(FULL_ROLLOUT)) as u8,
            None => FULL_ROLLOUT,
        }
    }

    /// The configured variants; empty when the feature is not an experiment.
    pub fn variants(&self) -> &[String] {
        self.variants.as_deref().unwrap_or_default()
    }

    pub fn has_variants(&self) -> bool {
        !self.variants().is_empty()
    }

    /// The groups this feature is restricted to, if a non-empty list is configured.
    pub(crate) fn required_groups(&self) -> Option<&[String]> {
        match self.user_groups.as_deref() {
            Some(groups) if !groups.is_empty() => Some(groups),
            _ => None,
        }
    }

    /// The variant used when hashing cannot place a user: the default, then the first variant.
    pub(crate) fn fallback_variant(&self) -> Option<&str> {
        self.default_variant
            .as_deref()
            .or_else(|| self.variants().first().map(String::as_str))
    }

    /// Returns true if `user` belongs to at least one of the feature's required groups.
    pub(crate) fn grants_group_access(&self, user: &UserContext) -> bool {
        self.required_groups()
            .map(|groups| groups.iter().any(|group| user.in_group(group)))
            .unwrap_or(false)
    }
}
