use std::collections::HashMap;

use itertools::Itertools;
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::feature::FeatureDefinition;
use crate::hash::FULL_ROLLOUT;
use crate::route::RouteRule;
use crate::store::FeatureStore;

/// Error returned when a configuration snapshot cannot be parsed or fails validation.
///
/// Malformed definitions are always rejected; they are never coerced into something the evaluator
/// would accept.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid JSON, or a field has the wrong type (for example a non-boolean
    /// `enabled`, a non-array `variants`, or a non-integer `rollout`).
    #[error("invalid feature flag configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("feature {feature:?} has rollout {rollout}, which is outside 0..=100")]
    RolloutOutOfRange { feature: String, rollout: i64 },

    #[error("feature {feature:?} declares an empty variant list")]
    EmptyVariants { feature: String },

    #[error("feature {feature:?} lists variant {variant:?} more than once")]
    DuplicateVariant { feature: String, variant: String },

    #[error("feature {feature:?} has default variant {variant:?}, which is not one of its variants")]
    UnknownDefaultVariant { feature: String, variant: String },

    #[error("route {route:?} is gated on unknown feature {feature:?}")]
    UnknownRouteFeature { route: String, feature: String },

    #[error("route {route:?} does not name any groups")]
    EmptyRouteGroups { route: String },
}

/// An immutable, validated view of every feature and route definition at a point in time.
///
/// A snapshot is passed explicitly to each evaluation; nothing in this crate caches one globally.
/// Every way of building one validates it, including deserializing it with serde, so a snapshot
/// that exists is known to be valid.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "RawConfig")]
pub struct FeatureFlagsConfig {
    features: HashMap<String, FeatureDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    routes: Option<HashMap<String, RouteRule>>,
}

// The unvalidated shape of a snapshot document.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    features: HashMap<String, FeatureDefinition>,
    #[serde(default)]
    routes: Option<HashMap<String, RouteRule>>,
}

impl TryFrom<RawConfig> for FeatureFlagsConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        FeatureFlagsConfig::new(raw.features, raw.routes)
    }
}

impl FeatureFlagsConfig {
    /// Parses and validates a JSON snapshot.
    ///
    /// Unlike deserializing the snapshot directly, validation failures are reported as their own
    /// [ConfigError] variant rather than folded into [ConfigError::Parse].
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(json)?;
        FeatureFlagsConfig::try_from(raw).map_err(|e| {
            warn!("rejecting feature flag configuration: {}", e);
            e
        })
    }

    /// Builds a snapshot from definitions constructed in code, validating them.
    pub fn new(
        features: HashMap<String, FeatureDefinition>,
        routes: Option<HashMap<String, RouteRule>>,
    ) -> Result<Self, ConfigError> {
        let config = FeatureFlagsConfig { features, routes };
        config.validate()?;
        Ok(config)
    }

    /// Checks every invariant the evaluator relies on, returning the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Sorted so that the reported violation does not depend on hash map order.
        for (key, feature) in self.features.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
            validate_feature(key, feature)?;
        }

        if let Some(routes) = &self.routes {
            for (path, rule) in routes.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
                self.validate_route(path, rule)?;
            }
        }

        Ok(())
    }

    fn validate_route(&self, path: &str, rule: &RouteRule) -> Result<(), ConfigError> {
        match rule {
            RouteRule::FeatureGated { feature, .. } if !self.features.contains_key(feature) => {
                Err(ConfigError::UnknownRouteFeature {
                    route: path.to_string(),
                    feature: feature.clone(),
                })
            }
            RouteRule::GroupGated { groups, .. } | RouteRule::GroupRoute { groups, .. }
                if groups.is_empty() =>
            {
                Err(ConfigError::EmptyRouteGroups {
                    route: path.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Returns every feature definition, keyed by feature.
    pub fn features(&self) -> &HashMap<String, FeatureDefinition> {
        &self.features
    }

    /// Returns the route rule registered for `path`, if any.
    pub fn route(&self, path: &str) -> Option<&RouteRule> {
        self.routes.as_ref()?.get(path)
    }
}

fn validate_feature(key: &str, feature: &FeatureDefinition) -> Result<(), ConfigError> {
    if let Some(rollout) = feature.rollout {
        if !(0..=i64::from(FULL_ROLLOUT)).contains(&rollout) {
            return Err(ConfigError::RolloutOutOfRange {
                feature: key.to_string(),
                rollout,
            });
        }
    }

    if let Some(variants) = &feature.variants {
        if variants.is_empty() {
            return Err(ConfigError::EmptyVariants {
                feature: key.to_string(),
            });
        }

        if let Some(variant) = variants.iter().duplicates().next() {
            return Err(ConfigError::DuplicateVariant {
                feature: key.to_string(),
                variant: variant.clone(),
            });
        }

        if let Some(default) = &feature.default_variant {
            if !variants.contains(default) {
                return Err(ConfigError::UnknownDefaultVariant {
                    feature: key.to_string(),
                    variant: default.clone(),
                });
            }
        }
    }

    Ok(())
}

impl FeatureStore for FeatureFlagsConfig {
    fn feature(&self, feature_key: &str) -> Option<&FeatureDefinition> {
        self.features.get(feature_key)
    }

    fn feature_keys(&self) -> Vec<&str> {
        self.features.keys().map(String::as_str).sorted().collect()
    }
}
