use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The identity and session state of the user a feature is evaluated for.
///
/// A context is a read-only input to evaluation. Group membership and persisted variant
/// assignments are changed by the surrounding session layer through [UserContext::join_group],
/// [UserContext::leave_group] and [UserContext::record_variant]; the evaluator only reads them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    user_id: String,
    // Ordered for display; membership checks ignore order.
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    variants: HashMap<String, String>,
}

impl UserContext {
    /// Create a new [UserContextBuilder], seeding it with the provided user id.
    pub fn with_id(user_id: impl Into<String>) -> UserContextBuilder {
        UserContextBuilder::new(user_id)
    }

    /// Returns the stable id of the user.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns the user's groups in the order they were joined.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    /// Returns the variant previously persisted for `feature_key`, if any.
    pub fn variant(&self, feature_key: &str) -> Option<&str> {
        self.variants.get(feature_key).map(String::as_str)
    }

    /// Returns every persisted variant assignment, keyed by feature.
    pub fn variants(&self) -> &HashMap<String, String> {
        &self.variants
    }

    /// Adds the user to `group`. Returns false if the user was already a member.
    pub fn join_group(&mut self, group: impl Into<String>) -> bool {
        let group = group.into();
        if self.in_group(&group) {
            return false;
        }
        self.groups.push(group);
        true
    }

    /// Removes the user from `group`. Returns false if the user was not a member.
    pub fn leave_group(&mut self, group: &str) -> bool {
        let before = self.groups.len();
        self.groups.retain(|g| g != group);
        self.groups.len() != before
    }

    /// Persists `variant` as the user's assignment for `feature_key`, returning the previous one.
    pub fn record_variant(
        &mut self,
        feature_key: impl Into<String>,
        variant: impl Into<String>,
    ) -> Option<String> {
        self.variants.insert(feature_key.into(), variant.into())
    }
}

/// Contains methods for configuring a [UserContext].
pub struct UserContextBuilder {
    user_id: String,
    groups: Vec<String>,
    variants: HashMap<String, String>,
}

impl UserContextBuilder {
    /// Create a new builder, setting the user id to `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            groups: Vec::new(),
            variants: HashMap::new(),
        }
    }

    /// Adds a group membership. Repeated groups are kept once.
    pub fn group(&mut self, group: impl Into<String>) -> &mut Self {
        let group = group.into();
        if !self.groups.contains(&group) {
            self.groups.push(group);
        }
        self
    }

    pub fn groups<I, S>(&mut self, groups: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for group in groups {
            self.group(group);
        }
        self
    }

    /// Sets a previously persisted variant assignment.
    pub fn variant(
        &mut self,
        feature_key: impl Into<String>,
        variant: impl Into<String>,
    ) -> &mut Self {
        self.variants.insert(feature_key.into(), variant.into());
        self
    }

    pub fn build(&self) -> UserContext {
        UserContext {
            user_id: self.user_id.clone(),
            groups: self.groups.clone(),
            variants: self.variants.clone(),
        }
    }
}
