use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::FeatureFlagsConfig;
use crate::context::UserContext;
use crate::eval::evaluate;

/// A redirect rule attached to a route path.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RouteRule {
    /// The route is reachable only while `feature` evaluates as enabled for the user; everyone
    /// else is sent to `redirect`.
    FeatureGated { feature: String, redirect: String },
    /// The route is reachable only by members of at least one of `groups`.
    GroupGated { groups: Vec<String>, redirect: String },
    /// Members of any of `groups` are sent to `redirect`, typically a group-specific version of
    /// the page; everyone else proceeds.
    GroupRoute { groups: Vec<String>, redirect: String },
}

/// The outcome of checking a route against its rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    Proceed,
    Redirect(String),
}

impl RouteDecision {
    pub fn is_redirect(&self) -> bool {
        matches!(self, RouteDecision::Redirect(_))
    }
}

impl RouteRule {
    /// Decides whether `user` may proceed, evaluating feature-gated rules against `config`.
    pub fn decide(&self, config: &FeatureFlagsConfig, user: &UserContext) -> RouteDecision {
        match self {
            RouteRule::FeatureGated { feature, redirect } => {
                if evaluate(config, feature, user).enabled {
                    RouteDecision::Proceed
                } else {
                    RouteDecision::Redirect(redirect.clone())
                }
            }
            RouteRule::GroupGated { groups, redirect } => {
                if in_any(user, groups) {
                    RouteDecision::Proceed
                } else {
                    RouteDecision::Redirect(redirect.clone())
                }
            }
            RouteRule::GroupRoute { groups, redirect } => {
                if in_any(user, groups) {
                    RouteDecision::Redirect(redirect.clone())
                } else {
                    RouteDecision::Proceed
                }
            }
        }
    }
}

fn in_any(user: &UserContext, groups: &[String]) -> bool {
    groups.iter().any(|group| user.in_group(group))
}

/// Resolves the route `path` for `user`. Paths without a rule always proceed.
pub fn resolve_route(config: &FeatureFlagsConfig, path: &str, user: &UserContext) -> RouteDecision {
    match config.route(path) {
        Some(rule) => {
            let decision = rule.decide(config, user);
            if let RouteDecision::Redirect(target) = &decision {
                debug!("redirecting {} from {} to {}", user.user_id(), path, target);
            }
            decision
        }
        None => RouteDecision::Proceed,
    }
}
