#![cfg(test)]

use crate::config::FeatureFlagsConfig;
use crate::store::AssignmentSink;

pub const CONFIG_JSON: &str = r#"{
    "features": {
        "dark-mode": {
            "enabled": true,
            "description": "site-wide dark theme"
        },
        "legacy-export": {
            "enabled": false
        },
        "promo": {
            "enabled": true,
            "rollout": 25,
            "userGroups": ["beta"]
        },
        "admin-tools": {
            "enabled": false,
            "userGroups": ["internal"]
        },
        "checkout": {
            "enabled": true,
            "variants": ["control", "one-page", "express"]
        },
        "pricing-test": {
            "enabled": true,
            "rollout": 0,
            "variants": ["monthly", "annual"],
            "defaultVariant": "annual",
            "userGroups": ["sales"]
        },
        "onboarding": {
            "enabled": true,
            "rollout": 0,
            "variants": ["short", "long"],
            "userGroups": ["beta"]
        },
        "staff-banner": {
            "enabled": true,
            "userGroups": []
        },
        "quarter-rollout": {
            "enabled": true,
            "rollout": 25
        }
    },
    "routes": {
        "/settings/dark": {"kind": "feature-gated", "feature": "dark-mode", "redirect": "/settings"},
        "/export": {"kind": "feature-gated", "feature": "legacy-export", "redirect": "/"},
        "/admin/tools": {"kind": "feature-gated", "feature": "admin-tools", "redirect": "/"},
        "/internal": {"kind": "group-gated", "groups": ["internal"], "redirect": "/"},
        "/beta": {"kind": "group-route", "groups": ["beta"], "redirect": "/beta/home"}
    }
}"#;

pub fn test_config() -> FeatureFlagsConfig {
    FeatureFlagsConfig::from_json(CONFIG_JSON).unwrap()
}

#[derive(Default)]
pub struct InMemoryAssignmentSink {
    pub assignments: Vec<(String, String, String)>,
}

impl AssignmentSink for InMemoryAssignmentSink {
    fn persist_variant(&mut self, user_id: &str, feature_key: &str, variant: &str) {
        self.assignments.push((
            user_id.to_string(),
            feature_key.to_string(),
            variant.to_string(),
        ));
    }
}
