//! # Namespace Filter
//!
//! Decides which namespaces the lifecycle job manages. Pure predicate, no I/O.

use crate::config::LifecycleConfig;
use crate::controller::store::NamespaceRecord;
use regex::Regex;
use std::fmt;

/// Why a namespace is left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// Name matches the reserved system pattern (`kube-*`)
    Reserved,
    /// The cluster default namespace
    DefaultNamespace,
    /// The namespace the job itself runs in
    OwnNamespace,
    /// The required label is missing or blank
    MissingLabel,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Exclusion::Reserved => "reserved system namespace",
            Exclusion::DefaultNamespace => "default namespace",
            Exclusion::OwnNamespace => "own namespace",
            Exclusion::MissingLabel => "required label missing",
        })
    }
}

#[derive(Debug, Clone)]
pub struct NamespaceFilter {
    reserved: Regex,
    default_namespace: String,
    own_namespace: Option<String>,
    required_label: Option<String>,
}

impl NamespaceFilter {
    /// Build the filter from lifecycle policy
    ///
    /// # Errors
    ///
    /// Returns an error if the reserved namespace pattern is not a valid regex.
    pub fn from_config(config: &LifecycleConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            reserved: Regex::new(&config.reserved_namespace_pattern)?,
            default_namespace: config.default_namespace.clone(),
            own_namespace: config.own_namespace.clone(),
            required_label: config
                .target_label_name
                .as_ref()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
        })
    }

    /// `None` when the namespace is managed, otherwise the first exclusion that applies
    #[must_use]
    pub fn exclusion(&self, namespace: &NamespaceRecord) -> Option<Exclusion> {
        let name = namespace.name.as_str();
        if self.reserved.is_match(name) {
            return Some(Exclusion::Reserved);
        }
        if name == self.default_namespace {
            return Some(Exclusion::DefaultNamespace);
        }
        if self.own_namespace.as_deref() == Some(name) {
            return Some(Exclusion::OwnNamespace);
        }
        if let Some(label) = &self.required_label {
            let has_value = namespace
                .label(label)
                .is_some_and(|value| !value.trim().is_empty());
            if !has_value {
                return Some(Exclusion::MissingLabel);
            }
        }
        None
    }

    #[must_use]
    pub fn includes(&self, namespace: &NamespaceRecord) -> bool {
        self.exclusion(namespace).is_none()
    }

    /// Label key gating eligibility, if configured
    #[must_use]
    pub fn required_label(&self) -> Option<&str> {
        self.required_label.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn namespace(name: &str, labels: &[(&str, &str)]) -> NamespaceRecord {
        NamespaceRecord {
            name: name.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
            annotations: None,
        }
    }

    fn filter(own: Option<&str>, label: Option<&str>) -> NamespaceFilter {
        NamespaceFilter::from_config(&LifecycleConfig {
            own_namespace: own.map(str::to_string),
            target_label_name: label.map(str::to_string),
            ..LifecycleConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_system_namespaces_are_excluded() {
        let f = filter(Some("kube-esg-system"), None);
        assert_eq!(
            f.exclusion(&namespace("kube-system", &[])),
            Some(Exclusion::Reserved)
        );
        assert_eq!(
            f.exclusion(&namespace("kube-public", &[])),
            Some(Exclusion::Reserved)
        );
        assert_eq!(
            f.exclusion(&namespace("default", &[])),
            Some(Exclusion::DefaultNamespace)
        );
    }

    #[test]
    fn test_own_namespace_is_excluded() {
        let f = filter(Some("esg"), None);
        assert_eq!(
            f.exclusion(&namespace("esg", &[])),
            Some(Exclusion::OwnNamespace)
        );
        assert!(f.includes(&namespace("esg-preview", &[])));
    }

    #[test]
    fn test_prefix_only_matches_at_start() {
        let f = filter(None, None);
        assert!(f.includes(&namespace("my-kube-app", &[])));
        assert!(f.includes(&namespace("defaults", &[])));
    }

    #[test]
    fn test_no_label_configured_includes_everything_else() {
        let f = filter(None, None);
        assert!(f.includes(&namespace("feature-123", &[])));
        assert_eq!(f.required_label(), None);
    }

    #[test]
    fn test_required_label_needs_non_blank_value() {
        let f = filter(None, Some("team"));
        assert!(f.includes(&namespace("feature-123", &[("team", "payments")])));
        assert_eq!(
            f.exclusion(&namespace("feature-124", &[("team", "   ")])),
            Some(Exclusion::MissingLabel)
        );
        assert_eq!(
            f.exclusion(&namespace("feature-125", &[("owner", "x")])),
            Some(Exclusion::MissingLabel)
        );
    }

    #[test]
    fn test_blank_label_setting_means_no_filter() {
        let f = filter(None, Some("  "));
        assert!(f.includes(&namespace("feature-123", &[])));
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let config = LifecycleConfig {
            reserved_namespace_pattern: "^kube-(".to_string(),
            ..LifecycleConfig::default()
        };
        assert!(NamespaceFilter::from_config(&config).is_err());
    }
}
