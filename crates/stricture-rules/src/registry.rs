//! Rule registry and strictness resolution.

use crate::error::ConfigError;
use crate::rule::{Rule, RuleMeta};
use crate::rules;
use stricture_kernel::{Diagnostic, DiagnosticKind, Severity};
use stricture_manifest::{Manifest, SeveritySetting, StrictnessMode};

/// Rules keyed by their stable id, kept sorted.
pub struct RuleRegistry {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleRegistry {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Every rule shipped with stricture.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for rule in rules::builtin() {
            let id = rule.meta().id;
            if registry.register(rule).is_err() {
                tracing::warn!(rule = id, "duplicate built-in rule skipped");
            }
        }
        registry
    }

    pub fn register(&mut self, rule: Box<dyn Rule>) -> Result<(), ConfigError> {
        let id = rule.meta().id;
        match self.rules.binary_search_by(|r| r.meta().id.cmp(id)) {
            Ok(_) => Err(ConfigError::DuplicateRule { id: id.to_string() }),
            Err(at) => {
                self.rules.insert(at, rule);
                Ok(())
            }
        }
    }

    /// The registry minus one rule.
    pub fn without(mut self, id: &str) -> Self {
        self.rules.retain(|rule| rule.meta().id != id);
        self
    }

    pub fn get(&self, id: &str) -> Option<&dyn Rule> {
        self.rules
            .binary_search_by(|r| r.meta().id.cmp(id))
            .ok()
            .map(|at| self.rules[at].as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|rule| rule.as_ref())
    }

    /// Metadata sorted by rule id.
    pub fn metadata(&self) -> Vec<RuleMeta> {
        self.rules.iter().map(|rule| *rule.meta()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every rule id named by a strictness override must be registered.
    pub fn check_manifest(&self, manifest: &Manifest) -> Result<(), ConfigError> {
        let unknown: Vec<String> = manifest
            .referenced_rules
            .iter()
            .filter(|id| !self.contains(id))
            .cloned()
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::UnknownRules { ids: unknown })
        }
    }

    /// `rules:` entries for ids this registry does not carry. They are
    /// ignored, so a removed rule takes only its own output with it.
    pub fn unknown_rule_options(&self, manifest: &Manifest) -> Vec<Diagnostic> {
        manifest
            .configured_rules
            .iter()
            .filter(|id| !self.contains(id))
            .map(|id| {
                Diagnostic::new(
                    DiagnosticKind::Config,
                    "",
                    format!("options for unknown rule {id} are ignored"),
                )
                .for_rule(id.clone())
            })
            .collect()
    }

    /// Rules to run with their resolved severity; `off` rules are dropped.
    pub fn plan(&self, manifest: &Manifest) -> Result<Vec<(&dyn Rule, Severity)>, ConfigError> {
        self.check_manifest(manifest)?;
        Ok(self
            .rules()
            .filter_map(|rule| resolve_severity(rule.meta(), manifest).map(|sev| (rule, sev)))
            .collect())
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|rule| rule.meta().id))
            .finish()
    }
}

/// Explicit per-rule setting, then lenient mode, then the rule's default.
/// `None` means the rule is switched off.
pub fn resolve_severity(meta: &RuleMeta, manifest: &Manifest) -> Option<Severity> {
    match manifest.severity_override(meta.id) {
        Some(setting) => setting.severity(),
        None if manifest.strictness.mode == StrictnessMode::Lenient => {
            SeveritySetting::Warning.severity()
        }
        None => Some(meta.default_severity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stricture_manifest::Manifest;

    fn manifest(yaml: &str) -> Manifest {
        Manifest::from_yaml_str(yaml, "test.yml").expect("manifest loads")
    }

    #[test]
    fn builtin_registry_is_sorted_and_complete() {
        let registry = RuleRegistry::builtin();
        let ids: Vec<&str> = registry.metadata().iter().map(|m| m.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 12);
        assert!(registry.contains("CTR-status-code-handling"));
        assert!(registry.contains("ARCH-no-circular-deps"));
        assert!(registry.contains("TQ-no-shallow-assertions"));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = RuleRegistry::builtin();
        let again = rules::builtin().into_iter().next().expect("at least one rule");
        assert!(matches!(
            registry.register(again),
            Err(ConfigError::DuplicateRule { .. })
        ));
    }

    #[test]
    fn severity_resolution_order() {
        let registry = RuleRegistry::builtin();
        let meta = *registry
            .get("CTR-idempotency")
            .expect("registered")
            .meta();

        let strict = manifest("strictness: { mode: strict }\n");
        assert_eq!(resolve_severity(&meta, &strict), Some(meta.default_severity));

        let lenient = manifest("strictness: { mode: lenient }\n");
        assert_eq!(resolve_severity(&meta, &lenient), Some(Severity::Warning));

        let pinned = manifest(
            "strictness:\n  mode: lenient\n  overrides:\n    CTR-idempotency: error\n",
        );
        assert_eq!(resolve_severity(&meta, &pinned), Some(Severity::Error));

        let off = manifest("rules:\n  CTR-idempotency:\n    severity: off\n");
        assert_eq!(resolve_severity(&meta, &off), None);
        let plan = registry.plan(&off).expect("plan");
        assert!(plan.iter().all(|(rule, _)| rule.meta().id != "CTR-idempotency"));
        assert_eq!(plan.len(), registry.len() - 1);
    }

    #[test]
    fn unknown_rule_ids_are_configuration_errors() {
        let registry = RuleRegistry::builtin();
        let bad = manifest("strictness:\n  overrides:\n    CTR-made-up: warning\n");
        assert_eq!(
            registry.check_manifest(&bad),
            Err(ConfigError::UnknownRules {
                ids: vec!["CTR-made-up".to_string()]
            })
        );
        assert!(registry.plan(&bad).is_err());
    }

    #[test]
    fn options_for_missing_rules_only_warn() {
        let registry = RuleRegistry::builtin().without("ARCH-max-file-lines");
        let configured = manifest("rules:\n  ARCH-max-file-lines: { max: 10 }\n  CTR-made-up: warn\n");
        assert_eq!(registry.check_manifest(&configured), Ok(()));
        assert_eq!(registry.plan(&configured).expect("plan").len(), registry.len());

        let warnings = registry.unknown_rule_options(&configured);
        let ids: Vec<&str> = warnings.iter().filter_map(|d| d.rule_id.as_deref()).collect();
        assert_eq!(ids, ["ARCH-max-file-lines", "CTR-made-up"]);
        assert!(warnings.iter().all(|d| d.kind == DiagnosticKind::Config));
    }
}
