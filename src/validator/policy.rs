// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolves the active `SecurityPolicy` rows into the rule sets the script
//! validator consults, honoring `spec.md §3`'s invariant: an empty active
//! set means "apply built-in defaults"; a non-empty set replaces defaults
//! entirely, and `deny` always shadows `allow` on the same pattern.

use crate::registry::models::{RuleCategory, RuleType, SecurityPolicy};
use std::collections::HashSet;

/// Built-in deny list covering modules that grant arbitrary OS, subprocess,
/// dynamic-import, serialization, or filesystem access.
const DEFAULT_DENIED_MODULES: &[&str] = &[
    "os", "subprocess", "sys", "importlib", "ctypes", "socket", "shutil",
    "pickle", "marshal", "builtins",
];

/// Built-in deny list of dynamic-evaluation / uncontained I/O function names.
const DEFAULT_DENIED_FUNCTIONS: &[&str] = &[
    "eval", "exec", "compile", "__import__", "open", "input", "exit", "quit",
];

/// Built-in deny list of `module.method` attribute patterns.
const DEFAULT_DENIED_ATTRIBUTES: &[&str] = &[
    "os.system", "subprocess.run", "subprocess.Popen", "importlib.import_module",
];

#[derive(Debug, Default)]
pub struct EffectivePolicy {
    pub module_deny: HashSet<String>,
    /// `Some` only when an explicit allow-list is present for the module
    /// category — then names outside it are rejected even if not denied.
    pub module_allow: Option<HashSet<String>>,
    pub function_deny: HashSet<String>,
    pub attribute_deny: HashSet<String>,
}

impl EffectivePolicy {
    #[must_use]
    pub fn resolve(policies: &[SecurityPolicy]) -> Self {
        let active: Vec<&SecurityPolicy> = policies.iter().filter(|p| p.is_active).collect();

        if active.is_empty() {
            return Self {
                module_deny: DEFAULT_DENIED_MODULES.iter().map(|s| (*s).to_owned()).collect(),
                module_allow: None,
                function_deny: DEFAULT_DENIED_FUNCTIONS.iter().map(|s| (*s).to_owned()).collect(),
                attribute_deny: DEFAULT_DENIED_ATTRIBUTES.iter().map(|s| (*s).to_owned()).collect(),
            };
        }

        let mut module_deny = HashSet::new();
        let mut module_allow_set = HashSet::new();
        let mut has_module_allow = false;
        let mut function_deny = HashSet::new();
        let mut attribute_deny = HashSet::new();

        for p in active {
            match (p.category, p.rule_type) {
                (RuleCategory::Module, RuleType::Deny) => {
                    module_deny.insert(p.pattern.clone());
                }
                (RuleCategory::Module, RuleType::Allow) => {
                    has_module_allow = true;
                    module_allow_set.insert(p.pattern.clone());
                }
                (RuleCategory::Function, RuleType::Deny) => {
                    function_deny.insert(p.pattern.clone());
                }
                (RuleCategory::Attribute, RuleType::Deny) => {
                    attribute_deny.insert(p.pattern.clone());
                }
                // Allow rules for function/attribute categories carry no
                // additional meaning beyond "not denied" — deny always wins.
                (RuleCategory::Function | RuleCategory::Attribute, RuleType::Allow) => {}
            }
        }

        Self {
            module_deny,
            module_allow: has_module_allow.then_some(module_allow_set),
            function_deny,
            attribute_deny,
        }
    }

    /// Whether `module` (or any of its dotted base-module prefixes) is
    /// permitted to be imported under this policy.
    #[must_use]
    pub fn module_allowed(&self, module: &str) -> bool {
        if Self::matches_or_base(&self.module_deny, module) {
            return false;
        }
        match &self.module_allow {
            Some(allow) => Self::matches_or_base(allow, module),
            None => true,
        }
    }

    #[must_use]
    pub fn function_denied(&self, name: &str) -> bool {
        self.function_deny.contains(name)
    }

    #[must_use]
    pub fn attribute_denied(&self, pattern: &str) -> bool {
        self.attribute_deny.contains(pattern)
    }

    fn matches_or_base(set: &HashSet<String>, name: &str) -> bool {
        if set.contains(name) {
            return true;
        }
        if let Some((base, _)) = name.split_once('.') {
            return set.contains(base);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_policies_use_builtin_defaults() {
        let policy = EffectivePolicy::resolve(&[]);
        assert!(!policy.module_allowed("os"));
        assert!(policy.module_allowed("json"));
        assert!(policy.function_denied("eval"));
    }

    #[test]
    fn explicit_allow_list_whitelists_modules() {
        let policies = vec![SecurityPolicy {
            id: 1,
            rule_type: RuleType::Allow,
            category: RuleCategory::Module,
            pattern: "math".to_owned(),
            is_active: true,
            description: String::new(),
        }];
        let policy = EffectivePolicy::resolve(&policies);
        assert!(policy.module_allowed("math"));
        assert!(!policy.module_allowed("json"));
    }

    #[test]
    fn deny_wins_over_allow_on_same_pattern() {
        let policies = vec![
            SecurityPolicy {
                id: 1,
                rule_type: RuleType::Allow,
                category: RuleCategory::Module,
                pattern: "os".to_owned(),
                is_active: true,
                description: String::new(),
            },
            SecurityPolicy {
                id: 2,
                rule_type: RuleType::Deny,
                category: RuleCategory::Module,
                pattern: "os".to_owned(),
                is_active: true,
                description: String::new(),
            },
        ];
        let policy = EffectivePolicy::resolve(&policies);
        assert!(!policy.module_allowed("os"));
    }
}
