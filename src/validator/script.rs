// SPDX-License-Identifier: MIT OR Apache-2.0

//! C3 — Validator: structural checks on imperative (`script`) artifacts.
//!
//! Grounded on the same AST-walking pattern a `Gatekeeper`-style validator
//! uses elsewhere in the ecosystem: parse with `rustpython_parser`, walk the
//! tree with a `Visitor` implementation that records violations rather than
//! bailing on the first one, and report everything found.

use super::policy::EffectivePolicy;
use crate::errors::EngineError;
use rustpython_ast::{Expr, Stmt, Suite};
use rustpython_parser::{ast, Parse};

/// All violations found during a single `validate_script` call.
#[derive(Debug, Default)]
pub struct ScriptReport {
    pub violations: Vec<Violation>,
}

#[derive(Debug, Clone)]
pub struct Violation {
    pub category: &'static str,
    pub pattern: String,
    pub detail: String,
}

impl ScriptReport {
    fn push(&mut self, category: &'static str, pattern: impl Into<String>, detail: impl Into<String>) {
        self.violations.push(Violation {
            category,
            pattern: pattern.into(),
            detail: detail.into(),
        });
    }
}

/// Parse and validate a script artifact body against the given (already
/// resolved) policy set. Returns `Ok(())` if the body is structurally legal;
/// otherwise the first violation found is surfaced as an `EngineError`
/// (every violation is still recorded in the returned report via `analyze`
/// for callers that want the full list, e.g. `system_inspect_tool`).
pub fn validate_script(body: &str, policy: &EffectivePolicy) -> Result<(), EngineError> {
    let report = analyze(body, policy)?;
    if let Some(first) = report.violations.first() {
        return Err(EngineError::PolicyViolation {
            category: first.category.to_owned(),
            pattern: first.pattern.clone(),
        });
    }
    Ok(())
}

/// Parse `body` and return every violation found, without short-circuiting.
pub fn analyze(body: &str, policy: &EffectivePolicy) -> Result<ScriptReport, EngineError> {
    let suite: Suite = ast::Suite::parse(body, "<artifact>").map_err(|e| EngineError::InvalidStructure {
        reason: e.to_string(),
    })?;

    let mut report = ScriptReport::default();
    check_top_level_structure(&suite, &mut report)?;

    for stmt in &suite {
        walk_stmt(stmt, policy, &mut report);
    }

    Ok(report)
}

/// `spec.md §4.3`: at the top level only imports and class definitions are
/// permitted. Any other top-level statement is a fatal `InvalidStructure`
/// (raised immediately, unlike policy violations which are merely collected).
fn check_top_level_structure(suite: &Suite, _report: &mut ScriptReport) -> Result<(), EngineError> {
    for stmt in suite {
        let allowed = matches!(
            stmt,
            Stmt::Import(_) | Stmt::ImportFrom(_) | Stmt::ClassDef(_)
        );
        if !allowed {
            return Err(EngineError::InvalidStructure {
                reason: format!("top-level statement of kind '{}' is not permitted; only imports and class definitions are", stmt_kind_name(stmt)),
            });
        }
    }
    Ok(())
}

fn stmt_kind_name(stmt: &Stmt) -> &'static str {
    match stmt {
        Stmt::FunctionDef(_) => "function definition",
        Stmt::AsyncFunctionDef(_) => "async function definition",
        Stmt::ClassDef(_) => "class definition",
        Stmt::Return(_) => "return",
        Stmt::Delete(_) => "delete",
        Stmt::Assign(_) => "assignment",
        Stmt::AugAssign(_) => "augmented assignment",
        Stmt::AnnAssign(_) => "annotated assignment",
        Stmt::For(_) | Stmt::AsyncFor(_) => "for loop",
        Stmt::While(_) => "while loop",
        Stmt::If(_) => "conditional",
        Stmt::With(_) | Stmt::AsyncWith(_) => "with block",
        Stmt::Raise(_) => "raise",
        Stmt::Try(_) | Stmt::TryStar(_) => "try block",
        Stmt::Assert(_) => "assert",
        Stmt::Import(_) => "import",
        Stmt::ImportFrom(_) => "import-from",
        Stmt::Global(_) => "global",
        Stmt::Nonlocal(_) => "nonlocal",
        Stmt::Expr(_) => "bare expression",
        Stmt::Pass(_) => "pass",
        Stmt::Break(_) => "break",
        Stmt::Continue(_) => "continue",
    }
}

/// Recursively walk a statement (and everything nested inside it, including
/// class bodies) looking for banned imports, calls, and attribute accesses.
fn walk_stmt(stmt: &Stmt, policy: &EffectivePolicy, report: &mut ScriptReport) {
    match stmt {
        Stmt::Import(node) => {
            for alias in &node.names {
                let module = alias.name.as_str();
                if !policy.module_allowed(module) {
                    report.push("module", module, format!("import of '{module}' is denied"));
                }
            }
        }
        Stmt::ImportFrom(node) => {
            if let Some(module) = &node.module {
                let module = module.as_str();
                if !policy.module_allowed(module) {
                    report.push("module", module, format!("import-from '{module}' is denied"));
                }
            }
        }
        Stmt::ClassDef(node) => {
            for s in &node.body {
                walk_stmt(s, policy, report);
            }
        }
        Stmt::FunctionDef(node) => {
            for s in &node.body {
                walk_stmt(s, policy, report);
            }
        }
        Stmt::AsyncFunctionDef(node) => {
            for s in &node.body {
                walk_stmt(s, policy, report);
            }
        }
        Stmt::If(node) => {
            walk_expr(&node.test, policy, report);
            for s in &node.body {
                walk_stmt(s, policy, report);
            }
            for s in &node.orelse {
                walk_stmt(s, policy, report);
            }
        }
        Stmt::For(node) => {
            walk_expr(&node.iter, policy, report);
            for s in &node.body {
                walk_stmt(s, policy, report);
            }
        }
        Stmt::While(node) => {
            walk_expr(&node.test, policy, report);
            for s in &node.body {
                walk_stmt(s, policy, report);
            }
        }
        Stmt::Assign(node) => walk_expr(&node.value, policy, report),
        Stmt::Expr(node) => walk_expr(&node.value, policy, report),
        Stmt::Return(node) => {
            if let Some(v) = &node.value {
                walk_expr(v, policy, report);
            }
        }
        _ => {}
    }
}

fn walk_expr(expr: &Expr, policy: &EffectivePolicy, report: &mut ScriptReport) {
    match expr {
        Expr::Call(node) => {
            if let Some(name) = dynamic_call_name(&node.func) {
                if policy.function_denied(&name) {
                    report.push("function", name.clone(), format!("call to '{name}' is denied"));
                }
            }
            if let Some(pattern) = attribute_pattern(&node.func) {
                if policy.attribute_denied(&pattern) {
                    report.push("attribute", pattern.clone(), format!("attribute access '{pattern}' is denied"));
                }
            }
            walk_expr(&node.func, policy, report);
            for arg in &node.args {
                walk_expr(arg, policy, report);
            }
        }
        Expr::Attribute(node) => {
            if let Some(pattern) = attribute_pattern(expr) {
                if policy.attribute_denied(&pattern) {
                    report.push("attribute", pattern.clone(), format!("attribute access '{pattern}' is denied"));
                }
            }
            walk_expr(&node.value, policy, report);
        }
        Expr::BinOp(node) => {
            walk_expr(&node.left, policy, report);
            walk_expr(&node.right, policy, report);
        }
        Expr::BoolOp(node) => {
            for v in &node.values {
                walk_expr(v, policy, report);
            }
        }
        Expr::Compare(node) => {
            walk_expr(&node.left, policy, report);
            for c in &node.comparators {
                walk_expr(c, policy, report);
            }
        }
        _ => {}
    }
}

/// Name of a directly-called function, e.g. `eval(...)` -> `Some("eval")`.
fn dynamic_call_name(func: &Expr) -> Option<String> {
    match func {
        Expr::Name(n) => Some(n.id.to_string()),
        Expr::Attribute(a) => Some(a.attr.to_string()),
        _ => None,
    }
}

/// `module.method` textual form of an attribute-access expression, if the
/// base is a plain name (covers the common banned patterns; deeper chains
/// are intentionally not resolved — the structural validator narrows shape,
/// it does not perform full static analysis).
fn attribute_pattern(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Attribute(a) => match a.value.as_ref() {
            Expr::Name(n) => Some(format!("{}.{}", n.id, a.attr)),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_policy() -> EffectivePolicy {
        EffectivePolicy::resolve(&[])
    }

    #[test]
    fn valid_tool_script_passes() {
        let body = r#"
class GreetTool(Tool):
    def run(self, arguments):
        return "Hello, " + arguments["name"]
"#;
        assert!(validate_script(body, &default_policy()).is_ok());
    }

    #[test]
    fn top_level_assignment_is_invalid_structure() {
        let body = "x = 1\n";
        let err = validate_script(body, &default_policy()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidStructure { .. }));
    }

    #[test]
    fn banned_import_is_policy_violation() {
        let body = "import os\nclass T(Tool):\n    def run(self, a):\n        return 1\n";
        let err = validate_script(body, &default_policy()).unwrap_err();
        match err {
            EngineError::PolicyViolation { category, pattern } => {
                assert_eq!(category, "module");
                assert_eq!(pattern, "os");
            }
            other => panic!("expected PolicyViolation, got {other:?}"),
        }
    }

    #[test]
    fn banned_call_inside_method_is_caught() {
        let body = "class T(Tool):\n    def run(self, a):\n        return eval(a['expr'])\n";
        let err = validate_script(body, &default_policy()).unwrap_err();
        assert!(matches!(err, EngineError::PolicyViolation { category, .. } if category == "function"));
    }

    #[test]
    fn invalid_syntax_is_invalid_structure() {
        let body = "class T(Tool:\n";
        let err = validate_script(body, &default_policy()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidStructure { .. }));
    }
}
