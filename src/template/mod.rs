// SPDX-License-Identifier: MIT OR Apache-2.0

//! C4 — Template Engine Adapter: renders a SQL template body with a macro
//! prelude and an argument bag, using `tera`'s Jinja2-like syntax for
//! conditional blocks, loops, and macro calls. Values are never interpolated
//! directly into the rendered SQL text — only `{% if %}`/`{% for %}`
//! structure and macro calls are expanded; every value the caller supplies
//! travels to the executor through a `:name` parameter placeholder instead.

use crate::errors::EngineError;
use crate::registry::models::MacroRecord;
use tera::{Context, Tera};

/// Concatenate the ordered set of active macro templates into the prelude
/// prepended to every SQL render (`spec.md §4.4`).
#[must_use]
pub fn build_macro_prelude(active_macros: &[MacroRecord]) -> String {
    active_macros
        .iter()
        .map(|m| m.template.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render `body` with the macro prelude prepended and `arguments` exposed to
/// `{% if %}`/`{% for %}` control flow under the `arguments` context key.
pub fn render_sql(
    body: &str,
    arguments: &serde_json::Value,
    active_macros: &[MacroRecord],
) -> Result<String, EngineError> {
    let prelude = build_macro_prelude(active_macros);
    let full_template = if prelude.is_empty() {
        body.to_owned()
    } else {
        format!("{prelude}\n{body}")
    };

    let mut context = Context::new();
    context.insert("arguments", arguments);

    Tera::one_off(&full_template, &context, false).map_err(|e| EngineError::InvalidInput(format!(
        "template render failed: {e}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_conditional_block_without_interpolating_values() {
        let body = "SELECT store, SUM(amount) AS total FROM sales WHERE 1=1 {% if arguments.store %} AND store = :store {% endif %} GROUP BY store";
        let rendered = render_sql(body, &serde_json::json!({"store": "A"}), &[]).unwrap();
        assert!(rendered.contains("AND store = :store"));
        assert!(!rendered.contains("'A'"));
    }

    #[test]
    fn omits_conditional_block_when_arg_absent() {
        let body = "SELECT store FROM sales WHERE 1=1 {% if arguments.store %} AND store = :store {% endif %}";
        let rendered = render_sql(body, &serde_json::json!({}), &[]).unwrap();
        assert!(!rendered.contains(":store"));
    }

    #[test]
    fn macro_prelude_text_is_present_in_every_render() {
        let macros = vec![MacroRecord {
            name: "noop".into(),
            description: String::new(),
            template: "{% macro noop() %}{% endmacro %}".into(),
            is_active: true,
        }];
        let rendered = render_sql("SELECT 1", &serde_json::json!({}), &macros).unwrap();
        assert!(rendered.contains("macro noop"));
    }
}
