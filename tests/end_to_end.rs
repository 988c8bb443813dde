// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end scenarios from `spec.md §8`, driven entirely through the
//! public `Dispatcher`/`meta_tools` surface against an in-memory SQLite
//! metadata store (and, for the SQL scenarios, an in-memory SQLite data
//! session standing in for the opaque external data store).

use registry_mcp_server::artifact::ArtifactKind;
use registry_mcp_server::chain::Step;
use registry_mcp_server::constants::DEFAULT_PERSONA;
use registry_mcp_server::database::{Database, DataSession, DatabaseProvider};
use registry_mcp_server::dispatcher::Dispatcher;
use registry_mcp_server::meta_tools::manual::system_verify_tool;
use registry_mcp_server::meta_tools::registry_tools::{create_new_sql_tool, remove_tool, NewSqlTool};
use registry_mcp_server::meta_tools::workflow::execute_workflow;
use registry_mcp_server::registry::models::{ManualExample, ToolManual, ToolRecord, ToolState};
use std::sync::Arc;

async fn meta_db() -> Database {
    let db = Database::new("sqlite::memory:").await.expect("open metadata store");
    db.migrate().await.expect("migrate metadata store");
    db
}

async fn data_session() -> DataSession {
    let session = DataSession::connect("sqlite::memory:").await.expect("open data session");
    session
        .execute("CREATE TABLE sales (store TEXT NOT NULL, city TEXT NOT NULL, amount INTEGER NOT NULL)")
        .await
        .expect("create sales table");
    session
        .execute("INSERT INTO sales (store, city, amount) VALUES ('A', 'Springfield', 10), ('A', 'Springfield', 5), ('B', 'Shelbyville', 7)")
        .await
        .expect("seed sales rows");
    session
}

async fn greet_tool(meta: &Database) -> ToolRecord {
    let body = "class GreetTool(Tool):\n    def run(self, arguments):\n        return \"Hello, \" + arguments[\"name\"]\n";
    let digest = meta.put_artifact(body, ArtifactKind::Script).await.unwrap();
    let record = ToolRecord {
        name: "utility_greet".to_owned(),
        persona: DEFAULT_PERSONA.to_owned(),
        description: "Greets the caller by name.".to_owned(),
        input_schema: serde_json::json!({"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]}),
        artifact_digest: digest,
        is_auto_created: false,
        group: "utility".to_owned(),
        manual: None,
        state: ToolState::Created,
    };
    meta.upsert_tool(&record).await.unwrap();
    record
}

/// Scenario 1 ("Greet"): a single `SUCCESS` audit entry, result contains
/// "Hello" and "World".
#[tokio::test]
async fn greet_scenario_records_one_success() {
    let meta = meta_db().await;
    greet_tool(&meta).await;
    let dispatcher = Dispatcher::new(meta, None);

    let result = dispatcher
        .call_tool("utility_greet", DEFAULT_PERSONA, serde_json::json!({"name": "World"}))
        .await
        .expect("greet should succeed");

    let text = match result {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    };
    assert!(text.contains("Hello"));
    assert!(text.contains("World"));

    let failure = dispatcher.meta_session().get_last_failure(Some("utility_greet")).await.unwrap();
    assert!(failure.is_none(), "greet should not have failed");
}

/// Scenario 2: a parameterized SELECT tool with a conditional template
/// block renders differently depending on whether the optional argument is
/// supplied, without ever interpolating the value directly into the SQL text.
#[tokio::test]
async fn parameterized_select_respects_conditional_block() {
    let meta = meta_db().await;
    let dispatcher = Dispatcher::new(meta, Some(data_session().await));

    let sql = "SELECT store, SUM(amount) AS total FROM sales WHERE 1=1 {% if arguments.store %} AND store = :store {% endif %} GROUP BY store";
    create_new_sql_tool(
        &dispatcher,
        NewSqlTool {
            tool_name: "sales_by_store",
            description: "Total sales, optionally filtered by store.",
            sql_query: sql,
            parameters: &serde_json::json!({"store": {"type": "string", "description": "store code", "required": false}}),
        },
    )
    .await
    .expect("tool creation should succeed");

    let filtered = dispatcher
        .call_tool("sales_by_store", DEFAULT_PERSONA, serde_json::json!({"store": "A"}))
        .await
        .expect("filtered query should succeed");
    let filtered_rows = filtered.as_array().expect("rows array");
    assert_eq!(filtered_rows.len(), 1);
    assert_eq!(filtered_rows[0]["store"], serde_json::json!("A"));

    let unfiltered = dispatcher
        .call_tool("sales_by_store", DEFAULT_PERSONA, serde_json::json!({}))
        .await
        .expect("unfiltered query should succeed");
    let unfiltered_rows = unfiltered.as_array().expect("rows array");
    assert_eq!(unfiltered_rows.len(), 2);
}

/// Scenario 3: `create_new_sql_tool` rejects a write statement before it
/// ever reaches the registry.
#[tokio::test]
async fn forbidden_write_is_rejected_at_creation() {
    let meta = meta_db().await;
    let dispatcher = Dispatcher::new(meta, None);

    let err = create_new_sql_tool(
        &dispatcher,
        NewSqlTool {
            tool_name: "sales_wipe",
            description: "not a select",
            sql_query: "DELETE FROM sales",
            parameters: &serde_json::json!({}),
        },
    )
    .await
    .expect_err("a DELETE body must be rejected");

    assert!(dispatcher.meta_session().get_tool("sales_wipe", DEFAULT_PERSONA).await.unwrap().is_none());
    assert!(!err.sanitized_message().is_empty());
}

/// Scenario 4: a tool whose body divides by zero fails, is recorded as a
/// `FAILURE`, and `get_last_error` surfaces the diagnostic.
#[tokio::test]
async fn self_heal_flow_records_failure_and_surfaces_it() {
    let meta = meta_db().await;
    let body = "class DivTool(Tool):\n    def run(self, arguments):\n        return 1 / 0\n";
    let digest = meta.put_artifact(body, ArtifactKind::Script).await.unwrap();
    let record = ToolRecord {
        name: "math_divide_by_zero".to_owned(),
        persona: DEFAULT_PERSONA.to_owned(),
        description: "always fails".to_owned(),
        input_schema: serde_json::json!({"type": "object", "properties": {}, "required": []}),
        artifact_digest: digest,
        is_auto_created: false,
        group: "math".to_owned(),
        manual: None,
        state: ToolState::Created,
    };
    meta.upsert_tool(&record).await.unwrap();
    let dispatcher = Dispatcher::new(meta, None);

    let result = dispatcher.call_tool("math_divide_by_zero", DEFAULT_PERSONA, serde_json::json!({})).await;
    assert!(result.is_err());

    let last_failure = dispatcher.meta_session().get_last_failure(Some("math_divide_by_zero")).await.unwrap();
    assert!(last_failure.is_some(), "the failure must be recorded to the execution log");

    let diagnostic = registry_mcp_server::meta_tools::db_ops::get_last_error(&dispatcher, Some("math_divide_by_zero"))
        .await
        .unwrap();
    assert!(diagnostic.contains("math_divide_by_zero"));
}

/// Scenario 5: a workflow step referencing an id that has not yet executed
/// is rejected before any step runs.
#[tokio::test]
async fn chain_rejects_forward_reference_before_executing() {
    let meta = meta_db().await;
    greet_tool(&meta).await;
    let dispatcher = Dispatcher::new(meta, None);

    let steps = vec![
        Step { id: "g".to_owned(), tool: "utility_greet".to_owned(), args: serde_json::json!({"name": "${loc.city}"}) },
        Step { id: "loc".to_owned(), tool: "utility_greet".to_owned(), args: serde_json::json!({"name": "x"}) },
    ];

    let err = execute_workflow(&dispatcher, DEFAULT_PERSONA, steps).await.expect_err("forward reference must be rejected");
    assert_eq!(err.code, registry_mcp_server::ErrorCode::ForwardReference);
}

/// Scenario 6: chain substitution threads a prior step's result field into
/// a later step's arguments, and both steps are recorded in order.
#[tokio::test]
async fn chain_substitutes_prior_step_result_field() {
    let meta = meta_db().await;
    let loc_body = "class LocationTool(Tool):\n    def run(self, arguments):\n        return {\"city\": \"Springfield\"}\n";
    let loc_digest = meta.put_artifact(loc_body, ArtifactKind::Script).await.unwrap();
    meta.upsert_tool(&ToolRecord {
        name: "get_location".to_owned(),
        persona: DEFAULT_PERSONA.to_owned(),
        description: "returns a location".to_owned(),
        input_schema: serde_json::json!({"type": "object", "properties": {}, "required": []}),
        artifact_digest: loc_digest,
        is_auto_created: false,
        group: "get".to_owned(),
        manual: None,
        state: ToolState::Created,
    })
    .await
    .unwrap();
    greet_tool(&meta).await;

    let dispatcher = Dispatcher::new(meta, None);
    let steps = vec![
        Step { id: "loc".to_owned(), tool: "get_location".to_owned(), args: serde_json::json!({}) },
        Step { id: "g".to_owned(), tool: "utility_greet".to_owned(), args: serde_json::json!({"name": "${loc.city}"}) },
    ];

    let report = execute_workflow(&dispatcher, DEFAULT_PERSONA, steps).await.expect("chain should complete");
    assert!(report.failure.is_none());
    assert_eq!(report.completed.len(), 2);
    let greet_result = &report.completed[1].result;
    let text = match greet_result {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    assert!(text.contains("Springfield"));
}

/// Exercises the full `ToolState` lifecycle (`spec.md §4.8`): a freshly
/// created tool starts `Created`, a fully-passing `system_verify_tool` run
/// advances it to `Verified`, re-pointing it at a new artifact digest resets
/// it to `Updated`, and `remove_tool` deletes the record outright.
#[tokio::test]
async fn tool_state_lifecycle_advances_through_verified_updated_removed() {
    let meta = meta_db().await;
    let seeded = greet_tool(&meta).await;
    assert_eq!(seeded.state, ToolState::Created);
    let dispatcher = Arc::new(Dispatcher::new(meta, None));

    let mut record = dispatcher.meta_session().get_tool("utility_greet", DEFAULT_PERSONA).await.unwrap().unwrap();
    record.manual = Some(ToolManual {
        usage_guide: None,
        examples: vec![ManualExample {
            input: serde_json::json!({"name": "World"}),
            expected_summary: "Hello, World".to_owned(),
            verified: false,
        }],
        pitfalls: Vec::new(),
        error_codes: Vec::new(),
    });
    dispatcher.meta_session().upsert_tool(&record).await.unwrap();

    system_verify_tool(&dispatcher, "utility_greet", DEFAULT_PERSONA).await.expect("verify should succeed");
    let verified = dispatcher.meta_session().get_tool("utility_greet", DEFAULT_PERSONA).await.unwrap().unwrap();
    assert_eq!(verified.state, ToolState::Verified);

    create_new_sql_tool(
        &dispatcher,
        NewSqlTool {
            tool_name: "utility_greet",
            description: "repointed at a SQL body",
            sql_query: "SELECT 1 AS one",
            parameters: &serde_json::json!({}),
        },
    )
    .await
    .expect("re-creation with a new digest should succeed");
    let updated = dispatcher.meta_session().get_tool("utility_greet", DEFAULT_PERSONA).await.unwrap().unwrap();
    assert_eq!(updated.state, ToolState::Updated);

    remove_tool(&dispatcher, "utility_greet", DEFAULT_PERSONA).await.expect("removal should succeed");
    assert!(dispatcher.meta_session().get_tool("utility_greet", DEFAULT_PERSONA).await.unwrap().is_none());
}
