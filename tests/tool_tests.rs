//! Tests for the tool system.

use pretty_assertions::assert_eq;
use serde_json::json;

use switchyard::error::SwitchyardError;
use switchyard::tools::*;

#[test]
fn parameter_builder_constructs_schema() {
    let params = ToolParameters::object()
        .string("query", "Search query", true)
        .integer("limit", "Max results", false)
        .boolean("verbose", "Enable verbose output", false)
        .build();

    let schema = &params.schema;
    assert_eq!(schema["type"], "object");
    assert_eq!(schema["properties"]["query"]["type"], "string");
    assert_eq!(schema["properties"]["limit"]["type"], "integer");
    assert_eq!(schema["required"], json!(["query"]));
}

#[test]
fn string_enum_is_enforced_by_validation() {
    let params = ToolParameters::object()
        .string_enum("format", "Output format", &["json", "text", "csv"], true)
        .build();

    assert!(validate_arguments(&json!({"format": "csv"}), &params.schema).is_ok());
    let err = validate_arguments(&json!({"format": "xml"}), &params.schema).unwrap_err();
    assert!(err.contains("arguments.format"));
    let err = validate_arguments(&json!({}), &params.schema).unwrap_err();
    assert!(err.contains("missing required field 'format'"));
}

#[test]
fn arguments_parse_blank_text_as_empty_object() {
    assert_eq!(ToolArguments::parse("  ").unwrap().raw(), &json!({}));
    assert!(matches!(
        ToolArguments::parse("{oops"),
        Err(SwitchyardError::InvalidArgument(_))
    ));
}

#[test]
fn arguments_typed_access() {
    let args = ToolArguments::new(json!({"name": "Alice", "age": 30, "active": true}));
    assert_eq!(args.get_str("name").unwrap(), "Alice");
    assert_eq!(args.get_i64("age").unwrap(), 30);
    assert_eq!(args.get_bool_opt("active"), Some(true));
    assert_eq!(args.get_str_opt("missing"), None);
    assert!(args.get_str("missing").is_err());

    #[derive(serde::Deserialize, PartialEq, Debug)]
    struct Params {
        name: String,
        age: Option<u32>,
    }
    let params: Params = args.deserialize().unwrap();
    assert_eq!(
        params,
        Params {
            name: "Alice".into(),
            age: Some(30)
        }
    );
}

#[tokio::test]
async fn agent_tool_executes() {
    let tool = AgentTool::new(
        "greet",
        "Greet a person",
        ToolParameters::object().string("name", "Name", true).build(),
        |args, _ctx| async move {
            let name = args.get_str("name")?;
            Ok::<_, SwitchyardError>(json!({"greeting": format!("Hello, {name}!")}))
        },
    );

    assert_eq!(tool.name(), "greet");
    assert_eq!(tool.description(), "Greet a person");

    let args = ToolArguments::new(json!({"name": "World"}));
    let result = tool
        .execute(&args, &ToolExecutionContext::default())
        .await
        .unwrap();
    assert_eq!(result["greeting"], "Hello, World!");
}

#[test]
fn sanitized_names_are_backend_safe() {
    assert_eq!(sanitize_tool_name("search.web"), "search_web");
    assert_eq!(sanitize_tool_name(""), "tool");
    assert_eq!(sanitize_tool_name(&"x".repeat(100)).len(), 64);

    let mut table = ToolNameTable::new();
    assert_eq!(table.insert("fs/read").unwrap(), "fs_read");
    assert_eq!(table.insert("fs/read").unwrap(), "fs_read");
    assert_eq!(table.original("fs_read"), Some("fs/read"));
    assert!(table.insert("fs:read").is_err());
    assert_eq!(table.len(), 1);
}

#[test]
fn budget_counts_down_and_refuses_overdraw() {
    let mut budget = ToolCallBudget::new(Some(2)).unwrap();
    assert!(budget.consume(1).unwrap());
    assert_eq!(
        budget.countdown_message().unwrap(),
        "Tool budget: used 1 of 2 — 1 remaining."
    );
    assert!(!budget.consume(2).unwrap());
    assert_eq!(budget.used(), 1);
    assert!(budget.consume(1).unwrap());
    assert!(budget.exhausted());
    assert!(budget.final_prompt_message().contains("all 2 available tool calls"));

    assert!(ToolCallBudget::new(Some(-1)).is_err());
    assert!(ToolCallBudget::new(None).unwrap().countdown_message().is_none());
}

#[test]
fn registry_with_builtins_exposes_definitions() {
    let registry = ToolRegistry::with_builtins();
    assert!(!registry.is_empty());
    for name in registry.names() {
        let tool = registry.get(name).unwrap();
        assert_eq!(tool.definition().name, name);
    }
}
