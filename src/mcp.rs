//! MCP surface for the wing store
//!
//! Tool definitions, argument decoding and JSON-RPC 2.0 dispatch. The
//! transport (stdio lines) lives in `main.rs`; everything here is
//! synchronous and transport-agnostic.

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::engine::WingEngine;
use crate::types::{AtomType, ConsolidationLevel};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

// ============================================================================
// MCP TOOL DEFINITIONS
// ============================================================================

pub fn get_tools() -> Vec<Value> {
    vec![
        json!({
            "name": "store_atom",
            "description": "Store a knowledge atom under a wing path (general to specific, e.g. [\"coding\",\"elixir\"]). The wing is created if missing; ancestor wings are not. Identical payloads are stored as separate atoms.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "wingPath": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Topic path, at least one non-blank segment"
                    },
                    "atomData": {
                        "type": "object",
                        "description": "Arbitrary JSON payload"
                    },
                    "atomType": {
                        "type": "string",
                        "description": "fact, rule, pattern, memory, code, or a custom tag (default fact)"
                    }
                },
                "required": ["wingPath", "atomData"]
            }
        }),
        json!({
            "name": "search_atoms",
            "description": "Relevance search across atoms. Scores payload substring match (0.5), nano-tag match (0.3) and wing specificity (0.2), scaled by confidence. An empty query browses everything.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Case-insensitive substring"
                    },
                    "wingPaths": {
                        "type": "array",
                        "items": { "type": "array", "items": { "type": "string" } },
                        "description": "Optional filters; an atom matches if a filter is a prefix of its wing path or vice versa"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum results (default 50)"
                    }
                },
                "required": ["query"]
            }
        }),
        json!({
            "name": "deep_research",
            "description": "Scan at most maxAtoms atoms for a topic and consolidate the high-relevance ones (relevance > 0.7, up to 10) into a summary.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "topic": {
                        "type": "string",
                        "description": "Research topic"
                    },
                    "maxAtoms": {
                        "type": "integer",
                        "description": "Maximum atoms scored (default 1000)"
                    },
                    "consolidationLevel": {
                        "type": "string",
                        "enum": ["brief", "detailed", "comprehensive"],
                        "description": "brief = 3 lines; detailed/comprehensive = full insight payloads"
                    }
                },
                "required": ["topic"]
            }
        }),
        json!({
            "name": "get_wing_structure",
            "description": "Return the full store: wings, atoms and counters.",
            "inputSchema": { "type": "object", "properties": {} }
        }),
        json!({
            "name": "get_atom",
            "description": "Fetch one atom by ID without counting it as an access.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "atomId": { "type": "string" }
                },
                "required": ["atomId"]
            }
        }),
        json!({
            "name": "list_wings",
            "description": "List wings with atom counts, optionally restricted to paths overlapping a prefix.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "prefix": {
                        "type": "array",
                        "items": { "type": "string" }
                    }
                }
            }
        }),
        json!({
            "name": "wing_stats",
            "description": "Totals for atoms, wings, searches and research runs, plus atom counts per type.",
            "inputSchema": { "type": "object", "properties": {} }
        }),
        json!({
            "name": "verify_atoms",
            "description": "Re-hash every atom. Reports atoms whose content no longer matches their hash, and how many atoms share a hash.",
            "inputSchema": { "type": "object", "properties": {} }
        }),
    ]
}

// ============================================================================
// TOOL ARGUMENTS
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreAtomArgs {
    wing_path: Vec<String>,
    atom_data: Value,
    #[serde(default)]
    atom_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchAtomsArgs {
    query: String,
    #[serde(default)]
    wing_paths: Option<Vec<Vec<String>>>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeepResearchArgs {
    topic: String,
    #[serde(default)]
    max_atoms: Option<usize>,
    #[serde(default)]
    consolidation_level: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetAtomArgs {
    atom_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListWingsArgs {
    #[serde(default)]
    prefix: Option<Vec<String>>,
}

fn parse_args<T: DeserializeOwned>(tool: &str, args: &Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args.clone() };
    serde_json::from_value(args).with_context(|| format!("invalid arguments for {}", tool))
}

pub fn is_known_tool(name: &str) -> bool {
    get_tools().iter().any(|t| t["name"] == name)
}

/// Run one tool and return its raw JSON result.
pub fn call_tool(engine: &WingEngine, name: &str, args: &Value) -> Result<Value> {
    match name {
        "store_atom" => {
            let args: StoreAtomArgs = parse_args(name, args)?;
            let atom_type = args.atom_type.map(AtomType::from);
            let stored = engine.store_atom(&args.wing_path, &args.atom_data, atom_type)?;
            Ok(serde_json::to_value(stored)?)
        }
        "search_atoms" => {
            let args: SearchAtomsArgs = parse_args(name, args)?;
            let hits = engine.search_atoms(&args.query, args.wing_paths.as_deref(), args.limit)?;
            Ok(serde_json::to_value(hits)?)
        }
        "deep_research" => {
            let args: DeepResearchArgs = parse_args(name, args)?;
            let level = match args.consolidation_level.as_deref() {
                Some(level) => level.parse::<ConsolidationLevel>()?,
                None => ConsolidationLevel::default(),
            };
            let report = engine.deep_research(&args.topic, args.max_atoms, level)?;
            Ok(serde_json::to_value(report)?)
        }
        "get_wing_structure" => Ok(engine.wing_structure()?),
        "get_atom" => {
            let args: GetAtomArgs = parse_args(name, args)?;
            Ok(serde_json::to_value(engine.get_atom(&args.atom_id)?)?)
        }
        "list_wings" => {
            let args: ListWingsArgs = parse_args(name, args)?;
            Ok(serde_json::to_value(engine.list_wings(args.prefix.as_deref())?)?)
        }
        "wing_stats" => Ok(serde_json::to_value(engine.stats()?)?),
        "verify_atoms" => Ok(serde_json::to_value(engine.verify_atoms()?)?),
        _ => Err(anyhow!("Unknown tool: {}", name)),
    }
}

// ============================================================================
// JSON-RPC DISPATCH
// ============================================================================

fn rpc_result(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn rpc_error(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message.into() }
    })
}

/// Wrap a tool outcome as MCP text content
fn tool_content(outcome: Result<Value>) -> Value {
    match outcome {
        Ok(value) => {
            let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
            json!({ "content": [{ "type": "text", "text": text }] })
        }
        Err(e) => json!({
            "content": [{ "type": "text", "text": format!("{:#}", e) }],
            "isError": true
        }),
    }
}

/// Handle one decoded JSON-RPC message. Notifications get no response.
pub fn handle_message(engine: &WingEngine, request: &Value) -> Option<Value> {
    let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");
    let params = request.get("params").cloned().unwrap_or(Value::Null);
    let id = request.get("id").cloned()?;

    let response = match method {
        "initialize" => rpc_result(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": { "name": "wingstore", "version": env!("CARGO_PKG_VERSION") }
            }),
        ),
        "ping" => rpc_result(id, json!({})),
        "tools/list" => rpc_result(id, json!({ "tools": get_tools() })),
        "tools/call" => {
            let Some(name) = params.get("name").and_then(|n| n.as_str()) else {
                return Some(rpc_error(id, -32602, "tools/call requires a tool name"));
            };
            if !is_known_tool(name) {
                return Some(rpc_error(id, -32602, format!("Unknown tool: {}", name)));
            }
            let args = params.get("arguments").cloned().unwrap_or(Value::Null);
            tracing::debug!(tool = name, "Tool call");
            rpc_result(id, tool_content(call_tool(engine, name, &args)))
        }
        _ => rpc_error(id, -32601, format!("Unknown method: {}", method)),
    };
    Some(response)
}

/// Handle one raw line from the transport
pub fn handle_line(engine: &WingEngine, line: &str) -> Option<String> {
    let response = match serde_json::from_str::<Value>(line) {
        Ok(request) => handle_message(engine, &request)?,
        Err(e) => rpc_error(Value::Null, -32700, format!("Parse error: {}", e)),
    };
    Some(response.to_string())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> WingEngine {
        WingEngine::in_memory().unwrap()
    }

    #[test]
    fn test_tool_names() {
        let names: Vec<String> = get_tools()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        for required in ["store_atom", "search_atoms", "deep_research", "get_wing_structure"] {
            assert!(names.contains(&required.to_string()), "missing {}", required);
        }
        assert!(get_tools().iter().all(|t| t["inputSchema"]["type"] == "object"));
    }

    #[test]
    fn test_store_and_search_through_tools() {
        let engine = engine();
        let stored = call_tool(
            &engine,
            "store_atom",
            &json!({"wingPath": ["coding", "elixir"], "atomData": {"note": "use GenServer for state"}, "atomType": "fact"}),
        )
        .unwrap();
        let atom_id = stored["atomId"].as_str().unwrap().to_string();

        let hits = call_tool(&engine, "search_atoms", &json!({"query": "genserver", "limit": 10})).unwrap();
        let first = &hits.as_array().unwrap()[0];
        assert_eq!(first["atomId"], atom_id.as_str());
        assert_eq!(first["wingPath"], json!(["coding", "elixir"]));
        assert_eq!(first["atomData"]["note"], "use GenServer for state");
        assert!(first["relevance"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_search_with_wing_paths() {
        let engine = engine();
        call_tool(&engine, "store_atom", &json!({"wingPath": ["semantic"], "atomData": {"v": "x"}})).unwrap();
        call_tool(&engine, "store_atom", &json!({"wingPath": ["coding", "elixir"], "atomData": {"v": "x"}})).unwrap();

        let hits = call_tool(&engine, "search_atoms", &json!({"query": "x", "wingPaths": [["coding"]]})).unwrap();
        let hits = hits.as_array().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["wingPath"], json!(["coding", "elixir"]));
    }

    #[test]
    fn test_deep_research_tool_defaults_to_brief() {
        let engine = engine();
        let report = call_tool(&engine, "deep_research", &json!({"topic": "performance"})).unwrap();
        assert_eq!(report["topic"], "performance");
        assert_eq!(report["summary"].as_array().unwrap().len(), 3);
        assert!(report["researchTimeMs"].is_u64());
        assert_eq!(report["atomsAnalyzed"], 0);

        let err = call_tool(
            &engine,
            "deep_research",
            &json!({"topic": "x", "consolidationLevel": "verbose"}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("consolidation level"));
    }

    #[test]
    fn test_bad_arguments_are_errors() {
        let engine = engine();
        assert!(call_tool(&engine, "store_atom", &json!({"atomData": {}})).is_err());
        assert!(call_tool(&engine, "store_atom", &json!({"wingPath": [], "atomData": {}})).is_err());
        assert!(call_tool(&engine, "search_atoms", &Value::Null).is_err());
        assert!(call_tool(&engine, "nope", &json!({})).is_err());
    }

    #[test]
    fn test_auxiliary_tools() {
        let engine = engine();
        let stored = call_tool(&engine, "store_atom", &json!({"wingPath": ["agent", "memories"], "atomData": {"m": 1}, "atomType": "memory"})).unwrap();

        let atom = call_tool(&engine, "get_atom", &json!({"atomId": stored["atomId"]})).unwrap();
        assert_eq!(atom["type"], "memory");
        assert_eq!(atom["accessCount"], 0);

        let wings = call_tool(&engine, "list_wings", &json!({"prefix": ["agent"]})).unwrap();
        assert_eq!(wings.as_array().unwrap().len(), 1);
        assert_eq!(wings[0]["atomCount"], 1);

        let all_wings = call_tool(&engine, "list_wings", &Value::Null).unwrap();
        assert_eq!(all_wings.as_array().unwrap().len(), 7);

        let stats = call_tool(&engine, "wing_stats", &json!({})).unwrap();
        assert_eq!(stats["totalAtoms"], 1);
        assert_eq!(stats["atomsByType"]["memory"], 1);

        let verify = call_tool(&engine, "verify_atoms", &json!({})).unwrap();
        assert_eq!(verify["atomsChecked"], 1);
        assert_eq!(verify["mismatched"], json!([]));

        let structure = call_tool(&engine, "get_wing_structure", &json!({})).unwrap();
        assert!(structure["wings"]["agent_memories"].is_object());
    }

    #[test]
    fn test_jsonrpc_initialize_and_list() {
        let engine = engine();
        let init = handle_message(&engine, &json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}})).unwrap();
        assert_eq!(init["result"]["serverInfo"]["name"], "wingstore");
        assert_eq!(init["id"], 1);

        let list = handle_message(&engine, &json!({"jsonrpc": "2.0", "id": "a", "method": "tools/list"})).unwrap();
        assert_eq!(list["result"]["tools"].as_array().unwrap().len(), get_tools().len());

        let note = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        assert!(handle_message(&engine, &note).is_none());
    }

    #[test]
    fn test_jsonrpc_tool_call_wraps_content() {
        let engine = engine();
        let ok = handle_message(
            &engine,
            &json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {"name": "store_atom", "arguments": {"wingPath": ["semantic"], "atomData": {"topic": "greeting"}}}}),
        )
        .unwrap();
        let text = ok["result"]["content"][0]["text"].as_str().unwrap();
        let body: Value = serde_json::from_str(text).unwrap();
        assert!(body["atomId"].as_str().unwrap().starts_with("atom_"));
        assert!(ok["result"].get("isError").is_none());

        let failed = handle_message(
            &engine,
            &json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {"name": "store_atom", "arguments": {"wingPath": [], "atomData": {}}}}),
        )
        .unwrap();
        assert_eq!(failed["result"]["isError"], true);
        assert!(failed["result"]["content"][0]["text"].as_str().unwrap().contains("invalid wing path"));
    }

    #[test]
    fn test_jsonrpc_protocol_errors() {
        let engine = engine();
        let unknown_method = handle_message(&engine, &json!({"jsonrpc": "2.0", "id": 4, "method": "resources/list"})).unwrap();
        assert_eq!(unknown_method["error"]["code"], -32601);

        let unknown_tool = handle_message(
            &engine,
            &json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call", "params": {"name": "delete_wing"}}),
        )
        .unwrap();
        assert_eq!(unknown_tool["error"]["code"], -32602);

        let parse = handle_line(&engine, "{oops").unwrap();
        let parse: Value = serde_json::from_str(&parse).unwrap();
        assert_eq!(parse["error"]["code"], -32700);
        assert!(parse["id"].is_null());
    }
}
