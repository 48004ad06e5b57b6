//! Tool handlers for the request/response channel

use gridlearn_core::{GridLearnError, Position, Result, SimulationConfig, error_codes};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::mcp::{RequestId, Response};
use crate::simulation::Simulation;

/// Tool definition for tools/list
#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

fn config_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "width": { "type": "integer", "minimum": 1, "default": 8 },
            "height": { "type": "integer", "minimum": 1, "default": 8 },
            "cells": {
                "type": "array",
                "description": "Rows of cell names: empty, wall, start, target, trap, bonus or bonus:<value>",
                "items": { "type": "array", "items": { "type": "string" } }
            },
            "alpha": { "type": "number", "default": 0.1 },
            "gamma": { "type": "number", "default": 0.9 },
            "epsilon": { "type": "number", "default": 0.2 },
            "epsilon_decay": { "type": "number", "default": 0.995 },
            "min_epsilon": { "type": "number", "default": 0.01 },
            "algorithm": { "type": "string", "enum": ["Q-Learning", "SARSA"], "default": "Q-Learning" },
            "step_penalty": { "type": "number", "default": -1.0 },
            "strategy": { "type": "string", "enum": ["minimize_steps", "collect_all"], "default": "minimize_steps" },
            "allowed_actions": {
                "type": "array",
                "items": { "type": "string", "enum": ["UP", "DOWN", "LEFT", "RIGHT"] }
            }
        }
    })
}

fn no_params() -> serde_json::Value {
    json!({ "type": "object", "properties": {} })
}

/// Get list of available tools
pub fn list_tools() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "setup".into(),
            description: "Replace the grid and agent. Counters reset, continuous play stops."
                .into(),
            input_schema: config_schema(),
        },
        ToolDef {
            name: "update_config".into(),
            description: "Change hyperparameters, strategy, step penalty and permitted actions without losing learned values. Grid fields are ignored.".into(),
            input_schema: config_schema(),
        },
        ToolDef {
            name: "get_state".into(),
            description: "Full state: grid, agent position, value table, counters, epsilon and run mode".into(),
            input_schema: no_params(),
        },
        ToolDef {
            name: "step".into(),
            description: "Advance one tick. Status is reset, terminal or step.".into(),
            input_schema: no_params(),
        },
        ToolDef {
            name: "turbo".into(),
            description: "Train for a number of episodes without live updates. Returns a sampled learning curve.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "episodes": { "type": "integer", "minimum": 0, "default": 1000 }
                }
            }),
        },
        ToolDef {
            name: "generate_maze".into(),
            description: "Carve a random maze. Learned values and epsilon reset.".into(),
            input_schema: no_params(),
        },
        ToolDef {
            name: "clear".into(),
            description: "Empty grid with only Start and Target. Learned values and epsilon reset.".into(),
            input_schema: no_params(),
        },
        ToolDef {
            name: "set_cell".into(),
            description: "Edit one cell. Example: {\"x\": 2, \"y\": 3, \"cell\": \"bonus:5\"}".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "x": { "type": "integer", "minimum": 0 },
                    "y": { "type": "integer", "minimum": 0 },
                    "cell": { "type": "string" }
                },
                "required": ["x", "y", "cell"]
            }),
        },
        ToolDef {
            name: "optimal_path".into(),
            description: "Greedy path from Start under the current value table".into(),
            input_schema: no_params(),
        },
        ToolDef {
            name: "play".into(),
            description: "Start continuous play. Updates arrive as notifications/live.".into(),
            input_schema: no_params(),
        },
        ToolDef {
            name: "pause".into(),
            description: "Stop continuous play".into(),
            input_schema: no_params(),
        },
        ToolDef {
            name: "set_speed".into(),
            description: "Delay between continuous-play ticks in milliseconds".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "speed": { "type": "integer", "minimum": 0 }
                },
                "required": ["speed"]
            }),
        },
    ]
}

/// Parameters for turbo
#[derive(Debug, Deserialize)]
pub struct TurboParams {
    #[serde(default = "default_episodes")]
    pub episodes: u64,
}

fn default_episodes() -> u64 {
    1000
}

/// Parameters for set_cell
#[derive(Debug, Deserialize)]
pub struct SetCellParams {
    pub x: usize,
    pub y: usize,
    pub cell: String,
}

/// Parameters for set_speed
#[derive(Debug, Deserialize)]
pub struct SetSpeedParams {
    pub speed: u64,
}

/// JSON-RPC error code for a domain error
pub fn error_code(error: &GridLearnError) -> i32 {
    match error {
        GridLearnError::InvalidDimensions { .. } => error_codes::INVALID_DIMENSIONS,
        GridLearnError::InvalidParameter(_)
        | GridLearnError::UnknownCell(_)
        | GridLearnError::SerializationError(_) => error_codes::INVALID_PARAMETER,
        GridLearnError::OutOfBounds { .. } => error_codes::OUT_OF_BOUNDS,
        GridLearnError::UnknownAction(_) => error_codes::UNKNOWN_ACTION,
        GridLearnError::Simulation(_) => error_codes::SIMULATION_FAILED,
        GridLearnError::ProtocolError(_) => error_codes::METHOD_NOT_FOUND,
        _ => error_codes::INTERNAL,
    }
}

/// Handle a tools/call request
pub async fn handle_tool_call(
    name: &str,
    params: serde_json::Value,
    id: RequestId,
    simulation: &Simulation,
) -> Response {
    let params = if params.is_null() { json!({}) } else { params };

    let result = match name {
        "setup" => handle_setup(params, simulation).await,
        "update_config" => handle_update_config(params, simulation).await,
        "get_state" => serde_json::to_value(simulation.query().await).map_err(Into::into),
        "step" => handle_step(simulation).await,
        "turbo" => handle_turbo(params, simulation).await,
        "generate_maze" => Ok(json!({ "env": simulation.generate_maze().await })),
        "clear" => Ok(json!({ "env": simulation.clear().await })),
        "set_cell" => handle_set_cell(params, simulation).await,
        "optimal_path" => Ok(json!({ "path": simulation.optimal_path().await })),
        "play" => {
            simulation.play().await;
            Ok(json!({ "run_mode": "playing" }))
        }
        "pause" => {
            simulation.pause().await;
            Ok(json!({ "run_mode": "paused" }))
        }
        "set_speed" => handle_set_speed(params, simulation).await,
        _ => Err(GridLearnError::ProtocolError(format!(
            "Unknown tool: {}",
            name
        ))),
    };

    match result {
        Ok(value) => Response::success(
            id,
            json!({ "content": [{ "type": "text", "text": value.to_string() }] }),
        ),
        Err(e) => Response::error(id, error_code(&e), e.to_string()),
    }
}

async fn handle_setup(
    params: serde_json::Value,
    simulation: &Simulation,
) -> Result<serde_json::Value> {
    let config: SimulationConfig = serde_json::from_value(params)?;
    let state = simulation.setup(&config).await?;
    Ok(serde_json::to_value(state)?)
}

async fn handle_update_config(
    params: serde_json::Value,
    simulation: &Simulation,
) -> Result<serde_json::Value> {
    let config: SimulationConfig = serde_json::from_value(params)?;
    simulation.update_config(&config).await?;
    Ok(json!({ "status": "ok" }))
}

async fn handle_step(simulation: &Simulation) -> Result<serde_json::Value> {
    let report = simulation.step().await?;
    Ok(serde_json::to_value(report)?)
}

async fn handle_turbo(
    params: serde_json::Value,
    simulation: &Simulation,
) -> Result<serde_json::Value> {
    let p: TurboParams = serde_json::from_value(params)?;
    let report = simulation.turbo(p.episodes).await?;
    Ok(serde_json::to_value(report)?)
}

async fn handle_set_cell(
    params: serde_json::Value,
    simulation: &Simulation,
) -> Result<serde_json::Value> {
    let p: SetCellParams = serde_json::from_value(params)?;
    let env = simulation
        .set_cell(Position::new(p.x, p.y), &p.cell)
        .await?;
    Ok(json!({ "env": env }))
}

async fn handle_set_speed(
    params: serde_json::Value,
    simulation: &Simulation,
) -> Result<serde_json::Value> {
    let p: SetSpeedParams = serde_json::from_value(params)?;
    simulation.set_speed(p.speed).await;
    Ok(json!({ "speed_ms": p.speed }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    fn simulation() -> Simulation {
        Simulation::new(&ServerConfig {
            seed: Some(5),
            ..Default::default()
        })
        .unwrap()
    }

    fn text_payload(response: &Response) -> serde_json::Value {
        let result = response.result.as_ref().expect("success response");
        let text = result["content"][0]["text"].as_str().unwrap();
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_tool_names_unique() {
        let tools = list_tools();
        let mut names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), tools.len());
    }

    #[tokio::test]
    async fn test_setup_then_get_state() {
        let sim = simulation();
        let id = RequestId::Number(1);
        let response = handle_tool_call(
            "setup",
            json!({ "width": 4, "height": 3, "algorithm": "SARSA" }),
            id.clone(),
            &sim,
        )
        .await;
        let state = text_payload(&response);
        assert_eq!(state["env"]["width"], 4);
        assert_eq!(state["env"]["cells"][2][3], "target");

        let response = handle_tool_call("get_state", serde_json::Value::Null, id, &sim).await;
        assert_eq!(text_payload(&response)["episode"], 0);
    }

    #[tokio::test]
    async fn test_error_codes() {
        let sim = simulation();
        let id = RequestId::Number(2);

        let response = handle_tool_call("setup", json!({ "width": 0 }), id.clone(), &sim).await;
        assert_eq!(response.error.unwrap().code, error_codes::INVALID_DIMENSIONS);

        let response =
            handle_tool_call("setup", json!({ "alpha": 1.5 }), id.clone(), &sim).await;
        assert_eq!(response.error.unwrap().code, error_codes::INVALID_PARAMETER);

        let response = handle_tool_call(
            "set_cell",
            json!({ "x": 99, "y": 0, "cell": "wall" }),
            id.clone(),
            &sim,
        )
        .await;
        assert_eq!(response.error.unwrap().code, error_codes::OUT_OF_BOUNDS);

        let response = handle_tool_call(
            "setup",
            json!({ "allowed_actions": ["JUMP"] }),
            id.clone(),
            &sim,
        )
        .await;
        assert_eq!(response.error.unwrap().code, error_codes::UNKNOWN_ACTION);

        let response = handle_tool_call(
            "update_config",
            json!({ "allowed_actions": ["down", "sideways"] }),
            id.clone(),
            &sim,
        )
        .await;
        assert_eq!(response.error.unwrap().code, error_codes::UNKNOWN_ACTION);

        let response = handle_tool_call(
            "setup",
            json!({ "width": 100000, "height": 100000 }),
            id.clone(),
            &sim,
        )
        .await;
        assert_eq!(response.error.unwrap().code, error_codes::INVALID_DIMENSIONS);

        let response = handle_tool_call("fly", json!({}), id, &sim).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, error_codes::METHOD_NOT_FOUND);
        assert!(error.message.contains("fly"));
    }

    #[tokio::test]
    async fn test_set_cell_and_path() {
        let sim = simulation();
        let id = RequestId::Number(3);
        let response = handle_tool_call(
            "set_cell",
            json!({ "x": 1, "y": 1, "cell": "trap" }),
            id.clone(),
            &sim,
        )
        .await;
        assert_eq!(text_payload(&response)["env"]["cells"][1][1], "trap");

        let response = handle_tool_call("optimal_path", json!({}), id, &sim).await;
        assert_eq!(
            text_payload(&response)["path"],
            json!([{ "x": 0, "y": 0 }])
        );
    }

    #[tokio::test]
    async fn test_turbo_defaults() {
        let sim = simulation();
        let id = RequestId::Number(4);
        handle_tool_call("setup", json!({ "width": 3, "height": 3 }), id.clone(), &sim).await;
        let response = handle_tool_call("turbo", json!({ "episodes": 30 }), id, &sim).await;
        let report = text_payload(&response);
        assert_eq!(report["episodes"], 30);
        assert_eq!(report["curve"].as_array().unwrap().len(), 30);
        assert_eq!(report["curve"][0]["episode"], 1);
    }
}
