//! End-to-end session over the stdio request channel

use std::sync::Arc;
use std::time::Duration;

use gridlearn_server::transport::stdio;
use gridlearn_server::{ServerConfig, Simulation};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};

struct Client {
    input: DuplexStream,
    output: Lines<BufReader<DuplexStream>>,
    next_id: i64,
}

impl Client {
    fn start(seed: u64) -> (Self, tokio::task::JoinHandle<gridlearn_core::Result<()>>) {
        let simulation = Arc::new(
            Simulation::new(&ServerConfig {
                seed: Some(seed),
                ..Default::default()
            })
            .unwrap(),
        );
        let (client_in, server_in) = tokio::io::duplex(64 * 1024);
        let (server_out, client_out) = tokio::io::duplex(64 * 1024);
        let task = tokio::spawn(stdio::serve(simulation, server_in, server_out));
        let client = Client {
            input: client_in,
            output: BufReader::new(client_out).lines(),
            next_id: 1,
        };
        (client, task)
    }

    async fn send(&mut self, message: Value) {
        let mut line = message.to_string();
        line.push('\n');
        self.input.write_all(line.as_bytes()).await.unwrap();
    }

    async fn next_message(&mut self) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(5), self.output.next_line())
            .await
            .expect("timed out waiting for output")
            .unwrap()
            .expect("server closed output");
        serde_json::from_str(&line).unwrap()
    }

    /// Send a request and return its response, skipping live notifications
    async fn request(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        self.send(json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .await;
        loop {
            let message = self.next_message().await;
            if message["id"] == id {
                return message;
            }
        }
    }

    async fn call(&mut self, tool: &str, arguments: Value) -> Value {
        let response = self
            .request("tools/call", json!({ "name": tool, "arguments": arguments }))
            .await;
        let text = response["result"]["content"][0]["text"]
            .as_str()
            .unwrap_or_else(|| panic!("tool {} failed: {}", tool, response));
        serde_json::from_str(text).unwrap()
    }
}

#[tokio::test]
async fn test_initialize_and_list_tools() {
    let (mut client, _task) = Client::start(1);

    let response = client.request("initialize", json!({})).await;
    assert_eq!(response["result"]["serverInfo"]["name"], "gridlearn-server");

    client
        .send(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
        .await;

    let response = client.request("tools/list", Value::Null).await;
    let names: Vec<&str> = response["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    for expected in ["setup", "step", "turbo", "generate_maze", "optimal_path", "play"] {
        assert!(names.contains(&expected), "missing tool {}", expected);
    }

    let response = client.request("resources/list", Value::Null).await;
    assert_eq!(response["error"]["code"], -32601);
}

#[tokio::test]
async fn test_training_session() {
    let (mut client, _task) = Client::start(2);

    let state = client
        .call(
            "setup",
            json!({
                "width": 4,
                "height": 1,
                "cells": [["start", "empty", "bonus:10", "target"]],
                "epsilon": 0.1
            }),
        )
        .await;
    assert_eq!(state["agent_pos"], json!({ "x": 0, "y": 0 }));
    assert_eq!(state["run_mode"], "paused");

    let step = client.call("step", json!({})).await;
    assert!(["step", "terminal"].contains(&step["status"].as_str().unwrap()));

    let report = client.call("turbo", json!({ "episodes": 300 })).await;
    let curve = report["curve"].as_array().unwrap();
    assert_eq!(curve.len(), 100);
    assert_eq!(curve[0]["episode"], 1);

    let path = client.call("optimal_path", json!({})).await;
    let path = path["path"].as_array().unwrap();
    assert_eq!(path.first(), Some(&json!({ "x": 0, "y": 0 })));
    assert_eq!(path.last(), Some(&json!({ "x": 3, "y": 0 })));

    let state = client.call("get_state", json!({})).await;
    assert!(state["episode"].as_u64().unwrap() >= 300);
    assert_eq!(state["env"]["cells"][0][2], "bonus:10.0");
    assert!(state["q_table"]["0,0"]["RIGHT"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_live_notifications_while_playing() {
    let (mut client, _task) = Client::start(3);
    client.call("set_speed", json!({ "speed": 1 })).await;
    client.call("play", json!({})).await;

    let mut updates = 0;
    while updates < 2 {
        let message = client.next_message().await;
        if message["method"] == "notifications/live" {
            assert_eq!(message["params"]["type"], "update");
            updates += 1;
        }
    }

    let paused = client.call("pause", json!({})).await;
    assert_eq!(paused["run_mode"], "paused");
}

#[tokio::test]
async fn test_errors_and_eof() {
    let (mut client, task) = Client::start(4);

    let response = client
        .request(
            "tools/call",
            json!({ "name": "set_cell", "arguments": { "x": 50, "y": 0, "cell": "wall" } }),
        )
        .await;
    assert_eq!(response["error"]["code"], -32002);

    let response = client
        .request("tools/call", json!({ "name": "teleport", "arguments": {} }))
        .await;
    assert_eq!(response["error"]["code"], -32601);

    client.input.write_all(b"not json\n").await.unwrap();
    let response = client.request("ping", Value::Null).await;
    assert_eq!(response["result"], json!({}));

    drop(client);
    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
