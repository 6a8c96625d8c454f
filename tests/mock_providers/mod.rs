//! Mock provider servers for integration tests
//!
//! - `realtime_mock`: OpenAI Realtime WebSocket server
//! - `assistants_mock`: wiremock routes for the Assistants v2 REST API

// Each test binary uses a different subset of these helpers
#![allow(dead_code)]

pub mod assistants_mock;
pub mod realtime_mock;
