use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Key under which backends store [`GenerationStats`] and the request id.
pub const METADATA_KEY: &str = "metadata";

/// One result of a model chat call. Produced once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub status: i32,
    pub output: String,
    pub code: String,
    pub prompt: String,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
}

impl ChatResponse {
    /// A successful response with status 0 and an empty code.
    pub fn ok(output: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            status: 0,
            output: output.into(),
            code: String::new(),
            prompt: prompt.into(),
            variables: HashMap::new(),
        }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: Value) -> Self {
        self.variables.insert(key.into(), value);
        self
    }

    pub fn with_stats(self, stats: &GenerationStats) -> Self {
        // A struct of numbers and an optional string always serializes.
        let value = serde_json::to_value(stats).unwrap_or(Value::Null);
        self.with_variable(METADATA_KEY, value)
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }

    /// Request id reported by the backend, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.variables
            .get(METADATA_KEY)
            .and_then(|m| m.get("request_id"))
            .and_then(Value::as_str)
    }

    /// Timing and token accounting reported by the backend, if any.
    pub fn stats(&self) -> Option<GenerationStats> {
        self.variables
            .get(METADATA_KEY)
            .and_then(|m| serde_json::from_value(m.clone()).ok())
    }
}

/// Per-call accounting a backend may attach to a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub input_tokens_count: u64,
    #[serde(default)]
    pub generated_tokens_count: u64,
    /// Seconds spent in the backend call.
    #[serde(default)]
    pub time_cost: f64,
    #[serde(default)]
    pub first_token_time: f64,
    /// Generated tokens per second.
    #[serde(default)]
    pub speed: f64,
}

impl GenerationStats {
    pub fn new(input_tokens_count: u64, generated_tokens_count: u64, time_cost: f64) -> Self {
        let speed = if time_cost > 0.0 {
            generated_tokens_count as f64 / time_cost
        } else {
            0.0
        };
        Self {
            request_id: None,
            input_tokens_count,
            generated_tokens_count,
            time_cost,
            first_token_time: 0.0,
            speed,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_response_defaults() {
        let response = ChatResponse::ok("hello", "hi");
        assert!(response.is_success());
        assert!(response.variables.is_empty());
        assert!(response.request_id().is_none());
        assert!(response.stats().is_none());
    }

    #[test]
    fn test_stats_round_trip_through_variables() {
        let stats = GenerationStats::new(12, 40, 2.0).with_request_id("req-7");
        let response = ChatResponse::ok("out", "in").with_stats(&stats);

        assert_eq!(response.request_id(), Some("req-7"));
        let read_back = response.stats().unwrap();
        assert_eq!(read_back.generated_tokens_count, 40);
        assert!((read_back.speed - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_variables_default_when_missing() {
        let response: ChatResponse = serde_json::from_value(json!({
            "status": 1,
            "output": "",
            "code": "timeout",
            "prompt": "p"
        }))
        .unwrap();
        assert!(!response.is_success());
        assert!(response.variables.is_empty());
    }

    #[test]
    fn test_zero_time_cost_has_zero_speed() {
        assert_eq!(GenerationStats::new(1, 5, 0.0).speed, 0.0);
    }
}
