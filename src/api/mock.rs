//! In-process transport that records calls and replays canned responses

use super::http::{ApiResponse, Transport};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub method: &'static str,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Call {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Responses are queued per (method, path); the last one repeats.
/// Unmatched calls get an empty 404.
#[derive(Default)]
pub(crate) struct MockTransport {
    responses: Mutex<HashMap<(&'static str, String), VecDeque<ApiResponse>>>,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, method: &'static str, path: &str, status: u16, body: Option<Value>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(ApiResponse::new(status, body));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(
        &self,
        method: &'static str,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
    ) -> ApiResponse {
        self.calls.lock().unwrap().push(Call {
            method,
            path: path.to_string(),
            query: query.to_vec(),
            body,
        });

        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(&(method, path.to_string())) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().cloned().unwrap_or_default(),
            None => ApiResponse::new(404, None),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<ApiResponse> {
        Ok(self.record("GET", path, query, None))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        Ok(self.record("POST", path, &[], Some(body.clone())))
    }

    async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        Ok(self.record("PUT", path, &[], Some(body.clone())))
    }

    async fn delete(&self, path: &str, query: &[(String, String)]) -> Result<ApiResponse> {
        Ok(self.record("DELETE", path, query, None))
    }

    async fn upload(&self, path: &str, content: Vec<u8>) -> Result<ApiResponse> {
        let body = Value::from(content.len());
        Ok(self.record("UPLOAD", path, &[], Some(body)))
    }
}
