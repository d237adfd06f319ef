//! In-memory stand-in for the Management API
//!
//! `MockTransport` keeps one JSON document per path and answers requests the
//! way the platform does: GET returns the document (404 when absent), PUT
//! replaces it, PATCH merges top-level keys, and POST to an `/apply` path
//! stores the body as the `config` of the parent path. Scripted responses
//! take precedence and are consumed in order. Every request is recorded so
//! tests can assert on exact call sequences.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use super::transport::{HttpRequest, HttpResponse, Method, Transport, TransportError};

#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    documents: HashMap<String, Value>,
    scripted: HashMap<(Method, String), VecDeque<HttpResponse>>,
    calls: Vec<HttpRequest>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_document(self, path: &str, document: Value) -> Self {
        self.set_document(path, document);
        self
    }

    pub fn set_document(&self, path: &str, document: Value) {
        self.lock().documents.insert(path.to_string(), document);
    }

    pub fn remove_document(&self, path: &str) {
        self.lock().documents.remove(path);
    }

    pub fn document(&self, path: &str) -> Option<Value> {
        self.lock().documents.get(path).cloned()
    }

    /// Queue a one-off response; a `Null` body is sent as an empty body
    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) {
        let body = match body {
            Value::Null => String::new(),
            other => other.to_string(),
        };
        self.lock()
            .scripted
            .entry((method, path.to_string()))
            .or_default()
            .push_back(HttpResponse { status, body });
    }

    /// Every request received so far, oldest first
    pub fn calls(&self) -> Vec<HttpRequest> {
        self.lock().calls.clone()
    }

    /// Requests other than GET
    pub fn writes(&self) -> Vec<HttpRequest> {
        self.calls()
            .into_iter()
            .filter(|call| call.method != Method::Get)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

fn ok(status: u16, document: &Value) -> HttpResponse {
    HttpResponse {
        status,
        body: document.to_string(),
    }
}

fn not_found(path: &str) -> HttpResponse {
    HttpResponse {
        status: 404,
        body: json!({ "message": format!("Not found: {}", path) }).to_string(),
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut state = self.lock();
        state.calls.push(request.clone());

        let key = (request.method, request.path.clone());
        if let Some(response) = state.scripted.get_mut(&key).and_then(VecDeque::pop_front) {
            return Ok(response);
        }

        let path = request.path;
        let body = request.body.unwrap_or(Value::Null);
        let response = match request.method {
            Method::Get => match state.documents.get(&path) {
                Some(document) => ok(200, document),
                None => not_found(&path),
            },
            Method::Put => {
                state.documents.insert(path, body.clone());
                ok(200, &body)
            }
            Method::Patch => {
                let Some(Value::Object(current)) = state.documents.get_mut(&path) else {
                    return Ok(not_found(&path));
                };
                if let Value::Object(changes) = body {
                    merge(current, changes);
                }
                let merged = Value::Object(current.clone());
                ok(200, &merged)
            }
            Method::Post => {
                let (target, document) = match path.strip_suffix("/apply") {
                    Some(parent) => (
                        parent.to_string(),
                        json!({ "entitlement": "allowed", "config": body, "status": "applied" }),
                    ),
                    None => (path, body),
                };
                state.documents.insert(target, document.clone());
                ok(201, &document)
            }
        };
        Ok(response)
    }
}

/// Null values drop the key, as the platform resets it to its default
fn merge(current: &mut Map<String, Value>, changes: Map<String, Value>) {
    for (key, value) in changes {
        if value.is_null() {
            current.remove(&key);
        } else {
            current.insert(key, value);
        }
    }
}
