// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: an in-memory Kubernetes API server behind a kube Client.

use crate::adapters::LifecycleSettings;
use crate::types::{ExposureKind, MicroserviceSpec, PortMapping, Protocol};
use http::{Method, Request, Response};
use http_body_util::BodyExt;
use kube::client::Body;
use kube::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

/// Annotation written by the simulated concurrent writer
pub const TOUCHED_ANNOTATION: &str = "test.example.com/touched";

pub fn deployments_path(namespace: &str) -> String {
    format!("/apis/apps/v1/namespaces/{}/deployments", namespace)
}

pub fn deployment_path(namespace: &str, name: &str) -> String {
    format!("{}/{}", deployments_path(namespace), name)
}

pub fn services_path(namespace: &str) -> String {
    format!("/api/v1/namespaces/{}/services", namespace)
}

pub fn service_path(namespace: &str, name: &str) -> String {
    format!("{}/{}", services_path(namespace), name)
}

/// The `web` microservice used across tests
pub fn web_spec() -> MicroserviceSpec {
    MicroserviceSpec {
        name: "web".to_string(),
        image: "app:v1".to_string(),
        replicas: 2,
        ports: vec![PortMapping {
            protocol: Protocol::Tcp,
            container_port: 8080,
            service_port: 80,
        }],
        expose_type: ExposureKind::ClusterIp,
        external_name: None,
    }
}

/// Lifecycle settings with millisecond polling so deletion tests stay fast
pub fn fast_settings() -> LifecycleSettings {
    LifecycleSettings {
        conflict_retry_attempts: 5,
        deletion_poll_interval: Duration::from_millis(5),
        deletion_timeout: Duration::from_millis(100),
    }
}

/// A stateful fake of the object API.
///
/// Objects are stored by item path. POST creates, GET reads, PUT replaces
/// with resourceVersion checking and DELETE removes. Failures can be injected
/// per path and method. Clones share state, so keep one clone to inspect what the client
/// did.
#[derive(Clone, Default)]
pub struct FakeApiServer {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    objects: HashMap<String, Value>,
    next_resource_version: u64,
    /// Collection path -> (status, reason) returned for POST
    create_failures: HashMap<String, (u16, String)>,
    /// Item path -> (remaining GETs, status, reason) failed before serving reads
    read_failures: HashMap<String, (u32, u16, String)>,
    /// Item path -> (status, reason) returned for PUT
    write_failures: HashMap<String, (u16, String)>,
    /// Item path -> (status, reason) returned for DELETE
    delete_failures: HashMap<String, (u16, String)>,
    /// Item path -> number of PUTs that lose to a concurrent writer
    write_conflicts: HashMap<String, u32>,
    /// Item path -> reads the object stays visible after DELETE, None for forever
    lingering: HashMap<String, Option<u32>>,
    requests: Vec<(Method, String)>,
}

impl FakeApiServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a kube Client backed by this server
    pub fn client(&self) -> Client {
        Client::new(self.clone(), "default")
    }

    /// Reject POSTs to a collection path
    pub fn fail_create(&self, collection: &str, status: u16, reason: &str) {
        self.lock()
            .create_failures
            .insert(collection.to_string(), (status, reason.to_string()));
    }

    /// Fail the next `times` GETs of an item path
    pub fn fail_read(&self, path: &str, times: u32, status: u16, reason: &str) {
        self.lock()
            .read_failures
            .insert(path.to_string(), (times, status, reason.to_string()));
    }

    /// Reject PUTs to an item path
    pub fn fail_write(&self, path: &str, status: u16, reason: &str) {
        self.lock()
            .write_failures
            .insert(path.to_string(), (status, reason.to_string()));
    }

    /// Reject DELETEs of an item path
    pub fn fail_delete(&self, path: &str, status: u16, reason: &str) {
        self.lock()
            .delete_failures
            .insert(path.to_string(), (status, reason.to_string()));
    }

    /// Let another writer modify the object right before each of the next `times` PUTs
    pub fn conflict_on_write(&self, path: &str, times: u32) {
        self.lock().write_conflicts.insert(path.to_string(), times);
    }

    /// Keep a deleted object readable for `reads` more GETs, or forever with None
    pub fn linger_after_delete(&self, path: &str, reads: Option<u32>) {
        self.lock().lingering.insert(path.to_string(), reads);
    }

    /// Store an object directly, as if another actor had created it
    pub fn insert(&self, path: &str, mut object: Value) {
        let mut state = self.lock();
        let resource_version = state.bump();
        object["metadata"]["resourceVersion"] = json!(resource_version);
        state.objects.insert(path.to_string(), object);
    }

    /// Drop all injected failures
    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.create_failures.clear();
        state.read_failures.clear();
        state.write_failures.clear();
        state.delete_failures.clear();
        state.write_conflicts.clear();
    }

    /// Finish background cleanup of a lingering object
    pub fn finish_deletion(&self, path: &str) {
        let mut state = self.lock();
        state.lingering.remove(path);
        state.objects.remove(path);
    }

    pub fn object(&self, path: &str) -> Option<Value> {
        self.lock().objects.get(path).cloned()
    }

    pub fn requests(&self) -> Vec<(Method, String)> {
        self.lock().requests.clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|(m, p)| *m == method && p == path)
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

impl FakeState {
    fn handle(&mut self, method: &Method, path: &str, body: &[u8]) -> (u16, Value) {
        self.requests.push((method.clone(), path.to_string()));

        match *method {
            Method::POST => self.create(path, body),
            Method::GET => self.get(path),
            Method::PUT => self.replace(path, body),
            Method::DELETE => self.delete(path),
            _ => (405, status_json(405, "MethodNotAllowed", path)),
        }
    }

    fn bump(&mut self) -> String {
        self.next_resource_version += 1;
        self.next_resource_version.to_string()
    }

    fn create(&mut self, collection: &str, body: &[u8]) -> (u16, Value) {
        if let Some((status, reason)) = self.create_failures.get(collection) {
            return (*status, status_json(*status, reason, collection));
        }

        let mut object: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => return (400, status_json(400, "BadRequest", &e.to_string())),
        };
        let name = object["metadata"]["name"].as_str().unwrap_or_default().to_string();
        let path = format!("{}/{}", collection, name);

        if self.objects.contains_key(&path) {
            return (409, status_json(409, "AlreadyExists", &name));
        }

        let resource_version = self.bump();
        object["metadata"]["resourceVersion"] = json!(resource_version);
        object["metadata"]["uid"] = json!(format!("uid-{}", name));
        self.objects.insert(path, object.clone());
        (201, object)
    }

    fn get(&mut self, path: &str) -> (u16, Value) {
        if let Some((remaining, status, reason)) = self.read_failures.get_mut(path) {
            if *remaining > 0 {
                *remaining -= 1;
                return (*status, status_json(*status, reason, path));
            }
        }

        let deleting = self
            .objects
            .get(path)
            .is_some_and(|o| !o["metadata"]["deletionTimestamp"].is_null());

        if deleting {
            match self.lingering.get(path).copied() {
                Some(Some(0)) | None => {
                    self.lingering.remove(path);
                    self.objects.remove(path);
                }
                Some(Some(reads)) => {
                    self.lingering.insert(path.to_string(), Some(reads - 1));
                }
                Some(None) => {}
            }
        }

        match self.objects.get(path) {
            Some(object) => (200, object.clone()),
            None => (404, status_json(404, "NotFound", path)),
        }
    }

    fn replace(&mut self, path: &str, body: &[u8]) -> (u16, Value) {
        if !self.objects.contains_key(path) {
            return (404, status_json(404, "NotFound", path));
        }
        if let Some((status, reason)) = self.write_failures.get(path) {
            return (*status, status_json(*status, reason, path));
        }

        if let Some(remaining) = self.write_conflicts.get_mut(path) {
            if *remaining > 0 {
                *remaining -= 1;
                let resource_version = self.bump();
                if let Some(stored) = self.objects.get_mut(path) {
                    stored["metadata"]["resourceVersion"] = json!(resource_version);
                    stored["metadata"]["annotations"][TOUCHED_ANNOTATION] = json!(resource_version);
                }
                return (409, status_json(409, "Conflict", path));
            }
        }

        let mut object: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => return (400, status_json(400, "BadRequest", &e.to_string())),
        };
        let stored_version = self.objects[path]["metadata"]["resourceVersion"].clone();
        if object["metadata"]["resourceVersion"] != stored_version {
            return (409, status_json(409, "Conflict", path));
        }

        let resource_version = self.bump();
        object["metadata"]["resourceVersion"] = json!(resource_version);
        self.objects.insert(path.to_string(), object.clone());
        (200, object)
    }

    fn delete(&mut self, path: &str) -> (u16, Value) {
        if let Some((status, reason)) = self.delete_failures.get(path) {
            return (*status, status_json(*status, reason, path));
        }

        if self.lingering.contains_key(path) {
            return match self.objects.get_mut(path) {
                Some(object) => {
                    object["metadata"]["deletionTimestamp"] = json!("2026-01-01T00:00:00Z");
                    (200, object.clone())
                }
                None => (404, status_json(404, "NotFound", path)),
            };
        }

        match self.objects.remove(path) {
            Some(object) => (200, object),
            None => (404, status_json(404, "NotFound", path)),
        }
    }
}

impl Service<Request<Body>> for FakeApiServer {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = self.state.clone();

        Box::pin(async move {
            let method = req.method().clone();
            let path = req.uri().path().to_string();
            let body = req.into_body().collect().await?.to_bytes();

            let (status, payload) = state.lock().unwrap().handle(&method, &path, &body);

            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string().into_bytes()))
                .unwrap())
        })
    }
}

/// Create a Status failure body
pub fn status_json(code: u16, reason: &str, message: &str) -> Value {
    json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    })
}
