// In-memory collaborators for tests
use super::lock;
use super::ports::{Notification, Notifier};
use super::query_runner::{LoadError, LoadRequest, QueryRunner};
use super::remote::{DashboardLookup, DashboardRemote, RemoteError, WidgetRemote};
use crate::domain::position::WidgetId;
use crate::domain::query_result::QueryResult;
use crate::domain::widget::Widget;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Conflict,
    Denied,
    Status(u16),
}

impl Failure {
    fn into_error(self) -> RemoteError {
        match self {
            Failure::Conflict => RemoteError::Conflict,
            Failure::Denied => RemoteError::PermissionDenied,
            Failure::Status(status) => RemoteError::from_status(status, "scripted failure"),
        }
    }
}

fn merge_into(target: &mut Value, fields: &Value) {
    if let (Some(target), Some(fields)) = (target.as_object_mut(), fields.as_object()) {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn version_of(value: &Value) -> i64 {
    value.get("version").and_then(Value::as_i64).unwrap_or(0)
}

/// Widget store with server-side optimistic concurrency.
#[derive(Default)]
pub struct FakeWidgetRemote {
    stored: Mutex<HashMap<WidgetId, Value>>,
    failures: Mutex<HashMap<WidgetId, VecDeque<Failure>>>,
    delays: Mutex<HashMap<WidgetId, Duration>>,
    saves: Mutex<Vec<(Option<WidgetId>, Value)>>,
    gets: Mutex<Vec<WidgetId>>,
}

impl FakeWidgetRemote {
    pub fn with_widgets(widgets: &[Widget]) -> Self {
        let remote = Self::default();
        for widget in widgets {
            if let Some(id) = widget.id {
                lock(&remote.stored).insert(id, serde_json::to_value(widget).unwrap());
            }
        }
        remote
    }

    /// Simulate a concurrent edit by someone else.
    pub fn bump_version(&self, id: WidgetId) {
        if let Some(stored) = lock(&self.stored).get_mut(&id) {
            let version = version_of(stored) + 1;
            stored["version"] = version.into();
        }
    }

    pub fn fail_next(&self, id: WidgetId, failure: Failure) {
        lock(&self.failures).entry(id).or_default().push_back(failure);
    }

    /// Every save of `id` takes `delay` before the server answers.
    pub fn delay(&self, id: WidgetId, delay: Duration) {
        lock(&self.delays).insert(id, delay);
    }

    pub fn save_count(&self) -> usize {
        lock(&self.saves).len()
    }

    pub fn saved_ids(&self) -> Vec<Option<WidgetId>> {
        lock(&self.saves).iter().map(|(id, _)| *id).collect()
    }

    pub fn last_payload(&self) -> Option<Value> {
        lock(&self.saves).last().map(|(_, payload)| payload.clone())
    }

    pub fn get_count(&self) -> usize {
        lock(&self.gets).len()
    }

    pub fn stored_position(&self, id: WidgetId) -> Option<Value> {
        lock(&self.stored)
            .get(&id)
            .and_then(|w| w.pointer("/options/position").cloned())
    }
}

#[async_trait]
impl WidgetRemote for FakeWidgetRemote {
    async fn save_widget(&self, id: Option<WidgetId>, payload: Value) -> Result<Value, RemoteError> {
        lock(&self.saves).push((id, payload.clone()));
        let Some(id) = id else {
            return Ok(payload);
        };
        let delay = lock(&self.delays).get(&id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = lock(&self.failures).get_mut(&id).and_then(VecDeque::pop_front) {
            return Err(failure.into_error());
        }

        let mut stored = lock(&self.stored);
        let current = stored.get_mut(&id).ok_or(RemoteError::NotFound)?;
        if version_of(current) != version_of(&payload) {
            return Err(RemoteError::Conflict);
        }
        merge_into(current, &payload);
        current["version"] = (version_of(&payload) + 1).into();
        Ok(current.clone())
    }

    async fn get_widget(&self, id: WidgetId) -> Result<Value, RemoteError> {
        lock(&self.gets).push(id);
        lock(&self.stored).get(&id).cloned().ok_or(RemoteError::NotFound)
    }
}

/// Dashboard store with server-side optimistic concurrency.
pub struct FakeDashboardRemote {
    stored: Mutex<Value>,
    failures: Mutex<VecDeque<Failure>>,
    saves: Mutex<Vec<Value>>,
    /// Fields the server rewrites on every save, regardless of the payload.
    server_fields: Mutex<Map<String, Value>>,
}

impl FakeDashboardRemote {
    pub fn new(dashboard: Value) -> Self {
        Self {
            stored: Mutex::new(dashboard),
            failures: Mutex::new(VecDeque::new()),
            saves: Mutex::new(Vec::new()),
            server_fields: Mutex::new(Map::new()),
        }
    }

    pub fn fail_next(&self, failure: Failure) {
        lock(&self.failures).push_back(failure);
    }

    pub fn set_server_field(&self, key: &str, value: Value) {
        lock(&self.server_fields).insert(key.to_string(), value);
    }

    pub fn bump_version(&self) {
        let mut stored = lock(&self.stored);
        let version = version_of(&stored) + 1;
        stored["version"] = version.into();
    }

    pub fn saves(&self) -> Vec<Value> {
        lock(&self.saves).clone()
    }
}

#[async_trait]
impl DashboardRemote for FakeDashboardRemote {
    async fn save_dashboard(&self, payload: Value) -> Result<Value, RemoteError> {
        lock(&self.saves).push(payload.clone());
        if let Some(failure) = lock(&self.failures).pop_front() {
            return Err(failure.into_error());
        }

        let mut stored = lock(&self.stored);
        if payload.get("version").is_some() && version_of(&stored) != version_of(&payload) {
            return Err(RemoteError::Conflict);
        }
        let version = version_of(&stored) + 1;
        merge_into(&mut stored, &payload);
        stored["version"] = version.into();
        let server_fields = Value::Object(lock(&self.server_fields).clone());
        merge_into(&mut stored, &server_fields);
        Ok(stored.clone())
    }

    async fn get_dashboard(&self, _lookup: &DashboardLookup) -> Result<Value, RemoteError> {
        Ok(lock(&self.stored).clone())
    }

    async fn archive_dashboard(&self, _id: i64) -> Result<Value, RemoteError> {
        let mut stored = lock(&self.stored);
        stored["is_archived"] = true.into();
        Ok(stored.clone())
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Rows(QueryResult),
    QueryError(String),
    Broken(String),
}

/// Query runner answering per query id, optionally after a delay.
#[derive(Default)]
pub struct FakeQueryRunner {
    outcomes: Mutex<HashMap<i64, Outcome>>,
    delays: Mutex<HashMap<i64, Duration>>,
    requests: Mutex<Vec<LoadRequest>>,
}

impl FakeQueryRunner {
    pub fn respond(&self, query_id: i64, outcome: Outcome) {
        lock(&self.outcomes).insert(query_id, outcome);
    }

    pub fn delay(&self, query_id: i64, delay: Duration) {
        lock(&self.delays).insert(query_id, delay);
    }

    pub fn requests(&self) -> Vec<LoadRequest> {
        lock(&self.requests).clone()
    }

    pub fn requested_queries(&self) -> Vec<i64> {
        lock(&self.requests).iter().map(|r| r.query.id).collect()
    }
}

#[async_trait]
impl QueryRunner for FakeQueryRunner {
    async fn run(&self, request: LoadRequest) -> Result<QueryResult, LoadError> {
        let query_id = request.query.id;
        lock(&self.requests).push(request);
        // the answer is fixed when the request is made, not when it returns
        let outcome = lock(&self.outcomes).get(&query_id).cloned();
        let delay = lock(&self.delays).get(&query_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match outcome {
            Some(Outcome::Rows(result)) => Ok(result),
            Some(Outcome::QueryError(message)) => Err(LoadError::QueryResult(message)),
            Some(Outcome::Broken(message)) => Err(LoadError::Other(anyhow::anyhow!(message))),
            None => Ok(QueryResult::default()),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        lock(&self.notifications).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn error(&self, notification: Notification) {
        lock(&self.notifications).push(notification);
    }
}
