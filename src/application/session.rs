// Dashboard session - owns the dashboard snapshot and drives loading and saving
use super::auto_height::{AutoHeightController, HeightUpdate};
use super::debounce::Debouncer;
use super::edit_mode::{EditModeCoordinator, EditTransition, LayoutSaveReport, SaveStatus};
use super::lock;
use super::ports::{LocationService, Notification, Notifier};
use super::query_runner::{LoadError, LoadRequest, QueryRunner};
use super::remote::{DashboardLookup, DashboardRemote, RemoteError, WidgetRemote};
use crate::domain::dashboard::{Dashboard, DashboardUpdate};
use crate::domain::layout::{has_position_changes, normalize, normalize_entries, positions_from_layout};
use crate::domain::parameters::{
    affected_widgets, bind_parameter_values, dashboard_parameters, synchronize_titles, widget_mappings,
    DashboardParameter, Mappings,
};
use crate::domain::position::{Breakpoint, GridItem, LayoutEntry, WidgetId};
use crate::domain::query_result::{collect_dashboard_filters, Filter, QueryResult};
use crate::domain::sizing::SizingRules;
use crate::domain::widget::{Widget, WidgetKind};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("widget {0} is not on this dashboard")]
    UnknownWidget(WidgetId),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("invalid dashboard data: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Collaborators a session talks to.
#[derive(Clone)]
pub struct SessionDeps {
    pub dashboards: Arc<dyn DashboardRemote>,
    pub widgets: Arc<dyn WidgetRemote>,
    pub queries: Arc<dyn QueryRunner>,
    pub location: Arc<dyn LocationService>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub rules: SizingRules,
    pub layout_debounce: Duration,
    pub dashboard_update_debounce: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            rules: SizingRules::default(),
            layout_debounce: Duration::from_millis(2000),
            dashboard_update_debounce: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadedData {
    Rows(QueryResult),
    Error(String),
}

/// Runtime load state of one widget.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetLoad {
    pub loading: bool,
    /// Bumped on every load; a completed load only applies if it is
    /// still the latest one.
    pub generation: u64,
    pub refresh_started_at: Option<DateTime<Utc>>,
    pub data: Option<LoadedData>,
}

#[derive(Debug, Default)]
pub struct DashboardLoadReport {
    pub loaded: Vec<WidgetId>,
    pub failed: Vec<(WidgetId, String)>,
}

#[derive(Debug)]
pub enum LayoutOutcome {
    /// Single-column layouts are derived and never persisted.
    Ignored,
    /// Coalesced into the pending edit-mode save.
    Scheduled,
    Saved(LayoutSaveReport),
}

struct SessionInner {
    snapshot: Mutex<Arc<Dashboard>>,
    loads: Mutex<HashMap<WidgetId, WidgetLoad>>,
    /// Bumped whenever a widget load completes.
    loads_settled: watch::Sender<u64>,
    filters: Mutex<Vec<Filter>>,
    parameter_values: Mutex<HashMap<String, Value>>,
    widget_values: Mutex<HashMap<WidgetId, HashMap<String, Value>>>,
    refreshing: AtomicBool,
    grid_disabled: AtomicBool,
    breakpoint: Mutex<Breakpoint>,
    grid: Mutex<Vec<GridItem>>,
    auto_height: Mutex<AutoHeightController>,
    height_updates: Arc<Mutex<Vec<HeightUpdate>>>,
    edit: Arc<EditModeCoordinator>,
    layout_debouncer: Debouncer,
    deps: SessionDeps,
    rules: SizingRules,
}

/// Top-level coordinator of one open dashboard.
#[derive(Clone)]
pub struct DashboardSession {
    inner: Arc<SessionInner>,
}

struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl DashboardSession {
    pub fn new(dashboard: Dashboard, deps: SessionDeps, settings: SessionSettings) -> Self {
        let dashboard = prepare(dashboard);
        let can_edit = editable(&dashboard);

        let height_updates = Arc::new(Mutex::new(Vec::new()));
        let sink = height_updates.clone();
        let mut auto_height = AutoHeightController::new(
            settings.rules.clone(),
            Box::new(move |update| lock(&sink).push(update)),
        );
        auto_height.update(&dashboard.widgets);

        let edit = Arc::new(EditModeCoordinator::new(
            can_edit,
            deps.widgets.clone(),
            deps.location.clone(),
            deps.notifier.clone(),
            settings.rules.clone(),
            settings.layout_debounce,
        ));

        let grid = grid_items(&dashboard.widgets);
        Self {
            inner: Arc::new(SessionInner {
                snapshot: Mutex::new(Arc::new(dashboard)),
                loads: Mutex::new(HashMap::new()),
                loads_settled: watch::channel(0).0,
                filters: Mutex::new(Vec::new()),
                parameter_values: Mutex::new(HashMap::new()),
                widget_values: Mutex::new(HashMap::new()),
                refreshing: AtomicBool::new(false),
                grid_disabled: AtomicBool::new(false),
                breakpoint: Mutex::new(Breakpoint::MultiColumn),
                grid: Mutex::new(grid),
                auto_height: Mutex::new(auto_height),
                height_updates,
                edit,
                layout_debouncer: Debouncer::new(settings.dashboard_update_debounce),
                deps,
                rules: settings.rules,
            }),
        }
    }

    /// Fetch a dashboard and load its widgets.
    pub async fn open(
        lookup: &DashboardLookup,
        deps: SessionDeps,
        settings: SessionSettings,
    ) -> Result<Self, SessionError> {
        let raw = deps.dashboards.get_dashboard(lookup).await?;
        let dashboard = Dashboard::from_value(raw, &settings.rules)?;
        tracing::info!(dashboard_id = dashboard.id, widgets = dashboard.widgets.len(), "dashboard opened");

        let session = Self::new(dashboard, deps, settings);
        session.load_dashboard(false, &[]).await;
        Ok(session)
    }

    /// Replace the snapshot with a fresh copy from the server.
    pub async fn reload(&self, lookup: &DashboardLookup) -> Result<DashboardLoadReport, SessionError> {
        let raw = self.inner.deps.dashboards.get_dashboard(lookup).await?;
        let dashboard = prepare(Dashboard::from_value(raw, &self.inner.rules)?);
        *lock(&self.inner.grid) = grid_items(&dashboard.widgets);
        *lock(&self.inner.snapshot) = Arc::new(dashboard);
        lock(&self.inner.loads).clear();
        self.inner.edit.reset();
        self.sync_permissions();
        self.sync_auto_height();
        Ok(self.load_dashboard(false, &[]).await)
    }

    pub fn snapshot(&self) -> Arc<Dashboard> {
        lock(&self.inner.snapshot).clone()
    }

    fn mutate<T>(&self, change: impl FnOnce(&mut Dashboard) -> T) -> T {
        let mut snapshot = lock(&self.inner.snapshot);
        let mut next = Dashboard::clone(&snapshot);
        let result = change(&mut next);
        *snapshot = Arc::new(next);
        result
    }

    pub fn can_edit_dashboard(&self) -> bool {
        editable(&self.snapshot())
    }

    pub fn set_grid_disabled(&self, disabled: bool) {
        self.inner.grid_disabled.store(disabled, Ordering::SeqCst);
        self.sync_permissions();
    }

    fn sync_permissions(&self) {
        let can_edit = self.can_edit_dashboard() && !self.inner.grid_disabled.load(Ordering::SeqCst);
        self.inner.edit.set_can_edit(can_edit);
    }

    fn sync_auto_height(&self) {
        let snapshot = self.snapshot();
        lock(&self.inner.auto_height).update(&snapshot.widgets);
    }

    // ---- edit mode ----

    pub fn is_editing(&self) -> bool {
        self.inner.edit.is_editing()
    }

    pub fn set_editing(&self, editing: bool) -> EditTransition {
        self.inner.edit.set_editing(editing)
    }

    pub fn save_status(&self) -> SaveStatus {
        self.inner.edit.status()
    }

    pub fn subscribe_save_status(&self) -> tokio::sync::watch::Receiver<SaveStatus> {
        self.inner.edit.subscribe()
    }

    pub async fn retry_save_layout(&self) -> LayoutSaveReport {
        let widgets = self.snapshot().widgets.clone();
        let report = self.inner.edit.retry_save_layout(&widgets).await;
        self.apply_saved_widgets(&report.saved);
        report
    }

    // ---- loading ----

    pub fn widget_load(&self, id: WidgetId) -> Option<WidgetLoad> {
        lock(&self.inner.loads).get(&id).cloned()
    }

    pub fn filters(&self) -> Vec<Filter> {
        lock(&self.inner.filters).clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.refreshing.load(Ordering::SeqCst)
    }

    /// Run a widget's query. Query-result errors are expected and kept on
    /// the widget; anything else is returned. A non-forced call on a widget
    /// that is already loading waits for that load instead.
    pub async fn load_widget(&self, id: WidgetId, force: bool) -> Result<(), SessionError> {
        let snapshot = self.snapshot();
        let widget = snapshot.widget(id).ok_or(SessionError::UnknownWidget(id))?;
        if widget.kind() != WidgetKind::Visualization {
            return Ok(());
        }
        let Some(query) = widget.query().cloned() else {
            return Ok(());
        };

        let settled = self.inner.loads_settled.subscribe();
        let generation = {
            let mut loads = lock(&self.inner.loads);
            let load = loads.entry(id).or_default();
            if !force && load.loading {
                None
            } else if !force && load.data.is_some() {
                return Ok(());
            } else {
                load.generation += 1;
                load.loading = true;
                load.refresh_started_at = Some(Utc::now());
                Some(load.generation)
            }
        };
        let Some(generation) = generation else {
            self.wait_for_load(id, settled).await;
            return Ok(());
        };

        let parameters = {
            let dashboard_values = lock(&self.inner.parameter_values);
            let widget_values = lock(&self.inner.widget_values);
            let empty = HashMap::new();
            bind_parameter_values(
                widget.parameter_defs(),
                &widget_mappings(widget),
                &dashboard_values,
                widget_values.get(&id).unwrap_or(&empty),
            )
        };

        tracing::debug!(widget_id = %id, force, generation, "loading widget");
        let outcome = self
            .inner
            .deps
            .queries
            .run(LoadRequest {
                query,
                parameters,
                max_age: force.then_some(0),
            })
            .await;

        {
            let mut loads = lock(&self.inner.loads);
            let load = loads.entry(id).or_default();
            if load.generation == generation {
                load.loading = false;
                load.data = Some(match &outcome {
                    Ok(result) => LoadedData::Rows(result.clone()),
                    Err(err) => LoadedData::Error(err.to_string()),
                });
            } else {
                tracing::debug!(widget_id = %id, generation, "discarding stale widget result");
            }
        }
        self.inner.loads_settled.send_modify(|count| *count += 1);

        match outcome {
            Ok(_) => Ok(()),
            Err(err) if err.is_expected() => {
                tracing::debug!(widget_id = %id, error = %err, "widget query failed");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn wait_for_load(&self, id: WidgetId, mut settled: watch::Receiver<u64>) {
        loop {
            let loading = lock(&self.inner.loads).get(&id).is_some_and(|load| load.loading);
            if !loading || settled.changed().await.is_err() {
                return;
            }
        }
    }

    pub async fn refresh_widget(&self, id: WidgetId) -> Result<(), SessionError> {
        self.load_widget(id, true).await
    }

    /// Load the widgets affected by `changed` dashboard parameters (all of
    /// them when empty), then recompute dashboard filters. Individual
    /// failures are collected, not propagated.
    pub async fn load_dashboard(&self, force: bool, changed: &[String]) -> DashboardLoadReport {
        let snapshot = self.snapshot();
        let ids: Vec<WidgetId> = affected_widgets(&snapshot.widgets, changed)
            .into_iter()
            .filter_map(|widget| widget.id)
            .collect();

        let loads = ids.iter().map(|id| async move { (*id, self.load_widget(*id, force).await) });
        let mut report = DashboardLoadReport::default();
        for (id, result) in join_all(loads).await {
            match result {
                Ok(()) => report.loaded.push(id),
                Err(err) => {
                    tracing::warn!(widget_id = %id, error = %err, "widget failed to load");
                    report.failed.push((id, err.to_string()));
                }
            }
        }

        let filters = {
            let loads = lock(&self.inner.loads);
            let results: Vec<&QueryResult> = snapshot
                .widgets
                .iter()
                .filter_map(|widget| match loads.get(&widget.id?)?.data.as_ref()? {
                    LoadedData::Rows(result) => Some(result),
                    LoadedData::Error(_) => None,
                })
                .collect();
            collect_dashboard_filters(snapshot.dashboard_filters_enabled, results)
        };
        *lock(&self.inner.filters) = filters;
        report
    }

    /// Forced reload guarded by the shared refreshing flag; returns `None`
    /// when a refresh is already in flight.
    pub async fn refresh_dashboard(&self, changed: &[String]) -> Option<DashboardLoadReport> {
        if self
            .inner
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("refresh already in progress, skipping");
            return None;
        }
        let _guard = RefreshGuard(&self.inner.refreshing);
        Some(self.load_dashboard(true, changed).await)
    }

    // ---- parameters ----

    pub fn global_parameters(&self) -> Vec<DashboardParameter> {
        let snapshot = self.snapshot();
        let values = lock(&self.inner.parameter_values);
        let mut parameters = dashboard_parameters(
            &snapshot.widgets,
            snapshot.options.global_param_order.as_deref(),
        );
        for parameter in &mut parameters {
            if let Some(value) = values.get(&parameter.name) {
                parameter.value = value.clone();
            }
        }
        parameters
    }

    /// Apply dashboard-level values and refresh only the widgets they feed.
    pub async fn set_parameter_values(&self, values: HashMap<String, Value>) -> Option<DashboardLoadReport> {
        let changed: Vec<String> = {
            let mut current = lock(&self.inner.parameter_values);
            values
                .into_iter()
                .filter_map(|(name, value)| {
                    (current.get(&name) != Some(&value)).then(|| {
                        current.insert(name.clone(), value);
                        name
                    })
                })
                .collect()
        };
        if changed.is_empty() {
            return None;
        }
        self.refresh_dashboard(&changed).await
    }

    pub async fn set_widget_parameter_value(
        &self,
        id: WidgetId,
        name: &str,
        value: Value,
    ) -> Result<(), SessionError> {
        lock(&self.inner.widget_values)
            .entry(id)
            .or_default()
            .insert(name.to_string(), value);
        self.refresh_widget(id).await
    }

    /// Persist edited mappings, propagate titles to widgets sharing the
    /// same dashboard parameters, then refresh everything.
    pub async fn update_parameter_mappings(&self, id: WidgetId, mappings: Mappings) -> Result<(), SessionError> {
        let mut patch = Map::new();
        patch.insert("parameterMappings".into(), serde_json::to_value(&mappings)?);
        self.save_widget_options(id, patch).await?;

        let others: Vec<Widget> = self
            .snapshot()
            .widgets
            .iter()
            .filter(|widget| widget.id != Some(id))
            .cloned()
            .collect();
        for widget in synchronize_titles(&mappings, &others) {
            let Some(other) = widget.id else { continue };
            let mut patch = Map::new();
            patch.insert(
                "parameterMappings".into(),
                serde_json::to_value(&widget.options.parameter_mappings)?,
            );
            self.save_widget_options(other, patch).await?;
        }

        self.refresh_dashboard(&[]).await;
        Ok(())
    }

    // ---- widget options ----

    /// Save an options patch for one widget; unrelated option keys survive.
    pub async fn save_widget_options(&self, id: WidgetId, patch: Map<String, Value>) -> Result<Widget, SessionError> {
        let mut widget = self
            .snapshot()
            .widget(id)
            .cloned()
            .ok_or(SessionError::UnknownWidget(id))?;
        let payload = widget.save_payload(Some(&patch))?;
        let stored = self.inner.deps.widgets.save_widget(Some(id), payload.clone()).await?;
        widget.merge_remote(&payload, &self.inner.rules)?;
        widget.merge_remote(&stored, &self.inner.rules)?;
        widget.options.parameter_mappings = widget_mappings(&widget);

        self.apply_saved_widgets(std::slice::from_ref(&widget));
        Ok(widget)
    }

    pub async fn toggle_widget_header(&self, id: WidgetId) -> Result<Widget, SessionError> {
        let show_header = self
            .snapshot()
            .widget(id)
            .map(Widget::show_header)
            .ok_or(SessionError::UnknownWidget(id))?;
        let mut patch = Map::new();
        patch.insert("showHeader".into(), Value::Bool(!show_header));
        self.save_widget_options(id, patch).await
    }

    pub async fn set_widget_param_order(&self, id: WidgetId, order: Vec<String>) -> Result<Widget, SessionError> {
        let mut patch = Map::new();
        patch.insert("paramOrder".into(), serde_json::to_value(order)?);
        self.save_widget_options(id, patch).await
    }

    /// Drop a widget from the local collection. Deleting it from storage is
    /// a separate operation.
    pub fn remove_widget(&self, id: WidgetId) {
        self.mutate(|dashboard| {
            dashboard
                .widgets
                .retain(|widget| widget.id.is_some() && widget.id != Some(id))
        });
        lock(&self.inner.loads).remove(&id);
        lock(&self.inner.grid).retain(|item| item.i != id.key());
        self.sync_auto_height();
    }

    fn apply_saved_widgets(&self, saved: &[Widget]) {
        if saved.is_empty() {
            return;
        }
        self.mutate(|dashboard| {
            for widget in saved {
                let Some(id) = widget.id else { continue };
                if let Some(existing) = dashboard.widget_mut(id) {
                    *existing = widget.clone();
                }
            }
        });
        self.sync_auto_height();
    }

    // ---- dashboard updates ----

    /// Apply `update` locally at once, then persist it. On success only
    /// the saved keys are taken from the response. Conflicts are reported,
    /// never merged.
    pub async fn update_dashboard(&self, update: DashboardUpdate, include_version: bool) -> Result<(), SessionError> {
        let mut update = update;
        update.layout = update.layout.map(normalize_entries);
        let fields = update.fields()?;

        let (id, version) = {
            let snapshot = self.snapshot();
            (snapshot.id, snapshot.version)
        };
        self.mutate(|dashboard| dashboard.overlay(&fields))?;

        let mut payload = fields;
        payload.insert("id".into(), id.into());
        if include_version {
            payload.insert("version".into(), version.into());
        }

        match self.inner.deps.dashboards.save_dashboard(Value::Object(payload.clone())).await {
            Ok(saved) => {
                let returned: Map<String, Value> = payload
                    .keys()
                    .filter_map(|key| saved.get(key).map(|value| (key.clone(), value.clone())))
                    .collect();
                self.mutate(|dashboard| dashboard.overlay(&returned))?;
                if returned.contains_key("dashboard_filters_enabled") {
                    self.load_dashboard(false, &[]).await;
                }
                Ok(())
            }
            Err(err) => {
                match &err {
                    RemoteError::PermissionDenied => self.inner.deps.notifier.error(Notification::timed(
                        "Dashboard update failed",
                        "Permission Denied.",
                        Duration::from_millis(4500),
                    )),
                    RemoteError::Conflict => self.inner.deps.notifier.error(Notification::sticky(
                        "Dashboard Version Conflict",
                        "The dashboard has been modified by another user. Please reload the page to get the latest version.",
                    )),
                    other => tracing::warn!(dashboard_id = id, error = %other, "dashboard update failed"),
                }
                Err(err.into())
            }
        }
    }

    pub async fn toggle_published(&self) -> Result<(), SessionError> {
        let is_draft = self.snapshot().is_draft;
        self.update_dashboard(
            DashboardUpdate {
                is_draft: Some(!is_draft),
                ..Default::default()
            },
            false,
        )
        .await
    }

    pub async fn archive_dashboard(&self) -> Result<(), SessionError> {
        let id = self.snapshot().id;
        let archived = self.inner.deps.dashboards.archive_dashboard(id).await?;
        let mut fields = Map::new();
        if let Some(is_archived) = archived.get("is_archived") {
            fields.insert("is_archived".into(), is_archived.clone());
        }
        self.mutate(|dashboard| dashboard.overlay(&fields))?;
        self.sync_permissions();
        tracing::info!(dashboard_id = id, "dashboard archived");
        Ok(())
    }

    // ---- grid ----

    pub fn grid_layout(&self) -> Vec<GridItem> {
        lock(&self.inner.grid).clone()
    }

    pub fn auto_height_enabled(&self, id: WidgetId) -> bool {
        lock(&self.inner.auto_height).exists(id)
    }

    pub fn set_viewport_width(&self, width: u32) -> Breakpoint {
        let breakpoint = Breakpoint::for_width(width, self.inner.rules.grid.mobile_breakpoint);
        *lock(&self.inner.breakpoint) = breakpoint;
        breakpoint
    }

    /// Reconcile a layout emitted by the grid (mapping or sequence form)
    /// back into widget positions and the dashboard layout.
    pub async fn handle_layout_change(&self, layout: &Value) -> LayoutOutcome {
        if *lock(&self.inner.breakpoint) == Breakpoint::SingleColumn {
            return LayoutOutcome::Ignored;
        }
        self.apply_layout(normalize(layout)).await
    }

    async fn apply_layout(&self, entries: Vec<LayoutEntry>) -> LayoutOutcome {
        {
            let mut grid = lock(&self.inner.grid);
            for item in grid.iter_mut() {
                if let Some(entry) = entries.iter().find(|entry| entry.i == item.i) {
                    item.x = entry.x;
                    item.y = entry.y;
                    item.w = entry.w;
                    item.h = entry.h;
                }
            }
        }

        let positions = {
            let auto_height = lock(&self.inner.auto_height);
            positions_from_layout(&entries, |id| auto_height.exists(id))
        };

        if has_position_changes(&entries, &self.snapshot().layout) {
            let session = self.clone();
            let layout = entries.clone();
            self.inner.layout_debouncer.schedule(async move {
                let update = DashboardUpdate {
                    layout: Some(layout),
                    ..Default::default()
                };
                if let Err(err) = session.update_dashboard(update, true).await {
                    tracing::warn!(error = %err, "failed to save dashboard layout");
                }
            });
        }

        if self.inner.edit.is_editing() {
            let current = self.clone();
            let settled = self.clone();
            self.inner.edit.save_layout_debounced(
                positions,
                move || current.snapshot().widgets.clone(),
                move |report| settled.apply_saved_widgets(&report.saved),
            );
            LayoutOutcome::Scheduled
        } else {
            let widgets = self.snapshot().widgets.clone();
            let report = self.inner.edit.save_layout(&widgets, &positions).await;
            self.apply_saved_widgets(&report.saved);
            LayoutOutcome::Saved(report)
        }
    }

    pub fn on_resize_start(&self) {
        lock(&self.inner.auto_height).stop();
    }

    /// A manual height change takes the widget out of auto-height.
    pub fn on_resize_stop(&self, id: WidgetId, old_rows: i32, new_rows: i32) {
        let mut auto_height = lock(&self.inner.auto_height);
        if old_rows != new_rows {
            auto_height.remove(id);
        }
        auto_height.resume();
    }

    /// Content of an auto-height widget was measured at `pixel_height`.
    pub async fn on_widget_measured(&self, id: WidgetId, pixel_height: u32) -> Option<LayoutOutcome> {
        lock(&self.inner.auto_height).on_measured(id, pixel_height);
        let updates: Vec<HeightUpdate> = std::mem::take(&mut *lock(&self.inner.height_updates));
        if updates.is_empty() {
            return None;
        }

        let entries: Vec<LayoutEntry> = {
            let grid = lock(&self.inner.grid);
            grid.iter()
                .map(|item| {
                    let mut entry = LayoutEntry::from(item);
                    if let Some(update) = updates.iter().rev().find(|u| u.widget_id.key() == entry.i) {
                        entry.h = update.rows;
                    }
                    entry
                })
                .collect()
        };
        Some(self.apply_layout(normalize_entries(entries)).await)
    }
}

fn editable(dashboard: &Dashboard) -> bool {
    !dashboard.is_archived && dashboard.can_edit
}

/// Resolve every widget's mappings and seed an empty layout from widget
/// positions.
fn prepare(mut dashboard: Dashboard) -> Dashboard {
    for widget in &mut dashboard.widgets {
        widget.options.parameter_mappings = widget_mappings(widget);
    }
    if dashboard.layout.is_empty() {
        dashboard.layout = dashboard.layout_from_widgets();
    }
    dashboard
}

fn grid_items(widgets: &[Widget]) -> Vec<GridItem> {
    widgets
        .iter()
        .filter_map(|widget| Some(GridItem::from_widget(widget.id?, widget.position())))
        .collect()
}
