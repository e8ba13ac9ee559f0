// Edit-mode persistence coordinator - debounced, conflict-aware layout saves
use super::debounce::Debouncer;
use super::lock;
use super::ports::{LocationService, Notification, Notifier};
use super::remote::{RemoteError, WidgetRemote};
use crate::domain::position::{GridPosition, WidgetId};
use crate::domain::sizing::SizingRules;
use crate::domain::widget::Widget;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

pub type Positions = BTreeMap<WidgetId, GridPosition>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    #[default]
    Saved,
    Saving,
    SavingFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTransition {
    Entered,
    Left,
    /// Leaving was requested while a save is pending; it happens when the
    /// save settles.
    Deferred,
    Denied,
    Unchanged,
}

#[derive(Debug, Default)]
pub struct LayoutSaveReport {
    /// Widgets as stored by the server, to be merged into the snapshot.
    pub saved: Vec<Widget>,
    pub failed: Vec<WidgetId>,
    pub status: SaveStatus,
}

struct EditState {
    can_edit: bool,
    editing: bool,
    exit_requested: bool,
    /// Save batches started and not yet settled.
    in_flight: usize,
    recent_positions: Positions,
}

pub struct EditModeCoordinator {
    state: Mutex<EditState>,
    status: watch::Sender<SaveStatus>,
    debouncer: Debouncer,
    widgets: Arc<dyn WidgetRemote>,
    location: Arc<dyn LocationService>,
    notifier: Arc<dyn Notifier>,
    rules: SizingRules,
}

impl EditModeCoordinator {
    pub fn new(
        can_edit: bool,
        widgets: Arc<dyn WidgetRemote>,
        location: Arc<dyn LocationService>,
        notifier: Arc<dyn Notifier>,
        rules: SizingRules,
        debounce_window: Duration,
    ) -> Self {
        let editing = can_edit && location.edit_flag();
        let (status, _) = watch::channel(SaveStatus::Saved);
        Self {
            state: Mutex::new(EditState {
                can_edit,
                editing,
                exit_requested: false,
                in_flight: 0,
                recent_positions: Positions::new(),
            }),
            status,
            debouncer: Debouncer::new(debounce_window),
            widgets,
            location,
            notifier,
            rules,
        }
    }

    pub fn is_editing(&self) -> bool {
        let state = lock(&self.state);
        state.can_edit && state.editing
    }

    pub fn can_edit(&self) -> bool {
        lock(&self.state).can_edit
    }

    pub fn exit_requested(&self) -> bool {
        lock(&self.state).exit_requested
    }

    pub fn status(&self) -> SaveStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.status.subscribe()
    }

    pub fn set_can_edit(&self, can_edit: bool) {
        let mut state = lock(&self.state);
        state.can_edit = can_edit;
        if !can_edit && state.editing {
            state.editing = false;
            self.location.set_edit_flag(false);
        }
    }

    pub fn set_editing(&self, editing: bool) -> EditTransition {
        let mut state = lock(&self.state);
        if !editing && self.status() != SaveStatus::Saved {
            tracing::debug!(status = ?self.status(), "leaving edit mode deferred until save settles");
            state.exit_requested = true;
            return EditTransition::Deferred;
        }
        if editing && !state.can_edit {
            return EditTransition::Denied;
        }

        state.exit_requested = false;
        if state.editing == editing {
            return EditTransition::Unchanged;
        }
        state.editing = editing;
        self.location.set_edit_flag(editing);
        if editing {
            EditTransition::Entered
        } else {
            EditTransition::Left
        }
    }

    /// Forget session state after the dashboard was (re)loaded.
    pub fn reset(&self) {
        self.debouncer.cancel();
        let mut state = lock(&self.state);
        state.exit_requested = false;
        state.recent_positions.clear();
        drop(state);
        self.status.send_replace(SaveStatus::Saved);
    }

    /// Persist the positions that differ from the widgets' current ones.
    pub async fn save_layout(&self, widgets: &[Widget], positions: &Positions) -> LayoutSaveReport {
        if !self.can_edit() {
            self.settle(SaveStatus::Saved);
            return LayoutSaveReport::default();
        }

        let changed = changed_positions(widgets, positions);
        if changed.is_empty() {
            tracing::debug!("layout unchanged, nothing to save");
            self.settle(SaveStatus::Saved);
            return LayoutSaveReport::default();
        }

        self.status.send_replace(SaveStatus::Saving);
        {
            let mut state = lock(&self.state);
            state.in_flight += 1;
            state.recent_positions = positions.clone();
        }
        tracing::info!(widgets = changed.len(), "saving dashboard layout");

        let saves = changed
            .into_iter()
            .map(|(widget, position)| self.save_position(widget, position));
        let results = join_all(saves).await;

        let mut report = LayoutSaveReport::default();
        let mut conflict = false;
        let mut failed = false;
        for result in results {
            match result {
                Ok(widget) => report.saved.push(widget),
                Err((id, err)) => {
                    tracing::error!(widget_id = %id, error = %err, "failed to save widget position");
                    conflict |= err.is_conflict();
                    failed = true;
                    report.failed.push(id);
                }
            }
        }

        let status = if failed {
            let notification = if conflict {
                Notification::sticky(
                    "Version Conflict",
                    "The dashboard layout has been modified. Please try saving again.",
                )
            } else {
                Notification::sticky(
                    "Error Saving Layout",
                    "There was a problem saving the dashboard layout. Please try again.",
                )
            };
            self.notifier.error(notification);
            SaveStatus::SavingFailed
        } else {
            SaveStatus::Saved
        };
        {
            let mut state = lock(&self.state);
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.settle(status);
        report.status = status;
        report
    }

    /// Coalesce layout saves during a drag or resize. The status turns to
    /// `saving` right away; only the last call in the window is executed,
    /// against the widgets `current` returns at that point.
    pub fn save_layout_debounced<C, F>(self: &Arc<Self>, positions: Positions, current: C, on_settled: F)
    where
        C: FnOnce() -> Vec<Widget> + Send + 'static,
        F: FnOnce(LayoutSaveReport) + Send + 'static,
    {
        self.status.send_replace(SaveStatus::Saving);
        let coordinator = Arc::clone(self);
        self.debouncer.schedule(async move {
            let widgets = current();
            let report = coordinator.save_layout(&widgets, &positions).await;
            on_settled(report);
        });
    }

    /// Replay the last attempted position set.
    pub async fn retry_save_layout(&self, widgets: &[Widget]) -> LayoutSaveReport {
        let positions = lock(&self.state).recent_positions.clone();
        self.save_layout(widgets, &positions).await
    }

    async fn save_position(&self, widget: Widget, position: GridPosition) -> Result<Widget, (WidgetId, RemoteError)> {
        let Some(id) = widget.id else {
            return Ok(widget);
        };

        let mut local = widget;
        local.options.position.apply(&position);
        match self.push(&mut local).await {
            Err(err) if err.is_conflict() => {
                tracing::warn!(widget_id = %id, "version conflict, refreshing widget and retrying");
                let fresh = self.widgets.get_widget(id).await.map_err(|err| (id, err))?;
                local
                    .merge_remote(&fresh, &self.rules)
                    .map_err(|err| (id, RemoteError::Transport(err.into())))?;
                local.options.position.apply(&position);
                self.push(&mut local).await.map_err(|err| (id, err))?;
                Ok(local)
            }
            Err(err) => Err((id, err)),
            Ok(()) => Ok(local),
        }
    }

    async fn push(&self, widget: &mut Widget) -> Result<(), RemoteError> {
        let payload = widget
            .save_payload(None)
            .map_err(|err| RemoteError::Transport(err.into()))?;
        let stored = self.widgets.save_widget(widget.id, payload).await?;
        widget
            .merge_remote(&stored, &self.rules)
            .map_err(|err| RemoteError::Transport(err.into()))
    }

    /// Publish the outcome of a batch, unless another batch is still in
    /// flight or a debounced save is waiting to run: the status then stays
    /// `saving` and a deferred exit waits for the last one.
    fn settle(&self, status: SaveStatus) {
        let mut state = lock(&self.state);
        if state.in_flight > 0 || self.debouncer.is_pending() {
            tracing::debug!(?status, in_flight = state.in_flight, "save settled, more saves outstanding");
            return;
        }
        self.status.send_replace(status);
        if state.exit_requested {
            state.exit_requested = false;
            if state.editing {
                state.editing = false;
                self.location.set_edit_flag(false);
                tracing::debug!(?status, "left edit mode after save settled");
            }
        }
    }
}

/// Positions that actually moved or resized an existing widget. Positions
/// for widgets no longer present are ignored.
pub fn changed_positions(widgets: &[Widget], positions: &Positions) -> Vec<(Widget, GridPosition)> {
    positions
        .iter()
        .filter_map(|(id, position)| {
            let widget = widgets.iter().find(|w| w.id == Some(*id))?;
            widget
                .position()
                .differs_from(position)
                .then(|| (widget.clone(), *position))
        })
        .collect()
}
