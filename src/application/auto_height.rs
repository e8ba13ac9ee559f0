// Auto-height controller - content-driven widget heights
use crate::domain::position::WidgetId;
use crate::domain::sizing::SizingRules;
use crate::domain::widget::Widget;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeightUpdate {
    pub widget_id: WidgetId,
    pub pixel_height: u32,
    pub rows: i32,
}

pub type HeightCallback = Box<dyn Fn(HeightUpdate) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tracking {
    /// Auto-height enabled, no measurement yet.
    Tracked,
    Measured(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerMode {
    Active,
    /// Suspended for the duration of a manual resize.
    Stopped,
}

pub struct AutoHeightController {
    rules: SizingRules,
    widgets: HashMap<WidgetId, Tracking>,
    mode: ControllerMode,
    on_height: HeightCallback,
}

impl AutoHeightController {
    pub fn new(rules: SizingRules, on_height: HeightCallback) -> Self {
        Self {
            rules,
            widgets: HashMap::new(),
            mode: ControllerMode::Active,
            on_height,
        }
    }

    /// Track exactly the widgets whose position declares auto-height.
    pub fn update(&mut self, widgets: &[Widget]) {
        let previous = std::mem::take(&mut self.widgets);
        self.widgets = widgets
            .iter()
            .filter(|widget| widget.position().auto_height)
            .filter_map(|widget| widget.id)
            .map(|id| (id, previous.get(&id).copied().unwrap_or(Tracking::Tracked)))
            .collect();
    }

    pub fn on_measured(&mut self, widget_id: WidgetId, pixel_height: u32) {
        if self.mode == ControllerMode::Stopped {
            tracing::trace!(widget_id = %widget_id, "auto-height stopped, ignoring measurement");
            return;
        }
        let Some(tracking) = self.widgets.get_mut(&widget_id) else {
            return;
        };
        if *tracking == Tracking::Measured(pixel_height) {
            return;
        }
        *tracking = Tracking::Measured(pixel_height);

        let rows = self.rules.rows_for_height(pixel_height);
        tracing::debug!(widget_id = %widget_id, pixel_height, rows, "auto-height measured");
        (self.on_height)(HeightUpdate {
            widget_id,
            pixel_height,
            rows,
        });
    }

    pub fn stop(&mut self) {
        self.mode = ControllerMode::Stopped;
    }

    pub fn resume(&mut self) {
        self.mode = ControllerMode::Active;
    }

    /// Drop a widget after the user resized its height by hand.
    pub fn remove(&mut self, widget_id: WidgetId) {
        self.widgets.remove(&widget_id);
    }

    pub fn exists(&self, widget_id: WidgetId) -> bool {
        self.widgets.contains_key(&widget_id)
    }

    pub fn mode(&self) -> ControllerMode {
        self.mode
    }

    pub fn measured_height(&self, widget_id: WidgetId) -> Option<u32> {
        match self.widgets.get(&widget_id) {
            Some(Tracking::Measured(height)) => Some(*height),
            _ => None,
        }
    }
}
