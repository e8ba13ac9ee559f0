// Grid geometry and per-visualization sizing rules
use super::position::{PersistedPosition, WidgetPosition};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GridOptions {
    pub columns: i32,
    /// Row pitch in pixels, including the vertical margin.
    pub row_height: i32,
    pub margins: i32,
    pub mobile_breakpoint: u32,
    pub default_size_x: i32,
    pub default_size_y: i32,
    pub min_size_x: i32,
    pub max_size_x: i32,
    pub min_size_y: i32,
    pub max_size_y: i32,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            columns: 6,
            row_height: 50,
            margins: 15,
            mobile_breakpoint: 800,
            default_size_x: 3,
            default_size_y: 3,
            min_size_x: 1,
            max_size_x: 6,
            min_size_y: 1,
            max_size_y: 1000,
        }
    }
}

/// Sizing hints a visualization type registers for itself.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisualizationSizing {
    pub auto_height: Option<bool>,
    pub min_columns: Option<i32>,
    pub max_columns: Option<i32>,
    /// Legacy minimum height in pixels; `min_rows` wins when both are set.
    pub height: Option<i32>,
    pub min_rows: Option<i32>,
    pub max_rows: Option<i32>,
    pub default_columns: Option<i32>,
    pub default_rows: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct SizingRules {
    pub grid: GridOptions,
    pub visualizations: HashMap<String, VisualizationSizing>,
}

impl SizingRules {
    pub fn new(grid: GridOptions, visualizations: HashMap<String, VisualizationSizing>) -> Self {
        Self {
            grid,
            visualizations,
        }
    }

    /// Default position options for a widget showing `visualization_type`.
    pub fn defaults_for(&self, visualization_type: Option<&str>) -> WidgetPosition {
        let grid = &self.grid;
        let mut position = WidgetPosition {
            col: 0,
            row: 0,
            size_x: (grid.columns + 1) / 2,
            size_y: grid.default_size_y,
            min_size_x: grid.min_size_x,
            max_size_x: grid.max_size_x,
            min_size_y: grid.min_size_y,
            max_size_y: grid.max_size_y,
            auto_height: false,
        };

        let Some(sizing) = visualization_type.and_then(|kind| self.visualizations.get(kind)) else {
            return position;
        };

        if let Some(auto_height) = sizing.auto_height {
            position.auto_height = auto_height;
        }
        if let Some(min_columns) = sizing.min_columns.filter(|n| *n >= 0) {
            position.min_size_x = min_columns;
        }
        if let Some(max_columns) = sizing.max_columns.filter(|n| *n >= 0) {
            position.max_size_x = max_columns.min(grid.columns);
        }
        if let Some(height) = sizing.height {
            position.min_size_y = ceil_div(height, grid.row_height);
        }
        if let Some(min_rows) = sizing.min_rows {
            position.min_size_y = min_rows;
        }
        if let Some(max_rows) = sizing.max_rows.filter(|n| *n >= 0) {
            position.max_size_y = max_rows;
        }
        if let Some(columns) = sizing.default_columns.filter(|n| *n > 0) {
            position.size_x = columns;
        }
        if let Some(rows) = sizing.default_rows.filter(|n| *n > 0) {
            position.size_y = rows;
        }

        position
    }

    /// Defaults overlaid with whatever the persisted position carries.
    /// A negative `sizeY` marks a legacy auto-height widget.
    pub fn position_for(
        &self,
        visualization_type: Option<&str>,
        persisted: &PersistedPosition,
    ) -> WidgetPosition {
        let mut position = self.defaults_for(visualization_type);
        if let Some(col) = persisted.col {
            position.col = col;
        }
        if let Some(row) = persisted.row {
            position.row = row;
        }
        if let Some(size_x) = persisted.size_x {
            position.size_x = size_x;
        }
        if let Some(size_y) = persisted.size_y {
            position.size_y = size_y;
        }
        if let Some(auto_height) = persisted.auto_height {
            position.auto_height = auto_height;
        }
        if position.size_y < 0 {
            position.auto_height = true;
        }
        position
    }

    /// Rows needed to show `pixel_height` of content.
    pub fn rows_for_height(&self, pixel_height: u32) -> i32 {
        let pixels = i64::from(pixel_height) + i64::from(self.grid.margins);
        let row_height = i64::from(self.grid.row_height.max(1));
        let rows = (pixels + row_height - 1) / row_height;
        i32::try_from(rows).unwrap_or(i32::MAX)
    }
}

fn ceil_div(value: i32, divisor: i32) -> i32 {
    let divisor = divisor.max(1);
    (value + divisor - 1).div_euclid(divisor)
}
