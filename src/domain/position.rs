// Grid position domain model
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetId(pub i64);

impl WidgetId {
    /// Parse the string key the grid uses for a widget (`"42"`).
    pub fn parse(key: &str) -> Option<Self> {
        key.trim().parse().ok().map(WidgetId)
    }

    pub fn key(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted placement of a widget, in the widget's own vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetPosition {
    pub col: i32,
    pub row: i32,
    pub size_x: i32,
    pub size_y: i32,
    pub min_size_x: i32,
    pub max_size_x: i32,
    pub min_size_y: i32,
    pub max_size_y: i32,
    #[serde(default)]
    pub auto_height: bool,
}

impl Default for WidgetPosition {
    fn default() -> Self {
        Self {
            col: 0,
            row: 0,
            size_x: 3,
            size_y: 3,
            min_size_x: 1,
            max_size_x: 6,
            min_size_y: 1,
            max_size_y: 1000,
            auto_height: false,
        }
    }
}

impl WidgetPosition {
    /// Field-wise comparison of the rectangle only; constraints and
    /// `autoHeight` do not count as a layout change.
    pub fn differs_from(&self, next: &GridPosition) -> bool {
        self.col != next.col
            || self.row != next.row
            || self.size_x != next.size_x
            || self.size_y != next.size_y
    }

    pub fn apply(&mut self, next: &GridPosition) {
        self.col = next.col;
        self.row = next.row;
        self.size_x = next.size_x;
        self.size_y = next.size_y;
        self.auto_height = next.auto_height;
    }

    pub fn to_grid(&self) -> GridPosition {
        GridPosition {
            col: self.col,
            row: self.row,
            size_x: self.size_x,
            size_y: self.size_y,
            auto_height: self.auto_height,
        }
    }
}

/// The subset of a persisted position that a widget payload may carry.
/// Constraint fields are always recomputed from sizing rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedPosition {
    pub col: Option<i32>,
    pub row: Option<i32>,
    pub size_x: Option<i32>,
    pub size_y: Option<i32>,
    pub auto_height: Option<bool>,
}

/// Position update emitted by the grid for one widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPosition {
    pub col: i32,
    pub row: i32,
    pub size_x: i32,
    pub size_y: i32,
    #[serde(default)]
    pub auto_height: bool,
}

/// Canonical rectangle used for layout comparison, in the grid's vocabulary.
///
/// Field order matters: the derived `Ord` sorts by `i` first, which is the
/// canonical order of a normalized layout.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LayoutEntry {
    pub i: String,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl LayoutEntry {
    pub fn from_grid(id: WidgetId, position: &GridPosition) -> Self {
        Self {
            i: id.key(),
            x: position.col,
            y: position.row,
            w: position.size_x,
            h: position.size_y,
        }
    }

    pub fn widget_id(&self) -> Option<WidgetId> {
        WidgetId::parse(&self.i)
    }

    pub fn to_grid(&self, auto_height: bool) -> GridPosition {
        GridPosition {
            col: self.x,
            row: self.y,
            size_x: self.w,
            size_y: self.h,
            auto_height,
        }
    }
}

/// Grid item as the grid view holds it: a layout entry plus resize
/// constraints. The constraints are decoration and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridItem {
    pub i: String,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    pub min_w: i32,
    pub max_w: i32,
    pub min_h: i32,
    pub max_h: i32,
}

impl GridItem {
    pub fn from_widget(id: WidgetId, position: &WidgetPosition) -> Self {
        Self {
            i: id.key(),
            x: position.col,
            y: position.row,
            w: position.size_x,
            h: position.size_y,
            min_w: position.min_size_x,
            max_w: position.max_size_x,
            min_h: position.min_size_y,
            max_h: position.max_size_y,
        }
    }
}

impl From<&GridItem> for LayoutEntry {
    fn from(item: &GridItem) -> Self {
        Self {
            i: item.i.clone(),
            x: item.x,
            y: item.y,
            w: item.w,
            h: item.h,
        }
    }
}

/// Responsive breakpoint of the grid. Only the multi-column layout is ever
/// persisted; the single-column variant is derived for narrow screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breakpoint {
    SingleColumn,
    MultiColumn,
}

impl Breakpoint {
    pub fn for_width(width: u32, mobile_breakpoint: u32) -> Self {
        if width <= mobile_breakpoint {
            Breakpoint::SingleColumn
        } else {
            Breakpoint::MultiColumn
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widget_id_parse() {
        assert_eq!(WidgetId::parse("42"), Some(WidgetId(42)));
        assert_eq!(WidgetId::parse("abc"), None);
        assert_eq!(WidgetId(7).key(), "7");
    }

    #[test]
    fn test_grid_and_widget_vocabularies_round_trip() {
        let grid = GridPosition {
            col: 2,
            row: 5,
            size_x: 3,
            size_y: 8,
            auto_height: false,
        };
        let entry = LayoutEntry::from_grid(WidgetId(9), &grid);
        assert_eq!((entry.x, entry.y, entry.w, entry.h), (2, 5, 3, 8));
        assert_eq!(entry.to_grid(false), grid);
    }

    #[test]
    fn test_differs_from_ignores_auto_height() {
        let position = WidgetPosition::default();
        let mut next = position.to_grid();
        next.auto_height = true;
        assert!(!position.differs_from(&next));

        next.row = 4;
        assert!(position.differs_from(&next));
    }

    #[test]
    fn test_breakpoint_for_width() {
        assert_eq!(Breakpoint::for_width(800, 800), Breakpoint::SingleColumn);
        assert_eq!(Breakpoint::for_width(1280, 800), Breakpoint::MultiColumn);
    }
}
