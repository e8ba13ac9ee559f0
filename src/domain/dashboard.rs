// Dashboard domain model
use super::layout::{deserialize_layout, normalize_entries};
use super::position::{LayoutEntry, WidgetId};
use super::sizing::SizingRules;
use super::widget::Widget;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_param_order: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub id: i64,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
    pub version: i64,
    #[serde(default)]
    pub widgets: Vec<Widget>,
    #[serde(default, deserialize_with = "deserialize_layout")]
    pub layout: Vec<LayoutEntry>,
    #[serde(default)]
    pub dashboard_filters_enabled: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub options: DashboardOptions,
}

impl Dashboard {
    pub fn from_value(value: Value, rules: &SizingRules) -> Result<Self, serde_json::Error> {
        let mut value = value;
        let raw_widgets = value
            .as_object_mut()
            .and_then(|fields| fields.remove("widgets"))
            .and_then(|widgets| match widgets {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .unwrap_or_default();

        let mut dashboard: Dashboard = serde_json::from_value(value)?;
        dashboard.widgets = raw_widgets
            .into_iter()
            .map(|widget| Widget::from_value(widget, rules))
            .collect::<Result<_, _>>()?;
        Ok(dashboard)
    }

    /// Overlay top-level fields onto the dashboard. Widgets are never
    /// touched by an overlay.
    pub fn overlay(&mut self, fields: &Map<String, Value>) -> Result<(), serde_json::Error> {
        let widgets = std::mem::take(&mut self.widgets);
        let mut current = match serde_json::to_value(&*self) {
            Ok(current) => current,
            Err(err) => {
                self.widgets = widgets;
                return Err(err);
            }
        };
        if let Some(current) = current.as_object_mut() {
            for (key, value) in fields {
                if key != "widgets" {
                    current.insert(key.clone(), value.clone());
                }
            }
        }
        let merged: Result<Dashboard, _> = serde_json::from_value(current);
        match merged {
            Ok(mut merged) => {
                merged.widgets = widgets;
                *self = merged;
                Ok(())
            }
            Err(err) => {
                self.widgets = widgets;
                Err(err)
            }
        }
    }

    pub fn widget(&self, id: WidgetId) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.id == Some(id))
    }

    pub fn widget_mut(&mut self, id: WidgetId) -> Option<&mut Widget> {
        self.widgets.iter_mut().find(|w| w.id == Some(id))
    }

    /// Layout derived from the persisted widget positions.
    pub fn layout_from_widgets(&self) -> Vec<LayoutEntry> {
        normalize_entries(self.widgets.iter().filter_map(|widget| {
            let id = widget.id?;
            Some(LayoutEntry::from_grid(id, &widget.position().to_grid()))
        }))
    }

    pub fn background_color(&self) -> &str {
        self.options.background_color.as_deref().unwrap_or("#ffffff")
    }
}

/// Partial dashboard update. Only the fields that are set are sent and,
/// after a successful save, only those fields are taken from the response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<Vec<LayoutEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard_filters_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_draft: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<DashboardOptions>,
}

impl DashboardUpdate {
    pub fn fields(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            _ => Ok(Map::new()),
        }
    }
}
