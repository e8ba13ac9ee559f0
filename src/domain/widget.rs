// Widget domain model
use super::position::{PersistedPosition, WidgetId, WidgetPosition};
use super::sizing::SizingRules;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MappingType {
    DashboardLevel,
    WidgetLevel,
    StaticValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterMapping {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MappingType,
    pub map_to: String,
    #[serde(default)]
    pub value: Value,
    /// Empty means "use the parameter's own title".
    #[serde(default)]
    pub title: String,
}

/// Parameter declared by a widget's query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Legacy flag: global parameters map to the dashboard by default.
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_safe: bool,
    #[serde(default)]
    pub options: QueryOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    pub query: Query,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetOptions {
    #[serde(default)]
    pub position: WidgetPosition,
    #[serde(default)]
    pub parameter_mappings: BTreeMap<String, ParameterMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_header: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param_order: Option<Vec<String>>,
    /// Option keys this engine does not interpret, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What a widget shows; decides how it is rendered and whether it loads data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    Visualization,
    Textbox,
    Restricted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<WidgetId>,
    #[serde(default)]
    pub version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization: Option<Visualization>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub restricted: bool,
    #[serde(default)]
    pub options: WidgetOptions,
}

impl Widget {
    /// Build a widget from its remote representation, filling position
    /// defaults from the sizing rules. Only `col, row, sizeX, sizeY,
    /// autoHeight` of the stored position are honoured.
    pub fn from_value(value: Value, rules: &SizingRules) -> Result<Self, serde_json::Error> {
        let persisted: PersistedPosition = value
            .pointer("/options/position")
            .filter(|position| position.is_object())
            .map(|position| serde_json::from_value(position.clone()))
            .transpose()?
            .unwrap_or_default();

        let mut value = value;
        if let Some(options) = value.get_mut("options").and_then(Value::as_object_mut) {
            options.remove("position");
        }

        let mut widget: Widget = serde_json::from_value(value)?;
        let kind = widget.visualization.as_ref().map(|v| v.kind.as_str());
        widget.options.position = rules.position_for(kind, &persisted);
        Ok(widget)
    }

    /// Overlay fields returned by the server onto this widget.
    pub fn merge_remote(&mut self, fields: &Value, rules: &SizingRules) -> Result<(), serde_json::Error> {
        let Some(fields) = fields.as_object() else {
            return Ok(());
        };
        let mut current = serde_json::to_value(&*self)?;
        if let Some(current) = current.as_object_mut() {
            for (key, value) in fields {
                current.insert(key.clone(), value.clone());
            }
        }
        *self = Widget::from_value(current, rules)?;
        Ok(())
    }

    pub fn kind(&self) -> WidgetKind {
        if self.visualization.is_some() {
            WidgetKind::Visualization
        } else if self.restricted {
            WidgetKind::Restricted
        } else {
            WidgetKind::Textbox
        }
    }

    pub fn query(&self) -> Option<&Query> {
        self.visualization.as_ref().map(|v| &v.query)
    }

    pub fn parameter_defs(&self) -> &[ParameterDef] {
        self.query()
            .map(|query| query.options.parameters.as_slice())
            .unwrap_or(&[])
    }

    pub fn name(&self) -> String {
        match &self.visualization {
            Some(visualization) => format!("{} ({})", visualization.query.name, visualization.name),
            None => self.text.clone(),
        }
    }

    pub fn position(&self) -> &WidgetPosition {
        &self.options.position
    }

    pub fn show_header(&self) -> bool {
        self.options.show_header.unwrap_or(true)
    }

    /// Body of a widget save. `options_patch` is shallow-merged into the
    /// current options so unrelated keys survive.
    pub fn save_payload(&self, options_patch: Option<&Map<String, Value>>) -> Result<Value, serde_json::Error> {
        let mut options = serde_json::to_value(&self.options)?;
        if let (Some(options), Some(patch)) = (options.as_object_mut(), options_patch) {
            for (key, value) in patch {
                options.insert(key.clone(), value.clone());
            }
        }

        let mut payload = Map::new();
        if let Some(id) = self.id {
            payload.insert("id".into(), serde_json::to_value(id)?);
        }
        payload.insert("version".into(), self.version.into());
        payload.insert("options".into(), options);
        payload.insert("text".into(), self.text.clone().into());
        // the backend still expects a width
        payload.insert("width".into(), 1.into());
        if let Some(dashboard_id) = self.dashboard_id {
            payload.insert("dashboard_id".into(), dashboard_id.into());
        }
        if let Some(visualization) = &self.visualization {
            payload.insert("visualization_id".into(), visualization.id.into());
        }
        Ok(Value::Object(payload))
    }
}

#[cfg(test)]
pub(crate) fn widget_fixture(id: i64, value: Value) -> Widget {
    let mut base = serde_json::json!({ "id": id, "version": 1 });
    if let (Some(base), Some(extra)) = (base.as_object_mut(), value.as_object()) {
        for (key, value) in extra {
            base.insert(key.clone(), value.clone());
        }
    }
    Widget::from_value(base, &SizingRules::default()).expect("valid widget fixture")
}
