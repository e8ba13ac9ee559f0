// Parameter mapping resolution and propagation
use super::position::WidgetId;
use super::widget::{MappingType, ParameterDef, ParameterMapping, Widget};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

pub type Mappings = BTreeMap<String, ParameterMapping>;

/// Complete the mappings for a widget's query parameters.
///
/// Unmapped parameters get a default mapping to a same-named upstream
/// parameter (dashboard-level for legacy global parameters, widget-level
/// otherwise). Mappings for parameters the query no longer declares are
/// pruned. Existing mappings are kept as they are.
pub fn resolve_mappings(defs: &[ParameterDef], existing: &Mappings) -> Mappings {
    defs.iter()
        .map(|def| {
            let mapping = existing
                .get(&def.name)
                .cloned()
                .unwrap_or_else(|| default_mapping(def));
            (def.name.clone(), mapping)
        })
        .collect()
}

fn default_mapping(def: &ParameterDef) -> ParameterMapping {
    ParameterMapping {
        name: def.name.clone(),
        kind: if def.global {
            MappingType::DashboardLevel
        } else {
            MappingType::WidgetLevel
        },
        map_to: def.name.clone(),
        value: Value::Null,
        title: String::new(),
    }
}

/// Resolved mappings of a widget; textboxes resolve to nothing.
pub fn widget_mappings(widget: &Widget) -> Mappings {
    resolve_mappings(widget.parameter_defs(), &widget.options.parameter_mappings)
}

/// Widgets that must reload when `changed` dashboard parameters change.
/// An empty change set means a full refresh.
pub fn affected_widgets<'a>(widgets: &'a [Widget], changed: &[String]) -> Vec<&'a Widget> {
    if changed.is_empty() {
        return widgets.iter().collect();
    }

    widgets
        .iter()
        .filter(|widget| {
            widget_mappings(widget).values().any(|mapping| {
                mapping.kind == MappingType::DashboardLevel && changed.contains(&mapping.map_to)
            })
        })
        .collect()
}

/// A dashboard-level parameter and the widget parameters feeding from it.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardParameter {
    pub name: String,
    pub title: String,
    pub kind: String,
    pub value: Value,
    pub locals: Vec<(Option<WidgetId>, String)>,
}

/// Dashboard-level parameter definitions, grouped by `mapTo`. Ordered by
/// `order` where listed, then in first-seen order.
pub fn dashboard_parameters(widgets: &[Widget], order: Option<&[String]>) -> Vec<DashboardParameter> {
    let mut parameters: Vec<DashboardParameter> = Vec::new();

    for widget in widgets {
        let mappings = widget_mappings(widget);
        for def in widget.parameter_defs() {
            let Some(mapping) = mappings.get(&def.name) else {
                continue;
            };
            if mapping.kind != MappingType::DashboardLevel {
                continue;
            }

            let local = (widget.id, def.name.clone());
            match parameters.iter_mut().find(|p| p.name == mapping.map_to) {
                Some(existing) => existing.locals.push(local),
                None => parameters.push(DashboardParameter {
                    name: mapping.map_to.clone(),
                    title: if mapping.title.is_empty() {
                        def.title.clone()
                    } else {
                        mapping.title.clone()
                    },
                    kind: def.kind.clone(),
                    value: def.value.clone(),
                    locals: vec![local],
                }),
            }
        }
    }

    if let Some(order) = order {
        let rank = |name: &str| order.iter().position(|o| o == name).unwrap_or(order.len());
        // stable sort keeps first-seen order for unlisted parameters
        parameters.sort_by_key(|p| rank(&p.name));
    }
    parameters
}

/// Effective value of each query parameter of a widget.
pub fn bind_parameter_values(
    defs: &[ParameterDef],
    mappings: &Mappings,
    dashboard_values: &HashMap<String, Value>,
    widget_values: &HashMap<String, Value>,
) -> BTreeMap<String, Value> {
    defs.iter()
        .map(|def| {
            let bound = mappings.get(&def.name).and_then(|mapping| match mapping.kind {
                MappingType::DashboardLevel => dashboard_values.get(&mapping.map_to).cloned(),
                MappingType::WidgetLevel => widget_values.get(&mapping.map_to).cloned(),
                MappingType::StaticValue => Some(mapping.value.clone()).filter(|v| !v.is_null()),
            });
            (def.name.clone(), bound.unwrap_or_else(|| def.value.clone()))
        })
        .collect()
}

/// Propagate titles of `source`'s dashboard-level mappings to other widgets
/// mapping the same dashboard parameter. Returns the widgets that changed.
pub fn synchronize_titles(source: &Mappings, widgets: &[Widget]) -> Vec<Widget> {
    let titles: HashMap<&str, &str> = source
        .values()
        .filter(|m| m.kind == MappingType::DashboardLevel && !m.title.is_empty())
        .map(|m| (m.map_to.as_str(), m.title.as_str()))
        .collect();
    if titles.is_empty() {
        return Vec::new();
    }

    widgets
        .iter()
        .filter_map(|widget| {
            let mut mappings = widget_mappings(widget);
            let mut changed = false;
            for mapping in mappings.values_mut() {
                if mapping.kind != MappingType::DashboardLevel {
                    continue;
                }
                if let Some(title) = titles.get(mapping.map_to.as_str()) {
                    if mapping.title != *title {
                        mapping.title = title.to_string();
                        changed = true;
                    }
                }
            }
            changed.then(|| {
                let mut updated = widget.clone();
                updated.options.parameter_mappings = mappings;
                updated
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::widget::widget_fixture;
    use serde_json::json;

    fn def(name: &str, global: bool) -> ParameterDef {
        ParameterDef {
            name: name.to_string(),
            title: name.to_uppercase(),
            kind: "text".to_string(),
            global,
            value: json!(format!("{}-default", name)),
        }
    }

    fn query_widget(id: i64, params: Value, mappings: Value) -> Widget {
        widget_fixture(
            id,
            json!({
                "visualization": {"id": id, "type": "TABLE", "name": "Table",
                    "query": {"id": id, "name": "Q", "options": {"parameters": params}}},
                "options": {"parameterMappings": mappings}
            }),
        )
    }

    #[test]
    fn test_resolve_creates_defaults() {
        let mappings = resolve_mappings(&[def("region", true), def("limit", false)], &Mappings::new());
        assert_eq!(mappings["region"].kind, MappingType::DashboardLevel);
        assert_eq!(mappings["region"].map_to, "region");
        assert_eq!(mappings["limit"].kind, MappingType::WidgetLevel);
    }

    #[test]
    fn test_resolve_prunes_removed_parameters() {
        let mut existing = resolve_mappings(&[def("region", false), def("old", false)], &Mappings::new());
        existing.get_mut("region").unwrap().title = "Area".into();

        let resolved = resolve_mappings(&[def("region", false)], &existing);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved["region"].title, "Area");
    }

    #[test]
    fn test_resolve_is_idempotent_and_keeps_customizations() {
        let defs = [def("region", false)];
        let mut first = resolve_mappings(&defs, &Mappings::new());
        let mapping = first.get_mut("region").unwrap();
        mapping.kind = MappingType::StaticValue;
        mapping.value = json!("emea");
        mapping.map_to = "zone".into();

        let second = resolve_mappings(&defs, &first);
        assert_eq!(first, second);
    }

    #[test]
    fn test_affected_widgets_empty_change_set_is_full_refresh() {
        let widgets = vec![
            query_widget(1, json!([{"name": "region", "global": true}]), json!({})),
            widget_fixture(2, json!({"text": "notes"})),
        ];
        assert_eq!(affected_widgets(&widgets, &[]).len(), 2);
    }

    #[test]
    fn test_affected_widgets_scoped() {
        let widgets = vec![
            query_widget(1, json!([{"name": "region", "global": true}]), json!({})),
            query_widget(2, json!([{"name": "region"}]), json!({})),
            query_widget(
                3,
                json!([{"name": "r"}]),
                json!({"r": {"name": "r", "type": "dashboard-level", "mapTo": "region"}}),
            ),
        ];

        let affected: Vec<_> = affected_widgets(&widgets, &["region".to_string()])
            .into_iter()
            .map(|w| w.id)
            .collect();
        assert_eq!(affected, vec![Some(WidgetId(1)), Some(WidgetId(3))]);

        assert!(affected_widgets(&widgets, &["unknown".to_string()]).is_empty());
    }

    #[test]
    fn test_dashboard_parameters_grouped_and_ordered() {
        let widgets = vec![
            query_widget(1, json!([{"name": "region", "title": "Region", "global": true}, {"name": "from", "global": true}]), json!({})),
            query_widget(2, json!([{"name": "region", "global": true}]), json!({})),
        ];
        let order = vec!["from".to_string()];
        let params = dashboard_parameters(&widgets, Some(&order));
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "from");
        assert_eq!(params[1].name, "region");
        assert_eq!(params[1].title, "Region");
        assert_eq!(params[1].locals.len(), 2);
    }

    #[test]
    fn test_bind_parameter_values() {
        let defs = [def("region", true), def("limit", false), def("kind", false), def("unset", false)];
        let mut mappings = resolve_mappings(&defs, &Mappings::new());
        let kind = mappings.get_mut("kind").unwrap();
        kind.kind = MappingType::StaticValue;
        kind.value = json!("fixed");

        let dashboard_values = HashMap::from([("region".to_string(), json!("emea"))]);
        let widget_values = HashMap::from([("limit".to_string(), json!(10))]);
        let bound = bind_parameter_values(&defs, &mappings, &dashboard_values, &widget_values);

        assert_eq!(bound["region"], json!("emea"));
        assert_eq!(bound["limit"], json!(10));
        assert_eq!(bound["kind"], json!("fixed"));
        assert_eq!(bound["unset"], json!("unset-default"));
    }

    #[test]
    fn test_synchronize_titles() {
        let widgets = vec![
            query_widget(1, json!([{"name": "region", "global": true}]), json!({})),
            query_widget(2, json!([{"name": "region"}]), json!({})),
        ];
        let mut source = resolve_mappings(&[def("region", true)], &Mappings::new());
        source.get_mut("region").unwrap().title = "Sales Region".into();

        let changed = synchronize_titles(&source, &widgets);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].id, Some(WidgetId(1)));
        assert_eq!(changed[0].options.parameter_mappings["region"].title, "Sales Region");
    }
}
