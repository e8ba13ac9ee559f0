// Query result and dashboard filter domain models
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    #[serde(default)]
    pub friendly_name: String,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<serde_json::Map<String, Value>>,
}

impl QueryResult {
    /// Filters are declared by column naming: `name::filter` for a single
    /// choice, `name::multi-filter` for multiple choice. The same markers
    /// with a single underscore are accepted too.
    pub fn filters(&self) -> Vec<Filter> {
        self.columns
            .iter()
            .filter_map(|column| {
                let (friendly, multiple) = filter_marker(&column.name)?;
                let mut values: Vec<Value> = Vec::new();
                for row in &self.rows {
                    if let Some(value) = row.get(&column.name) {
                        if !values.contains(value) {
                            values.push(value.clone());
                        }
                    }
                }
                Some(Filter {
                    name: column.name.clone(),
                    friendly_name: friendly.to_string(),
                    multiple,
                    values,
                })
            })
            .collect()
    }
}

fn filter_marker(column: &str) -> Option<(&str, bool)> {
    for (suffix, multiple) in [
        ("::multi-filter", true),
        ("::multi_filter", true),
        ("__multiFilter", true),
        ("::filter", false),
        ("__filter", false),
    ] {
        if let Some(friendly) = column.strip_suffix(suffix) {
            return Some((friendly, multiple));
        }
    }
    None
}

/// Dashboard-wide filters: same-named filters across widgets merge into
/// one, values unioned in first-seen order. Disabled dashboards get none.
pub fn collect_dashboard_filters<'a, I>(filters_enabled: bool, results: I) -> Vec<Filter>
where
    I: IntoIterator<Item = &'a QueryResult>,
{
    if !filters_enabled {
        return Vec::new();
    }

    let mut merged: Vec<Filter> = Vec::new();
    for filter in results.into_iter().flat_map(QueryResult::filters) {
        match merged.iter_mut().find(|f| f.name == filter.name) {
            Some(existing) => {
                for value in filter.values {
                    if !existing.values.contains(&value) {
                        existing.values.push(value);
                    }
                }
                existing.multiple |= filter.multiple;
            }
            None => merged.push(filter),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(value: Value) -> QueryResult {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_filters_from_columns() {
        let result = result(json!({
            "columns": [{"name": "country::filter"}, {"name": "amount"}],
            "rows": [
                {"country::filter": "NL", "amount": 1},
                {"country::filter": "DE", "amount": 2},
                {"country::filter": "NL", "amount": 3}
            ]
        }));
        let filters = result.filters();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].friendly_name, "country");
        assert!(!filters[0].multiple);
        assert_eq!(filters[0].values, vec![json!("NL"), json!("DE")]);
    }

    #[test]
    fn test_collect_dashboard_filters_merges_by_name() {
        let a = result(json!({
            "columns": [{"name": "country::filter"}],
            "rows": [{"country::filter": "NL"}]
        }));
        let b = result(json!({
            "columns": [{"name": "country::filter"}, {"name": "team::multi-filter"}],
            "rows": [{"country::filter": "FR", "team::multi-filter": "core"}]
        }));

        let filters = collect_dashboard_filters(true, [&a, &b]);
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].values, vec![json!("NL"), json!("FR")]);
        assert!(filters[1].multiple);

        assert!(collect_dashboard_filters(false, [&a, &b]).is_empty());
    }
}
