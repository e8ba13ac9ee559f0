// Layout normalization - canonical, order-independent layout sequences
use super::position::{GridPosition, LayoutEntry, WidgetId};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Normalize a layout given either as a mapping or as a sequence of entries.
///
/// Entries without a string `i` (or without integral coordinates) are
/// dropped. Only `i, x, y, w, h` survive and the result is sorted by `i`,
/// so two layouts describing the same rectangles compare equal.
pub fn normalize(layout: &Value) -> Vec<LayoutEntry> {
    let items: Vec<&Value> = match layout {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => return Vec::new(),
    };

    normalize_entries(items.into_iter().filter_map(entry_from_value))
}

/// Canonical ordering for entries that are already well-formed.
pub fn normalize_entries<I>(entries: I) -> Vec<LayoutEntry>
where
    I: IntoIterator<Item = LayoutEntry>,
{
    let mut entries: Vec<LayoutEntry> = entries.into_iter().collect();
    entries.sort();
    entries
}

fn entry_from_value(value: &Value) -> Option<LayoutEntry> {
    let item = value.as_object()?;
    let i = item.get("i")?.as_str()?;
    Some(LayoutEntry {
        i: i.to_string(),
        x: coordinate(item, "x")?,
        y: coordinate(item, "y")?,
        w: coordinate(item, "w")?,
        h: coordinate(item, "h")?,
    })
}

fn coordinate(item: &Map<String, Value>, key: &str) -> Option<i32> {
    item.get(key)
        .and_then(Value::as_i64)
        .and_then(|n| i32::try_from(n).ok())
}

/// Serde adapter so persisted layouts are normalized on the way in.
pub fn deserialize_layout<'de, D>(deserializer: D) -> Result<Vec<LayoutEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().map(normalize).unwrap_or_default())
}

/// Convert grid entries back to per-widget position updates. Entries whose
/// key is not a widget id (e.g. placeholders) are skipped.
pub fn positions_from_layout<F>(entries: &[LayoutEntry], auto_height: F) -> BTreeMap<WidgetId, GridPosition>
where
    F: Fn(WidgetId) -> bool,
{
    entries
        .iter()
        .filter_map(|entry| {
            let id = entry.widget_id()?;
            Some((id, entry.to_grid(auto_height(id))))
        })
        .collect()
}

/// True when `next` holds an entry that is new or has moved/resized
/// compared to `current`. Entries dropped from `next` do not count.
pub fn has_position_changes(next: &[LayoutEntry], current: &[LayoutEntry]) -> bool {
    next.iter()
        .any(|entry| !current.iter().any(|existing| existing == entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_sorts_and_strips_decorations() {
        let layout = json!([
            {"i": "2", "x": 3, "y": 0, "w": 3, "h": 2, "minW": 1, "moved": false},
            {"i": "1", "x": 0, "y": 0, "w": 3, "h": 2, "static": true},
        ]);

        let normalized = normalize(&layout);
        assert_eq!(
            normalized,
            vec![
                LayoutEntry { i: "1".into(), x: 0, y: 0, w: 3, h: 2 },
                LayoutEntry { i: "2".into(), x: 3, y: 0, w: 3, h: 2 },
            ]
        );
    }

    #[test]
    fn test_normalize_mapping_equals_sequence() {
        let as_map = json!({
            "b": {"i": "b", "x": 1, "y": 1, "w": 1, "h": 1},
            "a": {"i": "a", "x": 0, "y": 0, "w": 2, "h": 2},
        });
        let as_seq = json!([
            {"i": "a", "x": 0, "y": 0, "w": 2, "h": 2},
            {"i": "b", "x": 1, "y": 1, "w": 1, "h": 1},
        ]);
        assert_eq!(normalize(&as_map), normalize(&as_seq));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let layout = json!([
            {"i": "10", "x": 0, "y": 4, "w": 6, "h": 2},
            {"i": "9", "x": 0, "y": 0, "w": 6, "h": 4},
        ]);
        let once = normalize(&layout);
        let twice = normalize(&serde_json::to_value(&once).unwrap());
        assert_eq!(once, twice);
        // lexicographic on the string key
        assert_eq!(once[0].i, "10");
    }

    #[test]
    fn test_normalize_drops_malformed_entries() {
        let layout = json!([
            {"x": 0, "y": 0, "w": 1, "h": 1},
            {"i": 5, "x": 0, "y": 0, "w": 1, "h": 1},
            null,
            {"i": "ok", "x": 0, "y": 0, "w": 1, "h": 1},
        ]);
        let normalized = normalize(&layout);
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].i, "ok");

        assert!(normalize(&json!("not a layout")).is_empty());
    }

    #[test]
    fn test_positions_from_layout_skips_non_widget_keys() {
        let entries = vec![
            LayoutEntry { i: "3".into(), x: 0, y: 2, w: 3, h: 2 },
            LayoutEntry { i: "placeholder".into(), x: 0, y: 0, w: 1, h: 1 },
        ];
        let positions = positions_from_layout(&entries, |id| id == WidgetId(3));
        assert_eq!(positions.len(), 1);
        let position = positions[&WidgetId(3)];
        assert_eq!((position.col, position.row), (0, 2));
        assert!(position.auto_height);
    }

    #[test]
    fn test_has_position_changes() {
        let current = vec![LayoutEntry { i: "1".into(), x: 0, y: 0, w: 3, h: 2 }];
        assert!(!has_position_changes(&current, &current));

        let moved = vec![LayoutEntry { i: "1".into(), x: 0, y: 2, w: 3, h: 2 }];
        assert!(has_position_changes(&moved, &current));

        let added = vec![
            LayoutEntry { i: "1".into(), x: 0, y: 0, w: 3, h: 2 },
            LayoutEntry { i: "2".into(), x: 3, y: 0, w: 3, h: 2 },
        ];
        assert!(has_position_changes(&added, &current));
    }
}
