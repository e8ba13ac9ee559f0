// Location adapter - keeps the `edit` query flag of the dashboard URL
use crate::application::lock;
use crate::application::ports::LocationService;
use std::sync::{Mutex, MutexGuard};

/// In-process location holding the query string of the dashboard URL.
#[derive(Debug, Default)]
pub struct MemoryLocation {
    query: Mutex<Vec<(String, String)>>,
}

impl MemoryLocation {
    pub fn new(editing: bool) -> Self {
        let location = Self::default();
        location.set_edit_flag(editing);
        location
    }

    /// Parse a query string such as `p_region=emea&edit`.
    pub fn from_query(query: &str) -> Self {
        let pairs = query
            .trim_start_matches('?')
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(key), decode(value))
            })
            .collect();
        Self {
            query: Mutex::new(pairs),
        }
    }

    pub fn query_string(&self) -> String {
        self.pairs()
            .iter()
            .map(|(key, value)| {
                if value.is_empty() {
                    urlencoding::encode(key).into_owned()
                } else {
                    format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
                }
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    fn pairs(&self) -> MutexGuard<'_, Vec<(String, String)>> {
        lock(&self.query)
    }
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

impl LocationService for MemoryLocation {
    fn edit_flag(&self) -> bool {
        self.pairs().iter().any(|(key, _)| key == "edit")
    }

    fn set_edit_flag(&self, editing: bool) {
        let mut pairs = self.pairs();
        pairs.retain(|(key, _)| key != "edit");
        if editing {
            pairs.push(("edit".to_string(), String::new()));
        }
    }
}
