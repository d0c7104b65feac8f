use std::collections::HashMap;

use preview_proto::protocol::TrackRecord;
use tracing::warn;

/// Title-keyed view over the results of the last successful search.
///
/// Titles are not unique in the catalog; a later record with the same title
/// replaces the earlier one but keeps the earlier one's position in `titles()`.
#[derive(Debug, Clone, Default)]
pub struct TrackIndex {
    by_title: HashMap<String, TrackRecord>,
    order: Vec<String>,
}

impl TrackIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<TrackRecord>) -> Self {
        let mut index = Self::new();
        index.replace_all(records);
        index
    }

    /// Discard everything and index `records` in provider order.
    pub fn replace_all(&mut self, records: Vec<TrackRecord>) {
        self.by_title.clear();
        self.order.clear();

        for record in records {
            let Some(title) = record.title.clone() else {
                warn!("TrackIndex: skipping record without title: {:?}", record);
                continue;
            };
            if self.by_title.insert(title.clone(), record).is_none() {
                self.order.push(title);
            }
        }
    }

    pub fn lookup(&self, title: &str) -> Option<&TrackRecord> {
        self.by_title.get(title)
    }

    pub fn titles(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
