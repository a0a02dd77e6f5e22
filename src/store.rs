use crate::record::{NewSurveyRecord, SurveyRecord};
use log::debug;

/// In-memory survey collection.
///
/// Records live in a vector in insertion order next to an explicit id counter.
/// Ids start at 1, grow by one per inserted record and restart at 1 after
/// [`SurveyStore::clear`]. The store is owned by whoever builds it; the web
/// server keeps one behind a mutex in its application state.
#[derive(Clone, Debug)]
pub struct SurveyStore {
    records: Vec<SurveyRecord>,
    next_id: u32,
}

impl Default for SurveyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SurveyStore {
    pub fn new() -> Self {
        SurveyStore {
            records: Vec::new(),
            next_id: 1,
        }
    }

    /// Build a store pre-filled with `records`, ids assigned in order.
    pub fn with_records(records: Vec<NewSurveyRecord>) -> Self {
        let mut store = Self::new();
        store.insert_many(records);
        store
    }

    pub fn insert_one(&mut self, answers: NewSurveyRecord) -> SurveyRecord {
        let record = SurveyRecord::create(self.next_id, answers);
        self.next_id += 1;
        self.records.push(record.clone());
        record
    }

    pub fn insert_many(&mut self, batch: Vec<NewSurveyRecord>) -> Vec<SurveyRecord> {
        let first_id = self.next_id;
        let stored: Vec<SurveyRecord> = batch
            .into_iter()
            .map(|answers| self.insert_one(answers))
            .collect();
        debug!(
            "stored {} survey records (ids {}..{})",
            stored.len(),
            first_id,
            self.next_id
        );
        stored
    }

    pub fn clear(&mut self) {
        debug!("clearing {} survey records", self.records.len());
        self.records.clear();
        self.next_id = 1;
    }

    pub fn all(&self) -> &[SurveyRecord] {
        &self.records
    }

    pub fn get(&self, id: u32) -> Option<&SurveyRecord> {
        // ids are assigned in ascending order
        self.records
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|idx| &self.records[idx])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
