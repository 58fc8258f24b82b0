//! Per-collection CRUD over a [`SlotStore`].
//!
//! Every mutation is a read-modify-write of the whole collection: load the
//! array, change it, serialize it back into the slot. Concurrent writers are
//! not coordinated, so the last write wins.

use chrono::{Local, NaiveDate};
use log::{debug, info};

use crate::app_response::AppResponse;
use crate::collection::Collection;
use crate::local_db_model::{Record, RecordId};
use crate::projection::{project, Page, ViewState};
use crate::slot_store::SlotStore;

const MAX_ID_ATTEMPTS: usize = 32;

pub struct Repository<'a, S: SlotStore + ?Sized> {
    store: &'a S,
    collection: Collection,
}

impl<'a, S: SlotStore + ?Sized> Repository<'a, S> {
    pub fn new(store: &'a S, collection: Collection) -> Self {
        Self { store, collection }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// All records in insertion order. An absent slot is an empty collection;
    /// a slot that does not hold a JSON array of objects is a
    /// `SerializationError`.
    pub fn list(&self) -> Result<Vec<Record>, AppResponse> {
        let key = self.collection.storage_key();
        match self.store.read_slot(key)? {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str::<Vec<Record>>(&raw).map_err(|e| {
                AppResponse::SerializationError(format!("Slot '{key}' holds malformed data: {e}"))
            }),
        }
    }

    fn save(&self, records: &[Record]) -> Result<(), AppResponse> {
        let json = serde_json::to_string(records)?;
        self.store.write_slot(self.collection.storage_key(), &json)
    }

    pub fn resolve(&self, id: &RecordId) -> Result<Option<Record>, AppResponse> {
        Ok(self.list()?.into_iter().find(|record| record.has_id(id)))
    }

    /// Appends a record, assigning an id when the collection generates them.
    pub fn create(&self, record: Record) -> Result<Record, AppResponse> {
        self.create_on(record, Local::now().date_naive())
    }

    /// [`create`](Self::create) with an explicit date for generated ids.
    pub fn create_on(&self, mut record: Record, today: NaiveDate) -> Result<Record, AppResponse> {
        record.check_id()?;
        let mut records = self.list()?;

        // A caller-supplied id is stored as sent; only generated ids are written.
        let id = match record.id() {
            Some(id) => {
                if records.iter().any(|existing| existing.has_id(&id)) {
                    return Err(AppResponse::ValidationError(format!(
                        "A record with id '{id}' already exists in {}",
                        self.collection
                    )));
                }
                id
            }
            None => {
                let id = self.generate_id(&records, today)?;
                record.set_id(&id);
                id
            }
        };

        self.collection.strip_derived(&mut record);
        self.collection.validate(&record)?;

        records.push(record.clone());
        self.save(&records)?;
        info!("Created {} record '{id}'", self.collection);
        Ok(record)
    }

    fn generate_id(&self, records: &[Record], today: NaiveDate) -> Result<RecordId, AppResponse> {
        if !self.collection.generates_ids() {
            return Err(AppResponse::ValidationError(format!(
                "Records in {} need an explicit id",
                self.collection
            )));
        }

        for attempt in 0..MAX_ID_ATTEMPTS {
            let Some(candidate) = self.collection.propose_id(today, records.len(), attempt) else {
                break;
            };
            if !records.iter().any(|record| record.has_id(&candidate)) {
                return Ok(candidate);
            }
            debug!("Generated id '{candidate}' already taken, retrying");
        }

        Err(AppResponse::DatabaseError(format!(
            "Could not generate a free id for {}",
            self.collection
        )))
    }

    /// Replaces the record with the same id. `Ok(None)` if no such record.
    pub fn update(&self, mut record: Record) -> Result<Option<Record>, AppResponse> {
        record.check_id()?;
        let id = record
            .id()
            .ok_or_else(|| AppResponse::ValidationError("Record to update has no id".to_string()))?;
        self.collection.strip_derived(&mut record);
        self.collection.validate(&record)?;

        let mut records = self.list()?;
        let Some(slot) = records.iter_mut().find(|existing| existing.has_id(&id)) else {
            return Ok(None);
        };
        *slot = record.clone();

        self.save(&records)?;
        info!("Updated {} record '{id}'", self.collection);
        Ok(Some(record))
    }

    /// Removes every record with this id. Returns whether anything was removed.
    pub fn delete(&self, id: &RecordId) -> Result<bool, AppResponse> {
        let mut records = self.list()?;
        let before = records.len();
        records.retain(|record| !record.has_id(id));

        if records.len() == before {
            return Ok(false);
        }

        self.save(&records)?;
        info!("Deleted {} record '{id}'", self.collection);
        Ok(true)
    }

    /// Runs the projection pipeline over the stored collection.
    pub fn query(&self, view: &ViewState, default_page_size: usize) -> Result<Page, AppResponse> {
        let records = self.list()?;
        project(&records, self.collection.search_fields(), view, default_page_size)
    }
}
