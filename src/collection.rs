//! The named collections of the dashboard and their per-collection rules.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;
use crate::local_db_model::{Record, RecordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    Students,
    Books,
    LendedBooks,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Students, Collection::Books, Collection::LendedBooks];

    /// Key of the slot holding this collection's JSON array.
    pub fn storage_key(self) -> &'static str {
        match self {
            Collection::Students => "students",
            Collection::Books => "books",
            Collection::LendedBooks => "lendedBooks",
        }
    }

    /// Fields matched by the free-text query.
    pub fn search_fields(self) -> &'static [&'static str] {
        match self {
            Collection::Students => &["name", "id", "mobile", "email"],
            Collection::Books => &["title", "id", "author"],
            Collection::LendedBooks => &["lenderName", "bookTitle", "author", "isbn"],
        }
    }

    /// Students are registered with a hand-entered id; the other collections
    /// get one assigned on create when the caller leaves it empty.
    pub fn generates_ids(self) -> bool {
        !matches!(self, Collection::Students)
    }

    /// Proposes an id for a new record.
    ///
    /// Books: `STU` + `YYMMDD` + three random digits. Lendings:
    /// `LB-<year>-<nnn>` where `nnn` is the record's position in the
    /// collection. `attempt` shifts the lending sequence when the first
    /// candidate is already taken.
    pub fn propose_id(self, today: NaiveDate, existing: usize, attempt: usize) -> Option<RecordId> {
        match self {
            Collection::Students => None,
            Collection::Books => {
                let suffix: u16 = rand::thread_rng().gen_range(100..=999);
                Some(RecordId::new(format!("STU{}{}", today.format("%y%m%d"), suffix)))
            }
            Collection::LendedBooks => Some(RecordId::new(format!(
                "LB-{}-{:03}",
                today.year(),
                existing + attempt
            ))),
        }
    }

    /// Drops fields computed on read so they are never persisted.
    pub fn strip_derived(self, record: &mut Record) {
        if self == Collection::LendedBooks {
            record.remove(crate::lending::DAYS_REMAINING_FIELD);
        }
    }

    /// Field-level checks run before a record is written.
    pub fn validate(self, record: &Record) -> Result<(), AppResponse> {
        record.ensure_flat()?;
        match self {
            Collection::LendedBooks => crate::lending::validate_lending(record),
            Collection::Students | Collection::Books => Ok(()),
        }
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.storage_key())
    }
}

impl FromStr for Collection {
    type Err = AppResponse;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "students" | "Students" => Ok(Collection::Students),
            "books" | "Books" => Ok(Collection::Books),
            "lendedBooks" | "LendedBooks" | "lended_books" => Ok(Collection::LendedBooks),
            other => Err(AppResponse::BadRequest(format!("Unknown collection: {other}"))),
        }
    }
}
