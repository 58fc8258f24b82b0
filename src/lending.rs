//! Lending transactions: status, days remaining, summary counts and
//! form validation.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::app_response::AppResponse;
use crate::collection::Collection;
use crate::local_db_model::{Record, RecordId};
use crate::projection::{project, Page, SortSpec, ViewState};
use crate::repository::Repository;
use crate::slot_store::SlotStore;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DAYS_REMAINING_FIELD: &str = "daysRemaining";

const REQUIRED_FIELDS: [&str; 10] = [
    "lenderName",
    "studentId",
    "contactNumber",
    "bookTitle",
    "category",
    "author",
    "lendDate",
    "returnDate",
    "copies",
    "status",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LendingStatus {
    Active,
    Returned,
    Overdue,
    Lost,
}

impl LendingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LendingStatus::Active => "Active",
            LendingStatus::Returned => "Returned",
            LendingStatus::Overdue => "Overdue",
            LendingStatus::Lost => "Lost",
        }
    }
}

impl Display for LendingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LendingStatus {
    type Err = AppResponse;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(LendingStatus::Active),
            "Returned" => Ok(LendingStatus::Returned),
            "Overdue" => Ok(LendingStatus::Overdue),
            "Lost" => Ok(LendingStatus::Lost),
            other => Err(AppResponse::ValidationError(format!("Unknown lending status: {other}"))),
        }
    }
}

/// Sort presets offered by the lended-books table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LendingSort {
    #[default]
    Newest,
    Oldest,
    #[serde(alias = "Return Soonest")]
    ReturnSoonest,
    #[serde(alias = "Return Latest")]
    ReturnLatest,
}

impl LendingSort {
    pub fn sort_spec(self) -> SortSpec {
        match self {
            LendingSort::Newest => SortSpec::desc("lendDate"),
            LendingSort::Oldest => SortSpec::asc("lendDate"),
            LendingSort::ReturnSoonest => SortSpec::asc(DAYS_REMAINING_FIELD),
            LendingSort::ReturnLatest => SortSpec::desc(DAYS_REMAINING_FIELD),
        }
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, AppResponse> {
    let value = value.trim();
    // Accept full timestamps by reading only the calendar date.
    let date_part = value.get(..10).filter(|_| value.len() > 10).unwrap_or(value);
    Ok(NaiveDate::parse_from_str(date_part, DATE_FORMAT)?)
}

/// Whole days from `today` until `return_date`. Negative when overdue, zero
/// for an empty date.
pub fn days_remaining(return_date: &str, today: NaiveDate) -> Result<i64, AppResponse> {
    if return_date.trim().is_empty() {
        return Ok(0);
    }
    let due = parse_date(return_date)?;
    Ok((due - today).num_days())
}

/// Copy of `record` carrying a `daysRemaining` field. An unreadable return
/// date leaves the field `null`.
pub fn enrich(record: &Record, today: NaiveDate) -> Record {
    let mut enriched = record.clone();
    let return_date = record.text("returnDate").unwrap_or_default();
    let value = match days_remaining(&return_date, today) {
        Ok(days) => JsonValue::from(days),
        Err(e) => {
            warn!("Lending {:?} has an unreadable return date: {e}", record.id().map(|id| id.to_string()));
            JsonValue::Null
        }
    };
    enriched.insert(DAYS_REMAINING_FIELD, value);
    enriched
}

pub fn status_of(record: &Record) -> Option<LendingStatus> {
    record.text("status").and_then(|status| status.parse().ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LendingSummary {
    pub total: usize,
    pub active: usize,
    pub overdue: usize,
    pub returned: usize,
    pub lost: usize,
}

impl LendingSummary {
    pub fn from_records(records: &[Record]) -> Self {
        records.iter().fold(Self::default(), |mut summary, record| {
            summary.total += 1;
            match status_of(record) {
                Some(LendingStatus::Active) => summary.active += 1,
                Some(LendingStatus::Overdue) => summary.overdue += 1,
                Some(LendingStatus::Returned) => summary.returned += 1,
                Some(LendingStatus::Lost) => summary.lost += 1,
                None => {}
            }
            summary
        })
    }
}

/// Checks a lending form. All problems are reported in one
/// `ValidationError`, as `field: message` pairs separated by `; `.
pub fn validate_lending(record: &Record) -> Result<(), AppResponse> {
    let mut errors: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|field| record.is_blank(field))
        .map(|field| format!("{field}: This field is required"))
        .collect();

    if !record.is_blank("copies") {
        let copies = match record.get("copies") {
            Some(JsonValue::Number(n)) => n.as_i64(),
            Some(JsonValue::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        match copies {
            Some(n) if n >= 1 => {}
            Some(_) => errors.push("copies: Must be at least 1".to_string()),
            None => errors.push("copies: Must be a whole number".to_string()),
        }
    }

    if let Some(status) = record.text("status").filter(|s| !s.trim().is_empty()) {
        if status.parse::<LendingStatus>().is_err() {
            errors.push(format!("status: Unknown status '{status}'"));
        }
    }

    for field in ["lendDate", "returnDate"] {
        if let Some(date) = record.text(field).filter(|s| !s.trim().is_empty()) {
            if parse_date(&date).is_err() {
                errors.push(format!("{field}: Expected a YYYY-MM-DD date"));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppResponse::ValidationError(errors.join("; ")))
    }
}

/// Projects the lended-books collection with `daysRemaining` filled in, so
/// the return-date presets can sort on it.
pub fn query_lendings<S: SlotStore + ?Sized>(
    store: &S,
    view: &ViewState,
    today: NaiveDate,
    default_page_size: usize,
) -> Result<Page, AppResponse> {
    let records: Vec<Record> = Repository::new(store, Collection::LendedBooks)
        .list()?
        .iter()
        .map(|record| enrich(record, today))
        .collect();
    project(&records, Collection::LendedBooks.search_fields(), view, default_page_size)
}

pub fn summary<S: SlotStore + ?Sized>(store: &S) -> Result<LendingSummary, AppResponse> {
    let records = Repository::new(store, Collection::LendedBooks).list()?;
    Ok(LendingSummary::from_records(&records))
}

/// Follows a lending's `studentId` to the student record. There is no
/// referential integrity, so a dangling link is `Ok(None)`.
pub fn student_for<S: SlotStore + ?Sized>(store: &S, lending: &Record) -> Result<Option<Record>, AppResponse> {
    let Some(student_id) = lending.text("studentId").filter(|id| !id.trim().is_empty()) else {
        return Ok(None);
    };
    Repository::new(store, Collection::Students).resolve(&RecordId::new(student_id))
}
