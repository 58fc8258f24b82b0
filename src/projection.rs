//! Table view over a collection: filter → sort → paginate.
//!
//! [`project`] is pure and synchronous. It never clamps the requested page;
//! an out-of-range page yields an empty window. Clamping and navigation
//! guards live on [`ViewState`].

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::app_response::AppResponse;
use crate::local_db_model::{render_value, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Query, filters, sort and page of one table.
///
/// Hosts send it as JSON; every key is optional:
///
/// ```rust
/// use library_desk_core::projection::{SortDirection, ViewState};
///
/// let view: ViewState = serde_json::from_str(
///     r#"{"query":"alp","sort":{"key":"copies","direction":"desc"},"page":2}"#,
/// )?;
/// assert_eq!(view.page, 2);
/// assert_eq!(view.sort.unwrap().direction, SortDirection::Desc);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewState {
    pub query: String,
    /// Exact-match constraints, e.g. `{"status": "Active"}`.
    pub filters: BTreeMap<String, JsonValue>,
    pub sort: Option<SortSpec>,
    /// 1-indexed.
    pub page: usize,
    /// Falls back to the store's configured page size.
    pub page_size: Option<usize>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            query: String::new(),
            filters: BTreeMap::new(),
            sort: None,
            page: 1,
            page_size: None,
        }
    }
}

impl ViewState {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size: Some(page_size),
            ..Self::default()
        }
    }

    pub fn effective_page_size(&self, default_page_size: usize) -> Result<usize, AppResponse> {
        match self.page_size.unwrap_or(default_page_size) {
            0 => Err(AppResponse::ValidationError("Page size must be greater than zero".to_string())),
            size => Ok(size),
        }
    }

    /// New query text; always returns to the first page.
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.page = 1;
    }

    pub fn set_filter(&mut self, field: impl Into<String>, value: impl Into<JsonValue>) {
        self.filters.insert(field.into(), value.into());
        self.page = 1;
    }

    pub fn clear_filter(&mut self, field: &str) {
        if self.filters.remove(field).is_some() {
            self.page = 1;
        }
    }

    /// Clicking a column header: same key flips direction, a new key sorts
    /// ascending.
    pub fn toggle_sort(&mut self, key: &str) {
        self.sort = match self.sort.take() {
            Some(spec) if spec.key == key => Some(SortSpec {
                key: spec.key,
                direction: spec.direction.flipped(),
            }),
            _ => Some(SortSpec::asc(key)),
        };
    }

    pub fn go_to_page(&mut self, page: usize, total_pages: usize) -> Result<(), AppResponse> {
        if page < 1 || page > total_pages {
            return Err(AppResponse::BadRequest(format!(
                "Page {page} is outside 1..={total_pages}"
            )));
        }
        self.page = page;
        Ok(())
    }

    pub fn next_page(&mut self, total_pages: usize) -> Result<(), AppResponse> {
        self.go_to_page(self.page.saturating_add(1), total_pages)
    }

    pub fn prev_page(&mut self, total_pages: usize) -> Result<(), AppResponse> {
        self.go_to_page(self.page.saturating_sub(1), total_pages)
    }

    /// Pulls the page back inside `1..=total_pages` after rows disappear.
    pub fn clamp_page(&mut self, total_pages: usize) {
        self.page = self.page.clamp(1, total_pages.max(1));
    }
}

/// One window of a projected collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub rows: Vec<Record>,
    pub page: usize,
    pub page_size: usize,
    pub total_matches: usize,
    pub total_pages: usize,
}

impl Page {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

pub fn total_pages(matches: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    matches.div_ceil(page_size)
}

pub fn project(
    records: &[Record],
    search_fields: &[&str],
    view: &ViewState,
    default_page_size: usize,
) -> Result<Page, AppResponse> {
    let page_size = view.effective_page_size(default_page_size)?;

    let mut rows = filter_records(records, search_fields, &view.query, &view.filters);
    if let Some(spec) = &view.sort {
        sort_records(&mut rows, spec);
    }

    let total_matches = rows.len();
    let start = view.page.saturating_sub(1).saturating_mul(page_size);
    let window = if view.page == 0 {
        Vec::new()
    } else {
        rows.into_iter().skip(start).take(page_size).cloned().collect()
    };

    Ok(Page {
        rows: window,
        page: view.page,
        page_size,
        total_matches,
        total_pages: total_pages(total_matches, page_size),
    })
}

/// Records whose filters all match and whose search fields contain `query`
/// case-insensitively. Insertion order is kept.
pub fn filter_records<'r>(
    records: &'r [Record],
    search_fields: &[&str],
    query: &str,
    filters: &BTreeMap<String, JsonValue>,
) -> Vec<&'r Record> {
    let needle = query.to_lowercase();
    records
        .iter()
        .filter(|record| matches_filters(record, filters))
        .filter(|record| matches_query(record, search_fields, &needle))
        .collect()
}

pub fn matches_query(record: &Record, search_fields: &[&str], lowercase_query: &str) -> bool {
    if lowercase_query.is_empty() {
        return true;
    }
    search_fields.iter().any(|field| {
        record
            .text(field)
            .is_some_and(|text| text.to_lowercase().contains(lowercase_query))
    })
}

fn matches_filters(record: &Record, filters: &BTreeMap<String, JsonValue>) -> bool {
    filters.iter().all(|(field, expected)| {
        let actual = record.get(field).and_then(render_value);
        actual == render_value(expected)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Numeric,
    Boolean,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
enum SortValue {
    Missing,
    Number(f64),
    Bool(bool),
    Text(String),
}

impl SortValue {
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Missing, SortValue::Missing) => Ordering::Equal,
            (SortValue::Missing, _) => Ordering::Less,
            (_, SortValue::Missing) => Ordering::Greater,
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::Bool(a), SortValue::Bool(b)) => a.cmp(b),
            (SortValue::Text(a), SortValue::Text(b)) => compare_text(a, b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortValue::Missing => 0,
            SortValue::Bool(_) => 1,
            SortValue::Number(_) => 2,
            SortValue::Text(_) => 3,
        }
    }
}

/// Case-insensitive order, so "apple" < "Banana" < "cherry". Texts that only
/// differ in case fall back to byte order.
fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// A column sorts numerically when every present value is a number, by
/// boolean when every present value is a boolean, and by string rendering
/// otherwise. Missing and `null` values come first in ascending order.
fn column_kind(rows: &[&Record], key: &str) -> ColumnKind {
    let mut kind = None;
    for value in rows.iter().filter_map(|record| record.get(key)) {
        let current = match value {
            JsonValue::Null => continue,
            JsonValue::Number(_) => ColumnKind::Numeric,
            JsonValue::Bool(_) => ColumnKind::Boolean,
            _ => ColumnKind::Text,
        };
        match kind {
            None => kind = Some(current),
            Some(previous) if previous != current => return ColumnKind::Text,
            Some(_) => {}
        }
    }
    kind.unwrap_or(ColumnKind::Text)
}

fn sort_value(value: Option<&JsonValue>, kind: ColumnKind) -> SortValue {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return SortValue::Missing;
    };
    match (kind, value) {
        (ColumnKind::Numeric, JsonValue::Number(n)) => n.as_f64().map_or(SortValue::Missing, SortValue::Number),
        (ColumnKind::Boolean, JsonValue::Bool(b)) => SortValue::Bool(*b),
        (_, other) => render_value(other).map_or(SortValue::Missing, SortValue::Text),
    }
}

/// Stable sort by one key; ties keep their filtered order in both directions.
pub fn sort_records(rows: &mut Vec<&Record>, spec: &SortSpec) {
    let kind = column_kind(rows, &spec.key);
    let mut keyed: Vec<(SortValue, &Record)> = rows
        .iter()
        .map(|record| (sort_value(record.get(&spec.key), kind), *record))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| match spec.direction {
        SortDirection::Asc => a.compare(b),
        SortDirection::Desc => b.compare(a),
    });

    *rows = keyed.into_iter().map(|(_, record)| record).collect();
}
