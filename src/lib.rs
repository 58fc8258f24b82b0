//! # Library Desk Core
//!
//! Local storage and table-view core for a library management dashboard
//! (students, books, lended books, memberships). Collections are persisted in
//! LMDB, one JSON array per collection, and every table the dashboard shows
//! is produced by the same filter → sort → paginate pipeline.
//!
//! ## Features
//!
//! - **Whole-collection slots**: each collection lives under one key and is
//!   rewritten on every mutation
//! - **Swappable storage**: the [`slot_store::SlotStore`] trait is implemented
//!   by LMDB ([`local_db_state::AppDbState`]) and an in-memory store
//! - **Projection pipeline**: case-insensitive search, a total-order sort and
//!   pagination in [`projection`]
//! - **Lending analytics**: days remaining, status counts, form validation
//! - **FFI surface**: C functions taking and returning JSON strings
//!
//! ## Quick Start
//!
//! ```no_run
//! use library_desk_core::{create_db, post_record, query_records};
//! use std::ffi::CString;
//!
//! let db_name = CString::new("library_desk").unwrap();
//! let db_state = create_db(db_name.as_ptr());
//!
//! let books = CString::new("books").unwrap();
//! let book = CString::new(r#"{"title":"Alpha","author":"Ann","copies":3}"#).unwrap();
//! let created = post_record(db_state, books.as_ptr(), book.as_ptr());
//!
//! let view = CString::new(r#"{"query":"alp","sort":{"key":"copies","direction":"asc"}}"#).unwrap();
//! let page = query_records(db_state, books.as_ptr(), view.as_ptr());
//! ```
//!
//! ## FFI Functions
//!
//! Every function except [`create_db`] returns a serialized [`AppResponse`]
//! (`{"Ok":"<json>"}`, `{"NotFound":"..."}`, ...). Release returned strings
//! with [`free_response`] and the state with [`destroy_db`].
//!
//! - [`create_db`] / [`create_db_with_config`] - Open a store
//! - [`post_record`] - Append a record to a collection
//! - [`get_record`] - Look a record up by id
//! - [`get_all_records`] - Whole collection in insertion order
//! - [`put_record`] - Replace a record by id
//! - [`delete_record`] - Remove a record by id
//! - [`query_records`] - Search, sort and paginate a collection
//! - [`lending_summary`] - Lending counts by status
//! - [`membership_plans`] / [`checkout_membership`] - Plans and mock payment
//! - [`clear_all_records`] / [`reset_database`] / [`close_database`]

pub mod app_response;
pub mod collection;
pub mod config;
pub mod lending;
pub mod local_db_model;
pub mod local_db_state;
pub mod membership;
pub mod projection;
pub mod repository;
pub mod slot_store;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use chrono::Local;
use log::{info, warn};
use serde::Serialize;

use crate::app_response::AppResponse;
use crate::collection::Collection;
use crate::config::StoreConfig;
use crate::local_db_model::{Record, RecordId};
use crate::local_db_state::AppDbState;
use crate::membership::PaymentRequest;
use crate::projection::ViewState;
use crate::repository::Repository;

/// Opens (or creates) the store `<name>.lmdb` with default settings.
///
/// # Parameters
///
/// * `name` - Null-terminated C string with the store name or path prefix
///
/// # Returns
///
/// A pointer to the [`AppDbState`], or null if `name` is null, not UTF-8, or
/// the environment cannot be opened. The caller owns the returned state and
/// releases it with [`destroy_db`].
///
/// # Safety
///
/// `name` must be null or point to a valid null-terminated string.
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use library_desk_core::create_db;
///
/// let name = CString::new("library_desk").unwrap();
/// let db_state = create_db(name.as_ptr());
/// assert!(!db_state.is_null());
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_db(name: *const c_char) -> *mut AppDbState {
    if name.is_null() {
        warn!("Null name pointer passed to create_db");
        return std::ptr::null_mut();
    }

    let name_str = match unsafe { CStr::from_ptr(name).to_str() } {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid UTF-8 in name parameter: {e}");
            return std::ptr::null_mut();
        }
    };

    open_state(StoreConfig::named(name_str))
}

/// Opens a store from a JSON [`StoreConfig`]; missing keys take defaults and
/// a null pointer means "defaults plus environment overrides".
///
/// # Safety
///
/// `config_json` must be null or point to a valid null-terminated string.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_db_with_config(config_json: *const c_char) -> *mut AppDbState {
    if config_json.is_null() {
        return open_state(StoreConfig::from_env());
    }

    let json = match unsafe { CStr::from_ptr(config_json).to_str() } {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid UTF-8 in config parameter: {e}");
            return std::ptr::null_mut();
        }
    };

    match serde_json::from_str::<StoreConfig>(json) {
        Ok(config) => open_state(config),
        Err(e) => {
            warn!("Invalid store config: {e}");
            std::ptr::null_mut()
        }
    }
}

fn open_state(config: StoreConfig) -> *mut AppDbState {
    let lmdb_dir = format!("{}.lmdb", config.name);
    if std::path::Path::new(&lmdb_dir).exists() {
        info!("Opening existing store at: {lmdb_dir}");
    } else {
        info!("Creating new store at: {lmdb_dir}");
    }

    match AppDbState::open(config) {
        Ok(state) => Box::into_raw(Box::new(state)),
        Err(e) => {
            warn!("Failed to open store at {lmdb_dir}: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Appends a record to `collection` (`students`, `books` or `lendedBooks`).
///
/// Books and lended books get a generated id when `id` is missing or empty;
/// students must carry one. Duplicate ids and invalid lending forms are
/// rejected with a `ValidationError`. On success the stored record is
/// returned, id included.
///
/// # Parameters
///
/// * `state` - Pointer returned by [`create_db`]
/// * `collection` - Collection name (`students`, `books`, `lendedBooks`)
/// * `json_ptr` - The record as a flat JSON object
///
/// # Returns
///
/// `Ok` with the stored record, `ValidationError` for duplicates and bad
/// forms, `SerializationError` for malformed JSON, `BadRequest` for null or
/// non-UTF-8 arguments.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_db`]. The string
/// arguments must be null or valid null-terminated strings.
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use library_desk_core::{create_db, post_record};
///
/// let db_state = create_db(CString::new("library_desk").unwrap().as_ptr());
/// let students = CString::new("students").unwrap();
/// let json = CString::new(r#"{"id":"S-1","name":"Asha","mobile":"98450"}"#).unwrap();
/// let result = post_record(db_state, students.as_ptr(), json.as_ptr());
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn post_record(
    state: *mut AppDbState,
    collection: *const c_char,
    json_ptr: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "post_record") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let collection = match collection_arg(collection) {
        Ok(c) => c,
        Err(err) => return err,
    };
    let record = match record_arg(json_ptr) {
        Ok(r) => r,
        Err(err) => return err,
    };

    respond(Repository::new(state, collection).create(record))
}

/// Looks a record up by id.
///
/// # Parameters
///
/// * `state` - Pointer returned by [`create_db`]
/// * `collection` - Collection name
/// * `id` - Record id; numeric ids match their decimal text
///
/// # Returns
///
/// `Ok` with the record as JSON, or `NotFound` when no record has the id.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_db`]. `collection`
/// and `id` must be null or valid null-terminated strings.
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use library_desk_core::{create_db, get_record};
///
/// let db_state = create_db(CString::new("library_desk").unwrap().as_ptr());
/// let students = CString::new("students").unwrap();
/// let id = CString::new("S-1").unwrap();
/// let result = get_record(db_state, students.as_ptr(), id.as_ptr());
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_record(
    state: *mut AppDbState,
    collection: *const c_char,
    id: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "get_record") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let collection = match collection_arg(collection) {
        Ok(c) => c,
        Err(err) => return err,
    };
    let id = match c_ptr_to_string(id, "id") {
        Ok(id) => RecordId::new(id),
        Err(err) => return err,
    };

    match Repository::new(state, collection).resolve(&id) {
        Ok(Some(record)) => respond(Ok(record)),
        Ok(None) => response_to_c_string(&AppResponse::NotFound(format!(
            "No record found in {collection} with id: {id}"
        ))),
        Err(e) => response_to_c_string(&e),
    }
}

/// Whole collection as a JSON array, in insertion order.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_db`]; `collection`
/// must be null or a valid null-terminated string.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_all_records(state: *mut AppDbState, collection: *const c_char) -> *const c_char {
    let state = match state_ref(state, "get_all_records") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let collection = match collection_arg(collection) {
        Ok(c) => c,
        Err(err) => return err,
    };

    respond(Repository::new(state, collection).list())
}

/// Replaces the record whose `id` matches the one in `json_ptr`.
///
/// # Parameters
///
/// * `state` - Pointer returned by [`create_db`]
/// * `collection` - Collection name
/// * `json_ptr` - The full replacement record, `id` included
///
/// # Returns
///
/// `Ok` with the stored record, `NotFound` when no record has that id, or
/// `ValidationError` when the record has no id or fails the collection's
/// checks. A lending's computed `daysRemaining` is not stored.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_db`]. The string
/// arguments must be null or valid null-terminated strings.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn put_record(
    state: *mut AppDbState,
    collection: *const c_char,
    json_ptr: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "put_record") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let collection = match collection_arg(collection) {
        Ok(c) => c,
        Err(err) => return err,
    };
    let record = match record_arg(json_ptr) {
        Ok(r) => r,
        Err(err) => return err,
    };

    match Repository::new(state, collection).update(record) {
        Ok(Some(updated)) => respond(Ok(updated)),
        Ok(None) => response_to_c_string(&AppResponse::NotFound("Record not found for update".to_string())),
        Err(e) => response_to_c_string(&e),
    }
}

/// Deletes a record by id. Immediate and irreversible.
///
/// # Returns
///
/// `Ok` when a record was removed, `NotFound` otherwise.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_db`]. `collection`
/// and `id` must be null or valid null-terminated strings.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn delete_record(
    state: *mut AppDbState,
    collection: *const c_char,
    id: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "delete_record") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let collection = match collection_arg(collection) {
        Ok(c) => c,
        Err(err) => return err,
    };
    let id = match c_ptr_to_string(id, "id") {
        Ok(id) => RecordId::new(id),
        Err(err) => return err,
    };

    match Repository::new(state, collection).delete(&id) {
        Ok(true) => response_to_c_string(&AppResponse::success("Record deleted successfully")),
        Ok(false) => response_to_c_string(&AppResponse::NotFound(format!("No record found with id: {id}"))),
        Err(e) => response_to_c_string(&e),
    }
}

/// Runs search, sort and pagination over a collection.
///
/// `view_json` is a [`ViewState`]; a null pointer means the first page with
/// no query. Lended books carry a computed `daysRemaining` field that can be
/// used as a sort key. The `Ok` payload is a serialized
/// [`Page`](projection::Page).
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_db`]. `collection`
/// and `view_json` must be null or valid null-terminated strings.
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use library_desk_core::{create_db, query_records};
///
/// let db_state = create_db(CString::new("library_desk").unwrap().as_ptr());
/// let lended = CString::new("lendedBooks").unwrap();
/// let view = CString::new(
///     r#"{"filters":{"status":"Active"},"sort":{"key":"daysRemaining"},"pageSize":8}"#,
/// ).unwrap();
/// let page = query_records(db_state, lended.as_ptr(), view.as_ptr());
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn query_records(
    state: *mut AppDbState,
    collection: *const c_char,
    view_json: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "query_records") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let collection = match collection_arg(collection) {
        Ok(c) => c,
        Err(err) => return err,
    };

    let view = if view_json.is_null() {
        ViewState::default()
    } else {
        let json = match c_ptr_to_string(view_json, "view") {
            Ok(json) => json,
            Err(err) => return err,
        };
        match serde_json::from_str::<ViewState>(&json) {
            Ok(view) => view,
            Err(e) => {
                return response_to_c_string(&AppResponse::SerializationError(format!("Invalid view state: {e}")))
            }
        }
    };

    let page_size = state.config().default_page_size;
    let page = match collection {
        Collection::LendedBooks => lending::query_lendings(state, &view, Local::now().date_naive(), page_size),
        _ => Repository::new(state, collection).query(&view, page_size),
    };
    respond(page)
}

/// Counts of lended books by status.
///
/// # Returns
///
/// `Ok` with a [`LendingSummary`](lending::LendingSummary):
/// `{"total":..,"active":..,"overdue":..,"returned":..,"lost":..}`.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_db`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn lending_summary(state: *mut AppDbState) -> *const c_char {
    let state = match state_ref(state, "lending_summary") {
        Ok(s) => s,
        Err(err) => return err,
    };
    respond(lending::summary(state))
}

/// The membership plan catalog.
#[no_mangle]
pub extern "C" fn membership_plans() -> *const c_char {
    respond(Ok(&membership::PLANS))
}

/// Mock membership payment for a registered student.
///
/// # Parameters
///
/// * `state` - Pointer returned by [`create_db`]
/// * `json_ptr` - A [`PaymentRequest`]: `studentId`, `fullName`, `email`,
///   `mobile`, `selectedPlan` and optionally `paymentMethod`
///
/// # Returns
///
/// `Ok` with a [`PaymentReceipt`](membership::PaymentReceipt),
/// `ValidationError` for missing or malformed fields, `NotFound` for an
/// unknown plan or student.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_db`]; `json_ptr`
/// must be null or a valid null-terminated string.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn checkout_membership(state: *mut AppDbState, json_ptr: *const c_char) -> *const c_char {
    let state = match state_ref(state, "checkout_membership") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let json = match c_ptr_to_string(json_ptr, "JSON") {
        Ok(json) => json,
        Err(err) => return err,
    };
    let request: PaymentRequest = match serde_json::from_str(&json) {
        Ok(r) => r,
        Err(e) => {
            return response_to_c_string(&AppResponse::SerializationError(format!("Invalid payment request: {e}")))
        }
    };

    respond(membership::checkout_for_student(state, &request))
}

/// Empties every collection. The `Ok` payload is the number of removed records.
///
/// # Safety
///
/// `db_state` must be null or a live pointer from [`create_db`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn clear_all_records(db_state: *mut AppDbState) -> *const c_char {
    let db_state = match state_ref(db_state, "clear_all_records") {
        Ok(s) => s,
        Err(err) => return err,
    };
    respond(db_state.clear_all_records())
}

/// Deletes the store from disk and reopens it empty under `name_ptr`.
///
/// # Safety
///
/// `db_state` must be null or a live pointer from [`create_db`] that no other
/// thread is using; `name_ptr` must be null or a valid null-terminated string.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn reset_database(db_state: *mut AppDbState, name_ptr: *const c_char) -> *const c_char {
    let db_state = match unsafe { db_state.as_mut() } {
        Some(s) => s,
        None => {
            let error = AppResponse::BadRequest("Null state pointer passed to reset_database".to_string());
            return response_to_c_string(&error);
        }
    };
    let name = match c_ptr_to_string(name_ptr, "name") {
        Ok(name) => name,
        Err(err) => return err,
    };

    match db_state.reset_database(&name) {
        Ok(()) => response_to_c_string(&AppResponse::success(format!("Database '{name}' was reset successfully"))),
        Err(e) => response_to_c_string(&AppResponse::DatabaseError(format!("Error resetting database: {e}"))),
    }
}

/// Releases the LMDB environment; the state pointer stays valid but every
/// later call on it returns a `DatabaseError`.
///
/// # Safety
///
/// `db_state` must be null or a live pointer from [`create_db`] that no other
/// thread is using.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_database(db_state: *mut AppDbState) -> *const c_char {
    let db_state = match unsafe { db_state.as_mut() } {
        Some(s) => s,
        None => {
            let error = AppResponse::BadRequest("Null state pointer passed to close_database".to_string());
            return response_to_c_string(&error);
        }
    };

    match db_state.close_database() {
        Ok(()) => response_to_c_string(&AppResponse::success("Database connection closed successfully")),
        Err(e) => response_to_c_string(&e),
    }
}

/// Frees a state returned by [`create_db`]. Null is ignored.
///
/// # Safety
///
/// The pointer must come from [`create_db`] or [`create_db_with_config`] and
/// must not be used or freed again afterwards.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn destroy_db(db_state: *mut AppDbState) {
    if db_state.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(db_state) });
}

/// Frees a string returned by any function of this library. Null is ignored.
///
/// # Safety
///
/// The pointer must come from this library and must not be freed twice.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response(ptr: *const c_char) {
    if ptr.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(ptr as *mut c_char) });
}

/// Serializes a successful value into `AppResponse::Ok(json)`, or passes the
/// error through.
fn respond<T: Serialize>(result: Result<T, AppResponse>) -> *const c_char {
    let response = match result {
        Ok(value) => match serde_json::to_string(&value) {
            Ok(json) => AppResponse::Ok(json),
            Err(e) => AppResponse::SerializationError(format!("Failed to serialize result: {e}")),
        },
        Err(e) => e,
    };
    response_to_c_string(&response)
}

/// Converts an [`AppResponse`] to a heap-allocated C string owned by the
/// caller. Null if the response cannot be represented.
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}

/// Reads a C string argument, turning null pointers and invalid UTF-8 into a
/// ready-to-return `BadRequest` response.
fn c_ptr_to_string(ptr: *const c_char, field_name: &str) -> Result<String, *const c_char> {
    if ptr.is_null() {
        let error = AppResponse::BadRequest(format!("Null {field_name} pointer"));
        return Err(response_to_c_string(&error));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => {
            let error = AppResponse::BadRequest(format!("Invalid UTF-8 in {field_name}: {e}"));
            Err(response_to_c_string(&error))
        }
    }
}

fn state_ref<'a>(state: *mut AppDbState, caller: &str) -> Result<&'a AppDbState, *const c_char> {
    match unsafe { state.as_ref() } {
        Some(s) => Ok(s),
        None => {
            let error = AppResponse::BadRequest(format!("Null state pointer passed to {caller}"));
            Err(response_to_c_string(&error))
        }
    }
}

fn collection_arg(ptr: *const c_char) -> Result<Collection, *const c_char> {
    let name = c_ptr_to_string(ptr, "collection")?;
    name.parse::<Collection>().map_err(|e| response_to_c_string(&e))
}

fn record_arg(ptr: *const c_char) -> Result<Record, *const c_char> {
    let json = c_ptr_to_string(ptr, "JSON")?;
    Record::from_json(&json).map_err(|e| response_to_c_string(&e))
}
