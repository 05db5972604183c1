//! DogSquad - backend service for reporting and coordinating stray-dog
//! welfare rescues.
//!
//! # Overview
//!
//! DogSquad owns the report lifecycle: a community member submits a welfare
//! report, volunteers get alerted about it, and every action taken against
//! the report lands in an append-only audit timeline until the report is
//! resolved and closed.
//!
//! # Lifecycle Guarantees
//!
//! - A report always starts `pending` and only moves along the fixed
//!   lifecycle (`pending` → `in_progress` → `resolved` → `closed`, plus a
//!   close-from-anywhere administrative override).
//! - A report cannot exist without both coordinates; submission aborts
//!   before persistence when the location was not captured.
//! - Timeline entries are append-only and are only written after the report
//!   they reference is durably committed.
//! - A volunteer is alerted at most once per report, and an alert's outcome
//!   is recorded exactly once.
//!
//! # Modules
//!
//! - [`model`]: closed enums and entities for reports, timeline, and alerts
//! - [`error`]: the lifecycle error taxonomy
//! - [`storage`]: SQLite storage layer (report store, timeline recorder,
//!   alert records)
//! - [`images`]: the image store collaborator
//! - [`submission`]: the report submission flow
//! - [`api`]: HTTP API handlers

pub mod api;
pub mod error;
pub mod images;
pub mod model;
pub mod storage;
pub mod submission;
