//! Teacher evaluation surveys: roster imports, response scoring and
//! per-period publication of aggregated results.

pub mod aggregate;
pub mod catalog;
pub mod db;
pub mod error;
pub mod models;
pub mod publication;
pub mod report;
pub mod roster;
pub mod rubric;
pub mod state;
pub mod store;
