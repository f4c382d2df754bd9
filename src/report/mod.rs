//! Output rendering
//!
//! - [`table`] - the port listing as a table, JSON or CSV
//! - [`overview`] - the sectioned project overview
//! - [`palette`] - optional ANSI styling

pub mod overview;
pub mod palette;
pub mod table;

use crate::graph::Overview;
use crate::usage::ServiceUsage;
use serde::Serialize;

pub use overview::{render_overview, wrap_bullet_line};
pub use palette::{strip_ansi, Palette};
pub use table::{render_json, render_table, resolve_columns, write_csv};

/// Overview rows with the reconciled usage of each service
#[derive(Debug, Clone, Serialize)]
pub struct OverviewReport {
    pub overview: Overview,
    pub compute: ServiceUsage,
    pub network: ServiceUsage,
    pub volume: ServiceUsage,
}
