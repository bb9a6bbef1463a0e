//! Demand analytics over a grid snapshot.
//!
//! This module turns the current cell map into per-cell demand forecasts,
//! ranks relocation targets around a query point, reduces the grid to
//! operational KPIs, and runs the rebalancing simulation on a copy of it.

pub mod forecast;
pub mod kpi;
pub mod recommend;
pub mod simulate;
pub mod types;
pub mod utility;
