//! Shared test harness modules for the geosink CLI.

use super::*;

mod helpers;
mod steps;
mod unit;
