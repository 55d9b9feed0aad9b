//! Weather-driven AI canvas for Home Assistant dashboards

#![allow(clippy::multiple_crate_versions)]
#![deny(clippy::all)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::complexity)]
#![deny(clippy::correctness)]
#![deny(clippy::disallowed_methods)]
#![deny(clippy::expect_used)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::panic)]
#![deny(clippy::perf)]
#![deny(clippy::trivially_copy_pass_by_ref)]
#![deny(clippy::unreachable)]
#![deny(clippy::unwrap_used)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(warnings)]

pub mod cli;
pub mod config;
pub mod constants;
pub mod daypart;
pub mod display;
pub mod error;
pub mod homeassistant;
pub mod image_fetcher;
pub mod prompt;
pub mod scheduler;
pub mod season;
pub mod services;
pub mod weather;
pub mod web;
