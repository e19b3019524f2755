#![deny(clippy::all)]
#![warn(clippy::nursery, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregation;
pub mod models;
pub mod providers;
pub mod types;
