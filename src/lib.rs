pub mod catalog;
pub mod data;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod filter;
pub mod indicators;
pub mod logging;
pub mod state;
pub mod table;
pub mod titles;
pub mod transforms;
pub mod verify;
