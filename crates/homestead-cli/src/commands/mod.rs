pub mod add;
pub mod clear;
pub mod common;
pub mod config;
pub mod conflicts;
pub mod delete;
pub mod edit;
pub mod get;
pub mod list;
pub mod range;
pub mod status;
pub mod sync;
