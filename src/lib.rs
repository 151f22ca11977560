pub mod backend;
pub mod batch;
pub mod catalog;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod format_csv;
pub mod format_detect;
pub mod intent;
pub mod masking;
pub mod narrator;
pub mod output;
pub mod pipeline;
pub mod semantic;
pub mod summary;
pub mod table;
pub mod verbose;
