//! # Storage Module
//!
//! Filesystem persistence for process documents.

mod file_store;

pub use file_store::{FileProcessStore, load_document_path, load_path, slug};
