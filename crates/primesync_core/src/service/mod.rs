//! Import and export use cases over the entity repository.
//!
//! # Responsibility
//! - Orchestrate codec and repository calls per document.
//! - Keep CLI callers decoupled from storage details.

pub mod exporter;
pub mod importer;
