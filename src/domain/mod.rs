//! Domain layer for Audit Sentinel
//!
//! CDD Principle: Domain Model - Pure business logic for audit specification quality
//! - Contains all core entities, value objects, and domain services
//! - Independent of infrastructure concerns like file systems or external checkers
//! - Expresses the ubiquitous language of findings, grammars, and severities

pub mod field_path;
pub mod findings;

// Re-export main domain types for convenience
pub use field_path::{FieldPath, PathSegment};
pub use findings::*;
