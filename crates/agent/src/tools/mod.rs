//! Built-in tool implementations: arithmetic, string manipulation, and chart
//! URL generation. CRM tools live in their own crate because they carry an
//! authenticated session.

pub mod chart;
pub mod math;
pub mod text;
