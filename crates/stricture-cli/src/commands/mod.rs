pub mod check;
pub mod rules;
pub mod validate_manifest;
