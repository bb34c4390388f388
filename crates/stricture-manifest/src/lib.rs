//! Manifest model and schema validation.
//!
//! A manifest declares API contracts (endpoints, typed fields with enum value
//! sets, numeric ranges, string formats, nullability, status codes) and the
//! architecture configuration (ordered layers, module boundaries, line limits,
//! forbidden access). [`load`] turns the decoded document into a validated
//! [`Manifest`] or fails with a [`ManifestSchemaError`]; nothing downstream
//! ever sees an unvalidated manifest.

mod error;
mod format;
mod load;
mod model;
pub mod raw;

pub use error::ManifestSchemaError;
pub use format::ManifestFormat;
pub use load::{
    RULE_DEPENDENCY_DIRECTION, RULE_LAYER_VIOLATION, RULE_MAX_FILE_LINES, RULE_MODULE_BOUNDARY,
    RULE_SHALLOW_ASSERTIONS, load,
};
pub use model::{
    ArchitectureConfig, AssertionOptions, Bypass, Contract, DEFAULT_MIN_FIELD_FRACTION, Endpoint,
    Field, FieldType, ForbiddenImports, Layer, LineLimits, LineOverride, Manifest, ModuleBoundary,
    NumericRange, Pagination, PathMatcher, Primitive, ReexportAttribution, SeveritySetting, Shape,
    Strictness, StrictnessMode, StringFormat,
};
