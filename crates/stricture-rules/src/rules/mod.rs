//! Built-in rule catalogue.

mod architecture;
mod contract;
mod quality;

use crate::rule::Rule;
use stricture_kernel::SourceLocation;

pub use architecture::{
    DependencyDirection, LayerViolation, MaxFileLines, ModuleBoundaryRule, NoCircularDeps,
};
pub use contract::{
    ErrorHandling, Idempotency, NullSafety, Pagination, StatusCodeHandling, StrictnessParity,
};
pub use quality::NoShallowAssertions;

pub(crate) fn builtin() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(StatusCodeHandling),
        Box::new(ErrorHandling),
        Box::new(NullSafety),
        Box::new(StrictnessParity),
        Box::new(Pagination),
        Box::new(Idempotency),
        Box::new(NoShallowAssertions),
        Box::new(NoCircularDeps),
        Box::new(DependencyDirection),
        Box::new(LayerViolation),
        Box::new(ModuleBoundaryRule),
        Box::new(MaxFileLines),
    ]
}

/// `location` with `file` filled in when the producer left it empty.
fn in_file(location: &SourceLocation, file: &str) -> SourceLocation {
    let mut location = location.clone();
    if location.file.is_empty() {
        location.file = file.to_string();
    }
    location
}

/// Comma-separated list.
fn join<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|item| item.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
