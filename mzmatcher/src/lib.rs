mod args;
mod driver;
mod input;
mod write;

pub use args::{default_source_for, AnnotatorSpec, AnnotatorSpecParseError, ArgAnnotatorKind};
pub use driver::{MZMatcher, MZMatcherError};
pub use input::FeatureRecord;
pub use write::{write_json, OutputWriter};
