pub mod comparison;
pub mod profile;

pub use comparison::{ComparisonResult, DeltaKind, FunctionDelta};
pub use profile::{FlameNode, FlameTree, FunctionRecord, NormalizedProfile, SourceFormat};
