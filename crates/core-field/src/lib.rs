//! Field Materializer, Materialize/Project/Assemble pipeline
//! (spec.md §4.7, §4.9).

pub mod assemble;
pub mod field;
pub mod instances;
pub mod project;

pub use assemble::assemble_render_frame;
pub use field::{materialize_field, AttributeStreams, FieldContext};
pub use instances::{materialize_color, materialize_instances, materialize_path, ColorChannels, MaterializedColor};
pub use project::project_3d_to_2d;
