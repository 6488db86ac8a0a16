pub mod diagram;
pub mod document_writer;
pub mod idea_source;
pub mod question_framer;
pub mod raster_diagram;
pub mod validator;

pub use diagram::DiagramSelector;
pub use document_writer::DocumentWriter;
pub use idea_source::{IdeaBatch, IdeaOrigin, IdeaSource};
pub use question_framer::QuestionFramer;
pub use raster_diagram::DiagramRenderer;
pub use validator::{ValidationVerdict, Validator};
