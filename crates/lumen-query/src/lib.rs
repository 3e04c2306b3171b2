//! Query side of the pipeline: prompt assembly, answer generation and the
//! answer/citation stream split.

pub mod demux;
pub mod engine;
pub mod generator;
pub mod prompt;

pub use demux::{FinalAnswer, StreamSession};
pub use engine::{AnswerStream, QueryEngine};
pub use generator::{OpenAiChat, ScriptedGenerator};
