//! Stage adapter implementations.
//!
//! - [`CommandStage`]: an external process speaking JSON on stdin/stdout
//! - [`ScriptedStage`]: replays a fixed list of responses

pub mod command;
pub mod scripted;

pub use command::CommandStage;
pub use scripted::{ScriptStep, ScriptedStage};
