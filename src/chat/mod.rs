pub mod message;
pub mod session;

pub use message::{ContentBlock, History, Message, Role};
pub use session::{ChatSession, ModelProvider, MAX_ITERATIONS, MESSAGE_WINDOW};
