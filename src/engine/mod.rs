//! Command interpretation and message fan-out.

pub mod broadcast;
pub mod interpreter;

pub use broadcast::SessionRegistry;
pub use interpreter::{classify, handle_line, render_error, Command, Outgoing, Recipient};
