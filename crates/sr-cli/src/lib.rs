//! Interactive terminal interface for SupportRAG

mod session;
mod ui;

#[cfg(test)]
mod tests;

pub use session::{ChatSession, Reply, SessionCommand};
pub use ui::{display_banner, handle_input_with_history, print_help};

// Re-export core types
pub use sr_core::{Error, Result};
