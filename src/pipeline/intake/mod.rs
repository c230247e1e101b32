pub mod machine;
pub mod stages;
pub mod transcript;

pub use machine::*;
pub use stages::*;
pub use transcript::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Conversation {0} is already complete")]
    ConversationComplete(String),

    #[error("Patient message is empty")]
    EmptyMessage,
}
