pub mod chunk;
pub mod conversation;
pub mod enums;
pub mod note;

pub use chunk::*;
pub use conversation::*;
pub use note::*;
