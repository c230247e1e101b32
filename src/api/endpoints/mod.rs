pub mod health;
pub mod intake;
pub mod notes;
pub mod qa;
