pub mod intake;
pub mod rag;
pub mod storage;
pub mod structuring;
