pub mod qa_chain;

pub use qa_chain::StuffQaChain;
