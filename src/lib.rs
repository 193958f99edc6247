pub mod chunking;
pub mod content;
pub mod database;
pub mod document;
pub mod error;
pub mod gemini;
pub mod processor;
pub mod rag;
pub mod retry;
