// Library interface for newsbot modules
// This allows tests and the binary to import modules

pub mod commands;
pub mod llm;
pub mod pipeline;
pub mod report;
pub mod scheduler;
pub mod server;
pub mod sink;
