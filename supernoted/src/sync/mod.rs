pub mod convert;
pub mod engine;
pub mod paths;
pub mod queue;
pub mod reader;
pub mod transfer;
