pub mod adapters;
pub mod engine;
pub mod scheduler;
pub mod supervisor;
