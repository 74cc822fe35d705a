pub mod analyzer;
pub mod cache;
pub mod dimension;
pub mod dimensions;
pub mod guidance;
pub mod handlers;
pub mod holistic;
pub mod orchestrator;
pub mod persistence;
pub mod prompts;
pub mod rubric;
pub mod synthesis;
