pub mod context;
pub mod evaluation;
pub mod profile;
