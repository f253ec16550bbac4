pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod heal;
pub mod pipeline;
pub mod semantic;
pub mod settings;
pub mod wasm;

pub use pipeline::{GraphValidation, ValidationPipeline};
