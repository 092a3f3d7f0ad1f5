mod engine_builder;

pub use engine_builder::build_orchestrator;
