// Deal scoring: prompt assembly, model calls, weighting and delivery.

pub mod client;
pub mod handlers;
pub mod orchestrator;
pub mod pacer;
pub mod parser;
pub mod prompts;
pub mod sink;
pub mod weights;

pub use orchestrator::ScoringOrchestrator;
