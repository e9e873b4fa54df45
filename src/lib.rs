pub mod classifier;
pub mod config;
pub mod context;
pub mod export;
pub mod learning;
pub mod parser;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use classifier::{ClassificationResult, ClassifiedError, ErrorClassifier, ErrorType};
pub use config::Config;
pub use context::{CodebaseContext, ContextAnalyzer, ContextBuilder, ImpactLevel};
pub use learning::{PatternStore, RecordContext};
pub use parser::{ErrorParser, ParseResult, ParsedError, Severity};
