pub mod analyzer;
pub mod cache;
pub mod speech;
pub mod store;

pub use analyzer::OpenAiAnalysisAdapter;
pub use cache::SqliteCacheAdapter;
pub use speech::OpenAiSpeechAdapter;
pub use store::HttpStoreAdapter;
