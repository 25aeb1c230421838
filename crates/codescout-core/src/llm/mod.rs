//! Provider clients and abstractions
//!
//! Traits decouple the engine from concrete providers; the HTTP clients
//! target OpenAI-compatible embedding servers and cross-encoder rerank
//! services, with shared rate limiting.

pub mod http_embedder;
pub mod http_reranker;
pub mod rate_limiter;
pub mod traits;

pub use http_embedder::HttpEmbedder;
pub use http_reranker::HttpReranker;
pub use rate_limiter::RateLimiter;
pub use traits::{Embedder, RerankEntry, Reranker, Tokenizer};
