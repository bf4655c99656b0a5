//! Network-facing fetchers.
//!
//! The pipeline follows the usual two-phase scraping pattern:
//!
//! 1. **Discovery**: ask the GDELT DOC API for recent articles ([`gdelt`])
//! 2. **Fetching**: download each article page and extract its body text
//!    ([`article`])
//!
//! Both are behind traits so the runner can be driven by in-memory fakes.

pub mod article;
pub mod gdelt;
