//! News sentiment sources.
//!
//! Two backends produce a polarity in [-1, 1] for a ticker's recent news:
//! a local finance word-list scorer and the remote FinBERT service.

pub mod lexicon;
pub mod source;

pub use lexicon::{compound, HeadlineScorer};
pub use source::{NewsSentimentSource, SentimentBackend, DEFAULT_NEWS_LIMIT};
