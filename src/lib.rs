pub mod catalog;
pub mod config;
pub mod domain;
pub mod embeddings;
pub mod error;
pub mod geo;
pub mod matcher;
pub mod ner;
pub mod pipeline;
pub mod text;
pub mod utils;

pub use matcher::{MatchOptions, Matcher, Request};
pub use pipeline::{Confidence, MatchResult};

// Load env from a simple, standardized location resolution.
// This uses dotenvy::dotenv().ok() which loads .env if present and silently ignores if missing.
pub fn load_env() {
    let _ = dotenvy::dotenv();
}
