pub mod catalog;
pub mod classifier;
pub mod config;
pub mod error;
pub mod executor;
pub mod history;
pub mod index;
pub mod matcher;
pub mod pools;
pub mod prompt;
pub mod resolver;
pub mod store;
pub mod tokenizer;
