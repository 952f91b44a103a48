pub mod config;
pub mod error;
pub mod export;
pub mod llm;
pub mod pipeline;
pub mod secrets;
pub mod web;
