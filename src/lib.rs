pub mod chunk;
pub mod cli;
pub mod config;
pub mod document;
pub mod extract;
pub mod findings;
pub mod ocr;
pub mod orchestrator;
pub mod pipeline;
pub mod provider;
pub mod report;
pub mod score;
pub mod textnorm;
pub mod util;
