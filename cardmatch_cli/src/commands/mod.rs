pub mod batch;
pub mod match_text;
pub mod seed;
pub mod strategies;
