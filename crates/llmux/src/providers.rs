pub mod anthropic;
pub mod base;
pub mod errors;
pub mod factory;
pub mod google;
pub mod openai;
pub mod utils;
pub mod xai;

#[cfg(test)]
pub mod mock;
