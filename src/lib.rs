pub mod api;
pub mod bankroll;
pub mod clock;
pub mod config;
pub mod detector;
pub mod error;
pub mod guardrail;
pub mod monitor;
pub mod scorer;
pub mod state;
pub mod types;

#[cfg(test)]
mod test_support;
