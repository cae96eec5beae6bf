pub mod sharp_scorer;

pub use sharp_scorer::{score, score_signals};
