pub mod exposure;
pub mod withdrawal;

pub use exposure::{compute_exposure, RiskExposure, RiskLevel};
pub use withdrawal::{recommend_withdrawal, WithdrawalInput, WithdrawalRecommendation};
