pub mod bet_ledger;
pub mod line_store;
pub mod signal_book;

pub use bet_ledger::BetLedger;
pub use line_store::LineHistoryStore;
pub use signal_book::SignalBook;
