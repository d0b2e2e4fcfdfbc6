mod engine;
mod rates;
mod score;
mod tax;
mod types;

pub use engine::analyze_deal;
pub use rates::{monthly_payment, present_value, remaining_balance};
pub use score::{ScoreMetrics, composite_score};
pub use tax::{CORPORATION_TAX_RATE, income_tax, marginal_income_tax, stamp_duty};
pub use types::{BuyerType, DealInputs, DealSummary, LoanType, YearlyLedgerEntry};
