//! Premium matrices, premium lookup and quoting

pub mod interpolate;
pub mod loader;
pub mod matrix;
pub mod quick_quote;
pub mod quotes;

pub use interpolate::{
    estimate_premium, get_exact_premium, interpolate_premium, interpolate_premium_with_guardrail,
    PremiumLookup, PremiumMissReason, PremiumQuery, PREMIUM_GUARDRAIL,
};
pub use loader::{load_premium_matrices, load_premium_matrices_from_reader};
pub use matrix::{PremiumMatrix, PremiumMatrixRow, RateClass, TobaccoClass};
pub use quick_quote::{QuickQuoteInput, QuickQuoteResult, QuickQuoter, QuoteColumn};
pub use quotes::{
    calculate_alternative_quotes, comparison_face_amounts, cost_per_thousand, fit_face_amounts, AlternativeQuote,
};
