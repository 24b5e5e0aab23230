//! Property-based tests for I80F48 arithmetic
//!
//! Randomised inputs over the range real account values occupy (prices,
//! fees and funding well inside ±2^40).
