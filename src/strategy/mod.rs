//! The three MIS algorithm strategies.
//!
//! Each module pairs a push-based strategy with the pure decision
//! function(s) it runs, so the model checker can verify the exact
//! predicates the production code uses.

pub mod desire;
pub mod fast;
pub mod slow;

pub use desire::DesireLevel;
pub use fast::FastMis;
pub use slow::SlowMis;
