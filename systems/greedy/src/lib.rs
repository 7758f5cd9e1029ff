#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Polynomial-time greedy selectors for wave planning.
//!
//! Both selectors are pure functions of the [`CoverageIndex`] and their
//! arguments. They never mutate the tested-software or remaining-device sets
//! they are lent and always report [`Outcome::Heuristic`] unless the input is
//! degenerate.
//!
//! [`CoverageIndex`]: wave_planner_core::CoverageIndex
//! [`Outcome::Heuristic`]: wave_planner_core::Outcome::Heuristic

mod max_coverage;
mod set_cover;

pub use max_coverage::max_coverage;
pub use set_cover::set_cover;
