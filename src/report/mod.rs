//! # Report — Facts In, Deterministic Text Out
//!
//! | Submodule | Responsibility |
//! |-----------|----------------|
//! | [`aggregate`] | concurrent fact gathering + terminal aggregation branches |
//! | [`render`] | pure fact → table rendering, Persian digits, grade labels |
//! | [`dates`] | Gregorian → Jalali arithmetic, digit localization |

pub mod aggregate;
pub mod dates;
pub mod render;
