//! Pipeline stages for contract-PDF generation.
//!
//! Each submodule implements exactly one transformation step. Keeping the
//! stages separate makes each independently testable and lets us swap the
//! rendering backend without touching value handling.
//!
//! ## Data Flow
//!
//! ```text
//! record ──▶ normalize ──▶ links ──▶ media ──▶ template ──▶ render
//! (fields)   (to text)    (lookup)  (dataurl)  (HTML)       (PDF bytes)
//! ```
//!
//! 1. [`normalize`] — heterogeneous field values to plain text, grouped
//!    currency strings, and Shanghai-calendar dates
//! 2. [`rmb`]       — numeric totals to formal long-form RMB numerals
//! 3. [`links`]     — follow linked-record references for payment terms,
//!    quantity unit, and the product image
//! 4. [`media`]     — attachment binary to an inline data URL
//! 5. [`template`]  — resolved values into the fixed contract HTML
//! 6. [`render`]    — HTML to A4 PDF bytes via the headless engine

pub mod links;
pub mod media;
pub mod normalize;
pub mod render;
pub mod rmb;
pub mod template;
