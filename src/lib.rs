//! # sitefix
//!
//! Maintenance tooling for a hand-built static site whose pages carry their
//! images inline as base64 `data:` URIs.
//!
//! # Two Procedures
//!
//! ```text
//! 1. Extract   page.html      →  images/*.png|jpg   (decode inline images to files)
//! 2. Patch     index.html...  →  index.html...      (rewrite markup in place)
//! ```
//!
//! The two share nothing at runtime except configuration. `extract` runs once
//! against the original export of the page; `patch` then rewrites the live
//! documents to point at the extracted files and fills in missing SEO tags.
//! Either can be run alone, and `run` does both in order.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`extract`] | Finds `data:image/...;base64,` references, decodes and writes them, verifies the writes |
//! | [`patch`] | Ordered textual rewrite rules with an explicit outcome per rule |
//! | [`naming`] | Maps embedded images to output filenames, by position or by `alt` text |
//! | [`config`] | `sitefix.toml` loading, stock defaults, merging, and validation |
//! | [`types`] | Format tags shared by config, extraction, and reports |
//! | [`output`] | CLI output formatting for both procedures |
//!
//! # Design Decisions
//!
//! ## Text, Not a Parse Tree
//!
//! Every edit is a substring or regex match against the raw document. The
//! pages are exported by a site builder and never hand-edited, so their
//! markup is predictable, and a textual pass leaves every byte it does not
//! touch exactly as it was. The cost is that markers inside comments or
//! script strings are matched too; the [`patch`] module docs list each
//! rule's guard so the exposure is visible.
//!
//! ## Reported Outcomes
//!
//! A rule that does nothing is reported as such, with the reason
//! ([`patch::RuleOutcome`]). `sitefix check` runs every rule without writing,
//! so the effect of a patch can be read before it happens.
//!
//! ## Configuration Over Literals
//!
//! File paths, the image name list, and every inserted value live in
//! `sitefix.toml`. The stock defaults reproduce the New Bayit site, so running
//! with no config file does what the tool was first written to do.

pub mod config;
pub mod extract;
pub mod naming;
pub mod output;
pub mod patch;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
