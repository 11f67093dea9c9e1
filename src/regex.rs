//! Regex backend selected by the `regex` / `lite` features.

#[cfg(feature = "regex")]
pub(crate) use ::regex::Regex;

#[cfg(all(feature = "lite", not(feature = "regex")))]
pub(crate) use ::regex_lite::Regex;

#[cfg(not(any(feature = "regex", feature = "lite")))]
compile_error!("either the `regex` or the `lite` feature must be enabled");
