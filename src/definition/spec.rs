//! String spec grammar: `name[.factory][#update]` and `!name`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{DiError, DiResult};

static SPEC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:!(?P<reuse>[^.#!\s]+)|(?P<bundle>[^.#!\s]+)(?:\.(?P<factory>[^.#!\s]+))?(?:#(?P<update>[^.#!\s]+))?)$",
    )
    .expect("spec grammar is a valid regex")
});

/// Parsed form of a string spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Spec {
    /// `!name`
    Reuse(String),
    /// `name[.factory][#update]`
    Build {
        bundle: String,
        factory: Option<String>,
        update: Option<String>,
    },
}

impl Spec {
    /// Parses a string spec.
    ///
    /// # Examples
    ///
    /// ```
    /// use rewire::definition::Spec;
    ///
    /// assert_eq!(
    ///     Spec::parse("Logger.create#refresh").unwrap(),
    ///     Spec::Build {
    ///         bundle: "Logger".into(),
    ///         factory: Some("create".into()),
    ///         update: Some("refresh".into()),
    ///     }
    /// );
    /// assert_eq!(Spec::parse("!Logger").unwrap(), Spec::Reuse("Logger".into()));
    /// assert!(Spec::parse("Logger..create").is_err());
    /// ```
    pub fn parse(raw: &str) -> DiResult<Spec> {
        let captures = SPEC_RE
            .captures(raw)
            .ok_or_else(|| DiError::InvalidDefinitionFormat(raw.to_string()))?;

        if let Some(reuse) = captures.name("reuse") {
            return Ok(Spec::Reuse(reuse.as_str().to_string()));
        }

        let bundle = captures
            .name("bundle")
            .ok_or_else(|| DiError::InvalidDefinitionFormat(raw.to_string()))?;
        Ok(Spec::Build {
            bundle: bundle.as_str().to_string(),
            factory: captures.name("factory").map(|m| m.as_str().to_string()),
            update: captures.name("update").map(|m| m.as_str().to_string()),
        })
    }
}
