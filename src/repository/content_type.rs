//! Content-type formatting and Accept-header negotiation.

use anyhow::{Context, Result, bail};
use regex::Regex;
use std::sync::LazyLock;

use crate::package::Generation;

static VERSION_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bversion=v(\d+)")
        .unwrap_or_else(|e| panic!("invalid version token pattern: {e}"))
});

/// Content type of a repository document for one generation, e.g.
/// `application/vnd.dcos.universe.repo+json;charset=utf-8;version=v4`.
pub fn format_content_type(generation: Generation) -> String {
    format!(
        "application/vnd.dcos.universe.repo+json;charset=utf-8;version={}",
        generation.tag()
    )
}

/// Pick the newest generation named in an Accept header.
///
/// Every `version=vN` token counts; the numerically highest wins, so
/// multi-digit generations order correctly. Fails when the header names no
/// generation at all, or only generations this engine does not know.
pub fn highest_requested_generation(accept: &str) -> Result<Generation> {
    let mut highest: Option<u32> = None;
    for captures in VERSION_TOKEN.captures_iter(accept) {
        let number: u32 = captures[1]
            .parse()
            .with_context(|| format!("version token out of range in {accept:?}"))?;
        highest = Some(highest.map_or(number, |h| h.max(number)));
    }

    let Some(number) = highest else {
        bail!("no repository version found in Accept header {accept:?}");
    };
    Generation::from_number(number)
        .with_context(|| format!("unsupported repository version v{number} in {accept:?}"))
}
