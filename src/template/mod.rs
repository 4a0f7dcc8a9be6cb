//! `{{ name }}` substitution over a [`ParameterMap`].
//!
//! The directive command and any config file bodies go through the same
//! routine, so a parameter can never render differently between the two.

use crate::error::RunError;
use crate::params::ParameterMap;

/// Render a template, replacing each `{{ name }}` token with the canonical
/// string form of the named parameter.
///
/// A token whose parameter is missing fails with
/// [`RunError::MissingParameter`]; a template without tokens comes back
/// unchanged. Pure — repeated calls with the same inputs are byte-identical.
pub fn render(template: &str, params: &ParameterMap) -> Result<String, RunError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            // Unterminated `{{` is literal text, not a token.
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let token = after[..end].trim();
        match params.get(token) {
            Some(value) => out.push_str(&value.to_string()),
            None => {
                return Err(RunError::MissingParameter {
                    token: token.to_string(),
                });
            }
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Render a fetched config file body. Identical semantics to [`render`].
pub fn render_config(body: &str, params: &ParameterMap) -> Result<String, RunError> {
    render(body, params)
}
