//! Two-sigil variable substitution used in recipe step commands:
//!
//! - `$[[ NAME ]]` expands one of a fixed set of internal variables (target
//!   and host platform/architecture, toolchain prefix, project path,
//!   install prefix). Referencing a name outside that set is a mistake in
//!   the recipe, not a situation to paper over, so it errors.
//! - `$[ NAME ]` expands an environment variable from the process
//!   environment the step will run in. A recipe author can't know every
//!   environment a build will run in, so a variable that happens to be
//!   unset there (e.g. an optional `CFLAGS`) substitutes an empty string,
//!   the same way a shell would.

use crate::error::{ChefError, Result};
use std::collections::HashMap;

const COMPONENT: &str = "oven/variables";

pub fn expand(template: &str, internal: &HashMap<String, String>, env: &HashMap<String, String>) -> Result<String> {
    let bytes = template.as_bytes();
    let mut out = String::with_capacity(template.len());
    let mut i = 0;

    while i < bytes.len() {
        if template[i..].starts_with("$[[") {
            let Some(close) = template[i + 3..].find("]]") else {
                return Err(ChefError::validation(COMPONENT, format!("unterminated $[[ in: {template}")));
            };
            let name = template[i + 3..i + 3 + close].trim();
            let value = internal
                .get(name)
                .ok_or_else(|| ChefError::not_found(COMPONENT, format!("internal variable '{name}'")))?;
            out.push_str(value);
            i += 3 + close + 2;
        } else if template[i..].starts_with('$') && template[i + 1..].starts_with('[') {
            let Some(close) = template[i + 2..].find(']') else {
                return Err(ChefError::validation(COMPONENT, format!("unterminated $[ in: {template}")));
            };
            let name = template[i + 2..i + 2 + close].trim();
            let value = env.get(name).map(String::as_str).unwrap_or("");
            out.push_str(value);
            i += 2 + close + 1;
        } else {
            let ch = template[i..].chars().next().unwrap();
            out.push(ch);
            i += ch.len_utf8();
        }
    }

    Ok(out)
}
