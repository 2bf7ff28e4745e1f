//! `{placeholder}` substitution for notification subjects, bodies and notes.

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use regex::{Captures, Regex};

fn placeholder_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\{(\w+)\}").expect("placeholder regex"))
}

/// Replace every `{name}` with `vars[name]`. Unknown names are left verbatim
/// so a typo in a template stays visible to the operator. Single pass: values
/// that themselves contain `{...}` are not expanded again.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    placeholder_re()
        .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
            Some(v) => v.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
