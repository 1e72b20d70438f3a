use crate::plugins::registry::LinkExpander;
use regex::Regex;
use std::sync::OnceLock;

/// Upper bound on the URLs one bracketed range may produce.
const MAX_EXPANDED: usize = 1000;

/// Expands one bracketed numeric range: `http://h/ep[01-03].mkv` becomes
/// `ep01`, `ep02`, `ep03`. The width of the first bound sets zero padding.
pub struct NumberedLinkExpander;

impl LinkExpander for NumberedLinkExpander {
    fn name(&self) -> &'static str {
        "numbered"
    }

    fn try_expand(&self, url: &str) -> Option<Vec<String>> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"^(\w+://[^\[\]]*)\[(\d+)-(\d+)\]([^\[\]]*)$").unwrap());
        let caps = re.captures(url)?;
        let (head, from, to, tail) = (&caps[1], &caps[2], &caps[3], &caps[4]);
        let start: usize = from.parse().ok()?;
        let end: usize = to.parse().ok()?;
        if start > end || end - start >= MAX_EXPANDED {
            return None;
        }
        let width = if from.starts_with('0') { from.len() } else { 0 };
        Some(
            (start..=end)
                .map(|n| format!("{}{:0width$}{}", head, n, tail, width = width))
                .collect(),
        )
    }
}
