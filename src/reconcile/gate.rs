use log::debug;
use regex::Regex;

/// One entry of the branch allow-list.
///
/// A pattern matches when it is the wildcard, exactly equal to the branch,
/// or a regular expression matching the branch. A pattern with invalid
/// regex syntax can still match exactly; it never aborts evaluation.
#[derive(Debug, Clone)]
pub enum BranchRule {
    Any,
    Pattern { raw: String, regex: Option<Regex> },
}

impl BranchRule {
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            return BranchRule::Any;
        }
        BranchRule::Pattern {
            raw: pattern.to_string(),
            regex: Regex::new(pattern).ok(),
        }
    }

    pub fn matches(&self, branch: &str) -> bool {
        match self {
            BranchRule::Any => true,
            BranchRule::Pattern { raw, regex } => {
                raw == branch || regex.as_ref().is_some_and(|re| re.is_match(branch))
            }
        }
    }
}

/// The predicate deciding whether a reconciliation run proceeds at all.
/// Rules are evaluated in list order with short-circuit on the first match;
/// an empty list allows nothing.
#[derive(Debug, Clone)]
pub struct BranchGate {
    rules: Vec<BranchRule>,
}

impl BranchGate {
    pub fn new(patterns: &[String]) -> Self {
        Self {
            rules: patterns.iter().map(|p| BranchRule::parse(p)).collect(),
        }
    }

    pub fn allows(&self, branch: &str) -> bool {
        let allowed = self.rules.iter().any(|rule| rule.matches(branch));
        if !allowed {
            debug!("branch {branch} matched no allow-list rule");
        }
        allowed
    }
}
