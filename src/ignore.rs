use tracing::warn;

/// compiled ignore patterns for the tree builder
///
/// patterns are matched against scan-root-relative paths with `/`
/// separators, and against the basename, so both `dist/**` and
/// `.DS_Store` styles work. dotfiles are not excluded by default, and
/// `!` negation is not supported (the glob crate has none).
///
/// a pattern the glob crate rejects degrades to a simpler rule instead of
/// dropping the pattern: `<prefix>/**` becomes a path-prefix match, `*ext`
/// a suffix match, anything else exact-or-substring.
pub struct IgnoreSet {
    rules: Vec<Rule>,
    /// bare directory names extracted from `<dir>/**` patterns, used to
    /// prune recursion without walking the ignored subtree
    dir_prunes: Vec<String>,
}

enum Rule {
    Glob(glob::Pattern),
    Prefix(String),
    Suffix(String),
    Literal(String),
}

impl IgnoreSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut rules = Vec::new();
        let mut dir_prunes = Vec::new();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            if pattern.is_empty() {
                continue;
            }

            if let Some(prefix) = pattern.strip_suffix("/**") {
                dir_prunes.push(prefix.to_string());
            }

            match glob::Pattern::new(pattern) {
                Ok(compiled) => rules.push(Rule::Glob(compiled)),
                Err(e) => {
                    warn!(pattern, error = %e, "ignore pattern failed to compile, using fallback match");
                    rules.push(fallback_rule(pattern));
                }
            }
        }

        Self { rules, dir_prunes }
    }

    /// does any pattern match this root-relative path
    pub fn is_ignored(&self, rel_path: &str) -> bool {
        let basename = rel_path.rsplit('/').next().unwrap_or(rel_path);
        self.rules.iter().any(|rule| {
            rule.matches(rel_path) || (rel_path != basename && rule.matches(basename))
        })
    }

    /// should the builder skip recursing into this directory entirely
    pub fn prunes_dir(&self, rel_path: &str) -> bool {
        self.is_ignored(rel_path) || self.dir_prunes.iter().any(|p| p == rel_path)
    }
}

impl Rule {
    fn matches(&self, path: &str) -> bool {
        match self {
            Rule::Glob(pattern) => pattern.matches(path),
            Rule::Prefix(prefix) => path.starts_with(prefix),
            Rule::Suffix(suffix) => path.ends_with(suffix),
            Rule::Literal(lit) => path == lit || path.contains(lit.as_str()),
        }
    }
}

fn fallback_rule(pattern: &str) -> Rule {
    if let Some(prefix) = pattern.strip_suffix("**") {
        Rule::Prefix(prefix.to_string())
    } else if let Some(suffix) = pattern.strip_prefix('*') {
        Rule::Suffix(suffix.to_string())
    } else {
        Rule::Literal(pattern.to_string())
    }
}
