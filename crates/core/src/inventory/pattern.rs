//! Host patterns.
//!
//! A pattern is a list of terms separated by `:` or `,`. Plain terms are
//! unioned in order, `&term` intersects and `!term` excludes. A term is a
//! group name, a host name, `all`/`*`, or a glob using `*` and `?` that is
//! matched against both group and host names.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use indexmap::IndexSet;
use itertools::Itertools;
use log::debug;

use crate::config::ROOT_GROUP;
use crate::error::{Error, Result};
use crate::inventory::Inventory;

const MAX_SUGGESTIONS: usize = 3;

enum Term<'a> {
    Include(&'a str),
    Intersect(&'a str),
    Exclude(&'a str),
}

impl<'a> Term<'a> {
    fn parse(raw: &'a str) -> Self {
        if let Some(name) = raw.strip_prefix('!') {
            Term::Exclude(name)
        } else if let Some(name) = raw.strip_prefix('&') {
            Term::Intersect(name)
        } else {
            Term::Include(raw)
        }
    }

    fn name(&self) -> &'a str {
        match self {
            Term::Include(name) | Term::Intersect(name) | Term::Exclude(name) => name,
        }
    }
}

impl Inventory {
    /// Resolves a group name, host name or pattern to an ordered host list.
    ///
    /// A group that exists but has no hosts resolves to an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownScope`] if any term of the pattern matches no
    /// group and no host.
    pub fn resolve(&self, pattern: &str) -> Result<Vec<String>> {
        let terms: Vec<Term> = pattern
            .split([':', ','])
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(Term::parse)
            .collect();

        if terms.is_empty() {
            return Err(Error::unknown_scope(pattern.to_string(), Vec::new()));
        }

        let mut included: IndexSet<String> = IndexSet::new();
        let mut intersections: Vec<IndexSet<String>> = Vec::new();
        let mut exclusions: Vec<IndexSet<String>> = Vec::new();

        for term in &terms {
            let Some(hosts) = self.resolve_term(term.name()) else {
                return Err(Error::unknown_scope(
                    pattern.to_string(),
                    self.suggest(term.name()),
                ));
            };

            match term {
                Term::Include(_) => included.extend(hosts),
                Term::Intersect(_) => intersections.push(hosts),
                Term::Exclude(_) => exclusions.push(hosts),
            }
        }

        // A pattern made only of restrictions starts from every host.
        if !terms.iter().any(|term| matches!(term, Term::Include(_))) {
            included = self.hosts.keys().cloned().collect();
        }

        let resolved: Vec<String> = included
            .into_iter()
            .filter(|host| intersections.iter().all(|set| set.contains(host)))
            .filter(|host| exclusions.iter().all(|set| !set.contains(host)))
            .collect();

        debug!("Pattern `{pattern}` resolved to {} hosts", resolved.len());
        Ok(resolved)
    }

    fn resolve_term(&self, name: &str) -> Option<IndexSet<String>> {
        if name == ROOT_GROUP || name == "*" {
            return self.group_hosts(ROOT_GROUP);
        }

        if let Some(hosts) = self.group_hosts(name) {
            return Some(hosts);
        }

        if self.has_host(name) {
            return Some(IndexSet::from([name.to_string()]));
        }

        if !name.contains(['*', '?']) {
            return None;
        }

        let mut hosts = IndexSet::new();
        let mut matched = false;

        for group in self.group_names().filter(|group| glob_matches(name, group)) {
            matched = true;
            hosts.extend(self.group_hosts(group).unwrap_or_default());
        }

        for host in self.host_names().filter(|host| glob_matches(name, host)) {
            matched = true;
            hosts.insert(host.clone());
        }

        matched.then_some(hosts)
    }

    /// Group and host names that look like `name`, best match first.
    #[must_use]
    pub fn suggest(&self, name: &str) -> Vec<String> {
        let matcher = SkimMatcherV2::default();

        self.group_names()
            .chain(self.host_names())
            .unique()
            .filter_map(|candidate| {
                matcher
                    .fuzzy_match(candidate, name)
                    .map(|score| (score, candidate))
            })
            .sorted_by(|(left, _), (right, _)| right.cmp(left))
            .take(MAX_SUGGESTIONS)
            .map(|(_, candidate)| candidate.clone())
            .collect()
    }
}

/// Shell-style glob match supporting `*` and `?`.
fn glob_matches(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
