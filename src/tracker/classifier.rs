//! Keyword-based productivity categorization. The rules live in a fixed
//! priority table; the first matching rule wins, so broad browser rules are
//! refined by title keywords before falling back to generic web research.

pub use crate::store::entities::UNCATEGORIZED;

/// One classification rule. An entry matches when the lowercased application
/// name contains any of `apps` and, if `titles` is set, the lowercased window
/// title contains any of those as well.
struct Rule {
    apps: &'static [&'static str],
    titles: Option<&'static [&'static str]>,
    category: &'static str,
}

const BROWSERS: &[&str] = &["chrome", "firefox", "safari"];

const RULES: &[Rule] = &[
    Rule {
        apps: &["code", "visual studio", "sublime"],
        titles: None,
        category: "Deep Work - Coding",
    },
    Rule {
        apps: &["terminal", "iterm"],
        titles: None,
        category: "Deep Work - Development",
    },
    Rule {
        apps: BROWSERS,
        titles: Some(&["github", "stackoverflow", "docs"]),
        category: "Research - Development",
    },
    Rule {
        apps: BROWSERS,
        titles: Some(&["youtube", "reddit", "twitter"]),
        category: "Distraction - Social Media",
    },
    Rule {
        apps: BROWSERS,
        titles: None,
        category: "Research - Web",
    },
    Rule {
        apps: &["slack", "discord", "teams"],
        titles: None,
        category: "Communication",
    },
    Rule {
        apps: &["mail", "outlook"],
        titles: None,
        category: "Communication - Email",
    },
    Rule {
        apps: &["notion", "obsidian", "notes"],
        titles: None,
        category: "Deep Work - Writing",
    },
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Maps an application name and window title to a productivity category.
/// Matching is case-insensitive substring containment.
pub fn categorize(app_name: &str, window_title: &str) -> &'static str {
    let app = app_name.to_lowercase();
    let title = window_title.to_lowercase();

    RULES
        .iter()
        .find(|rule| {
            contains_any(&app, rule.apps)
                && rule.titles.map_or(true, |titles| contains_any(&title, titles))
        })
        .map_or(UNCATEGORIZED, |rule| rule.category)
}
