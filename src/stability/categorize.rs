//! Keyword-based test categorization from test titles

/// Category used when no keyword matches
pub const DEFAULT_CATEGORY: &str = "other";

/// Checked in order; the first category with a matching keyword wins
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "authentication",
        &[
            "login", "logout", "sign in", "signin", "sign up", "signup", "auth", "password",
            "register",
        ],
    ),
    ("checkout", &["checkout", "cart", "payment", "purchase", "order"]),
    ("search", &["search", "filter", "sort"]),
    ("navigation", &["navigation", "navigate", "menu", "routing", "redirect", "link"]),
    ("forms", &["form", "input", "validation", "submit", "field"]),
    ("api", &["api", "endpoint", "graphql", "request"]),
    ("dashboard", &["dashboard", "report", "chart", "analytics"]),
    ("account", &["profile", "account", "settings", "preferences"]),
    ("accessibility", &["accessibility", "a11y", "aria", "keyboard"]),
    ("visual", &["visual", "screenshot", "layout", "responsive"]),
];

/// Assigns a category label to a test title
#[derive(Debug, Clone)]
pub struct TestCategorizer {
    keywords: Vec<(String, Vec<String>)>,
}

impl TestCategorizer {
    pub fn new() -> Self {
        Self {
            keywords: CATEGORY_KEYWORDS
                .iter()
                .map(|(category, words)| {
                    (
                        category.to_string(),
                        words.iter().map(|w| w.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }

    /// Categorizer with a custom ordered keyword table
    pub fn with_keywords(keywords: Vec<(String, Vec<String>)>) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|(c, words)| (c, words.into_iter().map(|w| w.to_lowercase()).collect()))
                .collect(),
        }
    }

    pub fn categorize(&self, title: &str) -> String {
        let lower = title.to_lowercase();

        self.keywords
            .iter()
            .find(|(_, words)| words.iter().any(|w| lower.contains(w.as_str())))
            .map(|(category, _)| category.clone())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
    }
}

impl Default for TestCategorizer {
    fn default() -> Self {
        Self::new()
    }
}
