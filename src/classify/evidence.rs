//! Evidence extraction from raw error output

use regex::Regex;
use std::sync::LazyLock;

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s'"<>()\]]+"#).unwrap());

static STATUS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:status(?:\s+code)?[:=]?\s*|http/\d(?:\.\d)?\s+)([1-5]\d{2})\b").unwrap()
});

static DURATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s?ms\b").unwrap());

static STACK_FRAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"((?:[a-zA-Z]:)?[\w./\\@-]+\.(?:[cm]?[jt]sx?)):(\d+)(?::\d+)?").unwrap()
});

const MAX_PER_KIND: usize = 3;

/// Pull URLs, HTTP status codes, durations and stack-frame locations out
/// of error text. Kinds that do not occur are simply omitted.
pub fn extract_evidence(text: &str) -> Vec<String> {
    let mut evidence: Vec<String> = Vec::new();

    for m in URL_PATTERN.find_iter(text).take(MAX_PER_KIND) {
        let url = m.as_str().trim_end_matches(['.', ',', ';', ':']);
        push_unique(&mut evidence, format!("URL involved: {}", url));
    }

    for caps in STATUS_PATTERN.captures_iter(text).take(MAX_PER_KIND) {
        push_unique(&mut evidence, format!("HTTP status code: {}", &caps[1]));
    }

    for caps in DURATION_PATTERN.captures_iter(text).take(MAX_PER_KIND) {
        push_unique(&mut evidence, format!("Observed duration: {}ms", &caps[1]));
    }

    for caps in STACK_FRAME_PATTERN.captures_iter(text).take(MAX_PER_KIND) {
        push_unique(&mut evidence, format!("Stack frame: {}:{}", &caps[1], &caps[2]));
    }

    evidence
}

fn push_unique(evidence: &mut Vec<String>, line: String) {
    if !evidence.contains(&line) {
        evidence.push(line);
    }
}
