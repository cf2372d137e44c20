use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;

use crate::normalize::{percent_decode, NormalizedUrl};

const PLACE_MARKER: &str = "place";
const MIN_PLAUSIBLE_RATIO: f64 = 0.3;

const ADMIN_SUFFIXES: &[&str] = &[
    "都", "道", "府", "県", "市", "区", "町", "村", "郡", "丁目", "番地", "番", "号", "条",
];
const COUNTRY_TOKENS: &[&str] = &["日本", "japan"];
const MARKUP_FRAGMENTS: &[&str] = &["[[", "]]", "{", "}", "<", ">"];

static COORDINATE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@-?\d+\.\d+,-?\d+\.\d+.*$").expect("valid coordinate regex"));
static DATA_ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-[^=]*="[^"]*""#).expect("valid data attribute regex"));
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static NULL_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bnull\b").expect("valid null regex"));
static KEY_ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_-]*=").expect("valid attribute regex"));
static BLOCK_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(丁目|番地|番|号|条)\s*[0-9０-９\-−‐－]*$").expect("valid block number regex")
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedName {
    pub text: String,
    pub raw_segment: String,
    pub valid: bool,
}

impl ResolvedName {
    pub fn usable(&self) -> Option<&str> {
        (self.valid && !self.text.is_empty()).then_some(self.text.as_str())
    }

    pub fn carries_postal_code(&self, pattern: &Regex) -> bool {
        pattern.is_match(&self.raw_segment)
    }
}

pub fn extract_name(url: &NormalizedUrl) -> ResolvedName {
    let Some(segment) = place_segment(url) else {
        return ResolvedName::default();
    };

    let cleaned = clean_segment(&segment);
    let candidate = match split_name_from_address(&cleaned) {
        Some(name) => name,
        None => cleaned.clone(),
    };
    let valid = is_plausible_name(&candidate);

    ResolvedName {
        text: if valid { candidate } else { String::new() },
        raw_segment: cleaned,
        valid,
    }
}

fn place_segment(url: &NormalizedUrl) -> Option<String> {
    let from_path = Url::parse(&url.expanded).ok().and_then(|parsed| {
        let segments: Vec<String> = parsed.path_segments()?.map(str::to_string).collect();
        let index = segments.iter().position(|segment| segment == PLACE_MARKER)?;
        segments.get(index + 1).cloned()
    });

    let raw = match from_path {
        Some(segment) => segment,
        None => {
            let (_, rest) = url.expanded.split_once("/place/")?;
            rest.split(['/', '?', '#']).next()?.to_string()
        }
    };
    if raw.is_empty() {
        return None;
    }
    Some(percent_decode(&raw.replace('+', " ")))
}

fn clean_segment(segment: &str) -> String {
    let without_coords = COORDINATE_SUFFIX.replace(segment, "");
    let without_data = DATA_ATTRIBUTE.replace_all(&without_coords, "");
    let without_tags = HTML_TAG.replace_all(&without_data, "");
    WHITESPACE
        .replace_all(&without_tags, " ")
        .trim()
        .to_string()
}

pub fn split_name_from_address(segment: &str) -> Option<String> {
    let tokens: Vec<&str> = segment.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let mut best: Option<(usize, usize)> = None;
    let mut start: Option<usize> = None;
    for (index, token) in tokens.iter().enumerate() {
        if is_address_token(token) {
            if let Some(run_start) = start.take() {
                best = longer_run(best, (run_start, index));
            }
        } else if start.is_none() {
            start = Some(index);
        }
    }
    if let Some(run_start) = start {
        best = longer_run(best, (run_start, tokens.len()));
    }

    let (from, to) = best?;
    let name = tokens[from..to].join(" ");
    let name = name.trim_matches(|c: char| c == '、' || c == ',' || c.is_whitespace());
    (!name.is_empty()).then(|| name.to_string())
}

// Ties go to the later run; names trail the address in share links.
fn longer_run(best: Option<(usize, usize)>, run: (usize, usize)) -> Option<(usize, usize)> {
    match best {
        Some((from, to)) if to - from > run.1 - run.0 => Some((from, to)),
        _ => Some(run),
    }
}

pub fn is_address_token(token: &str) -> bool {
    let token = token.trim_matches(|c: char| c == '、' || c == ',' || c == '，');
    if token.is_empty() {
        return true;
    }
    if token.contains('〒') {
        return true;
    }
    if COUNTRY_TOKENS
        .iter()
        .any(|country| token.eq_ignore_ascii_case(country))
    {
        return true;
    }
    if token.chars().all(|c| c.is_numeric() || is_dash(c)) {
        return true;
    }
    if ADMIN_SUFFIXES.iter().any(|suffix| token.ends_with(*suffix)) {
        return true;
    }
    BLOCK_NUMBER.is_match(token) && token.chars().last().is_some_and(char::is_numeric)
}

fn is_dash(c: char) -> bool {
    matches!(c, '-' | '−' | '‐' | '－' | '–')
}

pub fn is_plausible_name(name: &str) -> bool {
    if name.trim().is_empty() {
        return false;
    }
    let lower = name.to_lowercase();
    if MARKUP_FRAGMENTS
        .iter()
        .any(|fragment| lower.contains(*fragment))
    {
        return false;
    }
    if NULL_TOKEN.is_match(name) || KEY_ASSIGNMENT.is_match(name) {
        return false;
    }
    if !brackets_balanced(name) {
        return false;
    }

    let total = name.chars().count();
    let letters = name.chars().filter(|c| is_locale_letter(*c)).count();
    letters as f64 / total as f64 >= MIN_PLAUSIBLE_RATIO
}

fn brackets_balanced(value: &str) -> bool {
    let mut stack = Vec::new();
    for c in value.chars() {
        match c {
            '(' | '[' | '（' => stack.push(c),
            ')' => {
                if stack.pop() != Some('(') {
                    return false;
                }
            }
            ']' => {
                if stack.pop() != Some('[') {
                    return false;
                }
            }
            '）' => {
                if stack.pop() != Some('（') {
                    return false;
                }
            }
            _ => {}
        }
    }
    stack.is_empty()
}

fn is_locale_letter(c: char) -> bool {
    c.is_ascii_alphabetic()
        || ('\u{3040}'..='\u{309F}').contains(&c)
        || ('\u{30A0}'..='\u{30FF}').contains(&c)
        || ('\u{4E00}'..='\u{9FAF}').contains(&c)
}
