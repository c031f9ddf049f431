//! Evidence Parser
//!
//! Recovers rankings and question sets from analyzer replies. The analyzer is
//! an untrusted text generator: replies arrive wrapped in prose, fenced as
//! markdown, with trailing commentary or with broken JSON. Each extraction
//! runs an ordered chain of strategies and the first that yields a usable
//! structure wins.

pub mod plausibility;
pub mod repair;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

use crate::questions::{OpenQuestion, SituationalQuestion};
use crate::taxonomy::{RankingCandidate, TraitLabel};

pub use plausibility::Implausibility;

/// Default minimum number of labels the text scan must recover.
pub const DEFAULT_MIN_RECOVERED_LABELS: usize = 20;

/// Open question prompts must be longer than this.
pub const MIN_PROMPT_CHARS: usize = 10;

const NAME_KEYS: [&str; 5] = ["trait", "name", "label", "strength", "theme"];
const RANK_KEYS: [&str; 3] = ["rank", "ranking", "position"];
const WRAPPER_KEYS: [&str; 6] = ["rankings", "ranking", "traits", "profile", "strengths", "questions"];

lazy_static! {
    static ref LABEL_VALUE: Regex =
        Regex::new(r#""?([A-Za-z][A-Za-z\-]*)"?\s*[:=]\s*"?(\d{1,3})\b"#).unwrap();
    static ref FLAT_OBJECT: Regex = Regex::new(r"(?s)\{[^{}]*\}").unwrap();
    static ref STRING_FIELD: Regex =
        Regex::new(r#""([A-Za-z0-9_]+)"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap();
    static ref LIST_FIELD: Regex = Regex::new(r#""([A-Za-z0-9_]+)"\s*:\s*\[([^\[\]]*)\]"#).unwrap();
    static ref QUOTED: Regex = Regex::new(r#""((?:[^"\\]|\\.)*)""#).unwrap();
    static ref OPEN_LINE: Regex =
        Regex::new(r#"(?m)^\s*"?(Q[\w-]*\d)"?\s*[:.)\-]\s*"?(.+?)"?,?\s*$"#).unwrap();
}

/// Which step of the fallback chain produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Direct,
    Bracketed,
    Repaired,
    TextScan,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Direct => "direct",
            Strategy::Bracketed => "bracketed",
            Strategy::Repaired => "repaired",
            Strategy::TextScan => "text-scan",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnrecoverableReason {
    Empty,
    NoStructure,
    TooFewLabels { found: usize, needed: usize },
    Implausible(Implausibility),
    IncompleteRecords,
}

impl fmt::Display for UnrecoverableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnrecoverableReason::Empty => write!(f, "empty reply"),
            UnrecoverableReason::NoStructure => write!(f, "no parsable structure"),
            UnrecoverableReason::TooFewLabels { found, needed } => {
                write!(f, "recovered {} labels, need {}", found, needed)
            }
            UnrecoverableReason::Implausible(why) => write!(f, "implausible ranking: {}", why),
            UnrecoverableReason::IncompleteRecords => write!(f, "recovered records are incomplete"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvidenceError {
    #[error("evidence unrecoverable: {reason}")]
    Unrecoverable { reason: UnrecoverableReason },
}

impl EvidenceError {
    fn unrecoverable(reason: UnrecoverableReason) -> Self {
        EvidenceError::Unrecoverable { reason }
    }

    pub fn reason(&self) -> &UnrecoverableReason {
        match self {
            EvidenceError::Unrecoverable { reason } => reason,
        }
    }

    pub fn is_implausible(&self) -> bool {
        matches!(self.reason(), UnrecoverableReason::Implausible(_))
    }
}

/// A structure recovered from a reply, with the strategy that found it.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub value: T,
    pub strategy: Strategy,
}

#[derive(Debug, Clone)]
pub struct EvidenceParser {
    min_recovered_labels: usize,
}

impl Default for EvidenceParser {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_RECOVERED_LABELS)
    }
}

impl EvidenceParser {
    pub fn new(min_recovered_labels: usize) -> Self {
        Self { min_recovered_labels }
    }

    /// Recover a ranking candidate and check it for plausibility.
    ///
    /// The candidate is not validated against the taxonomy here; that is the
    /// ranking engine's job.
    pub fn parse_ranking(&self, raw: &str) -> Result<Parsed<RankingCandidate>, EvidenceError> {
        if raw.trim().is_empty() {
            return Err(EvidenceError::unrecoverable(UnrecoverableReason::Empty));
        }

        let parsed = match recover_structured(raw, ranking_from_value) {
            Some(parsed) => parsed,
            None => self.scan_ranking(raw)?,
        };
        debug!(
            "Recovered {} ranking entries via {} strategy",
            parsed.value.len(),
            parsed.strategy
        );

        if let Err(why) = plausibility::check(&parsed.value) {
            warn!("Rejecting analyzer ranking: {}", why);
            return Err(EvidenceError::unrecoverable(UnrecoverableReason::Implausible(why)));
        }
        Ok(parsed)
    }

    /// Recover situational questions. Every kept record has a prompt, four
    /// options and at least one known trait label per option.
    pub fn parse_situational_questions(
        &self,
        raw: &str,
    ) -> Result<Parsed<Vec<SituationalQuestion>>, EvidenceError> {
        if raw.trim().is_empty() {
            return Err(EvidenceError::unrecoverable(UnrecoverableReason::Empty));
        }
        if let Some(parsed) = recover_structured(raw, |v| records_from_value(v, situational_from_record)) {
            return Ok(parsed);
        }
        scan_situational(raw).map(|value| Parsed {
            value,
            strategy: Strategy::TextScan,
        })
    }

    /// Recover open questions with prompts longer than [`MIN_PROMPT_CHARS`].
    pub fn parse_open_questions(&self, raw: &str) -> Result<Parsed<Vec<OpenQuestion>>, EvidenceError> {
        if raw.trim().is_empty() {
            return Err(EvidenceError::unrecoverable(UnrecoverableReason::Empty));
        }
        if let Some(parsed) = recover_structured(raw, |v| records_from_value(v, open_from_record)) {
            return Ok(parsed);
        }
        scan_open(raw).map(|value| Parsed {
            value,
            strategy: Strategy::TextScan,
        })
    }

    fn scan_ranking(&self, raw: &str) -> Result<Parsed<RankingCandidate>, EvidenceError> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for caps in LABEL_VALUE.captures_iter(raw) {
            let Ok(label) = caps[1].parse::<TraitLabel>() else {
                continue;
            };
            let Ok(rank) = caps[2].parse::<i64>() else {
                continue;
            };
            if seen.insert(label) {
                entries.push((label.as_str().to_string(), rank));
            }
        }

        if entries.is_empty() {
            return Err(EvidenceError::unrecoverable(UnrecoverableReason::NoStructure));
        }
        if entries.len() < self.min_recovered_labels {
            return Err(EvidenceError::unrecoverable(UnrecoverableReason::TooFewLabels {
                found: entries.len(),
                needed: self.min_recovered_labels,
            }));
        }
        Ok(Parsed {
            value: RankingCandidate::new(entries),
            strategy: Strategy::TextScan,
        })
    }
}

/// Steps 1-3 of the chain: whole text, balanced spans, repaired spans.
fn recover_structured<T>(raw: &str, extract: impl Fn(&Value) -> Option<T>) -> Option<Parsed<T>> {
    let direct = [raw.trim().to_string(), repair::strip_code_fences(raw)];
    for text in &direct {
        if let Some(value) = parse_value(text).as_ref().and_then(&extract) {
            return Some(Parsed { value, strategy: Strategy::Direct });
        }
    }

    let spans = balanced_spans(raw);
    for span in &spans {
        if let Some(value) = parse_value(span).as_ref().and_then(&extract) {
            return Some(Parsed { value, strategy: Strategy::Bracketed });
        }
    }

    let mut fragments: Vec<String> = spans.iter().map(|s| s.to_string()).collect();
    if let Some(tail) = closed_tail(raw) {
        fragments.push(tail);
    }
    for fragment in &fragments {
        let repaired = repair::repair_json(fragment);
        if let Some(value) = parse_value(&repaired).as_ref().and_then(&extract) {
            return Some(Parsed { value, strategy: Strategy::Repaired });
        }
    }
    None
}

fn parse_value(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text).ok()
}

/// Every top-level balanced `{...}` or `[...]` span, longest first.
///
/// Nesting depth is tracked per span and brackets inside string literals are
/// ignored, so prose braces before or after the payload do not confuse it.
fn balanced_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut stack: Vec<char> = Vec::new();
    let mut start = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' if !stack.is_empty() => in_string = true,
            '{' | '[' => {
                if stack.is_empty() {
                    start = idx;
                }
                stack.push(if c == '{' { '}' } else { ']' });
            }
            '}' | ']' => match stack.last() {
                Some(&expected) if expected == c => {
                    stack.pop();
                    if stack.is_empty() {
                        spans.push(&text[start..idx + c.len_utf8()]);
                    }
                }
                Some(_) => {
                    // mismatched closer, restart the scan after it
                    stack.clear();
                }
                None => {}
            },
            _ => {}
        }
    }

    spans.sort_by_key(|s| std::cmp::Reverse(s.len()));
    spans
}

/// The reply from its first opening bracket, with any unclosed brackets
/// closed. Covers replies cut off by a token limit.
fn closed_tail(text: &str) -> Option<String> {
    let start = text.find(['{', '['])?;
    let tail = &text[start..];
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in tail.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }
    if stack.is_empty() {
        return None;
    }

    let mut closed = tail.trim_end().trim_end_matches(',').to_string();
    if in_string {
        closed.push('"');
    }
    closed.extend(stack.iter().rev());
    Some(closed)
}

fn ranking_from_value(value: &Value) -> Option<RankingCandidate> {
    match value {
        Value::Object(map) => {
            // numeric siblings such as "total" or "confidence" are not labels
            let direct: Vec<(String, i64)> = map
                .iter()
                .filter(|(k, _)| k.parse::<TraitLabel>().is_ok())
                .filter_map(|(k, v)| as_rank(v).map(|r| (k.clone(), r)))
                .collect();
            let wrapped = WRAPPER_KEYS
                .iter()
                .filter_map(|k| map.get(*k))
                .find_map(ranking_from_value);
            match wrapped {
                Some(inner) if direct.is_empty() || known_labels(&inner) > direct.len() => Some(inner),
                _ => (!direct.is_empty()).then(|| RankingCandidate::new(direct)),
            }
        }
        Value::Array(items) => {
            if items.iter().all(Value::is_string) && !items.is_empty() {
                let entries = items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| v.as_str().map(|s| (s.to_string(), i as i64 + 1)))
                    .collect();
                return Some(RankingCandidate::new(entries));
            }
            let entries: Vec<(String, i64)> = items
                .iter()
                .filter_map(|item| {
                    let name = field(item, &NAME_KEYS).and_then(Value::as_str)?;
                    let rank = field(item, &RANK_KEYS).and_then(as_rank)?;
                    Some((name.to_string(), rank))
                })
                .collect();
            (!entries.is_empty()).then(|| RankingCandidate::new(entries))
        }
        _ => None,
    }
}

fn known_labels(candidate: &RankingCandidate) -> usize {
    candidate
        .entries()
        .iter()
        .filter(|(name, _)| name.parse::<TraitLabel>().is_ok())
        .count()
}

fn as_rank(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Case-insensitive lookup of the first present key.
fn field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let map = value.as_object()?;
    keys.iter().find_map(|key| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

/// Question records from an array, or an object wrapping one. Records that
/// lack a required field are dropped; an empty result counts as failure.
fn records_from_value<T>(value: &Value, build: fn(usize, &Value) -> Option<T>) -> Option<Vec<T>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => match WRAPPER_KEYS.iter().find_map(|k| value.get(*k)) {
            Some(Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };
    let records: Vec<T> = items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| build(idx, item))
        .collect();
    (!records.is_empty()).then_some(records)
}

fn question_id(idx: usize, record: &Value, round: u8) -> String {
    field(record, &["QuestionID", "id", "question_id"])
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("Q{}-{}", round, idx + 1))
}

fn prompt_of(record: &Value) -> Option<String> {
    field(record, &["Prompt", "QuestionText", "Question", "Text"])
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn situational_from_record(idx: usize, record: &Value) -> Option<SituationalQuestion> {
    let prompt = prompt_of(record)?;

    let options: Vec<String> = match field(record, &["Options"]).and_then(Value::as_array) {
        Some(list) => list.iter().filter_map(Value::as_str).map(|s| s.trim().to_string()).collect(),
        None => (1..=4)
            .filter_map(|n| field(record, &[format!("Option{}", n).as_str()]).and_then(Value::as_str))
            .map(|s| s.trim().to_string())
            .collect(),
    };

    let traits: Vec<Vec<TraitLabel>> = match field(record, &["OptionTraits"]).and_then(Value::as_array) {
        Some(list) => list.iter().map(labels_from_value).collect(),
        None => (1..=4)
            .filter_map(|n| field(record, &[format!("Option{}Traits", n).as_str()]))
            .map(labels_from_value)
            .collect(),
    };

    build_situational(question_id(idx, record, 2), prompt, options, traits)
}

fn build_situational(
    id: String,
    prompt: String,
    options: Vec<String>,
    traits: Vec<Vec<TraitLabel>>,
) -> Option<SituationalQuestion> {
    if options.iter().any(|o| o.is_empty()) || traits.iter().any(|t| t.is_empty()) {
        return None;
    }
    Some(SituationalQuestion {
        id,
        prompt,
        options: options.try_into().ok()?,
        option_traits: traits.try_into().ok()?,
    })
}

/// Known labels from a JSON list or a comma-separated string.
fn labels_from_value(value: &Value) -> Vec<TraitLabel> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|s| s.parse().ok())
            .collect(),
        Value::String(s) => labels_from_list(s),
        _ => Vec::new(),
    }
}

fn labels_from_list(text: &str) -> Vec<TraitLabel> {
    text.split([',', '/', ';'])
        .filter_map(|s| s.trim().trim_matches('"').parse().ok())
        .collect()
}

fn open_from_record(idx: usize, record: &Value) -> Option<OpenQuestion> {
    let prompt = match record {
        Value::String(s) => s.trim().to_string(),
        _ => prompt_of(record)?,
    };
    if prompt.chars().count() <= MIN_PROMPT_CHARS {
        return None;
    }
    let id = match record {
        Value::String(_) => format!("Q3-{}", idx + 1),
        _ => question_id(idx, record, 3),
    };
    Some(OpenQuestion { id, prompt })
}

/// Text scan for situational questions: each flat `{...}` block is read
/// field by field. Any incomplete block fails the whole scan.
fn scan_situational(raw: &str) -> Result<Vec<SituationalQuestion>, EvidenceError> {
    let mut questions = Vec::new();
    for (idx, block) in FLAT_OBJECT.find_iter(raw).enumerate() {
        let block = block.as_str();
        let string_field = |name: &str| {
            STRING_FIELD
                .captures_iter(block)
                .find(|c| c[1].eq_ignore_ascii_case(name))
                .map(|c| c[2].trim().to_string())
        };
        let list_field = |name: &str| {
            LIST_FIELD
                .captures_iter(block)
                .find(|c| c[1].eq_ignore_ascii_case(name))
                .map(|c| {
                    QUOTED
                        .captures_iter(&c[2])
                        .filter_map(|q| q[1].parse::<TraitLabel>().ok())
                        .collect::<Vec<_>>()
                })
        };

        let id = string_field("QuestionID").unwrap_or_else(|| format!("Q2-{}", idx + 1));
        let prompt = string_field("Prompt").or_else(|| string_field("QuestionText"));
        let options: Vec<String> = (1..=4)
            .filter_map(|n| string_field(&format!("Option{}", n)))
            .collect();
        let traits: Vec<Vec<TraitLabel>> = (1..=4)
            .filter_map(|n| {
                let key = format!("Option{}Traits", n);
                list_field(&key).or_else(|| string_field(&key).map(|s| labels_from_list(&s)))
            })
            .collect();

        let question = prompt.and_then(|prompt| build_situational(id, prompt, options, traits));
        match question {
            Some(q) => questions.push(q),
            None => {
                debug!("Situational block {} is incomplete", idx + 1);
                return Err(EvidenceError::unrecoverable(UnrecoverableReason::IncompleteRecords));
            }
        }
    }

    if questions.is_empty() {
        return Err(EvidenceError::unrecoverable(UnrecoverableReason::NoStructure));
    }
    Ok(questions)
}

/// Text scan for open questions: `Q3-1: prompt` lines.
fn scan_open(raw: &str) -> Result<Vec<OpenQuestion>, EvidenceError> {
    let questions: Vec<OpenQuestion> = OPEN_LINE
        .captures_iter(raw)
        .map(|c| OpenQuestion {
            id: c[1].to_string(),
            prompt: c[2].trim().to_string(),
        })
        .filter(|q| q.prompt.chars().count() > MIN_PROMPT_CHARS)
        .collect();

    if questions.is_empty() {
        return Err(EvidenceError::unrecoverable(UnrecoverableReason::NoStructure));
    }
    Ok(questions)
}
