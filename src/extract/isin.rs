//! ISIN detection and validation.
//!
//! An ISIN is 12 characters: a 2-letter country code, 9 alphanumeric NSIN
//! characters, and a final check digit computed with the Luhn algorithm
//! over a digit expansion (A=10 ... Z=35). The checksum is the engine's
//! primary false-positive filter: plenty of uppercase statement fragments
//! (addresses, reference numbers) match the lexical shape, and almost none
//! of them survive the check digit.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use super::section::Section;
use super::{blank_spans, Line, ParseWarning};

static ISIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Z]{2}[A-Z0-9]{9}[0-9])\b").unwrap());
static LABEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bISIN\b").unwrap());
static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{L}{3,}").unwrap());

/// A lexical ISIN match found in a line, with its checksum verdict cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsinCandidate {
    pub raw: String,
    pub line_index: usize,
    /// Byte span of the match within the line.
    pub start: usize,
    pub end: usize,
    /// Line distance to the label that led to this candidate, if any.
    pub distance_to_label: Option<usize>,
    pub is_checksum_valid: bool,
}

/// Validate a full 12-character ISIN candidate. Anything that does not
/// match the lexical shape is rejected without touching the checksum math.
pub fn is_valid_isin(candidate: &str) -> bool {
    let b = candidate.as_bytes();
    if b.len() != 12 {
        return false;
    }
    if !(b[0].is_ascii_uppercase() && b[1].is_ascii_uppercase()) {
        return false;
    }
    if !b[2..11]
        .iter()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return false;
    }
    if !b[11].is_ascii_digit() {
        return false;
    }
    check_digit(&candidate[..11]) == Some(b[11] - b'0')
}

/// Compute the ISO 6166 check digit for the first 11 characters: expand
/// letters to two digits (A=10 … Z=35), then run Luhn mod 10 from the
/// right, doubling every second digit.
pub fn check_digit(body: &str) -> Option<u8> {
    let mut digits: Vec<u8> = Vec::with_capacity(body.len() * 2);
    for c in body.chars() {
        if let Some(d) = c.to_digit(10) {
            digits.push(d as u8);
        } else if c.is_ascii_uppercase() {
            let v = c as u8 - b'A' + 10;
            digits.push(v / 10);
            digits.push(v % 10);
        } else {
            return None;
        }
    }

    let mut sum = 0u32;
    for (i, &d) in digits.iter().rev().enumerate() {
        let mut v = u32::from(d);
        if i % 2 == 0 {
            v *= 2;
            if v > 9 {
                v -= 9;
            }
        }
        sum += v;
    }
    Some(((10 - sum % 10) % 10) as u8)
}

/// All lexical ISIN matches in one line, checksum verdict included.
pub fn scan_candidates(text: &str, line_index: usize) -> Vec<IsinCandidate> {
    ISIN_RE
        .find_iter(text)
        .map(|m| IsinCandidate {
            raw: m.as_str().to_string(),
            line_index,
            start: m.start(),
            end: m.end(),
            distance_to_label: None,
            is_checksum_valid: is_valid_isin(m.as_str()),
        })
        .collect()
}

/// Blank out every lexical ISIN match so numeric extraction cannot read
/// identifier digits as field values.
pub fn mask_isin_candidates(text: &str) -> String {
    let spans: Vec<(usize, usize)> = ISIN_RE.find_iter(text).map(|m| (m.start(), m.end())).collect();
    blank_spans(text, &spans)
}

/// Blank out `ISIN` label tokens.
pub(crate) fn mask_label_tokens(text: &str) -> String {
    let spans: Vec<(usize, usize)> = LABEL_RE.find_iter(text).map(|m| (m.start(), m.end())).collect();
    blank_spans(text, &spans)
}

/// True if the text carries a word that could be part of a security name.
pub(crate) fn has_name_text(text: &str) -> bool {
    NAME_RE.is_match(text)
}

/// True if the line still reads like a security description once ISIN
/// matches and label tokens are blanked out.
fn looks_descriptive(text: &str) -> bool {
    has_name_text(&mask_label_tokens(&mask_isin_candidates(text)))
}

/// The line a labeled ISIN belongs to: the label line itself when it also
/// carries descriptive text, otherwise the neighbor that does.
fn holding_row_for_label(lines: &[Line], label_idx: usize) -> usize {
    if looks_descriptive(&lines[label_idx].text) {
        return label_idx;
    }
    if label_idx > 0 && looks_descriptive(&lines[label_idx - 1].text) {
        return label_idx - 1;
    }
    if label_idx + 1 < lines.len() && looks_descriptive(&lines[label_idx + 1].text) {
        return label_idx + 1;
    }
    label_idx
}

/// Resolve at most one validated ISIN per holdings-section line.
///
/// Two passes: candidates near an explicit `ISIN` label win first (closest
/// line, earliest on ties), then any still-unassigned section line keeps
/// its own single valid match. A candidate consumed by the label pass is
/// never handed out again.
pub fn resolve_isins(
    lines: &[Line],
    sec: Section,
    warnings: &mut Vec<ParseWarning>,
) -> BTreeMap<usize, String> {
    let mut assigned: BTreeMap<usize, String> = BTreeMap::new();
    let mut claimed: HashSet<(usize, usize)> = HashSet::new();

    // Label-proximity pass, with a two-line margin around the section to
    // tolerate off-by-one anchor detection.
    let scan_start = sec.start.saturating_sub(2);
    let scan_end = (sec.end + 2).min(lines.len());
    for label_idx in scan_start..scan_end {
        if !LABEL_RE.is_match(&lines[label_idx].text) {
            continue;
        }
        let win_start = label_idx.saturating_sub(2);
        let win_end = (label_idx + 3).min(lines.len());

        let mut window: Vec<IsinCandidate> = Vec::new();
        for li in win_start..win_end {
            for mut cand in scan_candidates(&lines[li].text, li) {
                if !cand.is_checksum_valid || claimed.contains(&(li, cand.start)) {
                    continue;
                }
                cand.distance_to_label = Some(label_idx.abs_diff(li));
                window.push(cand);
            }
        }

        let best = window
            .into_iter()
            .min_by_key(|c| (c.distance_to_label, c.line_index, c.start));
        if let Some(cand) = best {
            let row = holding_row_for_label(lines, label_idx);
            if let std::collections::btree_map::Entry::Vacant(entry) = assigned.entry(row) {
                entry.insert(cand.raw);
                claimed.insert((cand.line_index, cand.start));
            }
        }
    }

    // Fallback pass over the strict section boundary.
    for li in sec.start..sec.end.min(lines.len()) {
        if assigned.contains_key(&li) {
            continue;
        }
        let valid: Vec<IsinCandidate> = scan_candidates(&lines[li].text, li)
            .into_iter()
            .filter(|c| c.is_checksum_valid && !claimed.contains(&(li, c.start)))
            .collect();
        if valid.is_empty() {
            continue;
        }
        if valid.len() > 1 {
            warnings.push(ParseWarning::new(
                "ambiguous_isin",
                format!(
                    "{} valid ISIN candidates on one line, using the first",
                    valid.len()
                ),
                Some(li),
            ));
        }
        let first = &valid[0];
        assigned.insert(li, first.raw.clone());
        claimed.insert((li, first.start));
    }

    assigned
}
