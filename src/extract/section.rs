//! Holdings-section boundary discovery.

use super::{ExtractorConfig, Line};

/// Line range of the holdings table, `start` inclusive, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub start: usize,
    pub end: usize,
}

/// Find the holdings table: the first anchor keyword opens it one line
/// below, the next terminator keyword (or the end of the document) closes
/// it. Statements are linear single-table exports, so the first anchor
/// occurrence wins.
pub fn locate_holdings_section(lines: &[Line], config: &ExtractorConfig) -> Option<Section> {
    let anchor = lines
        .iter()
        .position(|l| contains_any(&l.text, &config.holdings_anchors))?;
    let start = anchor + 1;
    let end = lines[start.min(lines.len())..]
        .iter()
        .position(|l| contains_any(&l.text, &config.section_terminators))
        .map(|offset| start + offset)
        .unwrap_or(lines.len());
    Some(Section { start, end })
}

fn contains_any(text: &str, keywords: &[String]) -> bool {
    let upper = text.to_uppercase();
    keywords.iter().any(|k| upper.contains(&k.to_uppercase()))
}
