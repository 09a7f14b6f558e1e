//! Structural validation of the canonical dataset
//!
//! **[CIN-VAL-010]** Independent diagnostic pass, not tied to any scrape
//! run. Works on raw row forms so malformed JSON list columns stay visible,
//! and never mutates anything — the issues feed the manual-review queue.

use keyfit_common::db::records::RecordRow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    EmptyMake,
    EmptyModel,
    /// Empty chip list on a record not marked non-transponder
    EmptyChipTypes,
    /// chip_types column looks like a JSON array but does not parse as one
    MalformedChipTypes,
    /// compatible_parts column looks like a JSON array but does not parse
    MalformedCompatibleParts,
    /// year_end earlier than year_start
    InvertedYearRange,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            IssueKind::EmptyMake => "empty make",
            IssueKind::EmptyModel => "empty model",
            IssueKind::EmptyChipTypes => "empty chip list on a transponder record",
            IssueKind::MalformedChipTypes => "malformed chip_types column",
            IssueKind::MalformedCompatibleParts => "malformed compatible_parts column",
            IssueKind::InvertedYearRange => "year_end earlier than year_start",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub guid: String,
    pub make: String,
    pub model: String,
    pub kind: IssueKind,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({}): {}",
            self.make, self.model, self.guid, self.kind
        )
    }
}

/// Scan canonical rows for structural defects. A row can contribute several
/// issues; a clean dataset yields an empty list.
pub fn validate_rows(rows: &[RecordRow]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for row in rows {
        let mut push = |kind: IssueKind| {
            issues.push(ValidationIssue {
                guid: row.guid.clone(),
                make: row.make.clone(),
                model: row.model.clone(),
                kind,
            });
        };

        if row.make.trim().is_empty() {
            push(IssueKind::EmptyMake);
        }
        if row.model.trim().is_empty() {
            push(IssueKind::EmptyModel);
        }

        match parse_list_column(&row.chip_types) {
            Some(chips) => {
                if chips.is_empty() && !row.non_transponder {
                    push(IssueKind::EmptyChipTypes);
                }
            }
            None => push(IssueKind::MalformedChipTypes),
        }

        if parse_list_column(&row.compatible_parts).is_none() {
            push(IssueKind::MalformedCompatibleParts);
        }

        if let Some(end) = row.year_end {
            if end < row.year_start {
                push(IssueKind::InvertedYearRange);
            }
        }
    }

    issues
}

/// `Some(tokens)` for a well-formed column (JSON string array, or a legacy
/// flat string treated as one token), `None` for a value that claims to be
/// JSON but is not.
fn parse_list_column(raw: &str) -> Option<Vec<String>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(Vec::new());
    }
    if trimmed.starts_with('[') {
        return serde_json::from_str::<Vec<String>>(trimmed).ok();
    }
    Some(vec![trimmed.to_string()])
}
