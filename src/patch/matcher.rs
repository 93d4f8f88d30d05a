//! Line-oriented matching strategies for SEARCH/REPLACE blocks.
//!
//! All strategies work on newline-terminated inputs and return the full
//! rewritten text on success. Each one replaces the first location it finds.

use crate::patch::errors::PatchError;

/// Similarity a window of lines needs before it is offered as a hint.
const HINT_THRESHOLD: f64 = 0.6;

/// Upper bound on character comparisons spent computing a hint.
const HINT_BUDGET: usize = 50_000_000;

/// Which strategy produced a replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Empty search: replacement appended to the file
    Append,
    /// Search lines found verbatim
    ExactLines,
    /// Search lines found with a uniform indentation offset
    IndentTolerant,
    /// Matched after dropping a blank first search line
    SkippedBlankLine,
    /// Matched piecewise around `...` elision lines
    Elided,
    /// Matched as a plain substring inside a line
    Substring,
}

pub(crate) fn ensure_newline(text: &str) -> String {
    if !text.is_empty() && !text.ends_with('\n') {
        format!("{text}\n")
    } else {
        text.to_string()
    }
}

fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// Run the strategies in order and return the first rewrite that succeeds.
pub(crate) fn replace_first_match(
    whole: &str,
    part: &str,
    replace: &str,
) -> Result<Option<(String, MatchStrategy)>, PatchError> {
    let whole = ensure_newline(whole);
    let part = ensure_newline(part);
    let replace = ensure_newline(replace);

    let whole_lines = split_lines(&whole);
    let part_lines = split_lines(&part);
    let replace_lines = split_lines(&replace);

    if let Some(result) = perfect_or_whitespace(&whole_lines, &part_lines, &replace_lines) {
        return Ok(Some(result));
    }

    // Clients sometimes prepend a spurious empty line to the SEARCH block.
    if part_lines.len() > 2 && part_lines[0].trim().is_empty() {
        if let Some((text, _)) =
            perfect_or_whitespace(&whole_lines, &part_lines[1..], &replace_lines)
        {
            return Ok(Some((text, MatchStrategy::SkippedBlankLine)));
        }
    }

    if let Some(text) = replace_elided(&whole, &part, &replace)? {
        return Ok(Some((text, MatchStrategy::Elided)));
    }

    let needle = part.strip_suffix('\n').unwrap_or(&part);
    if !needle.is_empty() {
        if let Some(at) = whole.find(needle) {
            let replacement = replace.strip_suffix('\n').unwrap_or(&replace);
            let mut text = String::with_capacity(whole.len() + replacement.len());
            text.push_str(&whole[..at]);
            text.push_str(replacement);
            text.push_str(&whole[at + needle.len()..]);
            return Ok(Some((text, MatchStrategy::Substring)));
        }
    }

    Ok(None)
}

fn perfect_or_whitespace(
    whole_lines: &[&str],
    part_lines: &[&str],
    replace_lines: &[&str],
) -> Option<(String, MatchStrategy)> {
    if let Some(text) = perfect_replace(whole_lines, part_lines, replace_lines) {
        return Some((text, MatchStrategy::ExactLines));
    }
    replace_with_missing_indent(whole_lines, part_lines, replace_lines)
        .map(|text| (text, MatchStrategy::IndentTolerant))
}

fn perfect_replace(
    whole_lines: &[&str],
    part_lines: &[&str],
    replace_lines: &[&str],
) -> Option<String> {
    if part_lines.is_empty() || part_lines.len() > whole_lines.len() {
        return None;
    }

    let start = whole_lines
        .windows(part_lines.len())
        .position(|window| window == part_lines)?;

    let mut out = String::new();
    out.extend(whole_lines[..start].iter().copied());
    out.extend(replace_lines.iter().copied());
    out.extend(whole_lines[start + part_lines.len()..].iter().copied());
    Some(out)
}

fn leading_width(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn replace_with_missing_indent(
    whole_lines: &[&str],
    part_lines: &[&str],
    replace_lines: &[&str],
) -> Option<String> {
    if part_lines.is_empty() || part_lines.len() > whole_lines.len() {
        return None;
    }

    // Dedent search and replacement by their shared minimum indentation.
    let min_indent = part_lines
        .iter()
        .chain(replace_lines.iter())
        .filter(|line| !line.trim().is_empty())
        .map(|line| leading_width(line))
        .min()
        .unwrap_or(0);

    let dedent = |line: &&str| -> String {
        if line.trim().is_empty() {
            (*line).to_string()
        } else {
            line.get(min_indent..).unwrap_or(line).to_string()
        }
    };
    let part: Vec<String> = part_lines.iter().map(&dedent).collect();
    let replace: Vec<String> = replace_lines.iter().map(&dedent).collect();

    for start in 0..=whole_lines.len() - part.len() {
        let window = &whole_lines[start..start + part.len()];
        let Some(prefix) = uniform_extra_indent(window, &part) else {
            continue;
        };

        let mut out = String::new();
        out.extend(whole_lines[..start].iter().copied());
        for line in &replace {
            if !line.trim().is_empty() {
                out.push_str(prefix);
            }
            out.push_str(line);
        }
        out.extend(whole_lines[start + part.len()..].iter().copied());
        return Some(out);
    }

    None
}

/// The single indentation prefix that turns `part` into `window`, if any.
fn uniform_extra_indent<'a>(window: &[&'a str], part: &[String]) -> Option<&'a str> {
    let same_content = window
        .iter()
        .zip(part)
        .all(|(w, p)| w.trim_start() == p.trim_start());
    if !same_content {
        return None;
    }

    let mut prefix: Option<&'a str> = None;
    for (w, p) in window.iter().zip(part) {
        if w.trim().is_empty() {
            continue;
        }
        let candidate = w.strip_suffix(p.as_str())?;
        match prefix {
            None => prefix = Some(candidate),
            Some(existing) if existing == candidate => {}
            Some(_) => return None,
        }
    }
    prefix
}

fn is_elision(line: &str) -> bool {
    line.trim() == "..."
}

/// Split text into the pieces between `...` lines, returning pieces and markers.
fn split_elided(text: &str) -> (Vec<String>, Vec<String>) {
    let mut pieces = vec![String::new()];
    let mut markers = Vec::new();
    for line in text.split_inclusive('\n') {
        if is_elision(line) && line.ends_with('\n') {
            markers.push(line.to_string());
            pieces.push(String::new());
        } else if let Some(last) = pieces.last_mut() {
            last.push_str(line);
        }
    }
    (pieces, markers)
}

fn replace_elided(whole: &str, part: &str, replace: &str) -> Result<Option<String>, PatchError> {
    let (part_pieces, part_markers) = split_elided(part);
    let (replace_pieces, replace_markers) = split_elided(replace);

    if part_pieces.len() != replace_pieces.len() {
        return Err(PatchError::UnpairedEllipsis);
    }
    if part_pieces.len() == 1 {
        return Ok(None);
    }
    if part_markers != replace_markers {
        return Err(PatchError::MismatchedEllipsis);
    }

    let mut whole = whole.to_string();
    for (part, replace) in part_pieces.iter().zip(&replace_pieces) {
        if part.is_empty() && replace.is_empty() {
            continue;
        }
        if part.is_empty() {
            if !whole.ends_with('\n') {
                whole.push('\n');
            }
            whole.push_str(replace);
            continue;
        }

        let count = whole.matches(part.as_str()).count();
        if count != 1 {
            return Err(PatchError::ElidedSection { count });
        }
        whole = whole.replacen(part.as_str(), replace, 1);
    }

    Ok(Some(whole))
}

/// Find the run of lines in `whole` most similar to `part`.
pub(crate) fn closest_chunk(whole: &str, part: &str) -> Option<String> {
    let whole_lines: Vec<&str> = whole.lines().collect();
    let part_lines: Vec<&str> = part.lines().collect();
    if part_lines.is_empty() || whole_lines.is_empty() {
        return None;
    }

    let span = part_lines.len().min(whole_lines.len());
    let windows = whole_lines.len() - span + 1;
    if windows.saturating_mul(part.len()).saturating_mul(part.len()) > HINT_BUDGET {
        return None;
    }

    // Indentation is ignored when scoring; the hint keeps the file's own.
    let squash = |lines: &[&str]| lines.iter().map(|l| l.trim()).collect::<Vec<_>>().join("\n");
    let target = squash(&part_lines);
    let mut best: Option<(f64, usize)> = None;
    for start in 0..windows {
        let candidate = squash(&whole_lines[start..start + span]);
        let score = strsim::normalized_levenshtein(&candidate, &target);
        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, start));
        }
    }

    let (score, start) = best?;
    if score < HINT_THRESHOLD {
        return None;
    }
    Some(whole_lines[start..start + span].join("\n"))
}
