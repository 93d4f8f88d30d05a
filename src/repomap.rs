//! Compact outline of repository files for `/context`.
//!
//! Each supported file contributes its definitions with line numbers:
//!
//! ```text
//! src/store.rs:
//!   42 │ pub struct WorkspaceStore
//!   57 │   pub fn new(guard: WorkspaceGuard) -> Self
//! ```

use crate::pool;
use crate::ts::{Lang, ParsedSource};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tree_sitter::Node;
use walkdir::WalkDir;

pub const DEFAULT_MAP_BYTES: usize = 4096;

const MAX_SIGNATURE: usize = 100;
const SKIPPED_DIRS: &[&str] = &["target", "node_modules"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepoMap {
    map_bytes: usize,
}

impl Default for RepoMap {
    fn default() -> Self {
        Self::new(DEFAULT_MAP_BYTES)
    }
}

impl RepoMap {
    /// A `map_bytes` of 0 disables the map.
    pub fn new(map_bytes: usize) -> Self {
        Self { map_bytes }
    }

    pub fn is_enabled(&self) -> bool {
        self.map_bytes > 0
    }

    /// Outline `files` (workspace-relative), leaving out those in `exclude`.
    pub fn render(&self, workspace: &Path, files: &[PathBuf], exclude: &BTreeSet<PathBuf>) -> String {
        if !self.is_enabled() {
            return String::new();
        }

        let mut map = String::new();
        for file in files {
            if exclude.contains(file) {
                continue;
            }
            let Some(lang) = Lang::from_path(file) else {
                continue;
            };
            let Ok(source) = fs::read_to_string(workspace.join(file)) else {
                continue;
            };
            let Some(block) = outline(file, lang, &source) else {
                continue;
            };
            if map.len() + block.len() > self.map_bytes {
                break;
            }
            map.push_str(&block);
        }
        map
    }
}

/// Files under `workspace` for when there is no repository to ask.
pub fn list_files(workspace: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(workspace)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            let skipped_dir = entry.file_type().is_dir() && SKIPPED_DIRS.contains(&&*name);
            !name.starts_with('.') && !skipped_dir
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.path().strip_prefix(workspace).ok().map(Path::to_path_buf))
        .collect();
    files.sort();
    files
}

fn outline(file: &Path, lang: Lang, source: &str) -> Option<String> {
    let lines = pool::with_parser(lang, |parser| {
        parser.parse_with_source(source).ok().map(|parsed| {
            let mut lines = Vec::new();
            collect_definitions(&parsed, parsed.root_node(), lang, 0, &mut lines);
            lines
        })
    })
    .ok()
    .flatten()?;

    if lines.is_empty() {
        return None;
    }

    let mut block = format!("{}:\n", file.display());
    for line in lines {
        block.push_str(&line);
        block.push('\n');
    }
    Some(block)
}

fn collect_definitions(
    parsed: &ParsedSource<'_>,
    node: Node<'_>,
    lang: Lang,
    depth: usize,
    lines: &mut Vec<String>,
) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if lang.definition_kinds().contains(&child.kind()) {
            lines.push(format!(
                "{:>5} │ {}{}",
                child.start_position().row + 1,
                "  ".repeat(depth),
                signature(parsed.node_text(child))
            ));
            collect_definitions(parsed, child, lang, depth + 1, lines);
        } else {
            collect_definitions(parsed, child, lang, depth, lines);
        }
    }
}

/// First line of a definition without its opening brace or colon.
fn signature(text: &str) -> String {
    let first = text.lines().next().unwrap_or("").trim();
    let first = first
        .trim_end_matches('{')
        .trim_end_matches(':')
        .trim_end();
    if first.chars().count() > MAX_SIGNATURE {
        let cut: String = first.chars().take(MAX_SIGNATURE).collect();
        format!("{cut}…")
    } else {
        first.to_string()
    }
}
