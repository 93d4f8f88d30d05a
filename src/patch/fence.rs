use serde::{Deserialize, Serialize};

/// Delimiter pair used to quote code blocks inside SEARCH/REPLACE texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fence {
    pub open: String,
    pub close: String,
}

impl Default for Fence {
    fn default() -> Self {
        Self::new("```", "```")
    }
}

impl Fence {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    /// Remove quoting that clients wrap around a block of code.
    ///
    /// Drops a leading line naming the target file, then a surrounding
    /// open/close fence pair. A non-empty result always ends with `\n`.
    pub fn strip(&self, text: &str, file_name: Option<&str>) -> String {
        if text.is_empty() {
            return String::new();
        }

        let mut lines: Vec<&str> = text.lines().collect();

        if let (Some(name), Some(first)) = (file_name, lines.first()) {
            if !name.is_empty() && first.trim().ends_with(name) {
                lines.remove(0);
            }
        }

        let fenced = match (lines.first(), lines.last()) {
            (Some(first), Some(last)) => {
                first.starts_with(&self.open) && last.starts_with(&self.close)
            }
            _ => false,
        };
        if fenced {
            lines = if lines.len() >= 2 {
                lines[1..lines.len() - 1].to_vec()
            } else {
                Vec::new()
            };
        }

        let mut out = lines.join("\n");
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_plain_text_gains_newline() {
        let fence = Fence::default();
        assert_eq!(fence.strip("return 1", None), "return 1\n");
    }

    #[test]
    fn test_strip_fenced_block() {
        let fence = Fence::default();
        let text = "```python\ndef f():\n    return 1\n```";
        assert_eq!(fence.strip(text, None), "def f():\n    return 1\n");
    }

    #[test]
    fn test_strip_filename_line_then_fence() {
        let fence = Fence::default();
        let text = "src/app.py\n```\nx = 1\n```\n";
        assert_eq!(fence.strip(text, Some("app.py")), "x = 1\n");
    }

    #[test]
    fn test_strip_custom_fence() {
        let fence = Fence::new("<source>", "</source>");
        let text = "<source>\nfn main() {}\n</source>";
        assert_eq!(fence.strip(text, None), "fn main() {}\n");
    }

    #[test]
    fn test_strip_lone_fence_line_is_empty() {
        let fence = Fence::default();
        assert_eq!(fence.strip("```", None), "");
    }

    #[test]
    fn test_strip_empty() {
        assert_eq!(Fence::default().strip("", Some("a.rs")), "");
    }
}
