use crate::ts::errors::TreeSitterError;
use crate::ts::Lang;
use ast_grep_language::LanguageExt;
use tree_sitter::{Node, Parser, Tree};

/// Tree-sitter parser bound to one grammar.
pub struct SourceParser {
    parser: Parser,
    lang: Lang,
}

impl SourceParser {
    pub fn new(lang: Lang) -> Result<Self, TreeSitterError> {
        let mut parser = Parser::new();
        let ts_lang = lang.support_lang().get_ts_language();
        parser
            .set_language(&ts_lang)
            .map_err(|_| TreeSitterError::LanguageSet(lang))?;

        Ok(Self { parser, lang })
    }

    pub fn lang(&self) -> Lang {
        self.lang
    }

    pub fn parse(&mut self, source: &str) -> Result<Tree, TreeSitterError> {
        self.parser
            .parse(source, None)
            .ok_or(TreeSitterError::ParseFailed(self.lang))
    }

    /// Parse source code and return the tree along with the source.
    pub fn parse_with_source<'a>(
        &mut self,
        source: &'a str,
    ) -> Result<ParsedSource<'a>, TreeSitterError> {
        let tree = self.parse(source)?;
        Ok(ParsedSource { source, tree })
    }
}

/// A parsed source file with its tree-sitter tree.
pub struct ParsedSource<'a> {
    pub source: &'a str,
    pub tree: Tree,
}

/// An ERROR or MISSING node, with 1-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxIssue {
    pub line: usize,
    pub column: usize,
    pub missing: bool,
    /// Source around the node, newlines escaped
    pub context: String,
}

impl<'a> ParsedSource<'a> {
    pub fn root_node(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// All ERROR and MISSING nodes in document order.
    pub fn syntax_issues(&self) -> Vec<SyntaxIssue> {
        let mut issues = Vec::new();
        if self.has_errors() {
            collect_issues(self.root_node(), self.source, &mut issues);
        }
        issues
    }

    /// Extract text for a node's byte range.
    pub fn node_text(&self, node: Node<'_>) -> &'a str {
        self.source.get(node.byte_range()).unwrap_or("")
    }
}

fn collect_issues(node: Node<'_>, source: &str, issues: &mut Vec<SyntaxIssue>) {
    if node.is_error() || node.is_missing() {
        let start = node.start_position();
        let context_start = floor_char_boundary(source, node.start_byte().saturating_sub(20));
        let context_end = floor_char_boundary(source, (node.end_byte() + 20).min(source.len()));
        let context = source
            .get(context_start..context_end)
            .unwrap_or("")
            .trim()
            .replace('\n', "\\n");

        issues.push(SyntaxIssue {
            line: start.row + 1,
            column: start.column + 1,
            missing: node.is_missing(),
            context,
        });
        // Children of an ERROR node only repeat the same location
        if node.is_error() {
            return;
        }
    }

    if !node.has_error() {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_issues(child, source, issues);
    }
}

fn floor_char_boundary(source: &str, mut index: usize) -> usize {
    while index > 0 && !source.is_char_boundary(index) {
        index -= 1;
    }
    index
}
