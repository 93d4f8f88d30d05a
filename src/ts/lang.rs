use ast_grep_language::SupportLang;
use std::path::Path;

/// Languages the syntax linter and repo map understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
    Java,
    C,
    Cpp,
    Ruby,
    Json,
}

impl Lang {
    /// Detect the language from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        let lang = match ext.as_str() {
            "rs" => Lang::Rust,
            "py" | "pyi" => Lang::Python,
            "js" | "mjs" | "cjs" | "jsx" => Lang::JavaScript,
            "ts" | "mts" | "cts" => Lang::TypeScript,
            "tsx" => Lang::Tsx,
            "go" => Lang::Go,
            "java" => Lang::Java,
            "c" | "h" => Lang::C,
            "cc" | "cpp" | "cxx" | "hpp" | "hh" | "hxx" => Lang::Cpp,
            "rb" => Lang::Ruby,
            "json" => Lang::Json,
            _ => return None,
        };
        Some(lang)
    }

    pub(crate) fn support_lang(self) -> SupportLang {
        match self {
            Lang::Rust => SupportLang::Rust,
            Lang::Python => SupportLang::Python,
            Lang::JavaScript => SupportLang::JavaScript,
            Lang::TypeScript => SupportLang::TypeScript,
            Lang::Tsx => SupportLang::Tsx,
            Lang::Go => SupportLang::Go,
            Lang::Java => SupportLang::Java,
            Lang::C => SupportLang::C,
            Lang::Cpp => SupportLang::Cpp,
            Lang::Ruby => SupportLang::Ruby,
            Lang::Json => SupportLang::Json,
        }
    }

    /// Node kinds listed as definitions in the repo map.
    pub fn definition_kinds(self) -> &'static [&'static str] {
        match self {
            Lang::Rust => &[
                "function_item",
                "struct_item",
                "enum_item",
                "trait_item",
                "impl_item",
                "mod_item",
                "type_item",
                "macro_definition",
            ],
            Lang::Python => &["function_definition", "class_definition"],
            Lang::JavaScript => &[
                "function_declaration",
                "class_declaration",
                "method_definition",
            ],
            Lang::TypeScript | Lang::Tsx => &[
                "function_declaration",
                "class_declaration",
                "method_definition",
                "interface_declaration",
                "type_alias_declaration",
                "enum_declaration",
            ],
            Lang::Go => &["function_declaration", "method_declaration", "type_declaration"],
            Lang::Java => &[
                "class_declaration",
                "interface_declaration",
                "enum_declaration",
                "method_declaration",
            ],
            Lang::C => &["function_definition", "struct_specifier"],
            Lang::Cpp => &[
                "function_definition",
                "class_specifier",
                "struct_specifier",
                "namespace_definition",
            ],
            Lang::Ruby => &["method", "singleton_method", "class", "module"],
            Lang::Json => &[],
        }
    }
}
