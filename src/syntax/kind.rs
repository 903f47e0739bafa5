//! The closed set of token and node kinds of the JavaScript syntax tree.

macro_rules! syntax_kinds {
    ($($kind:ident),* $(,)?) => {
        /// Kind of a token or node in the lossless syntax tree.
        #[allow(non_camel_case_types, clippy::upper_case_acronyms)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(u16)]
        pub enum SyntaxKind {
            $($kind),*
        }

        impl SyntaxKind {
            const ALL: &'static [SyntaxKind] = &[$(SyntaxKind::$kind),*];

            /// Inverse of `kind as u16`.
            pub fn from_raw(raw: u16) -> SyntaxKind {
                Self::ALL[raw as usize]
            }
        }
    };
}

syntax_kinds! {
    // trivia
    WHITESPACE,
    LINE_COMMENT,
    BLOCK_COMMENT,

    // literals and names
    IDENT,
    NUMBER,
    STRING,
    REGEX,
    TEMPLATE_CHUNK,

    // punctuation
    L_PAREN,
    R_PAREN,
    L_BRACE,
    R_BRACE,
    L_BRACK,
    R_BRACK,
    SEMICOLON,
    COMMA,
    DOT,
    DOT3,
    QUESTION,
    QUESTION_DOT,
    COLON,
    FAT_ARROW,
    EQ,
    ASSIGN_OP,
    UPDATE_OP,
    OPERATOR,

    // keywords
    VAR_KW,
    CONST_KW,
    FUNCTION_KW,
    RETURN_KW,
    IF_KW,
    ELSE_KW,
    FOR_KW,
    IN_KW,
    WHILE_KW,
    DO_KW,
    SWITCH_KW,
    CASE_KW,
    DEFAULT_KW,
    BREAK_KW,
    CONTINUE_KW,
    TRY_KW,
    CATCH_KW,
    FINALLY_KW,
    THROW_KW,
    NEW_KW,
    DELETE_KW,
    TYPEOF_KW,
    VOID_KW,
    INSTANCEOF_KW,
    THIS_KW,
    NULL_KW,
    TRUE_KW,
    FALSE_KW,
    CLASS_KW,
    EXTENDS_KW,
    SUPER_KW,
    IMPORT_KW,
    EXPORT_KW,
    DEBUGGER_KW,
    WITH_KW,

    // statements
    SOURCE_FILE,
    VAR_DECL,
    DECLARATOR,
    FUNCTION_DECL,
    CLASS_DECL,
    EXPR_STMT,
    BLOCK_STMT,
    EMPTY_STMT,
    IF_STMT,
    FOR_STMT,
    FOR_IN_STMT,
    FOR_OF_STMT,
    FOR_INIT,
    FOR_TEST,
    FOR_UPDATE,
    WHILE_STMT,
    DO_WHILE_STMT,
    RETURN_STMT,
    BREAK_STMT,
    CONTINUE_STMT,
    THROW_STMT,
    TRY_STMT,
    CATCH_CLAUSE,
    FINALLY_CLAUSE,
    SWITCH_STMT,
    SWITCH_CASE,
    LABELED_STMT,
    DEBUGGER_STMT,
    WITH_STMT,
    IMPORT_DECL,
    EXPORT_DECL,

    // expressions
    NAME,
    NAME_REF,
    LITERAL,
    TEMPLATE,
    TAGGED_TEMPLATE,
    THIS_EXPR,
    SUPER_EXPR,
    ARRAY_EXPR,
    OBJECT_EXPR,
    PROPERTY,
    PROP_KEY,
    METHOD,
    SPREAD_ELEMENT,
    FUNCTION_EXPR,
    ARROW_FUNCTION,
    CLASS_EXPR,
    CLASS_BODY,
    CLASS_PROPERTY,
    PAREN_EXPR,
    MEMBER_EXPR,
    INDEX_EXPR,
    CALL_EXPR,
    NEW_EXPR,
    ARG_LIST,
    PREFIX_EXPR,
    POSTFIX_EXPR,
    BINARY_EXPR,
    COND_EXPR,
    ASSIGN_EXPR,
    SEQUENCE_EXPR,

    // patterns
    PARAM_LIST,
    OBJECT_PATTERN,
    ARRAY_PATTERN,
    PATTERN_PROP,
    ASSIGN_PATTERN,
    REST_PATTERN,
}

impl SyntaxKind {
    pub fn is_trivia(self) -> bool {
        matches!(self, WHITESPACE | LINE_COMMENT | BLOCK_COMMENT)
    }

    pub fn is_comment(self) -> bool {
        matches!(self, LINE_COMMENT | BLOCK_COMMENT)
    }

    pub fn is_keyword(self) -> bool {
        (VAR_KW as u16..=WITH_KW as u16).contains(&(self as u16))
    }

    /// Maps a reserved word to its keyword kind. Contextual words such as
    /// `let`, `of`, `async` and `static` stay identifiers.
    pub fn from_keyword(word: &str) -> Option<SyntaxKind> {
        let kind = match word {
            "var" => VAR_KW,
            "const" => CONST_KW,
            "function" => FUNCTION_KW,
            "return" => RETURN_KW,
            "if" => IF_KW,
            "else" => ELSE_KW,
            "for" => FOR_KW,
            "in" => IN_KW,
            "while" => WHILE_KW,
            "do" => DO_KW,
            "switch" => SWITCH_KW,
            "case" => CASE_KW,
            "default" => DEFAULT_KW,
            "break" => BREAK_KW,
            "continue" => CONTINUE_KW,
            "try" => TRY_KW,
            "catch" => CATCH_KW,
            "finally" => FINALLY_KW,
            "throw" => THROW_KW,
            "new" => NEW_KW,
            "delete" => DELETE_KW,
            "typeof" => TYPEOF_KW,
            "void" => VOID_KW,
            "instanceof" => INSTANCEOF_KW,
            "this" => THIS_KW,
            "null" => NULL_KW,
            "true" => TRUE_KW,
            "false" => FALSE_KW,
            "class" => CLASS_KW,
            "extends" => EXTENDS_KW,
            "super" => SUPER_KW,
            "import" => IMPORT_KW,
            "export" => EXPORT_KW,
            "debugger" => DEBUGGER_KW,
            "with" => WITH_KW,
            _ => return None,
        };
        Some(kind)
    }

    /// Nodes that appear as items of a statement list.
    pub fn is_statement(self) -> bool {
        matches!(
            self,
            VAR_DECL
                | FUNCTION_DECL
                | CLASS_DECL
                | EXPR_STMT
                | BLOCK_STMT
                | EMPTY_STMT
                | IF_STMT
                | FOR_STMT
                | FOR_IN_STMT
                | FOR_OF_STMT
                | WHILE_STMT
                | DO_WHILE_STMT
                | RETURN_STMT
                | BREAK_STMT
                | CONTINUE_STMT
                | THROW_STMT
                | TRY_STMT
                | SWITCH_STMT
                | LABELED_STMT
                | DEBUGGER_STMT
                | WITH_STMT
                | IMPORT_DECL
                | EXPORT_DECL
        )
    }

    /// Nodes that introduce a function scope.
    pub fn is_function(self) -> bool {
        matches!(self, FUNCTION_DECL | FUNCTION_EXPR | ARROW_FUNCTION | METHOD)
    }
}

pub use SyntaxKind::*;

impl From<SyntaxKind> for rowan::SyntaxKind {
    fn from(kind: SyntaxKind) -> Self {
        rowan::SyntaxKind(kind as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trips_through_table() {
        for kind in [WHITESPACE, IDENT, WITH_KW, SOURCE_FILE, REST_PATTERN] {
            assert_eq!(SyntaxKind::from_raw(kind as u16), kind);
        }
    }

    #[test]
    fn contextual_words_are_not_keywords() {
        assert_eq!(SyntaxKind::from_keyword("let"), None);
        assert_eq!(SyntaxKind::from_keyword("of"), None);
        assert_eq!(SyntaxKind::from_keyword("typeof"), Some(TYPEOF_KW));
        assert!(TYPEOF_KW.is_keyword());
        assert!(!IDENT.is_keyword());
    }
}
