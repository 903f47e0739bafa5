//! Tokenizer for JavaScript source.
//!
//! Produces a flat list of tokens covering every byte of the input, trivia
//! included. Two context-sensitive decisions happen here rather than in the
//! parser: whether a `/` starts a regular expression, and where a template
//! literal's `${ ... }` substitution ends.

use super::kind::SyntaxKind::{self, *};
use super::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: SyntaxKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-",
    "*", "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".",
];

/// Splits `source` into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    Lexer {
        source,
        pos: 0,
        tokens: Vec::new(),
        templates: Vec::new(),
        parens: Vec::new(),
        braces: Vec::new(),
        last_paren: Opener::Other,
        regex_after_close: false,
    }
    .run()
}

struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    tokens: Vec<Token>,
    /// Open brace depth inside each unfinished template substitution.
    templates: Vec<usize>,
    parens: Vec<Opener>,
    /// For each open `{`, whether its `}` ends a statement.
    braces: Vec<bool>,
    /// The opener of the most recently closed `(`.
    last_paren: Opener,
    /// Whether the most recent `)` or `}` leaves the lexer at the start of an
    /// expression, as after `if (a)` or a block statement.
    regex_after_close: bool,
}

/// What a `(` belongs to, as far as the tokens before it tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opener {
    /// `if (`, `while (`, `for (` and the other statement heads.
    Head,
    Function { declaration: bool },
    Other,
}

impl Lexer<'_> {
    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        while let Some(c) = self.peek() {
            let start = self.pos;
            let kind = match c {
                c if c.is_whitespace() => {
                    self.eat_while(char::is_whitespace);
                    WHITESPACE
                }
                '#' if start == 0 && self.at("#!") => {
                    self.eat_while(|c| c != '\n' && c != '\r');
                    LINE_COMMENT
                }
                '/' if self.at("//") => {
                    self.eat_while(|c| c != '\n' && c != '\r');
                    LINE_COMMENT
                }
                '/' if self.at("/*") => {
                    let Some(len) = self.rest()[2..].find("*/") else {
                        return Err(self.error("unterminated block comment", start));
                    };
                    self.pos += len + 4;
                    BLOCK_COMMENT
                }
                '/' if self.regex_allowed() => self.regex(start)?,
                '"' | '\'' => self.string(c, start)?,
                '`' => {
                    self.pos += 1;
                    self.template_chunk(start)?
                }
                '}' if self.templates.last() == Some(&0) => {
                    self.templates.pop();
                    self.pos += 1;
                    self.template_chunk(start)?
                }
                c if c.is_ascii_digit() => self.number(),
                '.' if self.rest()[1..].starts_with(|c: char| c.is_ascii_digit()) => self.number(),
                '#' if self.rest()[1..].starts_with(is_ident_start)
                    || self.rest()[1..].starts_with("\\u") =>
                {
                    self.pos += 1;
                    self.identifier(start)?;
                    IDENT
                }
                c if is_ident_start(c) || self.at("\\u") => {
                    self.identifier(start)?;
                    SyntaxKind::from_keyword(&self.source[start..self.pos]).unwrap_or(IDENT)
                }
                _ => self.punctuator(start)?,
            };
            self.tokens.push(Token {
                kind,
                start,
                end: self.pos,
            });
        }

        if !self.templates.is_empty() {
            return Err(self.error("unterminated template literal", self.source.len()));
        }
        Ok(self.tokens)
    }

    fn rest(&self) -> &str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn at(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        let len = self
            .rest()
            .find(|c: char| !pred(c))
            .unwrap_or(self.rest().len());
        self.pos += len;
    }

    fn error(&self, message: &str, offset: usize) -> ParseError {
        ParseError::at(self.source, offset, message)
    }

    fn significant(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().rev().filter(|t| !t.kind.is_trivia())
    }

    /// A `/` after a complete operand is division; anywhere else it opens a
    /// regular expression literal.
    fn regex_allowed(&self) -> bool {
        let mut significant = self.significant();
        let Some(prev) = significant.next() else {
            return true;
        };
        match prev.kind {
            R_PAREN | R_BRACE => self.regex_after_close,
            IDENT | NUMBER | STRING | REGEX | R_BRACK | THIS_KW | SUPER_KW | NULL_KW | TRUE_KW
            | FALSE_KW | UPDATE_OP => false,
            TEMPLATE_CHUNK => prev.text(self.source).ends_with("${"),
            // `obj.default / 2`
            kind if kind.is_keyword() => significant.next().is_none_or(|t| t.kind != DOT),
            _ => true,
        }
    }

    fn paren_opener(&self) -> Opener {
        let mut significant = self.significant();
        match significant.next().map(|t| t.kind) {
            // `promise.catch(...)` is a call.
            Some(IF_KW | WHILE_KW | FOR_KW | WITH_KW | SWITCH_KW | CATCH_KW) => {
                match significant.next().map(|t| t.kind) {
                    Some(DOT | QUESTION_DOT) => Opener::Other,
                    _ => Opener::Head,
                }
            }
            Some(IDENT) => {
                let mut before = significant.next();
                if before.is_some_and(|t| t.text(self.source) == "*") {
                    before = significant.next();
                }
                if before.is_none_or(|t| t.kind != FUNCTION_KW) {
                    return Opener::Other;
                }
                let mut lead = significant.next();
                if lead.is_some_and(|t| t.text(self.source) == "async") {
                    lead = significant.next();
                }
                let declaration = lead.is_none_or(|t| {
                    matches!(t.kind, SEMICOLON | L_BRACE | R_BRACE | EXPORT_KW | DEFAULT_KW)
                });
                Opener::Function { declaration }
            }
            _ => Opener::Other,
        }
    }

    /// Whether the `{` about to be pushed opens a block or a declaration body
    /// rather than an object literal or an expression's function body.
    fn brace_opens_statement(&self) -> bool {
        let Some(prev) = self.significant().next() else {
            return true;
        };
        match prev.kind {
            SEMICOLON | L_BRACE | R_BRACE | ELSE_KW | DO_KW | TRY_KW | FINALLY_KW | FAT_ARROW => {
                true
            }
            R_PAREN => matches!(
                self.last_paren,
                Opener::Head | Opener::Function { declaration: true }
            ),
            _ => false,
        }
    }

    /// Consumes an identifier name, `\uXXXX` and `\u{...}` escapes included.
    fn identifier(&mut self, start: usize) -> Result<(), ParseError> {
        loop {
            if self.at("\\u") {
                self.pos += 2;
                let len = self
                    .unicode_escape()
                    .ok_or_else(|| self.error("invalid unicode escape in identifier", start))?;
                self.pos += len;
                continue;
            }
            match self.peek() {
                Some(c) if is_ident_continue(c) => self.pos += c.len_utf8(),
                _ => return Ok(()),
            }
        }
    }

    /// Length of the escape body after `\u`, if it names a valid code point.
    fn unicode_escape(&self) -> Option<usize> {
        let rest = self.rest();
        let (hex, len) = match rest.strip_prefix('{') {
            Some(braced) => {
                let close = braced.find('}')?;
                (&braced[..close], close + 2)
            }
            None => (rest.get(..4)?, 4),
        };
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let code = u32::from_str_radix(hex, 16).ok()?;
        char::from_u32(code).map(|_| len)
    }

    fn regex(&mut self, start: usize) -> Result<SyntaxKind, ParseError> {
        self.pos += 1;
        let mut in_class = false;
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error("unterminated regular expression", start));
            };
            self.pos += c.len_utf8();
            match c {
                '\\' => {
                    if let Some(escaped) = self.peek() {
                        self.pos += escaped.len_utf8();
                    }
                }
                '[' => in_class = true,
                ']' => in_class = false,
                '/' if !in_class => break,
                '\n' | '\r' => return Err(self.error("unterminated regular expression", start)),
                _ => {}
            }
        }
        self.eat_while(is_ident_continue);
        Ok(REGEX)
    }

    fn string(&mut self, quote: char, start: usize) -> Result<SyntaxKind, ParseError> {
        self.pos += 1;
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error("unterminated string literal", start));
            };
            self.pos += c.len_utf8();
            match c {
                '\\' => {
                    if let Some(escaped) = self.peek() {
                        self.pos += escaped.len_utf8();
                    }
                }
                '\n' => return Err(self.error("unterminated string literal", start)),
                c if c == quote => return Ok(STRING),
                _ => {}
            }
        }
    }

    /// Lexes template text up to and including the closing backtick or the
    /// `${` that opens a substitution.
    fn template_chunk(&mut self, start: usize) -> Result<SyntaxKind, ParseError> {
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error("unterminated template literal", start));
            };
            self.pos += c.len_utf8();
            match c {
                '\\' => {
                    if let Some(escaped) = self.peek() {
                        self.pos += escaped.len_utf8();
                    }
                }
                '`' => return Ok(TEMPLATE_CHUNK),
                '$' if self.peek() == Some('{') => {
                    self.pos += 1;
                    self.templates.push(0);
                    return Ok(TEMPLATE_CHUNK);
                }
                _ => {}
            }
        }
    }

    fn number(&mut self) -> SyntaxKind {
        let radix_prefix = ["0x", "0X", "0o", "0O", "0b", "0B"]
            .iter()
            .any(|p| self.at(p));
        if radix_prefix {
            self.pos += 2;
            self.eat_while(|c| c.is_ascii_hexdigit() || c == '_');
        } else {
            self.eat_while(|c| c.is_ascii_digit() || c == '_');
            if self.at(".") {
                self.pos += 1;
                self.eat_while(|c| c.is_ascii_digit() || c == '_');
            }
            if self.at("e") || self.at("E") {
                let exponent = &self.rest()[1..];
                let signed = exponent.starts_with(['+', '-']);
                let digits = if signed { &exponent[1..] } else { exponent };
                if digits.starts_with(|c: char| c.is_ascii_digit()) {
                    self.pos += if signed { 2 } else { 1 };
                    self.eat_while(|c| c.is_ascii_digit() || c == '_');
                }
            }
        }
        if self.at("n") {
            self.pos += 1;
        }
        NUMBER
    }

    fn punctuator(&mut self, start: usize) -> Result<SyntaxKind, ParseError> {
        let rest = self.rest();
        let Some(punct) = PUNCTUATORS.iter().find(|p| rest.starts_with(**p)) else {
            let c = rest.chars().next().unwrap_or('\0');
            return Err(self.error(&format!("unexpected character '{}'", c), start));
        };
        // `a?.5:b` is a conditional, not optional chaining.
        if *punct == "?." && rest[2..].starts_with(|c: char| c.is_ascii_digit()) {
            self.pos += 1;
            return Ok(QUESTION);
        }
        self.pos += punct.len();

        let kind = match *punct {
            "(" => {
                let opener = self.paren_opener();
                self.parens.push(opener);
                L_PAREN
            }
            ")" => {
                self.last_paren = self.parens.pop().unwrap_or(Opener::Other);
                self.regex_after_close = self.last_paren == Opener::Head;
                R_PAREN
            }
            "{" => {
                if let Some(depth) = self.templates.last_mut() {
                    *depth += 1;
                }
                let statement = self.brace_opens_statement();
                self.braces.push(statement);
                L_BRACE
            }
            "}" => {
                if let Some(depth) = self.templates.last_mut() {
                    *depth -= 1;
                }
                self.regex_after_close = self.braces.pop().unwrap_or(false);
                R_BRACE
            }
            "[" => L_BRACK,
            "]" => R_BRACK,
            ";" => SEMICOLON,
            "," => COMMA,
            "." => DOT,
            "..." => DOT3,
            "?" => QUESTION,
            "?." => QUESTION_DOT,
            ":" => COLON,
            "=>" => FAT_ARROW,
            "=" => EQ,
            "++" | "--" => UPDATE_OP,
            p if p.len() >= 2 && p.ends_with('=') && !matches!(p, "==" | "!=" | "<=" | ">=" | "===" | "!==") => {
                ASSIGN_OP
            }
            _ => OPERATOR,
        };
        Ok(kind)
    }
}

pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$' || (!c.is_ascii() && c.is_alphabetic())
}

pub fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || (!c.is_ascii() && c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<SyntaxKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .filter(|t| !t.kind.is_trivia())
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn tokens_cover_every_byte() {
        let source = "var a = 1; // done\n/* block */ a += 2;";
        let tokens = tokenize(source).unwrap();
        let joined: String = tokens.iter().map(|t| t.text(source)).collect();
        assert_eq!(joined, source);
    }

    #[test]
    fn slash_after_operand_is_division() {
        assert_eq!(kinds("a / b / c"), vec![IDENT, OPERATOR, IDENT, OPERATOR, IDENT]);
        assert_eq!(kinds("x = /ab+c/g.test(s)")[2], REGEX);
        assert_eq!(kinds("return /x/")[1], REGEX);
    }

    #[test]
    fn slash_after_statement_head_starts_a_regex() {
        assert_eq!(kinds("if (a) /x/.test(s) && g();")[4], REGEX);
        assert_eq!(kinds("while (x) /y/.test(z);")[4], REGEX);
        assert_eq!(kinds("for (;;) /z/.exec(s);")[5], REGEX);
        assert_eq!(kinds("f(a) / 2")[4], OPERATOR);
        assert_eq!(kinds("x = (b) / c")[5], OPERATOR);
        assert_eq!(kinds("p.catch(e) / 2")[6], OPERATOR);
    }

    #[test]
    fn slash_after_block_statement_starts_a_regex() {
        assert_eq!(kinds("function f() {} /x/.test(s);")[6], REGEX);
        assert_eq!(kinds("{}\n/re/.test(s)")[2], REGEX);
        assert_eq!(kinds("if (a) {} /x/.test(s)")[6], REGEX);
        assert_eq!(kinds("function f() { i = 0; }\n/^\\s+/.test(s) && g();")[10], REGEX);
    }

    #[test]
    fn slash_after_expression_braces_is_division() {
        assert_eq!(kinds("x = {} / 1")[4], OPERATOR);
        assert_eq!(kinds("x = function () {} / 2")[7], OPERATOR);
        assert_eq!(kinds("x = function g() {} / 2")[8], OPERATOR);
    }

    #[test]
    fn identifiers_accept_unicode_escapes() {
        let source = "var \\u0061b = \\u{62}c;";
        let tokens = tokenize(source).unwrap();
        let idents: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == IDENT)
            .map(|t| t.text(source))
            .collect();
        assert_eq!(idents, vec!["\\u0061b", "\\u{62}c"]);
        assert_eq!(kinds("\\u0076ar"), vec![IDENT]);

        let err = tokenize("var \\u00g1 = 1;").unwrap_err();
        assert!(err.message.contains("invalid unicode escape"));
    }

    #[test]
    fn template_substitutions_are_tokenized() {
        let source = "`a${ b + `c${d}` }e`";
        assert_eq!(
            kinds(source),
            vec![
                TEMPLATE_CHUNK,
                IDENT,
                OPERATOR,
                TEMPLATE_CHUNK,
                IDENT,
                TEMPLATE_CHUNK,
                TEMPLATE_CHUNK
            ]
        );
    }

    #[test]
    fn object_braces_inside_substitution_do_not_close_it() {
        let source = "`${ {a: 1}.a }`";
        assert_eq!(
            kinds(source),
            vec![TEMPLATE_CHUNK, L_BRACE, IDENT, COLON, NUMBER, R_BRACE, DOT, IDENT, TEMPLATE_CHUNK]
        );
    }

    #[test]
    fn compound_assignment_and_comparison_are_distinct() {
        assert_eq!(kinds("a >>>= b")[1], ASSIGN_OP);
        assert_eq!(kinds("a >= b")[1], OPERATOR);
        assert_eq!(kinds("a ??= b")[1], ASSIGN_OP);
        assert_eq!(kinds("a?.b")[1], QUESTION_DOT);
        assert_eq!(kinds("a?.5:1")[1], QUESTION);
    }

    #[test]
    fn reports_unterminated_string() {
        let err = tokenize("var s = 'oops;\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("unterminated string"));
    }
}
