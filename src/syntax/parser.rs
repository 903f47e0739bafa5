//! Recursive-descent parser producing a lossless green tree.
//!
//! Trivia is flushed into whichever node is open when the next significant
//! token or node starts, so whitespace between two siblings belongs to their
//! parent. Statements are the exception: comments leading a statement are
//! emitted inside it, and so is a line comment trailing it.

use super::ParseError;
use super::kind::SyntaxKind::{self, *};
use super::lexer::{self, Token};
use rowan::{Checkpoint, GreenNode, GreenNodeBuilder};

type PResult = Result<(), ParseError>;

/// Deepest statement, expression or pattern nesting accepted before the
/// parser gives up instead of exhausting the stack.
const MAX_DEPTH: usize = 256;

pub(super) fn parse(source: &str) -> Result<GreenNode, ParseError> {
    let tokens = lexer::tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        depth: 0,
        builder: GreenNodeBuilder::new(),
    };
    parser.builder.start_node(SOURCE_FILE.into());
    while parser.peek().is_some() {
        parser.statement()?;
    }
    parser.eat_trivia();
    parser.builder.finish_node();
    Ok(parser.builder.finish())
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    /// Index of the next unconsumed token, trivia included.
    pos: usize,
    /// Recursion depth of the nesting productions.
    depth: usize,
    builder: GreenNodeBuilder<'static>,
}

impl Parser<'_> {
    // ---- token access -------------------------------------------------

    fn nth_token(&self, n: usize) -> Option<&Token> {
        self.tokens[self.pos..]
            .iter()
            .filter(|t| !t.kind.is_trivia())
            .nth(n)
    }

    fn peek(&self) -> Option<SyntaxKind> {
        self.nth(0)
    }

    fn nth(&self, n: usize) -> Option<SyntaxKind> {
        self.nth_token(n).map(|t| t.kind)
    }

    fn nth_text(&self, n: usize) -> &str {
        self.nth_token(n).map_or("", |t| t.text(self.source))
    }

    fn at(&self, kind: SyntaxKind) -> bool {
        self.peek() == Some(kind)
    }

    fn at_text(&self, text: &str) -> bool {
        self.nth_text(0) == text
    }

    fn at_ident(&self, text: &str) -> bool {
        self.at(IDENT) && self.at_text(text)
    }

    fn at_operator(&self, text: &str) -> bool {
        self.at(OPERATOR) && self.at_text(text)
    }

    /// Whether a line break separates the previous token from the next one.
    fn newline_before(&self) -> bool {
        self.tokens[self.pos..]
            .iter()
            .take_while(|t| t.kind.is_trivia())
            .any(|t| t.text(self.source).contains('\n'))
    }

    /// Whether the `n`-th significant token follows the one before it on the same line.
    fn same_line(&self, n: usize) -> bool {
        let mut seen = 0;
        let mut newline = false;
        for token in &self.tokens[self.pos..] {
            if token.kind.is_trivia() {
                if seen > 0 && token.text(self.source).contains('\n') {
                    newline = true;
                }
                continue;
            }
            if seen == n {
                return !newline;
            }
            seen += 1;
            newline = false;
        }
        false
    }

    fn error(&self, message: impl std::fmt::Display) -> ParseError {
        let offset = self
            .nth_token(0)
            .map_or(self.source.len(), |token| token.start);
        ParseError::at(self.source, offset, message)
    }

    fn unexpected(&self) -> ParseError {
        match self.nth_token(0) {
            Some(token) => self.error(format!("unexpected token `{}`", token.text(self.source))),
            None => self.error("unexpected end of input"),
        }
    }

    fn nested(&mut self, production: impl FnOnce(&mut Self) -> PResult) -> PResult {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let result = production(self);
        self.depth -= 1;
        result
    }

    // ---- tree building ------------------------------------------------

    fn eat_trivia(&mut self) {
        while let Some(token) = self.tokens.get(self.pos) {
            if !token.kind.is_trivia() {
                break;
            }
            let text = &self.source[token.start..token.end];
            self.builder.token(token.kind.into(), text);
            self.pos += 1;
        }
    }

    fn bump(&mut self) {
        self.eat_trivia();
        if let Some(token) = self.tokens.get(self.pos) {
            let text = &self.source[token.start..token.end];
            self.builder.token(token.kind.into(), text);
            self.pos += 1;
        }
    }

    fn eat(&mut self, kind: SyntaxKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: SyntaxKind, what: &str) -> PResult {
        if self.eat(kind) {
            return Ok(());
        }
        let found = self.nth_text(0);
        if found.is_empty() {
            Err(self.error(format!("expected `{}`, found end of input", what)))
        } else {
            Err(self.error(format!("expected `{}`, found `{}`", what, found)))
        }
    }

    fn expect_ident(&mut self, text: &str) -> PResult {
        if self.at_ident(text) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(format!("expected `{}`", text)))
        }
    }

    fn start(&mut self, kind: SyntaxKind) {
        self.eat_trivia();
        self.builder.start_node(kind.into());
    }

    fn finish(&mut self) {
        self.builder.finish_node();
    }

    fn checkpoint(&mut self) -> Checkpoint {
        self.eat_trivia();
        self.builder.checkpoint()
    }

    fn start_at(&mut self, checkpoint: Checkpoint, kind: SyntaxKind) {
        self.builder.start_node_at(checkpoint, kind.into());
    }

    /// Emits the whitespace before a statement, leaving any comments that
    /// lead it to be emitted inside the statement node.
    fn stmt_checkpoint(&mut self) -> Checkpoint {
        while let Some(token) = self.tokens.get(self.pos) {
            if token.kind != WHITESPACE {
                break;
            }
            let text = &self.source[token.start..token.end];
            self.builder.token(WHITESPACE.into(), text);
            self.pos += 1;
        }
        self.builder.checkpoint()
    }

    fn start_stmt(&mut self, kind: SyntaxKind) {
        let checkpoint = self.stmt_checkpoint();
        self.start_at(checkpoint, kind);
    }

    /// Closes a statement node, pulling in a line comment on the same line.
    fn finish_stmt(&mut self) {
        let mut end = self.pos;
        if let Some(token) = self.tokens.get(end)
            && token.kind == WHITESPACE
            && !token.text(self.source).contains('\n')
        {
            end += 1;
        }
        if self
            .tokens
            .get(end)
            .is_some_and(|token| token.kind == LINE_COMMENT)
        {
            while self.pos <= end {
                let token = self.tokens[self.pos];
                self.builder
                    .token(token.kind.into(), token.text(self.source));
                self.pos += 1;
            }
        }
        self.builder.finish_node();
    }

    /// Consumes a statement terminator, applying automatic semicolon insertion.
    fn semi(&mut self) -> PResult {
        if self.eat(SEMICOLON) || self.peek().is_none() || self.at(R_BRACE) || self.newline_before()
        {
            Ok(())
        } else {
            Err(self.error(format!("expected `;`, found `{}`", self.nth_text(0))))
        }
    }

    fn at_statement_end(&self) -> bool {
        self.peek().is_none() || self.at(SEMICOLON) || self.at(R_BRACE) || self.newline_before()
    }

    // ---- statements ---------------------------------------------------

    fn statement(&mut self) -> PResult {
        self.nested(Self::statement_body)
    }

    fn statement_body(&mut self) -> PResult {
        let Some(kind) = self.peek() else {
            return Err(self.unexpected());
        };
        match kind {
            L_BRACE => self.block_stmt(),
            VAR_KW | CONST_KW => self.var_stmt(),
            IDENT if self.at_let_declaration() => self.var_stmt(),
            FUNCTION_KW => self.function_decl(),
            IDENT if self.at_async_function() => self.function_decl(),
            CLASS_KW => self.class_decl(),
            IF_KW => self.if_stmt(),
            FOR_KW => self.for_stmt(),
            WHILE_KW => self.while_stmt(),
            DO_KW => self.do_while_stmt(),
            RETURN_KW => self.jump_stmt(RETURN_STMT),
            THROW_KW => self.jump_stmt(THROW_STMT),
            BREAK_KW => self.break_stmt(BREAK_STMT),
            CONTINUE_KW => self.break_stmt(CONTINUE_STMT),
            TRY_KW => self.try_stmt(),
            SWITCH_KW => self.switch_stmt(),
            WITH_KW => self.with_stmt(),
            SEMICOLON => {
                self.start_stmt(EMPTY_STMT);
                self.bump();
                self.finish_stmt();
                Ok(())
            }
            DEBUGGER_KW => {
                self.start_stmt(DEBUGGER_STMT);
                self.bump();
                self.semi()?;
                self.finish_stmt();
                Ok(())
            }
            IMPORT_KW if !matches!(self.nth(1), Some(L_PAREN | DOT)) => self.import_decl(),
            EXPORT_KW => self.export_decl(),
            IDENT if self.nth(1) == Some(COLON) => {
                self.start_stmt(LABELED_STMT);
                self.bump();
                self.bump();
                self.statement()?;
                self.finish_stmt();
                Ok(())
            }
            _ => {
                self.start_stmt(EXPR_STMT);
                self.expression(false)?;
                self.semi()?;
                self.finish_stmt();
                Ok(())
            }
        }
    }

    fn at_let_declaration(&self) -> bool {
        self.at_ident("let") && matches!(self.nth(1), Some(IDENT | L_BRACK | L_BRACE))
    }

    fn at_async_function(&self) -> bool {
        self.at_ident("async") && self.nth(1) == Some(FUNCTION_KW) && self.same_line(1)
    }

    fn block_stmt(&mut self) -> PResult {
        self.start_stmt(BLOCK_STMT);
        self.block_body()?;
        self.finish_stmt();
        Ok(())
    }

    /// A block that is part of a larger construct, e.g. a function body.
    fn block(&mut self) -> PResult {
        self.start(BLOCK_STMT);
        self.block_body()?;
        self.finish();
        Ok(())
    }

    fn block_body(&mut self) -> PResult {
        self.expect(L_BRACE, "{")?;
        while self.peek().is_some() && !self.at(R_BRACE) {
            self.statement()?;
        }
        self.expect(R_BRACE, "}")
    }

    fn var_stmt(&mut self) -> PResult {
        self.start_stmt(VAR_DECL);
        self.var_declaration_body(false)?;
        self.semi()?;
        self.finish_stmt();
        Ok(())
    }

    fn var_declaration_body(&mut self, no_in: bool) -> PResult {
        self.bump();
        loop {
            self.start(DECLARATOR);
            self.binding_target()?;
            if self.eat(EQ) {
                self.assign_expr(no_in)?;
            }
            self.finish();
            if !self.eat(COMMA) {
                return Ok(());
            }
        }
    }

    fn function_decl(&mut self) -> PResult {
        self.start_stmt(FUNCTION_DECL);
        self.function_rest(true)?;
        self.finish_stmt();
        Ok(())
    }

    /// Parses from the optional `async` through the body.
    fn function_rest(&mut self, name_required: bool) -> PResult {
        if self.at_ident("async") {
            self.bump();
        }
        self.expect(FUNCTION_KW, "function")?;
        if self.at_operator("*") {
            self.bump();
        }
        if self.at(IDENT) {
            self.name()?;
        } else if name_required {
            return Err(self.error("expected function name"));
        }
        self.param_list()?;
        self.block()
    }

    fn class_decl(&mut self) -> PResult {
        self.start_stmt(CLASS_DECL);
        self.class_rest(true)?;
        self.finish_stmt();
        Ok(())
    }

    fn class_rest(&mut self, name_required: bool) -> PResult {
        self.bump();
        if self.at(IDENT) {
            self.name()?;
        } else if name_required {
            return Err(self.error("expected class name"));
        }
        if self.eat(EXTENDS_KW) {
            self.lhs_expr()?;
        }
        self.class_body()
    }

    fn class_body(&mut self) -> PResult {
        self.start(CLASS_BODY);
        self.expect(L_BRACE, "{")?;
        while self.peek().is_some() && !self.at(R_BRACE) {
            if self.eat(SEMICOLON) {
                continue;
            }
            let checkpoint = self.checkpoint();
            self.member_modifiers();
            self.prop_key()?;
            if self.at(L_PAREN) {
                self.start_at(checkpoint, METHOD);
                self.param_list()?;
                self.block()?;
            } else {
                self.start_at(checkpoint, CLASS_PROPERTY);
                if self.eat(EQ) {
                    self.assign_expr(false)?;
                }
                self.semi()?;
            }
            self.finish();
        }
        self.expect(R_BRACE, "}")?;
        self.finish();
        Ok(())
    }

    /// Consumes `static`, `async`, `get`, `set` and `*` prefixes of a member.
    fn member_modifiers(&mut self) -> bool {
        let mut any = false;
        loop {
            let modifier = self.at(IDENT)
                && matches!(self.nth_text(0), "static" | "async" | "get" | "set")
                && self.nth(1).is_some_and(|next| {
                    matches!(next, IDENT | STRING | NUMBER | L_BRACK) || next.is_keyword()
                        || (next == OPERATOR && self.nth_text(1) == "*")
                });
            if modifier || self.at_operator("*") {
                self.bump();
                any = true;
            } else {
                return any;
            }
        }
    }

    fn prop_key(&mut self) -> PResult {
        self.start(PROP_KEY);
        match self.peek() {
            Some(L_BRACK) => {
                self.bump();
                self.assign_expr(false)?;
                self.expect(R_BRACK, "]")?;
            }
            Some(IDENT | STRING | NUMBER) => self.bump(),
            Some(kind) if kind.is_keyword() => self.bump(),
            _ => return Err(self.unexpected()),
        }
        self.finish();
        Ok(())
    }

    fn if_stmt(&mut self) -> PResult {
        self.start_stmt(IF_STMT);
        self.bump();
        self.paren_condition()?;
        self.statement()?;
        if self.eat(ELSE_KW) {
            self.statement()?;
        }
        self.finish_stmt();
        Ok(())
    }

    fn paren_condition(&mut self) -> PResult {
        self.expect(L_PAREN, "(")?;
        self.expression(false)?;
        self.expect(R_PAREN, ")")
    }

    fn for_stmt(&mut self) -> PResult {
        let checkpoint = self.stmt_checkpoint();
        self.bump();
        if self.at_ident("await") {
            self.bump();
        }
        self.expect(L_PAREN, "(")?;

        let mut kind = FOR_STMT;
        if !self.at(SEMICOLON) {
            let init = self.checkpoint();
            if self.at(VAR_KW) || self.at(CONST_KW) || self.at_let_declaration() {
                self.start(VAR_DECL);
                self.var_declaration_body(true)?;
                self.finish();
            } else {
                self.expression(true)?;
            }
            if self.at(IN_KW) {
                kind = FOR_IN_STMT;
            } else if self.at_ident("of") {
                kind = FOR_OF_STMT;
            } else {
                self.start_at(init, FOR_INIT);
                self.finish();
            }
        }
        self.start_at(checkpoint, kind);

        if kind == FOR_STMT {
            self.expect(SEMICOLON, ";")?;
            if !self.at(SEMICOLON) {
                self.start(FOR_TEST);
                self.expression(false)?;
                self.finish();
            }
            self.expect(SEMICOLON, ";")?;
            if !self.at(R_PAREN) {
                self.start(FOR_UPDATE);
                self.expression(false)?;
                self.finish();
            }
        } else {
            self.bump();
            if kind == FOR_IN_STMT {
                self.expression(false)?;
            } else {
                self.assign_expr(false)?;
            }
        }
        self.expect(R_PAREN, ")")?;
        self.statement()?;
        self.finish_stmt();
        Ok(())
    }

    fn while_stmt(&mut self) -> PResult {
        self.start_stmt(WHILE_STMT);
        self.bump();
        self.paren_condition()?;
        self.statement()?;
        self.finish_stmt();
        Ok(())
    }

    fn do_while_stmt(&mut self) -> PResult {
        self.start_stmt(DO_WHILE_STMT);
        self.bump();
        self.statement()?;
        self.expect(WHILE_KW, "while")?;
        self.paren_condition()?;
        self.eat(SEMICOLON);
        self.finish_stmt();
        Ok(())
    }

    fn jump_stmt(&mut self, kind: SyntaxKind) -> PResult {
        self.start_stmt(kind);
        self.bump();
        if kind == THROW_STMT || !self.at_statement_end() {
            self.expression(false)?;
        }
        self.semi()?;
        self.finish_stmt();
        Ok(())
    }

    fn break_stmt(&mut self, kind: SyntaxKind) -> PResult {
        self.start_stmt(kind);
        self.bump();
        if self.at(IDENT) && !self.newline_before() {
            self.bump();
        }
        self.semi()?;
        self.finish_stmt();
        Ok(())
    }

    fn try_stmt(&mut self) -> PResult {
        self.start_stmt(TRY_STMT);
        self.bump();
        self.block()?;
        if self.at(CATCH_KW) {
            self.start(CATCH_CLAUSE);
            self.bump();
            if self.eat(L_PAREN) {
                self.binding_target()?;
                self.expect(R_PAREN, ")")?;
            }
            self.block()?;
            self.finish();
        }
        if self.at(FINALLY_KW) {
            self.start(FINALLY_CLAUSE);
            self.bump();
            self.block()?;
            self.finish();
        }
        self.finish_stmt();
        Ok(())
    }

    fn switch_stmt(&mut self) -> PResult {
        self.start_stmt(SWITCH_STMT);
        self.bump();
        self.paren_condition()?;
        self.expect(L_BRACE, "{")?;
        while self.at(CASE_KW) || self.at(DEFAULT_KW) {
            self.start_stmt(SWITCH_CASE);
            if self.eat(CASE_KW) {
                self.expression(false)?;
            } else {
                self.bump();
            }
            self.expect(COLON, ":")?;
            while !matches!(self.peek(), None | Some(CASE_KW | DEFAULT_KW | R_BRACE)) {
                self.statement()?;
            }
            self.finish();
        }
        self.expect(R_BRACE, "}")?;
        self.finish_stmt();
        Ok(())
    }

    fn with_stmt(&mut self) -> PResult {
        self.start_stmt(WITH_STMT);
        self.bump();
        self.paren_condition()?;
        self.statement()?;
        self.finish_stmt();
        Ok(())
    }

    fn import_decl(&mut self) -> PResult {
        self.start_stmt(IMPORT_DECL);
        self.bump();
        if !self.at(STRING) {
            if self.at(IDENT) {
                self.name()?;
                self.eat(COMMA);
            }
            if self.at_operator("*") {
                self.bump();
                self.expect_ident("as")?;
                self.name()?;
            } else if self.eat(L_BRACE) {
                while self.peek().is_some() && !self.at(R_BRACE) {
                    if self.nth_text(1) == "as" {
                        self.bump();
                        self.bump();
                    }
                    self.name()?;
                    if !self.eat(COMMA) {
                        break;
                    }
                }
                self.expect(R_BRACE, "}")?;
            }
            self.expect_ident("from")?;
        }
        self.expect(STRING, "module specifier")?;
        self.semi()?;
        self.finish_stmt();
        Ok(())
    }

    fn export_decl(&mut self) -> PResult {
        self.start_stmt(EXPORT_DECL);
        self.bump();
        match self.peek() {
            Some(DEFAULT_KW) => {
                self.bump();
                if self.at(FUNCTION_KW) || self.at_async_function() {
                    self.start(FUNCTION_EXPR);
                    self.function_rest(false)?;
                    self.finish();
                } else if self.at(CLASS_KW) {
                    self.start(CLASS_EXPR);
                    self.class_rest(false)?;
                    self.finish();
                } else {
                    self.assign_expr(false)?;
                    self.semi()?;
                }
            }
            Some(OPERATOR) if self.at_text("*") => {
                self.bump();
                if self.at_ident("as") {
                    self.bump();
                    self.bump();
                }
                self.expect_ident("from")?;
                self.expect(STRING, "module specifier")?;
                self.semi()?;
            }
            Some(L_BRACE) => {
                let reexport = self.braces_followed_by("from");
                self.bump();
                while self.peek().is_some() && !self.at(R_BRACE) {
                    if reexport {
                        self.bump();
                    } else {
                        self.start(NAME_REF);
                        self.bump();
                        self.finish();
                    }
                    if self.at_ident("as") {
                        self.bump();
                        self.bump();
                    }
                    if !self.eat(COMMA) {
                        break;
                    }
                }
                self.expect(R_BRACE, "}")?;
                if reexport {
                    self.bump();
                    self.expect(STRING, "module specifier")?;
                }
                self.semi()?;
            }
            _ => self.statement()?,
        }
        self.finish_stmt();
        Ok(())
    }

    /// Whether the brace group at the current token is followed by `word`.
    fn braces_followed_by(&self, word: &str) -> bool {
        self.matching_close(0)
            .is_some_and(|close| self.nth_text(close + 1) == word)
    }

    // ---- bindings -----------------------------------------------------

    fn name(&mut self) -> PResult {
        if !self.at(IDENT) {
            return Err(self.error(format!("expected identifier, found `{}`", self.nth_text(0))));
        }
        self.start(NAME);
        self.bump();
        self.finish();
        Ok(())
    }

    fn binding_target(&mut self) -> PResult {
        match self.peek() {
            Some(L_BRACE) => self.nested(Self::object_pattern),
            Some(L_BRACK) => self.nested(Self::array_pattern),
            _ => self.name(),
        }
    }

    /// A binding target with an optional default value.
    fn binding_element(&mut self) -> PResult {
        let checkpoint = self.checkpoint();
        self.binding_target()?;
        if self.at(EQ) {
            self.start_at(checkpoint, ASSIGN_PATTERN);
            self.bump();
            self.assign_expr(false)?;
            self.finish();
        }
        Ok(())
    }

    fn rest_pattern(&mut self) -> PResult {
        self.start(REST_PATTERN);
        self.bump();
        self.binding_target()?;
        self.finish();
        Ok(())
    }

    fn object_pattern(&mut self) -> PResult {
        self.start(OBJECT_PATTERN);
        self.bump();
        while self.peek().is_some() && !self.at(R_BRACE) {
            if self.at(DOT3) {
                self.rest_pattern()?;
            } else {
                self.start(PATTERN_PROP);
                if self.at(IDENT) && self.nth(1) != Some(COLON) {
                    self.binding_element()?;
                } else {
                    self.prop_key()?;
                    self.expect(COLON, ":")?;
                    self.binding_element()?;
                }
                self.finish();
            }
            if !self.eat(COMMA) {
                break;
            }
        }
        self.expect(R_BRACE, "}")?;
        self.finish();
        Ok(())
    }

    fn array_pattern(&mut self) -> PResult {
        self.start(ARRAY_PATTERN);
        self.bump();
        while self.peek().is_some() && !self.at(R_BRACK) {
            if self.eat(COMMA) {
                continue;
            }
            if self.at(DOT3) {
                self.rest_pattern()?;
            } else {
                self.binding_element()?;
            }
            if !self.at(R_BRACK) {
                self.expect(COMMA, ",")?;
            }
        }
        self.expect(R_BRACK, "]")?;
        self.finish();
        Ok(())
    }

    fn param_list(&mut self) -> PResult {
        self.start(PARAM_LIST);
        self.expect(L_PAREN, "(")?;
        while self.peek().is_some() && !self.at(R_PAREN) {
            if self.at(DOT3) {
                self.rest_pattern()?;
            } else {
                self.binding_element()?;
            }
            if !self.eat(COMMA) {
                break;
            }
        }
        self.expect(R_PAREN, ")")?;
        self.finish();
        Ok(())
    }

    // ---- expressions --------------------------------------------------

    fn expression(&mut self, no_in: bool) -> PResult {
        let checkpoint = self.checkpoint();
        self.assign_expr(no_in)?;
        if self.at(COMMA) {
            self.start_at(checkpoint, SEQUENCE_EXPR);
            while self.eat(COMMA) {
                self.assign_expr(no_in)?;
            }
            self.finish();
        }
        Ok(())
    }

    fn assign_expr(&mut self, no_in: bool) -> PResult {
        self.nested(|p| p.assign_expr_body(no_in))
    }

    fn assign_expr_body(&mut self, no_in: bool) -> PResult {
        if self.at_arrow() {
            return self.arrow_function(no_in);
        }
        if self.at_ident("yield") && (self.at_operator_after_yield() || self.starts_operand(1)) {
            self.start(PREFIX_EXPR);
            self.bump();
            if self.at_operator("*") {
                self.bump();
            }
            if !self.at_statement_end() && self.starts_operand(0) {
                self.assign_expr(no_in)?;
            }
            self.finish();
            return Ok(());
        }
        let checkpoint = self.checkpoint();
        self.conditional_expr(no_in)?;
        if self.at(EQ) || self.at(ASSIGN_OP) {
            self.start_at(checkpoint, ASSIGN_EXPR);
            self.bump();
            self.assign_expr(no_in)?;
            self.finish();
        }
        Ok(())
    }

    fn at_operator_after_yield(&self) -> bool {
        self.nth(1) == Some(OPERATOR) && self.nth_text(1) == "*"
    }

    /// Whether the `n`-th token can begin an operand on the current line.
    fn starts_operand(&self, n: usize) -> bool {
        let Some(kind) = self.nth(n) else {
            return false;
        };
        if n > 0 && !self.same_line(n) {
            return false;
        }
        matches!(
            kind,
            IDENT
                | NUMBER
                | STRING
                | REGEX
                | TEMPLATE_CHUNK
                | L_PAREN
                | L_BRACK
                | L_BRACE
                | THIS_KW
                | SUPER_KW
                | NEW_KW
                | NULL_KW
                | TRUE_KW
                | FALSE_KW
                | FUNCTION_KW
                | CLASS_KW
                | TYPEOF_KW
                | VOID_KW
                | DELETE_KW
                | UPDATE_OP
        ) || (kind == OPERATOR && matches!(self.nth_text(n), "!" | "~" | "+" | "-"))
    }

    fn at_arrow(&self) -> bool {
        if self.at(IDENT) && self.nth(1) == Some(FAT_ARROW) {
            return true;
        }
        let offset = usize::from(self.at_ident("async") && self.same_line(1));
        match self.nth(offset) {
            Some(IDENT) => offset == 1 && self.nth(2) == Some(FAT_ARROW),
            Some(L_PAREN) => self
                .matching_close(offset)
                .is_some_and(|close| self.nth(close + 1) == Some(FAT_ARROW)),
            _ => false,
        }
    }

    /// Index (in significant tokens) of the bracket closing the one at `open`.
    fn matching_close(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        let significant = self.tokens[self.pos..]
            .iter()
            .filter(|t| !t.kind.is_trivia())
            .enumerate()
            .skip(open);
        for (index, token) in significant {
            match token.kind {
                L_PAREN | L_BRACK | L_BRACE => depth += 1,
                R_PAREN | R_BRACK | R_BRACE => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(index);
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn arrow_function(&mut self, no_in: bool) -> PResult {
        self.start(ARROW_FUNCTION);
        if self.at_ident("async") && self.nth(1) != Some(FAT_ARROW) {
            self.bump();
        }
        if self.at(IDENT) {
            self.start(PARAM_LIST);
            self.name()?;
            self.finish();
        } else {
            self.param_list()?;
        }
        self.expect(FAT_ARROW, "=>")?;
        if self.at(L_BRACE) {
            self.block()?;
        } else {
            self.assign_expr(no_in)?;
        }
        self.finish();
        Ok(())
    }

    fn conditional_expr(&mut self, no_in: bool) -> PResult {
        let checkpoint = self.checkpoint();
        self.binary_expr(0, no_in)?;
        if self.at(QUESTION) {
            self.start_at(checkpoint, COND_EXPR);
            self.bump();
            self.assign_expr(false)?;
            self.expect(COLON, ":")?;
            self.assign_expr(no_in)?;
            self.finish();
        }
        Ok(())
    }

    fn binary_precedence(&self, no_in: bool) -> Option<u8> {
        let prec = match self.peek()? {
            IN_KW if no_in => return None,
            IN_KW | INSTANCEOF_KW => 8,
            OPERATOR => match self.nth_text(0) {
                "??" => 1,
                "||" => 2,
                "&&" => 3,
                "|" => 4,
                "^" => 5,
                "&" => 6,
                "==" | "!=" | "===" | "!==" => 7,
                "<" | ">" | "<=" | ">=" => 8,
                "<<" | ">>" | ">>>" => 9,
                "+" | "-" => 10,
                "*" | "/" | "%" => 11,
                "**" => 12,
                _ => return None,
            },
            _ => return None,
        };
        Some(prec)
    }

    fn binary_expr(&mut self, min_prec: u8, no_in: bool) -> PResult {
        let checkpoint = self.checkpoint();
        self.unary_expr()?;
        while let Some(prec) = self.binary_precedence(no_in) {
            if prec < min_prec {
                break;
            }
            let right_assoc = self.at_operator("**");
            self.start_at(checkpoint, BINARY_EXPR);
            self.bump();
            self.binary_expr(if right_assoc { prec } else { prec + 1 }, no_in)?;
            self.finish();
        }
        Ok(())
    }

    fn unary_expr(&mut self) -> PResult {
        self.nested(Self::unary_expr_body)
    }

    fn unary_expr_body(&mut self) -> PResult {
        let prefix = match self.peek() {
            Some(TYPEOF_KW | VOID_KW | DELETE_KW | UPDATE_OP) => true,
            Some(OPERATOR) => matches!(self.nth_text(0), "!" | "~" | "+" | "-"),
            Some(IDENT) => self.at_text("await") && self.starts_operand(1),
            _ => false,
        };
        if prefix {
            self.start(PREFIX_EXPR);
            self.bump();
            self.unary_expr()?;
            self.finish();
            return Ok(());
        }

        let checkpoint = self.checkpoint();
        self.lhs_expr()?;
        if self.at(UPDATE_OP) && !self.newline_before() {
            self.start_at(checkpoint, POSTFIX_EXPR);
            self.bump();
            self.finish();
        }
        Ok(())
    }

    /// Member accesses, calls and `new` expressions.
    fn lhs_expr(&mut self) -> PResult {
        let checkpoint = self.checkpoint();
        if self.at(NEW_KW) {
            self.new_expr()?;
        } else {
            self.primary_expr()?;
        }
        loop {
            match self.peek() {
                Some(DOT) => {
                    self.start_at(checkpoint, MEMBER_EXPR);
                    self.bump();
                    self.member_name()?;
                }
                Some(QUESTION_DOT) => match self.nth(1) {
                    Some(L_PAREN) => {
                        self.start_at(checkpoint, CALL_EXPR);
                        self.bump();
                        self.arg_list()?;
                    }
                    Some(L_BRACK) => {
                        self.start_at(checkpoint, INDEX_EXPR);
                        self.bump();
                        self.bump();
                        self.expression(false)?;
                        self.expect(R_BRACK, "]")?;
                    }
                    _ => {
                        self.start_at(checkpoint, MEMBER_EXPR);
                        self.bump();
                        self.member_name()?;
                    }
                },
                Some(L_BRACK) => {
                    self.start_at(checkpoint, INDEX_EXPR);
                    self.bump();
                    self.expression(false)?;
                    self.expect(R_BRACK, "]")?;
                }
                Some(L_PAREN) => {
                    self.start_at(checkpoint, CALL_EXPR);
                    self.arg_list()?;
                }
                Some(TEMPLATE_CHUNK) if self.nth_text(0).starts_with('`') => {
                    self.start_at(checkpoint, TAGGED_TEMPLATE);
                    self.template()?;
                }
                _ => return Ok(()),
            }
            self.finish();
        }
    }

    fn member_name(&mut self) -> PResult {
        match self.peek() {
            Some(IDENT) => {
                self.bump();
                Ok(())
            }
            Some(kind) if kind.is_keyword() => {
                self.bump();
                Ok(())
            }
            _ => Err(self.error(format!("expected property name, found `{}`", self.nth_text(0)))),
        }
    }

    fn new_expr(&mut self) -> PResult {
        self.start(NEW_EXPR);
        self.bump();
        if self.eat(DOT) {
            self.member_name()?;
            self.finish();
            return Ok(());
        }
        let callee = self.checkpoint();
        if self.at(NEW_KW) {
            self.nested(Self::new_expr)?;
        } else {
            self.primary_expr()?;
        }
        loop {
            match self.peek() {
                Some(DOT) => {
                    self.start_at(callee, MEMBER_EXPR);
                    self.bump();
                    self.member_name()?;
                }
                Some(L_BRACK) => {
                    self.start_at(callee, INDEX_EXPR);
                    self.bump();
                    self.expression(false)?;
                    self.expect(R_BRACK, "]")?;
                }
                _ => break,
            }
            self.finish();
        }
        if self.at(L_PAREN) {
            self.arg_list()?;
        }
        self.finish();
        Ok(())
    }

    fn arg_list(&mut self) -> PResult {
        self.start(ARG_LIST);
        self.expect(L_PAREN, "(")?;
        while self.peek().is_some() && !self.at(R_PAREN) {
            if self.at(DOT3) {
                self.spread()?;
            } else {
                self.assign_expr(false)?;
            }
            if !self.eat(COMMA) {
                break;
            }
        }
        self.expect(R_PAREN, ")")?;
        self.finish();
        Ok(())
    }

    fn spread(&mut self) -> PResult {
        self.start(SPREAD_ELEMENT);
        self.bump();
        self.assign_expr(false)?;
        self.finish();
        Ok(())
    }

    fn primary_expr(&mut self) -> PResult {
        let Some(kind) = self.peek() else {
            return Err(self.unexpected());
        };
        match kind {
            IDENT if self.at_async_function() => {
                self.start(FUNCTION_EXPR);
                self.function_rest(false)?;
                self.finish();
            }
            IDENT => {
                self.start(NAME_REF);
                self.bump();
                self.finish();
            }
            THIS_KW => self.leaf(THIS_EXPR),
            SUPER_KW => self.leaf(SUPER_EXPR),
            NUMBER | STRING | REGEX | NULL_KW | TRUE_KW | FALSE_KW | IMPORT_KW => {
                self.leaf(LITERAL)
            }
            TEMPLATE_CHUNK => self.template()?,
            L_PAREN => {
                self.start(PAREN_EXPR);
                self.bump();
                self.expression(false)?;
                self.expect(R_PAREN, ")")?;
                self.finish();
            }
            L_BRACK => self.array_expr()?,
            L_BRACE => self.object_expr()?,
            FUNCTION_KW => {
                self.start(FUNCTION_EXPR);
                self.function_rest(false)?;
                self.finish();
            }
            CLASS_KW => {
                self.start(CLASS_EXPR);
                self.class_rest(false)?;
                self.finish();
            }
            _ => return Err(self.unexpected()),
        }
        Ok(())
    }

    fn leaf(&mut self, kind: SyntaxKind) {
        self.start(kind);
        self.bump();
        self.finish();
    }

    fn template(&mut self) -> PResult {
        self.start(TEMPLATE);
        loop {
            if !self.at(TEMPLATE_CHUNK) {
                return Err(self.unexpected());
            }
            let open = self.nth_text(0).ends_with("${");
            self.bump();
            if !open {
                break;
            }
            self.expression(false)?;
        }
        self.finish();
        Ok(())
    }

    fn array_expr(&mut self) -> PResult {
        self.start(ARRAY_EXPR);
        self.bump();
        while self.peek().is_some() && !self.at(R_BRACK) {
            if self.eat(COMMA) {
                continue;
            }
            if self.at(DOT3) {
                self.spread()?;
            } else {
                self.assign_expr(false)?;
            }
            if !self.at(R_BRACK) {
                self.expect(COMMA, ",")?;
            }
        }
        self.expect(R_BRACK, "]")?;
        self.finish();
        Ok(())
    }

    fn object_expr(&mut self) -> PResult {
        self.start(OBJECT_EXPR);
        self.bump();
        while self.peek().is_some() && !self.at(R_BRACE) {
            if self.at(DOT3) {
                self.spread()?;
            } else {
                self.property()?;
            }
            if !self.eat(COMMA) {
                break;
            }
        }
        self.expect(R_BRACE, "}")?;
        self.finish();
        Ok(())
    }

    fn property(&mut self) -> PResult {
        let checkpoint = self.checkpoint();
        let modified = self.member_modifiers();
        if !modified && self.at(IDENT) && matches!(self.nth(1), Some(COMMA | R_BRACE | EQ)) {
            self.start_at(checkpoint, PROPERTY);
            self.start(NAME_REF);
            self.bump();
            self.finish();
            if self.eat(EQ) {
                self.assign_expr(false)?;
            }
            self.finish();
            return Ok(());
        }
        self.prop_key()?;
        if self.at(L_PAREN) {
            self.start_at(checkpoint, METHOD);
            self.param_list()?;
            self.block()?;
        } else {
            self.start_at(checkpoint, PROPERTY);
            self.expect(COLON, ":")?;
            self.assign_expr(false)?;
        }
        self.finish();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::syntax::{SyntaxTree, debug_tree};

    fn tree(source: &str) -> String {
        debug_tree(SyntaxTree::parse(source).unwrap().root())
            .trim_end()
            .to_string()
    }

    #[test]
    fn var_declaration_shape() {
        insta::assert_snapshot!(tree("var a = 1, b;"), @r#"
        SOURCE_FILE
          VAR_DECL
            VAR_KW "var"
            DECLARATOR
              NAME
                IDENT "a"
              EQ "="
              LITERAL
                NUMBER "1"
            COMMA ","
            DECLARATOR
              NAME
                IDENT "b"
            SEMICOLON ";"
        "#);
    }

    #[test]
    fn member_property_is_a_plain_token() {
        insta::assert_snapshot!(tree("a.b = c[d];"), @r#"
        SOURCE_FILE
          EXPR_STMT
            ASSIGN_EXPR
              MEMBER_EXPR
                NAME_REF
                  IDENT "a"
                DOT "."
                IDENT "b"
              EQ "="
              INDEX_EXPR
                NAME_REF
                  IDENT "c"
                L_BRACK "["
                NAME_REF
                  IDENT "d"
                R_BRACK "]"
            SEMICOLON ";"
        "#);
    }

    #[test]
    fn for_in_header_keeps_declaration() {
        insta::assert_snapshot!(tree("for (var k in o) f(k);"), @r#"
        SOURCE_FILE
          FOR_IN_STMT
            FOR_KW "for"
            L_PAREN "("
            VAR_DECL
              VAR_KW "var"
              DECLARATOR
                NAME
                  IDENT "k"
            IN_KW "in"
            NAME_REF
              IDENT "o"
            R_PAREN ")"
            EXPR_STMT
              CALL_EXPR
                NAME_REF
                  IDENT "f"
                ARG_LIST
                  L_PAREN "("
                  NAME_REF
                    IDENT "k"
                  R_PAREN ")"
              SEMICOLON ";"
        "#);
    }

    #[test]
    fn binary_operators_respect_precedence() {
        insta::assert_snapshot!(tree("a + b * c;"), @r#"
        SOURCE_FILE
          EXPR_STMT
            BINARY_EXPR
              NAME_REF
                IDENT "a"
              OPERATOR "+"
              BINARY_EXPR
                NAME_REF
                  IDENT "b"
                OPERATOR "*"
                NAME_REF
                  IDENT "c"
            SEMICOLON ";"
        "#);
    }

    #[test]
    fn leading_and_trailing_comments_belong_to_statement() {
        let source = "a();\n// about b\nb(); // after b\nc();";
        let tree = SyntaxTree::parse(source).unwrap();
        let statements: Vec<String> = tree
            .root()
            .children()
            .map(|node| node.to_string())
            .collect();
        assert_eq!(statements, vec!["a();", "// about b\nb(); // after b", "c();"]);
    }

    #[test]
    fn arrow_functions_are_detected_by_lookahead() {
        let source = "f((a, b) => a + b, (c), async x => x, async (y) => y);";
        let tree = SyntaxTree::parse(source).unwrap();
        let arrows = tree
            .root()
            .descendants()
            .filter(|node| node.kind() == crate::syntax::SyntaxKind::ARROW_FUNCTION)
            .count();
        assert_eq!(arrows, 3);
    }

    #[test]
    fn asi_ends_statements_at_line_breaks() {
        let tree = SyntaxTree::parse("var a = 1\nvar b = a\nreturn\n").unwrap();
        assert_eq!(tree.root().children().count(), 3);
    }

    #[test]
    fn deep_nesting_is_an_error_not_a_crash() {
        let depth = 1000;
        let source = format!("x = {}1{};", "(".repeat(depth), ")".repeat(depth));
        let err = SyntaxTree::parse(&source).unwrap_err();
        assert_eq!(err.message, "nesting too deep");

        let blocks = format!("{}{}", "{".repeat(depth), "}".repeat(depth));
        assert!(SyntaxTree::parse(&blocks).is_err());
        let negations = format!("x = {}y;", "!".repeat(depth));
        assert!(SyntaxTree::parse(&negations).is_err());

        let shallow = format!("x = {}1{};", "(".repeat(40), ")".repeat(40));
        assert!(SyntaxTree::parse(&shallow).is_ok());
    }

    #[test]
    fn regex_after_statement_heads_and_blocks() {
        for source in [
            "if (a) /x/.test(s) && g();",
            "function f() {} /x/.test(s);",
            "while (x) /y/.test(z);",
            "{}\n/re/.test(s);",
            "function f() { i = 0; }\n/^\\s+/.test(s) && g();",
        ] {
            let tree = SyntaxTree::parse(source).unwrap_or_else(|err| panic!("{source}: {err}"));
            assert_eq!(tree.text(), source);
        }
    }

    #[test]
    fn escaped_identifiers_parse_losslessly() {
        let source = "var \\u0061b = 1, \\u{63} = \\u0061b;";
        assert_eq!(SyntaxTree::parse(source).unwrap().text(), source);
    }

    #[test]
    fn missing_semicolon_on_one_line_is_an_error() {
        let err = SyntaxTree::parse("a b").unwrap_err();
        assert!(err.message.contains("expected `;`"), "{}", err.message);
    }
}
