//! Recursive-descent parser over the token stream produced by `lexer`.
//!
//! Newlines play the role of Go's automatic semicolons inside struct bodies
//! and type groups. Outside `type` declarations nothing is interpreted: the
//! parser skips to the end of the declaration by counting delimiters.
use super::lexer::{Lexed, Token};
use super::{ChanDir, Comment, FieldDecl, Position, SourceUnit, SyntaxError, TypeDecl, TypeExpr};

pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Lexed>,
    cursor: usize,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str, tokens: Vec<Lexed>) -> Self {
        Self { source, tokens, cursor: 0 }
    }

    // ------------------------------ Top level ------------------------------ //

    pub fn source_unit(mut self) -> Result<SourceUnit, SyntaxError> {
        let mut package = None;
        let mut decls = Vec::new();
        loop {
            let doc = self.leading_comments();
            match self.peek() {
                None => break,
                Some(Token::Package) => {
                    self.bump();
                    package = Some(self.ident("package name")?.0);
                }
                Some(Token::Type) => {
                    self.bump();
                    self.type_decls(doc, &mut decls)?;
                }
                Some(_) => self.skip_declaration(),
            }
        }
        let package = package.ok_or(SyntaxError::MissingPackage)?;
        Ok(SourceUnit { package, decls })
    }

    fn type_decls(&mut self, doc: Vec<Comment>, decls: &mut Vec<TypeDecl>) -> Result<(), SyntaxError> {
        if !self.eat(&Token::LParen) {
            decls.push(self.type_spec(doc)?);
            self.trailing_comment();
            return self.end_of_item("end of type declaration");
        }
        loop {
            let doc = self.leading_comments();
            match self.peek() {
                Some(Token::RParen) => {
                    self.bump();
                    return Ok(());
                }
                None => return Err(SyntaxError::UnexpectedEof { context: "type group" }),
                Some(_) => {
                    decls.push(self.type_spec(doc)?);
                    self.trailing_comment();
                    self.end_of_item("end of type declaration")?;
                }
            }
        }
    }

    fn type_spec(&mut self, doc: Vec<Comment>) -> Result<TypeDecl, SyntaxError> {
        let (name, position) = self.ident("type name")?;
        let type_params = if self.peek() == Some(&Token::LBracket) && self.looks_like_type_params() {
            Some(self.balanced()?)
        } else {
            None
        };
        let alias = self.eat(&Token::Assign);
        let ty = self.type_expr()?;
        Ok(TypeDecl { name, type_params, alias, ty, doc, position })
    }

    /// `[T any]` vs `[N]int`: a parameter list has something after the first
    /// identifier other than the closing bracket.
    fn looks_like_type_params(&self) -> bool {
        matches!(self.peek_at(1), Some(Token::Ident(_)))
            && !matches!(self.peek_at(2), Some(Token::RBracket) | None)
    }

    fn skip_declaration(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match token {
                Token::LBrace | Token::LParen | Token::LBracket => depth += 1,
                Token::RBrace | Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
                Token::Newline | Token::Semi if depth == 0 => {
                    self.bump();
                    return;
                }
                _ => {}
            }
            self.bump();
        }
    }

    // -------------------------------- Structs ------------------------------ //

    fn struct_body(&mut self) -> Result<Vec<FieldDecl>, SyntaxError> {
        self.expect(Token::LBrace, "`{`")?;
        let mut fields = Vec::new();
        loop {
            let doc = self.leading_comments();
            match self.peek() {
                Some(Token::RBrace) => {
                    self.bump();
                    return Ok(fields);
                }
                None => return Err(SyntaxError::UnexpectedEof { context: "struct body" }),
                Some(_) => {
                    fields.push(self.field_decl(doc)?);
                    self.trailing_comment();
                    self.end_of_item("newline after struct field")?;
                }
            }
        }
    }

    fn field_decl(&mut self, doc: Vec<Comment>) -> Result<FieldDecl, SyntaxError> {
        let position = self.position();
        let embedded = match (self.peek(), self.peek_at(1)) {
            (Some(Token::Star), _) => true,
            (Some(Token::Ident(_)), next) => matches!(
                next,
                None | Some(
                    Token::Dot
                        | Token::Newline
                        | Token::Semi
                        | Token::RBrace
                        | Token::Str(_)
                        | Token::RawStr(_)
                        | Token::LineComment(_)
                        | Token::BlockComment(_)
                )
            ),
            _ => return Err(self.unexpected("field name")),
        };

        let (names, ty) = if embedded {
            let ty = self.type_expr()?;
            let name = embedded_name(&ty).ok_or_else(|| SyntaxError::Unexpected {
                expected: "embedded type name",
                found: ty.to_string(),
                position,
            })?;
            (vec![name], ty)
        } else {
            let mut names = vec![self.ident("field name")?.0];
            while self.eat(&Token::Comma) {
                names.push(self.ident("field name")?.0);
            }
            (names, self.type_expr()?)
        };

        let tag = match self.peek() {
            Some(Token::Str(tag) | Token::RawStr(tag)) => {
                let tag = tag.clone();
                self.bump();
                Some(tag)
            }
            _ => None,
        };

        Ok(FieldDecl { names, embedded, ty, tag, doc, position })
    }

    // --------------------------------- Types ------------------------------- //

    fn type_expr(&mut self) -> Result<TypeExpr, SyntaxError> {
        let Some(lexed) = self.tokens.get(self.cursor).cloned() else {
            return Err(SyntaxError::UnexpectedEof { context: "type" });
        };
        match lexed.token {
            Token::Ident(name) => {
                self.bump();
                let base = if self.eat(&Token::Dot) {
                    TypeExpr::Qualified { package: name, name: self.ident("type name")?.0 }
                } else {
                    TypeExpr::Named(name)
                };
                if self.peek() == Some(&Token::LBracket) {
                    let args = self.balanced()?;
                    return Ok(TypeExpr::Instantiated { base: Box::new(base), args });
                }
                Ok(base)
            }
            Token::Star => {
                self.bump();
                Ok(TypeExpr::Pointer(Box::new(self.type_expr()?)))
            }
            Token::LBracket => {
                self.bump();
                if self.eat(&Token::RBracket) {
                    return Ok(TypeExpr::Slice(Box::new(self.type_expr()?)));
                }
                let start = self.current_start();
                let mut depth = 0usize;
                loop {
                    match self.peek() {
                        None => return Err(SyntaxError::UnexpectedEof { context: "array length" }),
                        Some(Token::RBracket) if depth == 0 => break,
                        Some(Token::LBracket | Token::LParen) => depth += 1,
                        Some(Token::RBracket | Token::RParen) => depth = depth.saturating_sub(1),
                        _ => {}
                    }
                    self.bump();
                }
                let len = self.source[start..self.current_start()].trim().to_string();
                self.bump();
                Ok(TypeExpr::Array { len, elem: Box::new(self.type_expr()?) })
            }
            Token::Map => {
                self.bump();
                self.expect(Token::LBracket, "`[`")?;
                let key = self.type_expr()?;
                self.expect(Token::RBracket, "`]`")?;
                let value = self.type_expr()?;
                Ok(TypeExpr::Map { key: Box::new(key), value: Box::new(value) })
            }
            Token::Chan => {
                self.bump();
                let dir = if self.eat(&Token::Arrow) { ChanDir::Send } else { ChanDir::Both };
                Ok(TypeExpr::Chan { dir, elem: Box::new(self.type_expr()?) })
            }
            Token::Arrow => {
                self.bump();
                self.expect(Token::Chan, "`chan`")?;
                Ok(TypeExpr::Chan { dir: ChanDir::Recv, elem: Box::new(self.type_expr()?) })
            }
            Token::Func => {
                self.bump();
                if self.peek() != Some(&Token::LParen) {
                    return Err(self.unexpected("`(`"));
                }
                self.balanced()?;
                match self.peek() {
                    Some(Token::LParen) => {
                        self.balanced()?;
                    }
                    Some(
                        Token::Ident(_)
                        | Token::Star
                        | Token::LBracket
                        | Token::Map
                        | Token::Chan
                        | Token::Func
                        | Token::Struct
                        | Token::Interface
                        | Token::Arrow,
                    ) => {
                        self.type_expr()?;
                    }
                    _ => {}
                }
                Ok(TypeExpr::Func(self.text_since(lexed.start)))
            }
            Token::Interface => {
                self.bump();
                if self.peek() != Some(&Token::LBrace) {
                    return Err(self.unexpected("`{`"));
                }
                self.balanced()?;
                Ok(TypeExpr::Interface(self.text_since(lexed.start)))
            }
            Token::Struct => {
                self.bump();
                Ok(TypeExpr::Struct(self.struct_body()?))
            }
            Token::LParen => {
                self.bump();
                let inner = self.type_expr()?;
                self.expect(Token::RParen, "`)`")?;
                Ok(inner)
            }
            _ => Err(self.unexpected("type")),
        }
    }

    /// Consumes one delimited group starting at the current opener and returns
    /// its source text, delimiters included.
    fn balanced(&mut self) -> Result<String, SyntaxError> {
        let start = self.current_start();
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match token {
                Token::LBrace | Token::LParen | Token::LBracket => depth += 1,
                Token::RBrace | Token::RParen | Token::RBracket => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.bump();
                        return Ok(self.text_since(start));
                    }
                }
                _ => {}
            }
            self.bump();
        }
        Err(SyntaxError::UnexpectedEof { context: "delimited group" })
    }

    // -------------------------------- Comments ----------------------------- //

    /// Collects the comment group directly above the next significant token.
    /// A blank line or `;` resets the group; a comment sharing its line with the
    /// previous significant token belongs to that token, not to what follows.
    fn leading_comments(&mut self) -> Vec<Comment> {
        let mut group = Vec::new();
        let mut newlines = 0;
        let mut same_line = self.previous_significant_line();
        while let Some(lexed) = self.tokens.get(self.cursor) {
            match &lexed.token {
                Token::Newline => {
                    newlines += 1;
                    same_line = None;
                    if newlines >= 2 {
                        group.clear();
                    }
                }
                Token::Semi => {
                    newlines = 0;
                    group.clear();
                }
                Token::LineComment(text) | Token::BlockComment(text) => {
                    newlines = 0;
                    if same_line != Some(lexed.position.line) {
                        group.push(Comment { text: text.clone(), position: lexed.position });
                    }
                }
                _ => break,
            }
            self.cursor += 1;
        }
        group
    }

    fn trailing_comment(&mut self) {
        let Some(line) = self.previous_significant_line() else { return };
        if let Some(lexed) = self.tokens.get(self.cursor) {
            if matches!(lexed.token, Token::LineComment(_) | Token::BlockComment(_))
                && lexed.position.line == line
            {
                self.cursor += 1;
            }
        }
    }

    fn previous_significant_line(&self) -> Option<u32> {
        let prev = self.tokens.get(self.cursor.checked_sub(1)?)?;
        (!prev.token.is_trivia()).then_some(prev.position.line)
    }

    fn end_of_item(&self, expected: &'static str) -> Result<(), SyntaxError> {
        match self.peek() {
            None
            | Some(
                Token::Newline
                | Token::Semi
                | Token::RBrace
                | Token::RParen
                | Token::LineComment(_)
                | Token::BlockComment(_),
            ) => Ok(()),
            Some(_) => Err(self.unexpected(expected)),
        }
    }

    // -------------------------------- Cursor ------------------------------- //

    fn peek(&self) -> Option<&Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.cursor + n).map(|l| &l.token)
    }

    fn bump(&mut self) {
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.bump();
            return true;
        }
        false
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<(), SyntaxError> {
        if self.eat(&token) { Ok(()) } else { Err(self.unexpected(expected)) }
    }

    fn ident(&mut self, expected: &'static str) -> Result<(String, Position), SyntaxError> {
        match self.tokens.get(self.cursor) {
            Some(Lexed { token: Token::Ident(name), position, .. }) => {
                let out = (name.clone(), *position);
                self.bump();
                Ok(out)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn position(&self) -> Position {
        self.tokens.get(self.cursor).map(|l| l.position).unwrap_or_default()
    }

    fn current_start(&self) -> usize {
        self.tokens.get(self.cursor).map(|l| l.start).unwrap_or(self.source.len())
    }

    fn text_since(&self, start: usize) -> String {
        let end = self
            .cursor
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|l| l.end)
            .unwrap_or(start);
        self.source[start..end].to_string()
    }

    fn unexpected(&self, expected: &'static str) -> SyntaxError {
        match self.tokens.get(self.cursor) {
            Some(lexed) => SyntaxError::Unexpected {
                expected,
                found: self.source[lexed.start..lexed.end].escape_debug().to_string(),
                position: lexed.position,
            },
            None => SyntaxError::UnexpectedEof { context: expected },
        }
    }
}

fn embedded_name(ty: &TypeExpr) -> Option<String> {
    match ty {
        TypeExpr::Named(name) | TypeExpr::Qualified { name, .. } => Some(name.clone()),
        TypeExpr::Pointer(inner) => embedded_name(inner),
        TypeExpr::Instantiated { base, .. } => embedded_name(base),
        _ => None,
    }
}
