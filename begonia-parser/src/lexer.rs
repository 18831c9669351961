use begonia_source::{CompileError, CompileResult, Location, Source};
use logos::Logos;
use std::{collections::HashMap, fmt, rc::Rc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Only generated once the source is exhausted. Repeats forever.
    Eof,

    // separators
    Semicolon,
    Comma,
    Dot,
    Colon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LCurly,
    RCurly,

    // operators
    Assign,
    Sub,
    Add,
    Mul,
    Div,
    Mod,
    Xor,
    BitAnd,
    BitOr,
    And,
    Or,
    Not,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Neq,

    // keywords
    If,
    Elif,
    Else,
    While,
    For,
    False,
    True,
    Var,
    Func,
    Return,
    Nil,
    Double,
    String,

    // literals and identifiers
    Number,
    Str,
    Identifier,
}

impl TokenKind {
    /// Returns `true` if an expression can start with this token.
    pub fn starts_expr(&self) -> bool {
        matches!(
            self,
            TokenKind::LParen
                | TokenKind::Not
                | TokenKind::Nil
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Number
                | TokenKind::Str
                | TokenKind::Identifier
        )
    }

    /// Returns `true` if the token can name a type in a declaration.
    pub fn is_type_name(&self) -> bool {
        matches!(
            self,
            TokenKind::Identifier | TokenKind::Double | TokenKind::String
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Eof => "EOF",
            TokenKind::Semicolon => ";",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Colon => ":",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LCurly => "{",
            TokenKind::RCurly => "}",
            TokenKind::Assign => "=",
            TokenKind::Sub => "-",
            TokenKind::Add => "+",
            TokenKind::Mul => "*",
            TokenKind::Div => "/",
            TokenKind::Mod => "%",
            TokenKind::Xor => "^",
            TokenKind::BitAnd => "&",
            TokenKind::BitOr => "|",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
            TokenKind::Not => "!",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::Eq => "==",
            TokenKind::Neq => "!=",
            TokenKind::If => "if",
            TokenKind::Elif => "elif",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::False => "false",
            TokenKind::True => "true",
            TokenKind::Var => "var",
            TokenKind::Func => "func",
            TokenKind::Return => "return",
            TokenKind::Nil => "nil",
            TokenKind::Double => "double",
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::Str => "string literal",
            TokenKind::Identifier => "identifier",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-based line the token starts on.
    pub line: usize,
    /// Source text of the token. For string literals this excludes the quotes.
    pub lexeme: String,
    pub source_file: Rc<str>,
}

impl Token {
    pub fn location(&self) -> Location {
        Location::new(&*self.source_file, self.line)
    }
}

/// Classification of a raw byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Reject,
    Accept,
    Separator,
}

/// Classes a word (maximal run of accepted characters) can belong to once keywords are ruled out.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
enum WordClass {
    #[regex("[0-9]+")]
    Number,
    #[regex("[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,
    #[error]
    Error,
}

impl WordClass {
    /// Classifies the whole `word`. Returns `None` if no class spans every character.
    fn classify(word: &str) -> Option<Self> {
        let mut lex = WordClass::lexer(word);
        match lex.next() {
            Some(WordClass::Error) | None => None,
            Some(class) if lex.span() == (0..word.len()) => Some(class),
            Some(_) => None,
        }
    }
}

fn char_table() -> [CharClass; 256] {
    let mut table = [CharClass::Reject; 256];
    for class in table.iter_mut().take(127).skip(33) {
        *class = CharClass::Accept;
    }
    for &(start, end) in &[(32u8, 47u8), (58, 64), (91, 96), (123, 126)] {
        for c in start..=end {
            table[c as usize] = CharClass::Separator;
        }
    }
    for &c in &[b'\t', b'\r', b'\n'] {
        table[c as usize] = CharClass::Separator;
    }
    table[b'_' as usize] = CharClass::Accept;
    table
}

fn keyword_table() -> HashMap<&'static str, TokenKind> {
    vec![
        ("if", TokenKind::If),
        ("elif", TokenKind::Elif),
        ("else", TokenKind::Else),
        ("for", TokenKind::For),
        ("while", TokenKind::While),
        ("func", TokenKind::Func),
        ("var", TokenKind::Var),
        ("false", TokenKind::False),
        ("true", TokenKind::True),
        ("or", TokenKind::Or),
        ("and", TokenKind::And),
        ("return", TokenKind::Return),
        ("nil", TokenKind::Nil),
        ("double", TokenKind::Double),
        ("string", TokenKind::String),
    ]
    .into_iter()
    .collect()
}

/// On demand tokenizer with an unbounded lookahead buffer.
///
/// Every scanned token is kept in `tokens`, so peeking with [`Lexer::look_ahead`] never rescans
/// and never changes what [`Lexer::next_token`] returns.
pub struct Lexer<'a> {
    content: &'a str,
    file: Rc<str>,
    /// Byte offset of the next unscanned character.
    pos: usize,
    line: usize,
    char_table: [CharClass; 256],
    keywords: HashMap<&'static str, TokenKind>,
    tokens: Vec<Token>,
    /// Index in `tokens` of the next token to consume.
    index: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a Source) -> Self {
        Self {
            content: &source.content,
            file: source.name.as_str().into(),
            pos: 0,
            line: 1,
            char_table: char_table(),
            keywords: keyword_table(),
            tokens: Vec::new(),
            index: 0,
        }
    }

    /// Consumes and returns the next token.
    /// Once the end of input is reached the same `Eof` token is returned on every call.
    pub fn next_token(&mut self) -> CompileResult<Token> {
        let token = self.look_ahead(0)?;
        if token.kind != TokenKind::Eof {
            self.index += 1;
        }
        Ok(token)
    }

    /// Returns the token `step` positions ahead without consuming anything.
    /// `look_ahead(0)` is the token the next call to [`Lexer::next_token`] returns.
    pub fn look_ahead(&mut self, step: usize) -> CompileResult<Token> {
        while self.tokens.len() <= self.index + step {
            if let Some(last) = self.tokens.last() {
                if last.kind == TokenKind::Eof {
                    return Ok(last.clone());
                }
            }
            let token = self.scan()?;
            tracing::trace!(kind = ?token.kind, line = token.line, lexeme = %token.lexeme, "scanned token");
            self.tokens.push(token);
        }
        Ok(self.tokens[self.index + step].clone())
    }

    /// Scans the remaining input, including the trailing `Eof`.
    pub fn tokenize(mut self) -> CompileResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                return Ok(tokens);
            }
        }
    }
}

/// Scanning
impl<'a> Lexer<'a> {
    fn peek_byte(&self) -> Option<u8> {
        self.content.as_bytes().get(self.pos).copied()
    }

    fn peek_byte_at(&self, offset: usize) -> Option<u8> {
        self.content.as_bytes().get(self.pos + offset).copied()
    }

    fn class_of(&self, c: u8) -> CharClass {
        self.char_table[c as usize]
    }

    fn token(&self, kind: TokenKind, lexeme: impl ToString) -> Token {
        Token {
            kind,
            line: self.line,
            lexeme: lexeme.to_string(),
            source_file: self.file.clone(),
        }
    }

    fn error(&self, message: impl ToString) -> CompileError {
        CompileError::Lexical {
            location: Location::new(&*self.file, self.line),
            message: message.to_string(),
        }
    }

    /// Skips whitespace and `//` comments. Returns `false` at end of input.
    fn skip_whitespace_and_comments(&mut self) -> bool {
        while let Some(c) = self.peek_byte() {
            match c {
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'\n' => {
                    self.pos += 1;
                    self.line += 1;
                }
                b'/' if self.peek_byte_at(1) == Some(b'/') => {
                    while let Some(c) = self.peek_byte() {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => return true,
            }
        }
        false
    }

    fn scan(&mut self) -> CompileResult<Token> {
        if !self.skip_whitespace_and_comments() {
            return Ok(self.token(TokenKind::Eof, "EOF"));
        }

        if let Some(token) = self.scan_quote()? {
            return Ok(token);
        }

        let c = self.peek_byte().unwrap_or(b' ');
        match self.class_of(c) {
            CharClass::Separator => self.scan_separator(),
            CharClass::Reject => Err(self.error(format!(
                "Can not accept '{}'",
                self.content[self.pos..].chars().next().unwrap_or(' ')
            ))),
            CharClass::Accept => {
                let word = self.scan_word();
                self.classify_word(word)
            }
        }
    }

    /// Scans a `'` or `"` delimited string. Returns `None` if the next character is not a quote.
    fn scan_quote(&mut self) -> CompileResult<Option<Token>> {
        let quote = match self.peek_byte() {
            Some(c @ b'\'') | Some(c @ b'"') => c,
            _ => return Ok(None),
        };
        let start_line = self.line;
        let start = self.pos + 1;
        let mut end = start;
        loop {
            match self.content.as_bytes().get(end) {
                Some(&c) if c == quote => break,
                Some(b'\n') => {
                    self.line += 1;
                    end += 1;
                }
                Some(_) => end += 1,
                None => {
                    self.line = start_line;
                    return Err(self.error("miss quotation token"));
                }
            }
        }
        self.pos = end + 1;
        let mut token = self.token(TokenKind::Str, &self.content[start..end]);
        token.line = start_line;
        Ok(Some(token))
    }

    fn scan_separator(&mut self) -> CompileResult<Token> {
        let c = self.peek_byte().unwrap_or(b' ');
        self.pos += 1;
        let next = self.peek_byte();

        // Two character operators.
        let compound = match (c, next) {
            (b'=', Some(b'=')) => Some((TokenKind::Eq, "==")),
            (b'!', Some(b'=')) => Some((TokenKind::Neq, "!=")),
            (b'<', Some(b'=')) => Some((TokenKind::Le, "<=")),
            (b'>', Some(b'=')) => Some((TokenKind::Ge, ">=")),
            (b'&', Some(b'&')) => Some((TokenKind::And, "&&")),
            (b'|', Some(b'|')) => Some((TokenKind::Or, "||")),
            _ => None,
        };
        if let Some((kind, lexeme)) = compound {
            self.pos += 1;
            return Ok(self.token(kind, lexeme));
        }

        let kind = match c {
            b'=' => TokenKind::Assign,
            b'+' => TokenKind::Add,
            b'-' => TokenKind::Sub,
            b'*' => TokenKind::Mul,
            b'/' => TokenKind::Div,
            b'%' => TokenKind::Mod,
            b'^' => TokenKind::Xor,
            b'!' => TokenKind::Not,
            b'|' => TokenKind::BitOr,
            b'&' => TokenKind::BitAnd,
            b'<' => TokenKind::Lt,
            b'>' => TokenKind::Gt,
            b';' => TokenKind::Semicolon,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Dot,
            b':' => TokenKind::Colon,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b'{' => TokenKind::LCurly,
            b'}' => TokenKind::RCurly,
            _ => return Err(self.error(format!("Can not accept '{}'", c as char))),
        };
        Ok(self.token(kind, c as char))
    }

    /// Consumes a maximal run of accepted characters.
    fn scan_word(&mut self) -> &'a str {
        let content = self.content;
        let start = self.pos;
        while let Some(c) = self.peek_byte() {
            if self.class_of(c) != CharClass::Accept {
                break;
            }
            self.pos += 1;
        }
        &content[start..self.pos]
    }

    /// Keyword, then number, then identifier.
    fn classify_word(&self, word: &str) -> CompileResult<Token> {
        if let Some(&kind) = self.keywords.get(word) {
            return Ok(self.token(kind, word));
        }
        match WordClass::classify(word) {
            Some(WordClass::Number) => Ok(self.token(TokenKind::Number, word)),
            Some(WordClass::Identifier) => Ok(self.token(TokenKind::Identifier, word)),
            _ => Err(self.error(format!("Can not parse token: {}", word))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let source = source.into();
        Lexer::new(&source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("= == ! != < <= > >= & && | || + - * / % ^"),
            vec![
                TokenKind::Assign,
                TokenKind::Eq,
                TokenKind::Not,
                TokenKind::Neq,
                TokenKind::Lt,
                TokenKind::Le,
                TokenKind::Gt,
                TokenKind::Ge,
                TokenKind::BitAnd,
                TokenKind::And,
                TokenKind::BitOr,
                TokenKind::Or,
                TokenKind::Add,
                TokenKind::Sub,
                TokenKind::Mul,
                TokenKind::Div,
                TokenKind::Mod,
                TokenKind::Xor,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_compound_operators_without_spaces() {
        assert_eq!(
            kinds("a<=b==c"),
            vec![
                TokenKind::Identifier,
                TokenKind::Le,
                TokenKind::Identifier,
                TokenKind::Eq,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_and_words() {
        assert_eq!(
            kinds("if elif else while for func var return nil true false double string and or"),
            vec![
                TokenKind::If,
                TokenKind::Elif,
                TokenKind::Else,
                TokenKind::While,
                TokenKind::For,
                TokenKind::Func,
                TokenKind::Var,
                TokenKind::Return,
                TokenKind::Nil,
                TokenKind::True,
                TokenKind::False,
                TokenKind::Double,
                TokenKind::String,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("iffy _x1 42"),
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Number,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_literals() {
        let source = "'single' \"double\"".into();
        let tokens = Lexer::new(&source).tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].lexeme, "single");
        assert_eq!(tokens[1].lexeme, "double");
    }

    #[test]
    fn test_line_numbers_and_comments() {
        let source = "var a = 1; // first\n\n// skipped\nvar b = 2;".into();
        let tokens = Lexer::new(&source).tokenize().unwrap();
        assert_eq!(tokens[0].line, 1);
        let b = tokens.iter().find(|token| token.lexeme == "b").unwrap();
        assert_eq!(b.line, 4);
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_look_ahead_is_idempotent() {
        let source = "func main() void { }".into();
        let mut lexer = Lexer::new(&source);
        let peeked: Vec<Token> = (0..4).map(|step| lexer.look_ahead(step).unwrap()).collect();
        assert_eq!(lexer.look_ahead(3).unwrap(), peeked[3]);
        for token in peeked {
            assert_eq!(lexer.look_ahead(0).unwrap(), token);
            assert_eq!(lexer.next_token().unwrap(), token);
        }
        let void = lexer.next_token().unwrap();
        assert_eq!(void.kind, TokenKind::Identifier);
        assert_eq!(void.lexeme, "void");
    }

    #[test]
    fn test_eof_is_stable() {
        let source = "x".into();
        let mut lexer = Lexer::new(&source);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Identifier);
        let eof = lexer.next_token().unwrap();
        assert_eq!(eof.kind, TokenKind::Eof);
        assert_eq!(eof.lexeme, "EOF");
        for step in 0..5 {
            assert_eq!(lexer.look_ahead(step).unwrap(), eof);
            assert_eq!(lexer.next_token().unwrap(), eof);
        }
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
        assert_eq!(kinds("  \n // only a comment"), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_unterminated_string() {
        let source = "var s = 'oops;".into();
        let err = Lexer::new(&source).tokenize().unwrap_err();
        assert!(matches!(err, CompileError::Lexical { ref message, .. } if message == "miss quotation token"));
    }

    #[test]
    fn test_unrecognized_word() {
        let source = "var a = 1;\nvar b = 9lives;".into();
        let err = Lexer::new(&source).tokenize().unwrap_err();
        match err {
            CompileError::Lexical { location, message } => {
                assert_eq!(location.line, 2);
                assert_eq!(message, "Can not parse token: 9lives");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_rejected_characters() {
        let source = "var a = 1 # 2;".into();
        assert!(Lexer::new(&source).tokenize().is_err());
        let source = "var é = 1;".into();
        assert!(Lexer::new(&source).tokenize().is_err());
    }
}
