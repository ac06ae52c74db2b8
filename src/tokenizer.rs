//! Definition tokenizer
//!
//! Hand-written state machine that turns definition source into a token
//! stream. Every token records the line and column of its first character so
//! the parser can attach traces and report errors precisely.
//!
//! ```text
//!            "                 letter/_            digit
//!   START ───────▶ STRING   START ───────▶ IDENTIFIER   START ─────▶ NUMBER
//!     ▲  ◀─────── "           ▲  ◀──── boundary          ▲ ◀── boundary
//!     │
//!     ├── // ──▶ LINE_COMMENT ── \n ──▶ START
//!     └── /* ──▶ BLOCK_COMMENT ── */ ──▶ START
//! ```

use std::fmt;

use crate::diagnostics::{Diagnostic, DiagnosticCode};

/// Reserved words of the definition language (matched case-insensitively)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Model,
    Enum,
    Typedef,
    Import,
    Public,
    Private,
    Secret,
}

impl Keyword {
    pub fn from_word(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "model" => Some(Keyword::Model),
            "enum" => Some(Keyword::Enum),
            "typedef" => Some(Keyword::Typedef),
            "import" => Some(Keyword::Import),
            "public" => Some(Keyword::Public),
            "private" => Some(Keyword::Private),
            "secret" => Some(Keyword::Secret),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Model => "model",
            Keyword::Enum => "enum",
            Keyword::Typedef => "typedef",
            Keyword::Import => "import",
            Keyword::Public => "public",
            Keyword::Private => "private",
            Keyword::Secret => "secret",
        }
    }
}

/// Single-character punctuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Equals,
    BraceOpen,
    BraceClose,
    LessThan,
    GreaterThan,
    ParenOpen,
    ParenClose,
    Semicolon,
    Colon,
    Comma,
}

impl Symbol {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '=' => Some(Symbol::Equals),
            '{' => Some(Symbol::BraceOpen),
            '}' => Some(Symbol::BraceClose),
            '<' => Some(Symbol::LessThan),
            '>' => Some(Symbol::GreaterThan),
            '(' => Some(Symbol::ParenOpen),
            ')' => Some(Symbol::ParenClose),
            ';' => Some(Symbol::Semicolon),
            ':' => Some(Symbol::Colon),
            ',' => Some(Symbol::Comma),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Symbol::Equals => '=',
            Symbol::BraceOpen => '{',
            Symbol::BraceClose => '}',
            Symbol::LessThan => '<',
            Symbol::GreaterThan => '>',
            Symbol::ParenOpen => '(',
            Symbol::ParenClose => ')',
            Symbol::Semicolon => ';',
            Symbol::Colon => ':',
            Symbol::Comma => ',',
        }
    }
}

/// Token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Double-quoted string, lexeme holds the decoded contents
    String,
    /// Decimal number, lexeme kept as written
    Number,
    /// `true` or `false` in any case
    Boolean,
    Identifier,
    Keyword(Keyword),
    Symbol(Symbol),
    /// End of input
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::String => write!(f, "string"),
            TokenKind::Number => write!(f, "number"),
            TokenKind::Boolean => write!(f, "boolean"),
            TokenKind::Identifier => write!(f, "identifier"),
            TokenKind::Keyword(k) => write!(f, "keyword '{}'", k.as_str()),
            TokenKind::Symbol(s) => write!(f, "'{}'", s.as_char()),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// Token with its source position
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: u32,
    pub offset: u32,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: u32, offset: u32) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
            offset,
        }
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }

    pub fn is_symbol(&self, symbol: Symbol) -> bool {
        self.kind == TokenKind::Symbol(symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    String,
    Identifier,
    LineComment,
    BlockComment,
    Number,
}

/// Character cursor tracking line/column
struct Cursor {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
}

impl Cursor {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Consume one character, returning it with the position it was at
    fn bump(&mut self) -> Option<(char, u32, u32)> {
        let c = *self.chars.get(self.pos)?;
        let at = (c, self.line, self.column);
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(at)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }
}

/// Identifiers are ASCII only; other letters are stray characters
fn is_word_char(c: Option<char>) -> bool {
    matches!(c, Some(c) if c.is_ascii_alphanumeric() || c == '_')
}

fn is_number_char(c: Option<char>) -> bool {
    matches!(c, Some(c) if c.is_ascii_digit() || c == '.')
}

fn classify_word(word: &str) -> TokenKind {
    if let Some(keyword) = Keyword::from_word(word) {
        TokenKind::Keyword(keyword)
    } else if word.eq_ignore_ascii_case("true") || word.eq_ignore_ascii_case("false") {
        TokenKind::Boolean
    } else {
        TokenKind::Identifier
    }
}

/// Tokenizer for definition source
pub struct Tokenizer<'a> {
    source: &'a str,
    path: Option<String>,
    tokens: Vec<Token>,
    errors: Vec<Diagnostic>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            path: None,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Attach a source path to the diagnostics this tokenizer produces
    pub fn with_path(mut self, path: Option<String>) -> Self {
        self.path = path;
        self
    }

    pub fn source(&self) -> &str {
        self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    /// Tokenize the whole source. Returns `true` when no errors were recorded.
    pub fn tokenize(&mut self) -> bool {
        self.tokens.clear();
        self.errors.clear();

        let mut cursor = Cursor::new(self.source);
        let mut state = State::Start;
        let mut buf = String::new();
        let mut start = (1u32, 1u32);

        while let Some((c, line, offset)) = cursor.bump() {
            let next = cursor.peek();

            match state {
                State::Start => {
                    if c == '"' {
                        start = (line, offset);
                        state = State::String;
                    } else if c.is_ascii_alphabetic() || c == '_' {
                        if is_word_char(next) {
                            start = (line, offset);
                            buf.push(c);
                            state = State::Identifier;
                        } else {
                            let word = c.to_string();
                            self.push(classify_word(&word), word, line, offset);
                        }
                    } else if c.is_ascii_digit() {
                        if is_number_char(next) {
                            start = (line, offset);
                            buf.push(c);
                            state = State::Number;
                        } else {
                            self.push(TokenKind::Number, c.to_string(), line, offset);
                        }
                    } else if c == '/' && next == Some('/') {
                        cursor.bump();
                        state = State::LineComment;
                    } else if c == '/' && next == Some('*') {
                        cursor.bump();
                        state = State::BlockComment;
                    } else if let Some(symbol) = Symbol::from_char(c) {
                        self.push(TokenKind::Symbol(symbol), c.to_string(), line, offset);
                    }
                }
                State::String => match c {
                    '"' => {
                        let text = std::mem::take(&mut buf);
                        self.push(TokenKind::String, text, start.0, start.1);
                        state = State::Start;
                    }
                    '\\' => match cursor.bump() {
                        Some(('n', _, _)) => buf.push('\n'),
                        Some(('t', _, _)) => buf.push('\t'),
                        Some(('r', _, _)) => buf.push('\r'),
                        Some((escaped, _, _)) => buf.push(escaped),
                        None => {}
                    },
                    _ => buf.push(c),
                },
                State::Identifier => {
                    buf.push(c);
                    if !is_word_char(next) {
                        let word = std::mem::take(&mut buf);
                        self.push(classify_word(&word), word, start.0, start.1);
                        state = State::Start;
                    }
                }
                State::Number => {
                    buf.push(c);
                    if !is_number_char(next) {
                        let text = std::mem::take(&mut buf);
                        self.push(TokenKind::Number, text, start.0, start.1);
                        state = State::Start;
                    }
                }
                State::LineComment => {
                    if c == '\n' {
                        state = State::Start;
                    }
                }
                State::BlockComment => {
                    if c == '*' && next == Some('/') {
                        cursor.bump();
                        state = State::Start;
                    }
                }
            }
        }

        if state == State::String {
            self.errors.push(Diagnostic::new(
                DiagnosticCode::UnterminatedString,
                "string not terminated",
                start.0,
                start.1,
                self.path.clone(),
            ));
        }

        self.push(TokenKind::Eof, "", cursor.line, cursor.column);

        self.errors.is_empty()
    }

    fn push(&mut self, kind: TokenKind, lexeme: impl Into<String>, line: u32, offset: u32) {
        self.tokens.push(Token::new(kind, lexeme, line, offset));
    }
}

/// Tokenize a source string in one call
pub fn tokenize(source: &str, path: Option<&str>) -> Result<Vec<Token>, Vec<Diagnostic>> {
    let mut tokenizer = Tokenizer::new(source).with_path(path.map(str::to_string));
    if tokenizer.tokenize() {
        Ok(tokenizer.into_tokens())
    } else {
        Err(tokenizer.errors().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source, None)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_model_field_sequence() {
        let tokens = tokenize("model User { public string(32) name; }", None).unwrap();
        let expected = vec![
            (TokenKind::Keyword(Keyword::Model), "model"),
            (TokenKind::Identifier, "User"),
            (TokenKind::Symbol(Symbol::BraceOpen), "{"),
            (TokenKind::Keyword(Keyword::Public), "public"),
            (TokenKind::Identifier, "string"),
            (TokenKind::Symbol(Symbol::ParenOpen), "("),
            (TokenKind::Number, "32"),
            (TokenKind::Symbol(Symbol::ParenClose), ")"),
            (TokenKind::Identifier, "name"),
            (TokenKind::Symbol(Symbol::Semicolon), ";"),
            (TokenKind::Symbol(Symbol::BraceClose), "}"),
            (TokenKind::Eof, ""),
        ];
        let actual: Vec<(TokenKind, &str)> =
            tokens.iter().map(|t| (t.kind, t.lexeme.as_str())).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("model A {\n  integer id;\n}", None).unwrap();
        assert_eq!((tokens[0].line, tokens[0].offset), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].offset), (1, 7));
        assert_eq!((tokens[3].line, tokens[3].offset), (2, 3));
        assert_eq!(tokens[3].lexeme, "integer");
        assert_eq!((tokens[4].line, tokens[4].offset), (2, 11));
        assert_eq!((tokens[6].line, tokens[6].offset), (3, 1));
    }

    #[test]
    fn test_unterminated_string() {
        let mut tokenizer = Tokenizer::new("model X { private string(1) a = \"oops; }");
        assert!(!tokenizer.tokenize());
        assert_eq!(tokenizer.errors().len(), 1);
        let err = &tokenizer.errors()[0];
        assert_eq!(err.code, DiagnosticCode::UnterminatedString);
        assert_eq!(err.message, "string not terminated");
        assert_eq!((err.line, err.offset), (1, 33));
        assert!(matches!(tokenizer.tokens().last(), Some(t) if t.kind == TokenKind::Eof));
    }

    #[test]
    fn test_keywords_case_insensitive() {
        let tokens = tokenize("MODEL Enum TypeDef", None).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::Model));
        assert_eq!(tokens[0].lexeme, "MODEL");
        assert_eq!(tokens[1].kind, TokenKind::Keyword(Keyword::Enum));
        assert_eq!(tokens[2].kind, TokenKind::Keyword(Keyword::Typedef));
    }

    #[test]
    fn test_booleans() {
        assert_eq!(
            kinds("true FALSE truthy"),
            vec![
                TokenKind::Boolean,
                TokenKind::Boolean,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens = tokenize("7 3.14 10", None).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].lexeme, "7");
        assert_eq!(tokens[1].lexeme, "3.14");
        assert_eq!(tokens[2].lexeme, "10");
    }

    #[test]
    fn test_single_char_identifier() {
        let tokens = tokenize("a b_1 _", None).unwrap();
        assert_eq!(tokens[0].lexeme, "a");
        assert_eq!(tokens[1].lexeme, "b_1");
        assert_eq!(tokens[2].lexeme, "_");
        assert!(tokens[..3].iter().all(|t| t.kind == TokenKind::Identifier));
    }

    #[test]
    fn test_comments_skipped() {
        let source = "// heading\nenum /* inline */ Role /* multi\nline */ { }";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::Keyword(Keyword::Enum),
                TokenKind::Identifier,
                TokenKind::Symbol(Symbol::BraceOpen),
                TokenKind::Symbol(Symbol::BraceClose),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_block_comment_opener_does_not_close() {
        assert_eq!(kinds("/*/ still comment */ x"), vec![TokenKind::Identifier, TokenKind::Eof]);
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize(r#""say \"hi\"\n""#, None).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].lexeme, "say \"hi\"\n");
    }

    #[test]
    fn test_stray_characters_ignored() {
        assert_eq!(
            kinds("# @ x $"),
            vec![TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn test_non_ascii_letters_split_identifiers() {
        let tokens = tokenize("Größe", None).unwrap();
        let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(lexemes, vec!["Gr", "e", ""]);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
    }

    #[test]
    fn test_error_carries_path() {
        let err = tokenize("\"open", Some("a.mdl")).unwrap_err();
        assert_eq!(err[0].path.as_deref(), Some("a.mdl"));
    }

    #[test]
    fn test_empty_input_yields_eof() {
        let tokens = tokenize("", None).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }
}
