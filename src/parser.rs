//! Recursive-descent parser
//!
//! Consumes the token stream of one source unit and produces its raw
//! declarations. Parsing is fail-fast: the first error stops the unit and is
//! reported with the position of the offending token.
//!
//! ```text
//! unit      := (model | enum | typedef | import)*
//! model     := 'model' IDENT (':' STRING)? '{' field* '}' ';'?
//! field     := visibility? type IDENT ('=' value)? ';'
//! visibility:= 'public' | 'private' | 'secret'
//! type      := IDENT ('<' type '>')? ('(' (value | IDENT) ')')?
//! enum      := 'enum' IDENT '{' IDENT (',' IDENT)* ','? '}' ';'?
//! typedef   := 'typedef' IDENT type ';'?
//! import    := 'import' STRING ';'?
//! value     := STRING | NUMBER | BOOLEAN
//! ```
//!
//! Imports are resolved through an [`Importer`] and parsed recursively with
//! the same grammar; the imported declarations are merged into the importing
//! unit by name.

use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::debug;

use crate::decl::{DeclarationKind, Enum, Model, Named, TypeDef};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::importer::Importer;
use crate::tokenizer::{Keyword, Symbol, Token, TokenKind, Tokenizer};
use crate::trace::Trace;
use crate::types::{Field, FieldType, Value, Visibility};

/// A name declared a second time in the same namespace of one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redeclaration {
    pub kind: DeclarationKind,
    pub name: String,
    /// Position of the later declaration
    pub trace: Trace,
}

/// Declarations produced from one source unit and everything it imports
#[derive(Debug, Clone, Default)]
pub struct ParsedUnit {
    pub models: IndexMap<String, Model>,
    pub enums: IndexMap<String, Enum>,
    pub typedefs: IndexMap<String, TypeDef>,
    /// Names a source declared more than once; the later declaration is kept
    pub redeclared: Vec<Redeclaration>,
}

impl ParsedUnit {
    /// Merge another unit into this one; entries of `other` win on name clashes
    pub fn merge(&mut self, other: ParsedUnit) {
        self.models.extend(other.models);
        self.enums.extend(other.enums);
        self.typedefs.extend(other.typedefs);
        self.redeclared.extend(other.redeclared);
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty() && self.enums.is_empty() && self.typedefs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.models.len() + self.enums.len() + self.typedefs.len()
    }
}

/// Marker for an aborted parse; the diagnostic is already recorded
#[derive(Debug)]
struct ParseAbort;

type PResult<T> = std::result::Result<T, ParseAbort>;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    path: Option<String>,
    importer: Option<&'a dyn Importer>,
    /// Paths of the sources currently importing this one
    chain: Vec<String>,
    /// Names declared by this source itself, not by its imports
    declared: HashSet<(DeclarationKind, String)>,
    errors: Vec<Diagnostic>,
    unit: ParsedUnit,
}

impl<'a> Parser<'a> {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof) {
            let (line, offset) = tokens.last().map(|t| (t.line, t.offset)).unwrap_or((1, 1));
            tokens.push(Token::new(TokenKind::Eof, "", line, offset));
        }

        Self {
            tokens,
            pos: 0,
            path: None,
            importer: None,
            chain: Vec::new(),
            declared: HashSet::new(),
            errors: Vec::new(),
            unit: ParsedUnit::default(),
        }
    }

    pub fn with_path(mut self, path: Option<String>) -> Self {
        self.path = path;
        self
    }

    pub fn with_importer(mut self, importer: Option<&'a dyn Importer>) -> Self {
        self.importer = importer;
        self
    }

    fn with_chain(mut self, chain: Vec<String>) -> Self {
        self.chain = chain;
        self
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn unit(&self) -> &ParsedUnit {
        &self.unit
    }

    pub fn into_unit(self) -> ParsedUnit {
        self.unit
    }

    /// Parse the whole token stream. Returns `true` when no error was found.
    pub fn parse(&mut self) -> bool {
        self.errors.clear();
        self.pos = 0;
        self.declared.clear();
        self.unit = ParsedUnit::default();

        while self.peek().kind != TokenKind::Eof {
            if self.parse_declaration().is_err() {
                return false;
            }
        }

        self.errors.is_empty()
    }

    // =========================================================================
    // Token helpers
    // =========================================================================

    fn peek(&self) -> &Token {
        // the stream always ends with Eof and `next` never moves past it
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn accept(&mut self, kind: TokenKind) -> Option<Token> {
        if self.peek().kind == kind {
            Some(self.next())
        } else {
            None
        }
    }

    fn accept_symbol(&mut self, symbol: Symbol) -> Option<Token> {
        self.accept(TokenKind::Symbol(symbol))
    }

    fn accept_visibility(&mut self) -> Option<(Visibility, Token)> {
        let visibility = match self.peek().kind {
            TokenKind::Keyword(Keyword::Public) => Visibility::Public,
            TokenKind::Keyword(Keyword::Private) => Visibility::Private,
            TokenKind::Keyword(Keyword::Secret) => Visibility::Secret,
            _ => return None,
        };
        Some((visibility, self.next()))
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if let Some(token) = self.accept(kind) {
            return Ok(token);
        }
        let found = self.peek().clone();
        Err(self.error_at(
            &found,
            DiagnosticCode::UnexpectedToken,
            format!("expected {}, got {}", kind, found.kind),
        ))
    }

    fn expect_symbol(&mut self, symbol: Symbol) -> PResult<Token> {
        self.expect(TokenKind::Symbol(symbol))
    }

    fn expect_value(&mut self) -> PResult<Value> {
        let token = self.peek().clone();
        let value = match token.kind {
            TokenKind::String => Value::String(token.lexeme.clone()),
            TokenKind::Boolean => Value::Boolean(token.lexeme.eq_ignore_ascii_case("true")),
            TokenKind::Number => match token.lexeme.parse::<f64>() {
                Ok(n) => Value::Number(n),
                Err(_) => {
                    return Err(self.error_at(
                        &token,
                        DiagnosticCode::InvalidLiteral,
                        format!("invalid number literal '{}'", token.lexeme),
                    ))
                }
            },
            _ => {
                return Err(self.error_at(
                    &token,
                    DiagnosticCode::UnexpectedToken,
                    format!("expected value, got {}", token.kind),
                ))
            }
        };
        self.next();
        Ok(value)
    }

    fn trace_of(&self, token: &Token) -> Trace {
        Trace::new(token.line, token.offset, self.path.clone())
    }

    fn error_at(&mut self, token: &Token, code: DiagnosticCode, message: String) -> ParseAbort {
        self.errors.push(Diagnostic::new(
            code,
            message,
            token.line,
            token.offset,
            self.path.clone(),
        ));
        ParseAbort
    }

    // =========================================================================
    // Grammar
    // =========================================================================

    fn parse_declaration(&mut self) -> PResult<()> {
        let token = self.next();
        match token.kind {
            TokenKind::Keyword(Keyword::Model) => {
                let model = self.parse_model(&token)?;
                self.declare(&model);
                self.unit.models.insert(model.name().to_string(), model);
            }
            TokenKind::Keyword(Keyword::Enum) => {
                let enumeration = self.parse_enum(&token)?;
                self.declare(&enumeration);
                self.unit
                    .enums
                    .insert(enumeration.name().to_string(), enumeration);
            }
            TokenKind::Keyword(Keyword::Typedef) => {
                let typedef = self.parse_typedef(&token)?;
                self.declare(&typedef);
                self.unit
                    .typedefs
                    .insert(typedef.name().to_string(), typedef);
            }
            TokenKind::Keyword(Keyword::Import) => self.parse_import()?,
            _ => {
                return Err(self.error_at(
                    &token,
                    DiagnosticCode::UnexpectedToken,
                    format!(
                        "expected keyword 'model', 'enum', 'typedef' or 'import', got {}",
                        token.kind
                    ),
                ))
            }
        }
        Ok(())
    }

    /// Imports may replace each other by name; a source repeating one of its
    /// own names is recorded
    fn declare(&mut self, decl: &dyn Named) {
        if !self
            .declared
            .insert((decl.kind(), decl.name().to_string()))
        {
            self.unit.redeclared.push(Redeclaration {
                kind: decl.kind(),
                name: decl.name().to_string(),
                trace: decl.trace().clone(),
            });
        }
    }

    fn parse_model(&mut self, keyword: &Token) -> PResult<Model> {
        let name = self.expect(TokenKind::Identifier)?;

        let table = if self.accept_symbol(Symbol::Colon).is_some() {
            Some(self.expect(TokenKind::String)?.lexeme)
        } else {
            None
        };

        self.expect_symbol(Symbol::BraceOpen)?;

        let mut model = Model::new(name.lexeme, table, self.trace_of(keyword));
        while self.accept_symbol(Symbol::BraceClose).is_none() {
            let field = self.parse_field()?;
            model.insert_field(field);
        }

        self.accept_symbol(Symbol::Semicolon);
        Ok(model)
    }

    fn parse_field(&mut self) -> PResult<Field> {
        let visibility = self.accept_visibility();
        let (ty, type_token) = self.parse_type()?;
        let name = self.expect(TokenKind::Identifier)?;

        let default = if self.accept_symbol(Symbol::Equals).is_some() {
            Some(self.expect_value()?)
        } else {
            None
        };

        self.expect_symbol(Symbol::Semicolon)?;

        let (visibility, trace_token) = match visibility {
            Some((visibility, token)) => (visibility, token),
            None => (Visibility::Private, type_token),
        };

        Ok(Field {
            name: name.lexeme,
            ty,
            visibility,
            default,
            trace: self.trace_of(&trace_token),
        })
    }

    /// Returns the type with its leading token
    fn parse_type(&mut self) -> PResult<(FieldType, Token)> {
        let name = self.expect(TokenKind::Identifier)?;
        let mut ty = FieldType::new(name.lexeme.clone());

        if self.accept_symbol(Symbol::LessThan).is_some() {
            let (parameter, _) = self.parse_type()?;
            self.expect_symbol(Symbol::GreaterThan)?;
            ty = ty.with_parameter(parameter);
        }

        if self.accept_symbol(Symbol::ParenOpen).is_some() {
            let options = match self.accept(TokenKind::Identifier) {
                Some(ident) => Value::String(ident.lexeme),
                None => self.expect_value()?,
            };
            self.expect_symbol(Symbol::ParenClose)?;
            ty = ty.with_options(options);
        }

        Ok((ty, name))
    }

    fn parse_enum(&mut self, keyword: &Token) -> PResult<Enum> {
        let name = self.expect(TokenKind::Identifier)?;
        self.expect_symbol(Symbol::BraceOpen)?;

        let mut values = Vec::new();
        let mut traces = Vec::new();

        while self.accept_symbol(Symbol::BraceClose).is_none() {
            let value = self.expect(TokenKind::Identifier)?;
            traces.push(self.trace_of(&value));
            values.push(value.lexeme);

            if self.accept_symbol(Symbol::Comma).is_none() {
                self.expect_symbol(Symbol::BraceClose)?;
                break;
            }
        }

        self.accept_symbol(Symbol::Semicolon);
        Ok(Enum::new(name.lexeme, values, traces, self.trace_of(keyword)))
    }

    fn parse_typedef(&mut self, keyword: &Token) -> PResult<TypeDef> {
        let name = self.expect(TokenKind::Identifier)?;
        let (ty, _) = self.parse_type()?;
        self.accept_symbol(Symbol::Semicolon);
        Ok(TypeDef::new(name.lexeme, ty, self.trace_of(keyword)))
    }

    fn parse_import(&mut self) -> PResult<()> {
        let file = self.expect(TokenKind::String)?;

        let Some(importer) = self.importer else {
            return Err(self.error_at(
                &file,
                DiagnosticCode::NoImporter,
                "import failed, no importer set".to_string(),
            ));
        };

        let Some(source) = importer.resolve(self.path.as_deref(), &file.lexeme) else {
            return Err(self.error_at(
                &file,
                DiagnosticCode::ImportNotFound,
                format!("import failed, cannot find path '{}'", file.lexeme),
            ));
        };

        let mut chain = self.chain.clone();
        chain.extend(self.path.iter().cloned());
        if chain.contains(&source.path) {
            chain.push(source.path);
            return Err(self.error_at(
                &file,
                DiagnosticCode::ImportCycle,
                format!("import cycle detected: {}", chain.join(" -> ")),
            ));
        }

        debug!("Parsing import {:?} from {:?}", source.path, self.path);

        let mut tokenizer = Tokenizer::new(&source.text).with_path(Some(source.path.clone()));
        if !tokenizer.tokenize() {
            self.errors.extend_from_slice(tokenizer.errors());
            return Err(ParseAbort);
        }

        let mut nested = Parser::new(tokenizer.into_tokens())
            .with_path(Some(source.path))
            .with_importer(self.importer)
            .with_chain(chain);
        if !nested.parse() {
            self.errors.append(&mut nested.errors);
            return Err(ParseAbort);
        }

        self.unit.merge(nested.into_unit());
        self.accept_symbol(Symbol::Semicolon);
        Ok(())
    }
}

/// Tokenize and parse a source unit, resolving imports through `importer`
pub fn parse_source(
    source: &str,
    path: Option<&str>,
    importer: Option<&dyn Importer>,
) -> Result<ParsedUnit, Vec<Diagnostic>> {
    let path = path.map(str::to_string);

    let mut tokenizer = Tokenizer::new(source).with_path(path.clone());
    if !tokenizer.tokenize() {
        return Err(tokenizer.errors().to_vec());
    }

    let mut parser = Parser::new(tokenizer.into_tokens())
        .with_path(path)
        .with_importer(importer);
    if parser.parse() {
        Ok(parser.into_unit())
    } else {
        Err(parser.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::ImportedSource;
    use std::collections::HashMap;

    fn parse(source: &str) -> ParsedUnit {
        parse_source(source, None, None).unwrap()
    }

    fn parse_err(source: &str) -> Vec<Diagnostic> {
        parse_source(source, None, None).unwrap_err()
    }

    struct MapImporter(HashMap<&'static str, &'static str>);

    impl Importer for MapImporter {
        fn resolve(&self, _current: Option<&str>, import: &str) -> Option<ImportedSource> {
            self.0
                .get(import)
                .map(|text| ImportedSource::new(import, *text))
        }
    }

    #[test]
    fn test_parse_model() {
        let unit = parse(
            r#"
            model User : "users" {
                public string(32) name;
                secret string(64) password;
                integer age = 18;
                boolean active = true;
            };
            "#,
        );
        let user = &unit.models["User"];
        assert_eq!(user.table(), Some("users"));
        assert_eq!(user.fields().len(), 4);
        assert_eq!(user.field("name").unwrap().visibility, Visibility::Public);
        assert_eq!(user.field("password").unwrap().visibility, Visibility::Secret);
        assert_eq!(user.field("age").unwrap().visibility, Visibility::Private);
        assert_eq!(user.field("age").unwrap().default, Some(Value::Number(18.0)));
        assert_eq!(
            user.field("active").unwrap().default,
            Some(Value::Boolean(true))
        );
        assert_eq!(user.trace().line, 2);
    }

    #[test]
    fn test_model_without_table() {
        let unit = parse("model Log { string(200) message; }");
        assert!(unit.models["Log"].table().is_none());
    }

    #[test]
    fn test_field_trace_from_visibility_or_type() {
        let unit = parse("model A {\n  public integer x;\n    decimal y;\n}");
        let a = &unit.models["A"];
        assert_eq!(a.field_trace("x"), Some(&Trace::new(2, 3, None)));
        assert_eq!(a.field_trace("y"), Some(&Trace::new(3, 5, None)));
    }

    #[test]
    fn test_parse_type_parameter_and_options() {
        let unit = parse("model A { array<custom(Foo)> items; ref<User> owner; }");
        let a = &unit.models["A"];
        assert_eq!(a.field("items").unwrap().ty.to_string(), "array<custom(Foo)>");
        let owner = &a.field("owner").unwrap().ty;
        assert_eq!(owner.name, "ref");
        assert_eq!(owner.parameter.as_ref().unwrap().name, "User");
        assert!(owner.options.is_none());
    }

    #[test]
    fn test_string_option_round_trip() {
        let unit = parse(r#"typedef Money custom("numeric(10,2)");"#);
        assert_eq!(
            unit.typedefs["Money"].ty().to_string(),
            "custom(numeric(10,2))"
        );
    }

    #[test]
    fn test_parse_enum() {
        let unit = parse("enum Role { Admin, Member, Guest, }");
        let role = &unit.enums["Role"];
        assert_eq!(role.values(), &["Admin", "Member", "Guest"]);
        assert_eq!(role.value_trace("Member").unwrap().offset, 20);
    }

    #[test]
    fn test_parse_empty_enum() {
        let unit = parse("enum Nothing {}");
        assert!(unit.enums["Nothing"].values().is_empty());
    }

    #[test]
    fn test_parse_typedef() {
        let unit = parse("typedef Email string(255)\ntypedef Id integer;");
        assert_eq!(unit.typedefs["Email"].ty().to_string(), "string(255)");
        assert_eq!(unit.typedefs["Id"].trace().line, 2);
    }

    #[test]
    fn test_unexpected_top_level_token() {
        let errors = parse_err("field X;");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, DiagnosticCode::UnexpectedToken);
        assert!(errors[0].message.contains("expected keyword 'model'"));
        assert_eq!((errors[0].line, errors[0].offset), (1, 1));
    }

    #[test]
    fn test_missing_semicolon_reports_expected_vs_actual() {
        let errors = parse_err("model A {\n  integer id\n}");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "expected ';', got '}'");
        assert_eq!((errors[0].line, errors[0].offset), (3, 1));
    }

    #[test]
    fn test_fail_fast_single_error() {
        let errors = parse_err("model A { integer ; } model B { string x }");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "expected identifier, got ';'");
    }

    #[test]
    fn test_default_must_be_literal() {
        let errors = parse_err("model A { integer x = y; }");
        assert_eq!(errors[0].message, "expected value, got identifier");
    }

    #[test]
    fn test_invalid_number_literal() {
        let errors = parse_err("model A { decimal x = 1.2.3; }");
        assert_eq!(errors[0].code, DiagnosticCode::InvalidLiteral);
    }

    #[test]
    fn test_unterminated_string_fails_parse() {
        let errors = parse_err("model X { private string(1) a = \"oops; }");
        assert_eq!(errors[0].code, DiagnosticCode::UnterminatedString);
    }

    #[test]
    fn test_import_without_importer() {
        let errors = parse_err("import \"types.mdl\";");
        assert_eq!(errors[0].code, DiagnosticCode::NoImporter);
        assert_eq!(errors[0].message, "import failed, no importer set");
    }

    #[test]
    fn test_import_merges_declarations() {
        let importer = MapImporter(HashMap::from([(
            "types.mdl",
            "enum Role { Admin }\ntypedef Id integer;",
        )]));
        let unit = parse_source(
            "import \"types.mdl\";\nmodel User { Role role; Id id; }",
            Some("main.mdl"),
            Some(&importer),
        )
        .unwrap();
        assert!(unit.enums.contains_key("Role"));
        assert!(unit.typedefs.contains_key("Id"));
        assert_eq!(unit.enums["Role"].trace().path(), Some("types.mdl"));
        assert_eq!(unit.models["User"].trace().path(), Some("main.mdl"));
    }

    #[test]
    fn test_import_not_found() {
        let importer = MapImporter(HashMap::new());
        let errors = parse_source("import \"nope.mdl\"", None, Some(&importer)).unwrap_err();
        assert_eq!(errors[0].code, DiagnosticCode::ImportNotFound);
        assert_eq!(errors[0].message, "import failed, cannot find path 'nope.mdl'");
    }

    #[test]
    fn test_nested_import_errors_are_not_wrapped() {
        let importer = MapImporter(HashMap::from([("bad.mdl", "model {")]));
        let errors =
            parse_source("import \"bad.mdl\";", Some("main.mdl"), Some(&importer)).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path.as_deref(), Some("bad.mdl"));
        assert_eq!(errors[0].message, "expected identifier, got '{'");
    }

    #[test]
    fn test_import_cycle_rejected() {
        let importer = MapImporter(HashMap::from([
            ("a.mdl", "import \"b.mdl\"; model A { integer x; }"),
            ("b.mdl", "import \"a.mdl\"; model B { integer y; }"),
        ]));
        let errors =
            parse_source("import \"b.mdl\";", Some("a.mdl"), Some(&importer)).unwrap_err();
        assert_eq!(errors[0].code, DiagnosticCode::ImportCycle);
        assert_eq!(
            errors[0].message,
            "import cycle detected: a.mdl -> b.mdl -> a.mdl"
        );
    }

    #[test]
    fn test_diamond_import_is_not_a_cycle() {
        let importer = MapImporter(HashMap::from([
            ("left.mdl", "import \"base.mdl\"; model L { Base b; }"),
            ("right.mdl", "import \"base.mdl\"; model R { Base b; }"),
            ("base.mdl", "model Base { integer id; }"),
        ]));
        let unit = parse_source(
            "import \"left.mdl\"; import \"right.mdl\";",
            Some("top.mdl"),
            Some(&importer),
        )
        .unwrap();
        assert_eq!(unit.models.len(), 3);
    }

    #[test]
    fn test_later_declaration_overwrites() {
        let unit = parse("enum E { A }\nenum E { B }");
        assert_eq!(unit.enums.len(), 1);
        assert_eq!(unit.enums["E"].values(), &["B"]);
        assert_eq!(
            unit.redeclared,
            vec![Redeclaration {
                kind: DeclarationKind::Enum,
                name: "E".to_string(),
                trace: Trace::new(2, 1, None),
            }]
        );
    }

    #[test]
    fn test_declaration_replacing_import_is_not_redeclared() {
        let importer = MapImporter(HashMap::from([("types.mdl", "enum Role { Admin }")]));
        let unit = parse_source(
            "import \"types.mdl\";\nenum Role { Owner }",
            Some("main.mdl"),
            Some(&importer),
        )
        .unwrap();
        assert_eq!(unit.enums["Role"].values(), &["Owner"]);
        assert!(unit.redeclared.is_empty());
    }

    #[test]
    fn test_redeclaration_inside_import_is_kept() {
        let importer = MapImporter(HashMap::from([(
            "types.mdl",
            "typedef Id integer;\ntypedef Id decimal;",
        )]));
        let unit =
            parse_source("import \"types.mdl\";", Some("main.mdl"), Some(&importer)).unwrap();
        assert_eq!(unit.redeclared.len(), 1);
        assert_eq!(unit.redeclared[0].trace.path(), Some("types.mdl"));
    }

    #[test]
    fn test_same_name_in_other_namespace_is_not_redeclared() {
        let unit = parse("model Status { integer id; }\nenum Status { Open }");
        assert!(unit.redeclared.is_empty());
    }

    #[test]
    fn test_parser_new_appends_missing_eof() {
        let mut parser = Parser::new(vec![]);
        assert!(parser.parse());
        assert!(parser.unit().is_empty());
    }
}
