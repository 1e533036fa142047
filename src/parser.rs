//! Grammar parser for TypeQL
//!
//! A recursive-descent parser over the lexer's token stream. Each
//! invocation owns its own cursor, so concurrent parses never share
//! state. Multi-query input is exposed as a lazy iterator that lexes and
//! parses one query at a time; iteration never recurses per query, so
//! inputs with tens of thousands of queries parse in constant stack and
//! hold only the current query's tokens in memory.

use chumsky::error::{Simple, SimpleReason};
use chumsky::Parser as _;

use crate::error::{self, Result, TypeQLError};
use crate::lexer::{lexer, Span, Token};
use crate::literal;
use crate::pattern::*;
use crate::query::*;
use crate::scope;

pub(crate) fn parse_query(source: &str) -> Result<Query> {
    let tokens = lex(source)?;
    if tokens.is_empty() {
        return Err(TypeQLError::structural("no query found in input"));
    }
    let mut parser = QueryParser::new(source, &tokens, 0);
    let query = parser.query()?;
    if parser.pos < tokens.len() {
        return Err(parser.unexpected("end of query"));
    }
    Ok(query)
}

pub(crate) fn parse_pattern(source: &str) -> Result<Pattern> {
    let tokens = lex(source)?;
    if tokens.is_empty() {
        return Err(TypeQLError::structural("no pattern found in input"));
    }
    let mut parser = QueryParser::new(source, &tokens, 0);
    let pattern = parser.pattern()?;
    if parser.peek() == Some(&Token::Semicolon) {
        parser.bump();
    }
    if parser.pos < tokens.len() {
        return Err(parser.unexpected("end of pattern"));
    }
    Ok(pattern)
}

pub(crate) fn parse_queries(source: &str) -> Queries<'_> {
    Queries {
        source,
        offset: 0,
        tokens: Vec::new(),
        pos: 0,
        failed: false,
    }
}

/// Lazily parsed sequence of queries. Stops after the first failure.
///
/// The source is lexed in segments cut at query-leading keywords, so a
/// malformed literal late in the input only fails once iteration reaches
/// the query that contains it.
pub struct Queries<'a> {
    source: &'a str,
    offset: usize,
    tokens: Vec<(Token, Span)>,
    pos: usize,
    failed: bool,
}

impl Iterator for Queries<'_> {
    type Item = Result<Query>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while self.pos >= self.tokens.len() {
            if self.offset >= self.source.len() {
                return None;
            }
            let end = next_query_boundary(self.source, self.offset);
            match lex_range(self.source, self.offset, end) {
                Ok(tokens) => {
                    self.tokens = tokens;
                    self.pos = 0;
                    self.offset = end;
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        let mut parser = QueryParser::new(self.source, &self.tokens, self.pos);
        let result = parser.query();
        self.pos = parser.pos;
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

/// Byte offset of the next query-leading keyword (`match`, `define`,
/// `undefine`) strictly after `from`, or the end of the source. `insert`
/// and `delete` are not boundaries, since they can continue a match
/// query. Strings, comments, variables and annotations are skipped, so
/// the keywords only match where a new query can begin.
fn next_query_boundary(source: &str, from: usize) -> usize {
    const LEADING: [&str; 3] = ["match", "define", "undefine"];
    let bytes = source.as_bytes();
    let mut i = from;
    let mut in_word = false;
    while i < bytes.len() {
        match bytes[i] {
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                in_word = false;
            }
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
                i += 1;
                in_word = false;
            }
            b'$' | b'@' => {
                i += 1;
                while i < bytes.len() && is_word_byte(bytes[i]) {
                    i += 1;
                }
                in_word = false;
            }
            b => {
                if !in_word && i > from {
                    for keyword in LEADING {
                        let end = i + keyword.len();
                        if bytes[i..].starts_with(keyword.as_bytes())
                            && (end >= bytes.len() || !is_word_byte(bytes[end]))
                        {
                            return i;
                        }
                    }
                }
                in_word = is_word_byte(b);
                i += 1;
            }
        }
    }
    source.len()
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn lex(source: &str) -> Result<Vec<(Token, Span)>> {
    lex_range(source, 0, source.len())
}

/// Lex `source[start..end]`; spans are reported against the full source.
fn lex_range(source: &str, start: usize, end: usize) -> Result<Vec<(Token, Span)>> {
    lexer()
        .parse(&source[start..end])
        .map(|tokens| {
            tokens
                .into_iter()
                .map(|(token, span)| (token, span.start + start..span.end + start))
                .collect()
        })
        .map_err(|errors| lex_error(source, start, errors))
}

fn lex_error(source: &str, start: usize, errors: Vec<Simple<char>>) -> TypeQLError {
    // report the failure furthest into the input
    match errors.into_iter().max_by_key(|e| e.span().start) {
        None => TypeQLError::structural("the input could not be tokenized"),
        Some(e) => {
            let offset = start + e.span().start;
            let message = match e.reason() {
                SimpleReason::Custom(msg) => msg.clone(),
                _ => match e.found() {
                    Some(c) => format!("unexpected character '{}'", c),
                    None => "unexpected end of input".to_string(),
                },
            };
            error::lexical_error(source, offset, message)
        }
    }
}

fn named(name: String) -> Variable {
    if name == "_" {
        Variable::Anonymous
    } else {
        Variable::Named(name)
    }
}

fn into_branch(mut patterns: Vec<Pattern>) -> Pattern {
    if patterns.len() == 1 {
        patterns.remove(0)
    } else {
        Pattern::Conjunction(Conjunction::new(patterns))
    }
}

struct QueryParser<'a> {
    source: &'a str,
    tokens: &'a [(Token, Span)],
    pos: usize,
    /// Global line of the query's first token; errors report lines
    /// relative to it.
    base_line: usize,
}

impl<'a> QueryParser<'a> {
    fn new(source: &'a str, tokens: &'a [(Token, Span)], pos: usize) -> Self {
        let base_line = tokens
            .get(pos)
            .map(|(_, span)| error::line_col(source, span.start).0)
            .unwrap_or(1);
        QueryParser {
            source,
            tokens,
            pos,
            base_line,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(t, _)| t)
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    /// A syntax error at the current token, or at the end of the last
    /// consumed token when input ran out.
    fn error_here(&self, message: String) -> TypeQLError {
        let offset = match self.tokens.get(self.pos) {
            Some((_, span)) => span.start,
            None => self.tokens.last().map(|(_, span)| span.end).unwrap_or(0),
        };
        error::syntax_error(self.source, self.base_line, offset, message)
    }

    fn unexpected(&self, expected: &str) -> TypeQLError {
        let found = match self.peek() {
            Some(token) => format!("'{}'", token),
            None => "end of input".to_string(),
        };
        self.error_here(format!("unexpected {}, expected {}", found, expected))
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<()> {
        if self.peek() == Some(&token) {
            self.bump();
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_semicolon(&mut self) -> Result<()> {
        self.expect(Token::Semicolon, "';'")
    }

    fn variable(&mut self) -> Result<Variable> {
        match self.peek().cloned() {
            Some(Token::Var(name)) => {
                self.bump();
                Ok(named(name))
            }
            _ => Err(self.unexpected("a variable")),
        }
    }

    fn opt_variable(&mut self) -> Variable {
        match self.peek().cloned() {
            Some(Token::Var(name)) => {
                self.bump();
                named(name)
            }
            _ => Variable::Anonymous,
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.bump();
                Ok(name)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    /// A type label, scoped (`relation:role`) when a colon is directly
    /// followed by another identifier.
    fn label(&mut self) -> Result<Label> {
        let name = self.ident()?;
        if self.peek() == Some(&Token::Colon) && matches!(self.peek_at(1), Some(Token::Ident(_))) {
            self.bump();
            let scoped = self.ident()?;
            Ok(Label {
                scope: Some(name),
                name: scoped,
            })
        } else {
            Ok(Label { scope: None, name })
        }
    }

    fn type_ref(&mut self) -> Result<TypeRef> {
        match self.peek() {
            Some(Token::Var(_)) => Ok(TypeRef::Variable(self.variable()?)),
            Some(Token::Ident(_)) => Ok(TypeRef::Label(self.label()?)),
            _ => Err(self.unexpected("a type")),
        }
    }

    // ============ Queries ============

    fn query(&mut self) -> Result<Query> {
        match self.peek() {
            Some(Token::Match) => self.match_based(),
            Some(Token::Insert) => {
                self.bump();
                let statements = self.thing_statements()?;
                scope::validate_insert(&statements)?;
                Ok(Query::Insert(InsertQuery {
                    match_clause: None,
                    statements,
                }))
            }
            Some(Token::Define) => self.define(),
            Some(Token::Undefine) => self.undefine(),
            Some(_) => Err(self.unexpected("a query keyword")),
            None => Err(TypeQLError::structural("no query found in input")),
        }
    }

    fn match_based(&mut self) -> Result<Query> {
        self.bump();
        let patterns = self.patterns()?;
        if patterns.is_empty() {
            return Err(self.unexpected("a pattern"));
        }
        let conjunction = Conjunction::new(patterns);
        match self.peek() {
            Some(Token::Insert) => {
                self.bump();
                let statements = self.thing_statements()?;
                scope::validate_match_clause(&conjunction)?;
                scope::validate_insert(&statements)?;
                Ok(Query::Insert(InsertQuery {
                    match_clause: Some(conjunction),
                    statements,
                }))
            }
            Some(Token::Delete) => {
                self.bump();
                let deletes = self.thing_statements()?;
                scope::validate_match_clause(&conjunction)?;
                scope::validate_delete(&conjunction, &deletes)?;
                if self.peek() == Some(&Token::Insert) {
                    self.bump();
                    let inserts = self.thing_statements()?;
                    scope::validate_insert(&inserts)?;
                    Ok(Query::Update(UpdateQuery {
                        match_clause: conjunction,
                        deletes,
                        inserts,
                    }))
                } else {
                    Ok(Query::Delete(DeleteQuery {
                        match_clause: conjunction,
                        statements: deletes,
                    }))
                }
            }
            _ => {
                let modifiers = self.modifiers()?;
                let reduction = self.reduction()?;
                let query = MatchQuery {
                    conjunction,
                    modifiers,
                    reduction,
                };
                scope::validate_match(&query)?;
                Ok(Query::Match(query))
            }
        }
    }

    fn define(&mut self) -> Result<Query> {
        self.bump();
        let definables = self.definables()?;
        for definable in &definables {
            if let Definable::Rule(rule) = definable {
                scope::validate_rule(rule)?;
            }
        }
        Ok(Query::Define(DefineQuery { definables }))
    }

    fn undefine(&mut self) -> Result<Query> {
        self.bump();
        let definables = self.definables()?;
        for definable in &definables {
            if let Definable::Rule(rule) = definable {
                if rule.when.is_some() || rule.then.is_some() {
                    return Err(TypeQLError::structural(format!(
                        "rule '{}' must be undefined by label alone",
                        rule.label
                    )));
                }
            }
        }
        Ok(Query::Undefine(UndefineQuery { definables }))
    }

    fn definables(&mut self) -> Result<Vec<Definable>> {
        let mut definables = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Rule) => definables.push(Definable::Rule(self.rule()?)),
                Some(Token::Ident(_) | Token::Var(_)) => {
                    let statement = self.type_statement()?;
                    self.expect_semicolon()?;
                    definables.push(Definable::Type(statement));
                }
                _ => break,
            }
        }
        if definables.is_empty() {
            return Err(self.unexpected("a definition"));
        }
        Ok(definables)
    }

    fn rule(&mut self) -> Result<Rule> {
        self.expect(Token::Rule, "'rule'")?;
        let label = self.ident()?;
        let mut rule = Rule::new(label);
        if self.peek() == Some(&Token::Colon) {
            self.bump();
            self.expect(Token::When, "'when'")?;
            self.expect(Token::LBrace, "'{'")?;
            let patterns = self.patterns()?;
            if patterns.is_empty() {
                return Err(self.unexpected("a pattern"));
            }
            self.expect(Token::RBrace, "'}'")?;
            self.expect(Token::Then, "'then'")?;
            self.expect(Token::LBrace, "'{'")?;
            let then = self.thing_statement()?;
            self.expect_semicolon()?;
            self.expect(Token::RBrace, "'}'")?;
            rule.when = Some(Conjunction::new(patterns));
            rule.then = Some(then);
        }
        self.expect_semicolon()?;
        Ok(rule)
    }

    // ============ Patterns ============

    fn patterns(&mut self) -> Result<Vec<Pattern>> {
        let mut patterns = Vec::new();
        while matches!(
            self.peek(),
            Some(
                Token::LBrace
                    | Token::Not
                    | Token::Var(_)
                    | Token::Ident(_)
                    | Token::LParen
            )
        ) {
            let pattern = self.pattern()?;
            self.expect_semicolon()?;
            patterns.push(pattern);
        }
        Ok(patterns)
    }

    fn pattern(&mut self) -> Result<Pattern> {
        match self.peek() {
            Some(Token::LBrace) => {
                let first = self.pattern_group()?;
                if self.peek() == Some(&Token::Or) {
                    let mut branches = vec![first];
                    while self.peek() == Some(&Token::Or) {
                        self.bump();
                        branches.push(self.pattern_group()?);
                    }
                    Ok(Pattern::Disjunction(Disjunction { branches }))
                } else {
                    // a braced group without `or` stays a conjunction
                    Ok(match first {
                        conjunction @ Pattern::Conjunction(_) => conjunction,
                        other => Pattern::Conjunction(Conjunction::new(vec![other])),
                    })
                }
            }
            Some(Token::Not) => {
                self.bump();
                let body = self.pattern_group()?;
                Ok(Pattern::Negation(Negation {
                    pattern: Box::new(body),
                }))
            }
            _ => Ok(Pattern::Statement(self.statement()?)),
        }
    }

    /// A braced pattern block; a single-pattern block collapses to that
    /// pattern.
    fn pattern_group(&mut self) -> Result<Pattern> {
        self.expect(Token::LBrace, "'{'")?;
        let patterns = self.patterns()?;
        if patterns.is_empty() {
            return Err(self.unexpected("a pattern"));
        }
        self.expect(Token::RBrace, "'}'")?;
        Ok(into_branch(patterns))
    }

    fn statement(&mut self) -> Result<Statement> {
        match (self.peek(), self.peek_at(1)) {
            (Some(Token::LParen), _) => Ok(Statement::Thing(self.thing_statement()?)),
            (
                Some(Token::Var(_)),
                Some(
                    Token::Sub
                    | Token::SubX
                    | Token::Type
                    | Token::Relates
                    | Token::Plays
                    | Token::Owns
                    | Token::Value
                    | Token::Regex
                    | Token::Abstract,
                ),
            ) => Ok(Statement::Type(self.type_statement()?)),
            (Some(Token::Var(_)), _) => Ok(Statement::Thing(self.thing_statement()?)),
            (Some(Token::Ident(_)), _) => Ok(Statement::Type(self.type_statement()?)),
            _ => Err(self.unexpected("a pattern")),
        }
    }

    // ============ Thing statements ============

    fn thing_statement(&mut self) -> Result<ThingStatement> {
        let variable = self.opt_variable();
        let mut statement = ThingStatement::new(variable);
        match self.peek() {
            Some(Token::LParen) => {
                let relation = self.relation_constraint()?;
                statement
                    .constraints
                    .push(ThingConstraint::Relation(relation));
                if matches!(self.peek(), Some(Token::Isa | Token::IsaX)) {
                    statement
                        .constraints
                        .push(ThingConstraint::Isa(self.isa_constraint()?));
                }
                self.has_chain(&mut statement)?;
            }
            Some(Token::Isa | Token::IsaX) => {
                statement
                    .constraints
                    .push(ThingConstraint::Isa(self.isa_constraint()?));
                self.has_chain(&mut statement)?;
            }
            Some(Token::Has) => {
                statement
                    .constraints
                    .push(ThingConstraint::Has(self.has_constraint()?));
                self.has_chain(&mut statement)?;
            }
            Some(Token::Is) => {
                self.bump();
                let other = self.variable()?;
                statement.constraints.push(ThingConstraint::Is(other));
            }
            Some(
                Token::Eq
                | Token::Neq
                | Token::Lt
                | Token::Lte
                | Token::Gt
                | Token::Gte
                | Token::Contains
                | Token::Like
                | Token::StringLit(_)
                | Token::Long(_)
                | Token::Double(_)
                | Token::Bool(_)
                | Token::DateTime(_),
            ) => {
                statement
                    .constraints
                    .push(ThingConstraint::Value(self.value_constraint()?));
                if matches!(self.peek(), Some(Token::Isa | Token::IsaX)) {
                    statement
                        .constraints
                        .push(ThingConstraint::Isa(self.isa_constraint()?));
                }
                self.has_chain(&mut statement)?;
            }
            _ => return Err(self.unexpected("a constraint")),
        }
        Ok(statement)
    }

    /// Further `has` constraints chained with commas.
    fn has_chain(&mut self, statement: &mut ThingStatement) -> Result<()> {
        while self.peek() == Some(&Token::Comma) {
            self.bump();
            if self.peek() == Some(&Token::Has) {
                statement
                    .constraints
                    .push(ThingConstraint::Has(self.has_constraint()?));
            } else {
                return Err(self.unexpected("'has'"));
            }
        }
        Ok(())
    }

    fn isa_constraint(&mut self) -> Result<IsaConstraint> {
        let explicit = self.peek() == Some(&Token::IsaX);
        self.bump();
        let type_ = self.type_ref()?;
        Ok(IsaConstraint { type_, explicit })
    }

    fn has_constraint(&mut self) -> Result<HasConstraint> {
        self.expect(Token::Has, "'has'")?;
        match self.peek() {
            Some(Token::Var(_)) => Ok(HasConstraint {
                attribute: None,
                value: HasValue::Variable(self.variable()?),
            }),
            Some(Token::Ident(_)) => {
                let attribute = self.ident()?;
                match self.peek() {
                    Some(Token::Var(_)) => Ok(HasConstraint {
                        attribute: Some(attribute),
                        value: HasValue::Variable(self.variable()?),
                    }),
                    _ => Ok(HasConstraint {
                        attribute: Some(attribute),
                        value: HasValue::Constraint(self.value_constraint()?),
                    }),
                }
            }
            _ => Err(self.unexpected("an attribute")),
        }
    }

    fn value_constraint(&mut self) -> Result<ValueConstraint> {
        let predicate = match self.peek() {
            Some(Token::Eq) => Some(Predicate::Eq),
            Some(Token::Neq) => Some(Predicate::Neq),
            Some(Token::Lt) => Some(Predicate::Lt),
            Some(Token::Lte) => Some(Predicate::Lte),
            Some(Token::Gt) => Some(Predicate::Gt),
            Some(Token::Gte) => Some(Predicate::Gte),
            Some(Token::Contains) => Some(Predicate::Contains),
            Some(Token::Like) => Some(Predicate::Like),
            _ => None,
        };
        let predicate = match predicate {
            Some(predicate) => {
                self.bump();
                predicate
            }
            None => Predicate::Eq, // bare literal
        };
        if predicate == Predicate::Like {
            // `like` payloads are strings with `\/` unescaped
            match self.peek().cloned() {
                Some(Token::StringLit(s)) => {
                    self.bump();
                    Ok(ValueConstraint::new(
                        Predicate::Like,
                        Value::String(literal::unescape_regex(&s)),
                    ))
                }
                _ => Err(self.unexpected("a quoted pattern")),
            }
        } else {
            let value = self.value()?;
            Ok(ValueConstraint::new(predicate, value))
        }
    }

    fn value(&mut self) -> Result<Value> {
        let value = match self.peek().cloned() {
            Some(Token::StringLit(s)) => Value::String(s),
            Some(Token::Long(v)) => Value::Long(v),
            Some(Token::Double(v)) => Value::Double(v),
            Some(Token::Bool(v)) => Value::Boolean(v),
            Some(Token::DateTime(v)) => Value::DateTime(v),
            Some(Token::Var(name)) => Value::Variable(named(name)),
            _ => return Err(self.unexpected("a value")),
        };
        self.bump();
        Ok(value)
    }

    fn relation_constraint(&mut self) -> Result<RelationConstraint> {
        self.expect(Token::LParen, "'('")?;
        let mut role_players = Vec::new();
        loop {
            role_players.push(self.role_player()?);
            match self.peek() {
                Some(Token::Comma) => self.bump(),
                Some(Token::RParen) => {
                    self.bump();
                    break;
                }
                _ => return Err(self.unexpected("',' or ')'")),
            }
        }
        Ok(RelationConstraint { role_players })
    }

    fn role_player(&mut self) -> Result<RolePlayer> {
        match (self.peek(), self.peek_at(1)) {
            (Some(Token::Ident(_)), _) => {
                let role = self.label()?;
                self.expect(Token::Colon, "':'")?;
                let player = self.variable()?;
                Ok(RolePlayer {
                    role: Some(TypeRef::Label(role)),
                    player,
                })
            }
            (Some(Token::Var(_)), Some(Token::Colon)) => {
                let role = self.variable()?;
                self.bump();
                let player = self.variable()?;
                Ok(RolePlayer {
                    role: Some(TypeRef::Variable(role)),
                    player,
                })
            }
            (Some(Token::Var(_)), _) => Ok(RolePlayer {
                role: None,
                player: self.variable()?,
            }),
            _ => Err(self.unexpected("a role player")),
        }
    }

    fn thing_statements(&mut self) -> Result<Vec<ThingStatement>> {
        let mut statements = Vec::new();
        while matches!(self.peek(), Some(Token::Var(_) | Token::LParen)) {
            let statement = self.thing_statement()?;
            self.expect_semicolon()?;
            statements.push(statement);
        }
        if statements.is_empty() {
            return Err(self.unexpected("a statement"));
        }
        Ok(statements)
    }

    // ============ Type statements ============

    fn type_statement(&mut self) -> Result<TypeStatement> {
        let subject = match self.peek() {
            Some(Token::Var(_)) => TypeRef::Variable(self.variable()?),
            Some(Token::Ident(_)) => TypeRef::Label(self.label()?),
            _ => return Err(self.unexpected("a type")),
        };
        let mut statement = TypeStatement::new(subject);
        statement.constraints.push(self.type_constraint()?);
        while self.peek() == Some(&Token::Comma) {
            self.bump();
            statement.constraints.push(self.type_constraint()?);
        }
        Ok(statement)
    }

    fn type_constraint(&mut self) -> Result<TypeConstraint> {
        match self.peek() {
            Some(Token::Sub | Token::SubX) => {
                let explicit = self.peek() == Some(&Token::SubX);
                self.bump();
                Ok(TypeConstraint::Sub(SubConstraint {
                    type_: self.type_ref()?,
                    explicit,
                }))
            }
            Some(Token::Type) => {
                self.bump();
                Ok(TypeConstraint::Type(self.label()?))
            }
            Some(Token::Abstract) => {
                self.bump();
                Ok(TypeConstraint::Abstract)
            }
            Some(Token::Owns) => {
                self.bump();
                let attribute = self.type_ref()?;
                let overridden = self.as_override()?;
                let mut annotations = Vec::new();
                while let Some(&Token::Annotation(annotation)) = self.peek() {
                    annotations.push(annotation);
                    self.bump();
                }
                Ok(TypeConstraint::Owns(OwnsConstraint {
                    attribute,
                    overridden,
                    annotations,
                }))
            }
            Some(Token::Relates) => {
                self.bump();
                Ok(TypeConstraint::Relates(RelatesConstraint {
                    role: self.type_ref()?,
                    overridden: self.as_override()?,
                }))
            }
            Some(Token::Plays) => {
                self.bump();
                Ok(TypeConstraint::Plays(PlaysConstraint {
                    role: self.type_ref()?,
                    overridden: self.as_override()?,
                }))
            }
            Some(Token::Value) => {
                self.bump();
                match self.peek().cloned() {
                    Some(Token::ValueType(value_type)) => {
                        self.bump();
                        Ok(TypeConstraint::ValueType(value_type))
                    }
                    _ => Err(self.unexpected("a value type")),
                }
            }
            Some(Token::Regex) => {
                self.bump();
                match self.peek().cloned() {
                    Some(Token::StringLit(s)) => {
                        self.bump();
                        Ok(TypeConstraint::Regex(literal::unescape_regex(&s)))
                    }
                    _ => Err(self.unexpected("a quoted pattern")),
                }
            }
            _ => Err(self.unexpected("a type constraint")),
        }
    }

    fn as_override(&mut self) -> Result<Option<TypeRef>> {
        if self.peek() == Some(&Token::As) {
            self.bump();
            Ok(Some(self.type_ref()?))
        } else {
            Ok(None)
        }
    }

    // ============ Modifiers and reductions ============

    fn modifiers(&mut self) -> Result<Modifiers> {
        let mut modifiers = Modifiers::default();
        if self.peek() == Some(&Token::Get) {
            self.bump();
            loop {
                modifiers.filter.push(self.variable()?);
                match self.peek() {
                    Some(Token::Comma) => self.bump(),
                    _ => break,
                }
            }
            self.expect_semicolon()?;
        }
        if self.peek() == Some(&Token::Sort) {
            self.bump();
            loop {
                let variable = self.variable()?;
                let order = match self.peek() {
                    Some(Token::Asc) => {
                        self.bump();
                        Some(SortOrder::Asc)
                    }
                    Some(Token::Desc) => {
                        self.bump();
                        Some(SortOrder::Desc)
                    }
                    _ => None,
                };
                modifiers.sorting.push(SortKey { variable, order });
                match self.peek() {
                    Some(Token::Comma) => self.bump(),
                    _ => break,
                }
            }
            self.expect_semicolon()?;
        }
        if self.peek() == Some(&Token::Offset) {
            self.bump();
            let offset = self.unsigned("offset")?;
            modifiers.offset = Some(offset);
            self.expect_semicolon()?;
        }
        if self.peek() == Some(&Token::Limit) {
            self.bump();
            let limit = self.unsigned("limit")?;
            if limit == 0 {
                return Err(TypeQLError::structural("limit must be positive"));
            }
            modifiers.limit = Some(limit);
            self.expect_semicolon()?;
        }
        Ok(modifiers)
    }

    fn unsigned(&mut self, clause: &str) -> Result<u64> {
        match self.peek().cloned() {
            Some(Token::Long(v)) => {
                if v < 0 {
                    return Err(TypeQLError::structural(format!(
                        "{} cannot be negative",
                        clause
                    )));
                }
                self.bump();
                Ok(v as u64)
            }
            _ => Err(self.unexpected("a non-negative integer")),
        }
    }

    fn reduction(&mut self) -> Result<Option<Reduction>> {
        if let Some(method) = self.aggregate_method() {
            let aggregate = self.aggregate(method)?;
            return Ok(Some(Reduction::Aggregate(aggregate)));
        }
        if self.peek() == Some(&Token::Group) {
            self.bump();
            let variable = match self.peek() {
                Some(Token::Var(_)) => self.variable()?,
                _ => {
                    return Err(TypeQLError::structural(
                        "the group clause requires a variable",
                    ));
                }
            };
            self.expect_semicolon()?;
            let aggregate = match self.aggregate_method() {
                Some(method) => Some(self.aggregate(method)?),
                None => None,
            };
            return Ok(Some(Reduction::Group(GroupClause {
                variable,
                aggregate,
            })));
        }
        Ok(None)
    }

    fn aggregate_method(&self) -> Option<AggregateMethod> {
        match self.peek() {
            Some(Token::Count) => Some(AggregateMethod::Count),
            Some(Token::Sum) => Some(AggregateMethod::Sum),
            Some(Token::Max) => Some(AggregateMethod::Max),
            Some(Token::Min) => Some(AggregateMethod::Min),
            Some(Token::Mean) => Some(AggregateMethod::Mean),
            Some(Token::Median) => Some(AggregateMethod::Median),
            Some(Token::Std) => Some(AggregateMethod::Std),
            _ => None,
        }
    }

    fn aggregate(&mut self, method: AggregateMethod) -> Result<Aggregate> {
        self.bump();
        let variable = match self.peek() {
            Some(Token::Var(_)) => Some(self.variable()?),
            _ => None,
        };
        match (&variable, method.takes_variable()) {
            (Some(_), false) => {
                return Err(TypeQLError::structural(
                    "the count aggregate does not take a variable",
                ));
            }
            (None, true) => {
                return Err(TypeQLError::structural(format!(
                    "the '{}' aggregate requires a variable",
                    method
                )));
            }
            _ => {}
        }
        self.expect_semicolon()?;
        Ok(Aggregate { method, variable })
    }
}
