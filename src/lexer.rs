//! Lexer for TypeQL
//!
//! Tokenizes query text into a stream for the parser. Literal values are
//! normalized here: date-times collapse to millisecond precision (finer
//! fractions are rejected), longs and doubles are parsed, and string
//! literals keep their inner text verbatim, escapes included.

use chumsky::prelude::*;
use std::ops::Range;

use chrono::NaiveDateTime;

use crate::literal;
use crate::pattern::{Annotation, ValueType};

/// Token types for TypeQL
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    // Query keywords
    Match,
    Insert,
    Delete,
    Update,
    Define,
    Undefine,

    // Modifier keywords
    Get,
    Sort,
    Asc,
    Desc,
    Offset,
    Limit,

    // Aggregate keywords
    Count,
    Sum,
    Max,
    Min,
    Mean,
    Median,
    Std,
    Group,

    // Constraint keywords
    Isa,
    IsaX, // isa!
    Sub,
    SubX, // sub!
    Type,
    Has,
    Relates,
    Plays,
    Owns,
    Value,
    Regex,
    Abstract,
    As,
    Is,
    Not,
    Or,
    Rule,
    When,
    Then,
    Contains,
    Like,

    // Names and literals
    Ident(String),
    Var(String),
    StringLit(String),
    Long(i64),
    Double(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    ValueType(ValueType),
    Annotation(Annotation),

    // Punctuation
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    Semicolon, // ;
    Colon,     // :
    Comma,     // ,

    // Predicates
    Eq,  // =
    Neq, // !=
    Lt,  // <
    Lte, // <=
    Gt,  // >
    Gte, // >=
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Match => write!(f, "match"),
            Token::Insert => write!(f, "insert"),
            Token::Delete => write!(f, "delete"),
            Token::Update => write!(f, "update"),
            Token::Define => write!(f, "define"),
            Token::Undefine => write!(f, "undefine"),
            Token::Get => write!(f, "get"),
            Token::Sort => write!(f, "sort"),
            Token::Asc => write!(f, "asc"),
            Token::Desc => write!(f, "desc"),
            Token::Offset => write!(f, "offset"),
            Token::Limit => write!(f, "limit"),
            Token::Count => write!(f, "count"),
            Token::Sum => write!(f, "sum"),
            Token::Max => write!(f, "max"),
            Token::Min => write!(f, "min"),
            Token::Mean => write!(f, "mean"),
            Token::Median => write!(f, "median"),
            Token::Std => write!(f, "std"),
            Token::Group => write!(f, "group"),
            Token::Isa => write!(f, "isa"),
            Token::IsaX => write!(f, "isa!"),
            Token::Sub => write!(f, "sub"),
            Token::SubX => write!(f, "sub!"),
            Token::Type => write!(f, "type"),
            Token::Has => write!(f, "has"),
            Token::Relates => write!(f, "relates"),
            Token::Plays => write!(f, "plays"),
            Token::Owns => write!(f, "owns"),
            Token::Value => write!(f, "value"),
            Token::Regex => write!(f, "regex"),
            Token::Abstract => write!(f, "abstract"),
            Token::As => write!(f, "as"),
            Token::Is => write!(f, "is"),
            Token::Not => write!(f, "not"),
            Token::Or => write!(f, "or"),
            Token::Rule => write!(f, "rule"),
            Token::When => write!(f, "when"),
            Token::Then => write!(f, "then"),
            Token::Contains => write!(f, "contains"),
            Token::Like => write!(f, "like"),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Var(s) => write!(f, "${}", s),
            Token::StringLit(s) => write!(f, "\"{}\"", s),
            Token::Long(v) => write!(f, "{}", v),
            Token::Double(v) => write!(f, "{}", v),
            Token::Bool(v) => write!(f, "{}", v),
            Token::DateTime(v) => write!(f, "{}", literal::format_date_time(v)),
            Token::ValueType(v) => write!(f, "{}", v),
            Token::Annotation(a) => write!(f, "{}", a),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Semicolon => write!(f, ";"),
            Token::Colon => write!(f, ":"),
            Token::Comma => write!(f, ","),
            Token::Eq => write!(f, "="),
            Token::Neq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Lte => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Gte => write!(f, ">="),
        }
    }
}

/// Type alias for spans
pub type Span = Range<usize>;

fn keyword(word: &str, explicit: bool) -> Option<Token> {
    let token = match (word, explicit) {
        ("isa", true) => Token::IsaX,
        ("sub", true) => Token::SubX,
        (_, true) => return None,
        ("match", _) => Token::Match,
        ("insert", _) => Token::Insert,
        ("delete", _) => Token::Delete,
        ("update", _) => Token::Update,
        ("define", _) => Token::Define,
        ("undefine", _) => Token::Undefine,
        ("get", _) => Token::Get,
        ("sort", _) => Token::Sort,
        ("asc", _) => Token::Asc,
        ("desc", _) => Token::Desc,
        ("offset", _) => Token::Offset,
        ("limit", _) => Token::Limit,
        ("count", _) => Token::Count,
        ("sum", _) => Token::Sum,
        ("max", _) => Token::Max,
        ("min", _) => Token::Min,
        ("mean", _) => Token::Mean,
        ("median", _) => Token::Median,
        ("std", _) => Token::Std,
        ("group", _) => Token::Group,
        ("isa", _) => Token::Isa,
        ("sub", _) => Token::Sub,
        ("type", _) => Token::Type,
        ("has", _) => Token::Has,
        ("relates", _) => Token::Relates,
        ("plays", _) => Token::Plays,
        ("owns", _) => Token::Owns,
        ("value", _) => Token::Value,
        ("regex", _) => Token::Regex,
        ("abstract", _) => Token::Abstract,
        ("as", _) => Token::As,
        ("is", _) => Token::Is,
        ("not", _) => Token::Not,
        ("or", _) => Token::Or,
        ("rule", _) => Token::Rule,
        ("when", _) => Token::When,
        ("then", _) => Token::Then,
        ("contains", _) => Token::Contains,
        ("like", _) => Token::Like,
        ("true", _) => Token::Bool(true),
        ("false", _) => Token::Bool(false),
        ("boolean", _) => Token::ValueType(ValueType::Boolean),
        ("datetime", _) => Token::ValueType(ValueType::DateTime),
        ("double", _) => Token::ValueType(ValueType::Double),
        ("long", _) => Token::ValueType(ValueType::Long),
        ("string", _) => Token::ValueType(ValueType::String),
        (other, _) => Token::Ident(other.to_string()),
    };
    Some(token)
}

/// A quoted string literal. The inner text is kept verbatim: an escape
/// sequence contributes both the backslash and the escaped character, so
/// printing can reproduce the source exactly.
fn quoted(delim: char) -> impl Parser<char, String, Error = Simple<char>> + Clone {
    let escape = just('\\').ignore_then(any()).map(|c| vec!['\\', c]);
    let plain = filter(move |c: &char| *c != delim && *c != '\\' && *c != '\n').map(|c| vec![c]);
    just(delim)
        .ignore_then(escape.or(plain).repeated())
        .then_ignore(just(delim))
        .map(|chunks: Vec<Vec<char>>| chunks.into_iter().flatten().collect())
}

/// Create a lexer for TypeQL
pub fn lexer() -> impl Parser<char, Vec<(Token, Span)>, Error = Simple<char>> {
    let digit = |c: &char| c.is_ascii_digit();
    let digits2 = || filter(digit).repeated().exactly(2).collect::<String>();

    // Date-times are tried before plain numbers so that `1986-03-03` is one
    // literal rather than three. Validation (rather than a fallible map)
    // keeps over-precise fractions from backtracking into the number rule.
    let date = one_of("+-")
        .or_not()
        .then(filter(digit).repeated().at_least(4).collect::<String>())
        .then_ignore(just('-'))
        .then(digits2())
        .then_ignore(just('-'))
        .then(digits2());
    let time = just('T')
        .ignore_then(digits2())
        .then_ignore(just(':'))
        .then(digits2())
        .then(
            just(':')
                .ignore_then(digits2())
                .then(
                    just('.')
                        .ignore_then(filter(digit).repeated().at_least(1).collect::<String>())
                        .or_not(),
                )
                .or_not(),
        );
    let date_time = date.then(time.or_not()).validate(
        |((((sign, year), month), day), time), span: Span, emit| {
            match literal::normalize_date_time(sign, &year, &month, &day, time) {
                Ok(dt) => Token::DateTime(dt),
                Err(message) => {
                    emit(Simple::custom(span, message));
                    Token::DateTime(NaiveDateTime::default())
                }
            }
        },
    );

    // A fractional part and/or an exponent makes the literal a double.
    let exponent = one_of("eE")
        .ignore_then(one_of("+-").or_not())
        .then(filter(digit).repeated().at_least(1).collect::<String>());
    let number = one_of("+-")
        .or_not()
        .then(filter(digit).repeated().at_least(1).collect::<String>())
        .then(
            just('.')
                .ignore_then(filter(digit).repeated().at_least(1).collect::<String>())
                .or_not(),
        )
        .then(exponent.or_not())
        .validate(|(((sign, whole), fraction), exponent), span: Span, emit| {
            let mut raw = String::new();
            if let Some(sign) = sign {
                raw.push(sign);
            }
            raw.push_str(&whole);
            if let Some(fraction) = &fraction {
                raw.push('.');
                raw.push_str(fraction);
            }
            if let Some((exp_sign, exp_digits)) = &exponent {
                raw.push('e');
                if let Some(exp_sign) = exp_sign {
                    raw.push(*exp_sign);
                }
                raw.push_str(exp_digits);
            }
            if fraction.is_some() || exponent.is_some() {
                match raw.parse::<f64>() {
                    Ok(v) if v.is_finite() => Token::Double(v),
                    _ => {
                        emit(Simple::custom(
                            span,
                            format!("no viable alternative at input '{}'", raw),
                        ));
                        Token::Double(0.0)
                    }
                }
            } else {
                match raw.parse::<i64>() {
                    Ok(v) => Token::Long(v),
                    Err(_) => {
                        emit(Simple::custom(
                            span,
                            format!("no viable alternative at input '{}'", raw),
                        ));
                        Token::Long(0)
                    }
                }
            }
        });

    let string_lit = quoted('"').or(quoted('\'')).map(Token::StringLit);

    let variable = just('$')
        .ignore_then(
            filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
                .repeated()
                .at_least(1)
                .collect::<String>(),
        )
        .map(Token::Var);

    let ident = filter(|c: &char| c.is_ascii_alphabetic() || *c == '_')
        .chain::<char, _, _>(
            filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_' || *c == '-').repeated(),
        )
        .collect::<String>();

    let annotation = just('@')
        .ignore_then(ident.clone())
        .validate(|name, span: Span, emit| match name.as_str() {
            "key" => Token::Annotation(Annotation::Key),
            "unique" => Token::Annotation(Annotation::Unique),
            _ => {
                emit(Simple::custom(span, format!("unknown annotation '@{}'", name)));
                Token::Annotation(Annotation::Key)
            }
        });

    // `isa!` and `sub!` are the only words that may carry a trailing bang
    let keyword_or_ident = ident.then(just('!').or_not()).validate(
        |(word, bang): (String, Option<char>), span: Span, emit| match keyword(
            &word,
            bang.is_some(),
        ) {
            Some(token) => token,
            None => {
                emit(Simple::custom(
                    span,
                    format!("unexpected character '!' after '{}'", word),
                ));
                Token::Ident(word)
            }
        },
    );

    let operator = choice((
        just("!=").to(Token::Neq),
        just("<=").to(Token::Lte),
        just(">=").to(Token::Gte),
        just('<').to(Token::Lt),
        just('>').to(Token::Gt),
        just('=').to(Token::Eq),
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just('{').to(Token::LBrace),
        just('}').to(Token::RBrace),
        just(';').to(Token::Semicolon),
        just(':').to(Token::Colon),
        just(',').to(Token::Comma),
    ));

    let token = choice((
        date_time,
        number,
        string_lit,
        variable,
        annotation,
        keyword_or_ident,
        operator,
    ));

    // Comments: # to end of line
    let comment = just('#').then(none_of('\n').repeated()).ignored();

    // Token OR comment - comments produce None, tokens produce Some
    let token_or_skip = comment.to(None).or(token.map(Some));

    token_or_skip
        .map_with_span(|opt_tok, span| opt_tok.map(|tok| (tok, span)))
        .padded()
        .repeated()
        .then_ignore(end())
        .map(|items| items.into_iter().flatten().collect())
}
