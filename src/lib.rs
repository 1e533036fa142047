//! TypeQL: parser, AST and canonical printer for the TypeQL query language
//!
//! Query text is lexed, parsed into an immutable typed AST, validated for
//! variable scope, and can be rendered back into its one canonical form.
//! The same AST can be assembled programmatically through the builder API
//! and compares structurally equal to the parsed equivalent.

pub mod builder;
pub mod error;
pub mod lexer;
mod literal;
mod parser;
pub mod pattern;
mod pretty;
pub mod query;
mod scope;

pub use builder::{
    contains, eq, gt, gte, like, lt, lte, neq, not, rel, rule, type_, var, UnboundVariable,
};
pub use error::{Result, TypeQLError};
pub use parser::Queries;
pub use pattern::*;
pub use query::*;

/// Parse a single query; trailing tokens after the query are an error.
pub fn parse_query(query: &str) -> Result<Query> {
    parser::parse_query(query)
}

/// Lazily parse a `;`-separated sequence of queries. The iterator yields
/// queries until the input is exhausted or a query fails; after the first
/// failure it yields nothing further.
pub fn parse_queries(queries: &str) -> Queries<'_> {
    parser::parse_queries(queries)
}

/// Parse a single pattern, as found inside a `match` or rule `when` body.
/// Scope validation is not applied; the pattern may reference variables
/// bound elsewhere.
pub fn parse_pattern(pattern: &str) -> Result<Pattern> {
    parser::parse_pattern(pattern)
}
