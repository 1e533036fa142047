//! Query AST for TypeQL
//!
//! The six query forms plus the modifier and reduction clauses that can
//! trail a `match`. Construction goes through the parser or the builder;
//! both run the same scope validation, so a `Query` in hand is well-formed.

use std::fmt;

use crate::error::{Result, TypeQLError};
use crate::pattern::{Conjunction, ThingStatement, TypeStatement, Variable};
use crate::pretty;

/// A schema rule: `rule label: when { ... } then { ... };`. Inside an
/// `undefine`, only the label is given and `when`/`then` stay empty.
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    pub label: String,
    pub when: Option<Conjunction>,
    pub then: Option<ThingStatement>,
}

impl Rule {
    pub fn new(label: impl Into<String>) -> Rule {
        Rule {
            label: label.into(),
            when: None,
            then: None,
        }
    }

    pub fn when(mut self, when: impl Into<Conjunction>) -> Rule {
        self.when = Some(when.into());
        self
    }

    pub fn then(mut self, then: ThingStatement) -> Rule {
        self.then = Some(then);
        self
    }
}

/// One entry of a `define` or `undefine`.
#[derive(Clone, Debug, PartialEq)]
pub enum Definable {
    Type(TypeStatement),
    Rule(Rule),
}

impl From<TypeStatement> for Definable {
    fn from(s: TypeStatement) -> Self {
        Definable::Type(s)
    }
}

impl From<Rule> for Definable {
    fn from(r: Rule) -> Self {
        Definable::Rule(r)
    }
}

/// `sort` direction; omitted direction defaults server-side to ascending.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SortKey {
    pub variable: Variable,
    pub order: Option<SortOrder>,
}

impl From<&str> for SortKey {
    fn from(name: &str) -> Self {
        SortKey {
            variable: Variable::from(name),
            order: None,
        }
    }
}

impl From<(&str, SortOrder)> for SortKey {
    fn from((name, order): (&str, SortOrder)) -> Self {
        SortKey {
            variable: Variable::from(name),
            order: Some(order),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.variable)?;
        if let Some(order) = self.order {
            write!(f, " {}", order)?;
        }
        Ok(())
    }
}

/// The answer-shaping clauses of a match query, all optional.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Modifiers {
    pub filter: Vec<Variable>,
    pub sorting: Vec<SortKey>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateMethod {
    Count,
    Sum,
    Max,
    Min,
    Mean,
    Median,
    Std,
}

impl AggregateMethod {
    pub(crate) fn takes_variable(&self) -> bool {
        !matches!(self, AggregateMethod::Count)
    }
}

impl fmt::Display for AggregateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateMethod::Count => "count",
            AggregateMethod::Sum => "sum",
            AggregateMethod::Max => "max",
            AggregateMethod::Min => "min",
            AggregateMethod::Mean => "mean",
            AggregateMethod::Median => "median",
            AggregateMethod::Std => "std",
        };
        write!(f, "{}", name)
    }
}

/// `count;` or `sum $x;` and friends. `count` takes no variable, every
/// other method requires one.
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregate {
    pub method: AggregateMethod,
    pub variable: Option<Variable>,
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method)?;
        if let Some(variable) = &self.variable {
            write!(f, " {}", variable)?;
        }
        write!(f, ";")
    }
}

/// `group $x;` with an optional trailing aggregate per group.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupClause {
    pub variable: Variable,
    pub aggregate: Option<Aggregate>,
}

/// The reduction that can close a match query.
#[derive(Clone, Debug, PartialEq)]
pub enum Reduction {
    Aggregate(Aggregate),
    Group(GroupClause),
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatchQuery {
    pub conjunction: Conjunction,
    pub modifiers: Modifiers,
    pub reduction: Option<Reduction>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InsertQuery {
    /// Present for `match ... insert ...`, absent for a bare `insert`.
    pub match_clause: Option<Conjunction>,
    pub statements: Vec<ThingStatement>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeleteQuery {
    pub match_clause: Conjunction,
    pub statements: Vec<ThingStatement>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateQuery {
    pub match_clause: Conjunction,
    pub deletes: Vec<ThingStatement>,
    pub inserts: Vec<ThingStatement>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DefineQuery {
    pub definables: Vec<Definable>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UndefineQuery {
    pub definables: Vec<Definable>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Query {
    Match(MatchQuery),
    Insert(InsertQuery),
    Delete(DeleteQuery),
    Update(UpdateQuery),
    Define(DefineQuery),
    Undefine(UndefineQuery),
}

impl Query {
    pub fn is_match(&self) -> bool {
        matches!(self, Query::Match(_))
    }

    pub fn into_match(self) -> Result<MatchQuery> {
        match self {
            Query::Match(q) => Ok(q),
            _ => Err(TypeQLError::TypeMismatch { expected: "match query" }),
        }
    }

    pub fn into_insert(self) -> Result<InsertQuery> {
        match self {
            Query::Insert(q) => Ok(q),
            _ => Err(TypeQLError::TypeMismatch { expected: "insert query" }),
        }
    }

    pub fn into_delete(self) -> Result<DeleteQuery> {
        match self {
            Query::Delete(q) => Ok(q),
            _ => Err(TypeQLError::TypeMismatch { expected: "delete query" }),
        }
    }

    pub fn into_update(self) -> Result<UpdateQuery> {
        match self {
            Query::Update(q) => Ok(q),
            _ => Err(TypeQLError::TypeMismatch { expected: "update query" }),
        }
    }

    pub fn into_define(self) -> Result<DefineQuery> {
        match self {
            Query::Define(q) => Ok(q),
            _ => Err(TypeQLError::TypeMismatch { expected: "define query" }),
        }
    }

    pub fn into_undefine(self) -> Result<UndefineQuery> {
        match self {
            Query::Undefine(q) => Ok(q),
            _ => Err(TypeQLError::TypeMismatch { expected: "undefine query" }),
        }
    }
}

impl From<MatchQuery> for Query {
    fn from(q: MatchQuery) -> Self {
        Query::Match(q)
    }
}

impl From<InsertQuery> for Query {
    fn from(q: InsertQuery) -> Self {
        Query::Insert(q)
    }
}

impl From<DeleteQuery> for Query {
    fn from(q: DeleteQuery) -> Self {
        Query::Delete(q)
    }
}

impl From<UpdateQuery> for Query {
    fn from(q: UpdateQuery) -> Self {
        Query::Update(q)
    }
}

impl From<DefineQuery> for Query {
    fn from(q: DefineQuery) -> Self {
        Query::Define(q)
    }
}

impl From<UndefineQuery> for Query {
    fn from(q: UndefineQuery) -> Self {
        Query::Undefine(q)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", pretty::print_query(self))
    }
}

impl fmt::Display for MatchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", pretty::print_match_query(self))
    }
}

impl fmt::Display for InsertQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", pretty::print_insert_query(self))
    }
}

impl fmt::Display for DeleteQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", pretty::print_delete_query(self))
    }
}

impl fmt::Display for UpdateQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", pretty::print_update_query(self))
    }
}

impl fmt::Display for DefineQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", pretty::print_define_query(self))
    }
}

impl fmt::Display for UndefineQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", pretty::print_undefine_query(self))
    }
}
