//! Pattern AST for TypeQL
//!
//! Patterns are what goes between `match` and the modifiers: statements
//! about thing or type variables, grouped by conjunction, disjunction and
//! negation. All nodes are plain data; printing lives in [`crate::pretty`]
//! and scope checking in the query validators.

use std::fmt;

use chrono::{NaiveDateTime, Timelike};

use crate::error::{Result, TypeQLError};
use crate::literal;

/// A query variable. Anonymous variables (`$_`) are all structurally
/// equal; equality between a built and a parsed pattern relies on that.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Variable {
    Named(String),
    Anonymous,
}

impl Variable {
    pub fn is_named(&self) -> bool {
        matches!(self, Variable::Named(_))
    }
}

impl From<&str> for Variable {
    fn from(name: &str) -> Self {
        Variable::Named(name.to_string())
    }
}

impl From<String> for Variable {
    fn from(name: String) -> Self {
        Variable::Named(name)
    }
}

impl From<()> for Variable {
    fn from(_: ()) -> Self {
        Variable::Anonymous
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Named(name) => write!(f, "${}", name),
            Variable::Anonymous => write!(f, "$_"),
        }
    }
}

/// A type label, optionally scoped to a relation (`marriage:spouse`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Label {
    pub scope: Option<String>,
    pub name: String,
}

impl From<&str> for Label {
    fn from(name: &str) -> Self {
        Label {
            scope: None,
            name: name.to_string(),
        }
    }
}

impl From<(&str, &str)> for Label {
    fn from((scope, name): (&str, &str)) -> Self {
        Label {
            scope: Some(scope.to_string()),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{}:{}", scope, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Either a concrete label or a variable standing for a type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Label(Label),
    Variable(Variable),
}

impl TypeRef {
    pub fn variable(&self) -> Option<&Variable> {
        match self {
            TypeRef::Variable(v) => Some(v),
            TypeRef::Label(_) => None,
        }
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::Label(Label::from(name))
    }
}

impl From<(&str, &str)> for TypeRef {
    fn from(scoped: (&str, &str)) -> Self {
        TypeRef::Label(Label::from(scoped))
    }
}

impl From<Label> for TypeRef {
    fn from(label: Label) -> Self {
        TypeRef::Label(label)
    }
}

impl From<Variable> for TypeRef {
    fn from(variable: Variable) -> Self {
        TypeRef::Variable(variable)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Label(label) => write!(f, "{}", label),
            TypeRef::Variable(variable) => write!(f, "{}", variable),
        }
    }
}

/// Attribute value types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    Boolean,
    DateTime,
    Double,
    Long,
    String,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Boolean => "boolean",
            ValueType::DateTime => "datetime",
            ValueType::Double => "double",
            ValueType::Long => "long",
            ValueType::String => "string",
        };
        write!(f, "{}", name)
    }
}

/// Ownership annotations (`owns name @key;`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Annotation {
    Key,
    Unique,
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Annotation::Key => write!(f, "@key"),
            Annotation::Unique => write!(f, "@unique"),
        }
    }
}

/// A literal or variable value appearing in a predicate.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(String),
    Boolean(bool),
    Long(i64),
    Double(f64),
    DateTime(NaiveDateTime),
    Variable(Variable),
}

impl Value {
    /// Checked constructor for date-time values: anything finer than a
    /// millisecond is not representable in the language.
    pub fn date_time(value: NaiveDateTime) -> Result<Value> {
        if value.nanosecond() % 1_000_000 != 0 {
            return Err(TypeQLError::Precision {
                value: value.to_string(),
            });
        }
        Ok(Value::DateTime(value))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Value::Variable(_))
    }

    pub(crate) fn variable(&self) -> Option<&Variable> {
        match self {
            Value::Variable(v) => Some(v),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Long(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<Variable> for Value {
    fn from(v: Variable) -> Self {
        Value::Variable(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", literal::quote(s)),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Long(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", literal::format_double(*v)),
            Value::DateTime(dt) => write!(f, "{}", literal::format_date_time(dt)),
            Value::Variable(v) => write!(f, "{}", v),
        }
    }
}

/// Comparison predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Predicate {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    Like,
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Predicate::Eq => "=",
            Predicate::Neq => "!=",
            Predicate::Lt => "<",
            Predicate::Lte => "<=",
            Predicate::Gt => ">",
            Predicate::Gte => ">=",
            Predicate::Contains => "contains",
            Predicate::Like => "like",
        };
        write!(f, "{}", symbol)
    }
}

/// A predicate applied to a value: `>= 1986-03-03T00:00`, `like "..."`,
/// or a bare literal (equality with the `=` elided).
#[derive(Clone, Debug, PartialEq)]
pub struct ValueConstraint {
    pub predicate: Predicate,
    pub value: Value,
}

impl ValueConstraint {
    pub fn new(predicate: Predicate, value: Value) -> ValueConstraint {
        ValueConstraint { predicate, value }
    }
}

impl fmt::Display for ValueConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.predicate, &self.value) {
            // equality with a literal prints as the bare literal
            (Predicate::Eq, value) if !value.is_variable() => write!(f, "{}", value),
            (Predicate::Like, Value::String(s)) => {
                write!(f, "like {}", literal::quote(&literal::escape_regex(s)))
            }
            (predicate, value) => write!(f, "{} {}", predicate, value),
        }
    }
}

/// The payload of a `has` constraint.
#[derive(Clone, Debug, PartialEq)]
pub enum HasValue {
    /// `has title $t`, or `has $a` when no attribute type is named
    Variable(Variable),
    /// `has title "Godfather"`, `has rating >= 8.0`, `has age = $y`
    Constraint(ValueConstraint),
}

#[derive(Clone, Debug, PartialEq)]
pub struct HasConstraint {
    pub attribute: Option<String>,
    pub value: HasValue,
}

impl fmt::Display for HasConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "has")?;
        if let Some(attribute) = &self.attribute {
            write!(f, " {}", attribute)?;
        }
        match &self.value {
            HasValue::Variable(v) => write!(f, " {}", v),
            HasValue::Constraint(c) => write!(f, " {}", c),
        }
    }
}

/// One `role: $player` (or bare `$player`) entry of a relation.
#[derive(Clone, Debug, PartialEq)]
pub struct RolePlayer {
    pub role: Option<TypeRef>,
    pub player: Variable,
}

impl fmt::Display for RolePlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.role {
            Some(role) => write!(f, "{}: {}", role, self.player),
            None => write!(f, "{}", self.player),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RelationConstraint {
    pub role_players: Vec<RolePlayer>,
}

impl fmt::Display for RelationConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, rp) in self.role_players.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", rp)?;
        }
        write!(f, ")")
    }
}

/// `isa movie` / `isa! movie`.
#[derive(Clone, Debug, PartialEq)]
pub struct IsaConstraint {
    pub type_: TypeRef,
    pub explicit: bool,
}

impl fmt::Display for IsaConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = if self.explicit { "isa!" } else { "isa" };
        write!(f, "{} {}", keyword, self.type_)
    }
}

/// Constraints that can hang off a thing variable.
#[derive(Clone, Debug, PartialEq)]
pub enum ThingConstraint {
    Isa(IsaConstraint),
    Has(HasConstraint),
    Relation(RelationConstraint),
    Value(ValueConstraint),
    Is(Variable),
}

impl fmt::Display for ThingConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThingConstraint::Isa(c) => write!(f, "{}", c),
            ThingConstraint::Has(c) => write!(f, "{}", c),
            ThingConstraint::Relation(c) => write!(f, "{}", c),
            ThingConstraint::Value(c) => write!(f, "{}", c),
            ThingConstraint::Is(v) => write!(f, "is {}", v),
        }
    }
}

/// A statement about a data instance: a subject variable plus its
/// constraints in source order.
#[derive(Clone, Debug, PartialEq)]
pub struct ThingStatement {
    pub variable: Variable,
    pub constraints: Vec<ThingConstraint>,
}

impl ThingStatement {
    pub(crate) fn new(variable: Variable) -> ThingStatement {
        ThingStatement {
            variable,
            constraints: Vec::new(),
        }
    }

    /// Every variable mentioned by this statement, subject included.
    pub fn variables(&self) -> Vec<Variable> {
        let mut out = vec![self.variable.clone()];
        for constraint in &self.constraints {
            match constraint {
                ThingConstraint::Isa(isa) => {
                    if let Some(v) = isa.type_.variable() {
                        out.push(v.clone());
                    }
                }
                ThingConstraint::Has(has) => match &has.value {
                    HasValue::Variable(v) => out.push(v.clone()),
                    HasValue::Constraint(c) => {
                        if let Some(v) = c.value.variable() {
                            out.push(v.clone());
                        }
                    }
                },
                ThingConstraint::Relation(rel) => {
                    for rp in &rel.role_players {
                        if let Some(v) = rp.role.as_ref().and_then(TypeRef::variable) {
                            out.push(v.clone());
                        }
                        out.push(rp.player.clone());
                    }
                }
                ThingConstraint::Value(c) => {
                    if let Some(v) = c.value.variable() {
                        out.push(v.clone());
                    }
                }
                ThingConstraint::Is(v) => out.push(v.clone()),
            }
        }
        out
    }

    pub(crate) fn has_relation(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, ThingConstraint::Relation(_)))
    }
}

impl fmt::Display for ThingStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::pretty::print_thing_statement(self, 0))
    }
}

/// `sub`/`sub!` with its supertype.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubConstraint {
    pub type_: TypeRef,
    pub explicit: bool,
}

/// `owns attribute (as overridden)? @annotations*`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnsConstraint {
    pub attribute: TypeRef,
    pub overridden: Option<TypeRef>,
    pub annotations: Vec<Annotation>,
}

/// `relates role (as overridden)?`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelatesConstraint {
    pub role: TypeRef,
    pub overridden: Option<TypeRef>,
}

/// `plays relation:role (as overridden)?`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaysConstraint {
    pub role: TypeRef,
    pub overridden: Option<TypeRef>,
}

/// Constraints that can hang off a type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeConstraint {
    Sub(SubConstraint),
    Type(Label),
    Abstract,
    Owns(OwnsConstraint),
    Relates(RelatesConstraint),
    Plays(PlaysConstraint),
    ValueType(ValueType),
    Regex(String),
}

impl fmt::Display for TypeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeConstraint::Sub(sub) => {
                let keyword = if sub.explicit { "sub!" } else { "sub" };
                write!(f, "{} {}", keyword, sub.type_)
            }
            TypeConstraint::Type(label) => write!(f, "type {}", label),
            TypeConstraint::Abstract => write!(f, "abstract"),
            TypeConstraint::Owns(owns) => {
                write!(f, "owns {}", owns.attribute)?;
                if let Some(overridden) = &owns.overridden {
                    write!(f, " as {}", overridden)?;
                }
                for annotation in &owns.annotations {
                    write!(f, " {}", annotation)?;
                }
                Ok(())
            }
            TypeConstraint::Relates(relates) => {
                write!(f, "relates {}", relates.role)?;
                if let Some(overridden) = &relates.overridden {
                    write!(f, " as {}", overridden)?;
                }
                Ok(())
            }
            TypeConstraint::Plays(plays) => {
                write!(f, "plays {}", plays.role)?;
                if let Some(overridden) = &plays.overridden {
                    write!(f, " as {}", overridden)?;
                }
                Ok(())
            }
            TypeConstraint::ValueType(vt) => write!(f, "value {}", vt),
            TypeConstraint::Regex(pattern) => {
                write!(f, "regex {}", literal::quote(&literal::escape_regex(pattern)))
            }
        }
    }
}

/// A statement about a schema type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeStatement {
    pub subject: TypeRef,
    pub constraints: Vec<TypeConstraint>,
}

impl TypeStatement {
    pub(crate) fn new(subject: TypeRef) -> TypeStatement {
        TypeStatement {
            subject,
            constraints: Vec::new(),
        }
    }

    pub fn variables(&self) -> Vec<Variable> {
        let mut out = Vec::new();
        if let Some(v) = self.subject.variable() {
            out.push(v.clone());
        }
        for constraint in &self.constraints {
            let refs: Vec<&TypeRef> = match constraint {
                TypeConstraint::Sub(sub) => vec![&sub.type_],
                TypeConstraint::Owns(owns) => {
                    let mut r = vec![&owns.attribute];
                    r.extend(owns.overridden.as_ref());
                    r
                }
                TypeConstraint::Relates(relates) => {
                    let mut r = vec![&relates.role];
                    r.extend(relates.overridden.as_ref());
                    r
                }
                TypeConstraint::Plays(plays) => {
                    let mut r = vec![&plays.role];
                    r.extend(plays.overridden.as_ref());
                    r
                }
                _ => Vec::new(),
            };
            for type_ref in refs {
                if let Some(v) = type_ref.variable() {
                    out.push(v.clone());
                }
            }
        }
        out
    }
}

impl fmt::Display for TypeStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::pretty::print_type_statement(self, 0))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Thing(ThingStatement),
    Type(TypeStatement),
}

impl Statement {
    pub fn variables(&self) -> Vec<Variable> {
        match self {
            Statement::Thing(s) => s.variables(),
            Statement::Type(s) => s.variables(),
        }
    }
}

impl From<ThingStatement> for Statement {
    fn from(s: ThingStatement) -> Self {
        Statement::Thing(s)
    }
}

impl From<TypeStatement> for Statement {
    fn from(s: TypeStatement) -> Self {
        Statement::Type(s)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Thing(s) => write!(f, "{}", s),
            Statement::Type(s) => write!(f, "{}", s),
        }
    }
}

/// A set of patterns that must all hold.
#[derive(Clone, Debug, PartialEq)]
pub struct Conjunction {
    pub patterns: Vec<Pattern>,
}

impl Conjunction {
    pub fn new(patterns: Vec<Pattern>) -> Conjunction {
        Conjunction { patterns }
    }
}

/// Alternative branches; a branch is a single pattern or a conjunction.
#[derive(Clone, Debug, PartialEq)]
pub struct Disjunction {
    pub branches: Vec<Pattern>,
}

/// A pattern that must not hold.
#[derive(Clone, Debug, PartialEq)]
pub struct Negation {
    pub pattern: Box<Pattern>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
    Statement(Statement),
    Conjunction(Conjunction),
    Disjunction(Disjunction),
    Negation(Negation),
}

impl From<Statement> for Pattern {
    fn from(s: Statement) -> Self {
        Pattern::Statement(s)
    }
}

impl From<ThingStatement> for Pattern {
    fn from(s: ThingStatement) -> Self {
        Pattern::Statement(Statement::Thing(s))
    }
}

impl From<TypeStatement> for Pattern {
    fn from(s: TypeStatement) -> Self {
        Pattern::Statement(Statement::Type(s))
    }
}

impl From<Conjunction> for Pattern {
    fn from(c: Conjunction) -> Self {
        Pattern::Conjunction(c)
    }
}

impl From<Disjunction> for Pattern {
    fn from(d: Disjunction) -> Self {
        Pattern::Disjunction(d)
    }
}

impl From<Negation> for Pattern {
    fn from(n: Negation) -> Self {
        Pattern::Negation(n)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::pretty::print_pattern(self))
    }
}
