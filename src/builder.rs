//! Programmatic query construction
//!
//! The builder mirrors the textual grammar: anything the parser can
//! produce can be assembled here and compares structurally equal to its
//! parsed counterpart. Entry points are [`var`], [`type_`], [`rel`],
//! [`not`], [`rule`], the predicate helpers, and the `typeql_match!`
//! family of macros, which run the same validation the parser runs.

use chrono::NaiveDateTime;

use crate::error::{Result, TypeQLError};
use crate::pattern::*;
use crate::query::*;
use crate::scope;

/// A variable with no constraints yet. Constraint methods turn it into a
/// thing or type statement.
#[derive(Clone, Debug)]
pub struct UnboundVariable(Variable);

/// `var("x")` for `$x`, `var(())` for the anonymous `$_`.
pub fn var(variable: impl Into<Variable>) -> UnboundVariable {
    UnboundVariable(variable.into())
}

/// A type statement rooted at a concrete label, as used in `define`.
pub fn type_(label: impl Into<Label>) -> TypeStatement {
    TypeStatement::new(TypeRef::Label(label.into()))
}

/// A relation with an anonymous subject: `rel(("wife", "a")).rel(...)`.
pub fn rel(role_player: impl Into<RolePlayer>) -> ThingStatement {
    ThingStatement::new(Variable::Anonymous).rel(role_player)
}

pub fn not(pattern: impl Into<Pattern>) -> Negation {
    Negation {
        pattern: Box::new(pattern.into()),
    }
}

pub fn rule(label: impl Into<String>) -> Rule {
    Rule::new(label)
}

impl From<UnboundVariable> for Variable {
    fn from(v: UnboundVariable) -> Self {
        v.0
    }
}

impl From<UnboundVariable> for TypeRef {
    fn from(v: UnboundVariable) -> Self {
        TypeRef::Variable(v.0)
    }
}

impl From<UnboundVariable> for Value {
    fn from(v: UnboundVariable) -> Self {
        Value::Variable(v.0)
    }
}

impl UnboundVariable {
    fn thing(self) -> ThingStatement {
        ThingStatement::new(self.0)
    }

    fn type_statement(self) -> TypeStatement {
        TypeStatement::new(TypeRef::Variable(self.0))
    }

    pub fn isa(self, type_: impl Into<TypeRef>) -> ThingStatement {
        self.thing().isa(type_)
    }

    pub fn isa_x(self, type_: impl Into<TypeRef>) -> ThingStatement {
        self.thing().isa_x(type_)
    }

    pub fn has(self, constraint: impl Into<HasConstraint>) -> ThingStatement {
        self.thing().has(constraint)
    }

    pub fn is(self, other: impl Into<Variable>) -> ThingStatement {
        self.thing().is(other)
    }

    pub fn rel(self, role_player: impl Into<RolePlayer>) -> ThingStatement {
        self.thing().rel(role_player)
    }

    pub fn eq(self, value: impl Into<Value>) -> ThingStatement {
        self.thing().eq(value)
    }

    pub fn neq(self, value: impl Into<Value>) -> ThingStatement {
        self.thing().neq(value)
    }

    pub fn lt(self, value: impl Into<Value>) -> ThingStatement {
        self.thing().lt(value)
    }

    pub fn lte(self, value: impl Into<Value>) -> ThingStatement {
        self.thing().lte(value)
    }

    pub fn gt(self, value: impl Into<Value>) -> ThingStatement {
        self.thing().gt(value)
    }

    pub fn gte(self, value: impl Into<Value>) -> ThingStatement {
        self.thing().gte(value)
    }

    pub fn contains(self, value: impl Into<Value>) -> ThingStatement {
        self.thing().contains(value)
    }

    pub fn like(self, pattern: impl Into<String>) -> ThingStatement {
        self.thing().like(pattern)
    }

    pub fn sub(self, type_: impl Into<TypeRef>) -> TypeStatement {
        self.type_statement().sub(type_)
    }

    pub fn sub_x(self, type_: impl Into<TypeRef>) -> TypeStatement {
        self.type_statement().sub_x(type_)
    }

    pub fn type_(self, label: impl Into<Label>) -> TypeStatement {
        self.type_statement().type_(label)
    }

    pub fn owns(self, constraint: impl Into<OwnsConstraint>) -> TypeStatement {
        self.type_statement().owns(constraint)
    }

    pub fn relates(self, constraint: impl Into<RelatesConstraint>) -> TypeStatement {
        self.type_statement().relates(constraint)
    }

    pub fn plays(self, constraint: impl Into<PlaysConstraint>) -> TypeStatement {
        self.type_statement().plays(constraint)
    }

    pub fn value(self, value_type: ValueType) -> TypeStatement {
        self.type_statement().value(value_type)
    }

    pub fn regex(self, pattern: impl Into<String>) -> TypeStatement {
        self.type_statement().regex(pattern)
    }

    pub fn abstract_(self) -> TypeStatement {
        self.type_statement().abstract_()
    }
}

impl ThingStatement {
    fn constrain(mut self, constraint: ThingConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    fn predicate(self, predicate: Predicate, value: Value) -> Self {
        self.constrain(ThingConstraint::Value(ValueConstraint::new(
            predicate, value,
        )))
    }

    pub fn isa(self, type_: impl Into<TypeRef>) -> Self {
        self.constrain(ThingConstraint::Isa(IsaConstraint {
            type_: type_.into(),
            explicit: false,
        }))
    }

    pub fn isa_x(self, type_: impl Into<TypeRef>) -> Self {
        self.constrain(ThingConstraint::Isa(IsaConstraint {
            type_: type_.into(),
            explicit: true,
        }))
    }

    pub fn has(self, constraint: impl Into<HasConstraint>) -> Self {
        self.constrain(ThingConstraint::Has(constraint.into()))
    }

    pub fn is(self, other: impl Into<Variable>) -> Self {
        self.constrain(ThingConstraint::Is(other.into()))
    }

    /// Adds a role player, extending the existing relation constraint if
    /// one is present.
    pub fn rel(mut self, role_player: impl Into<RolePlayer>) -> Self {
        let role_player = role_player.into();
        for constraint in self.constraints.iter_mut() {
            if let ThingConstraint::Relation(relation) = constraint {
                relation.role_players.push(role_player);
                return self;
            }
        }
        self.constraints
            .insert(0, ThingConstraint::Relation(RelationConstraint {
                role_players: vec![role_player],
            }));
        self
    }

    pub fn eq(self, value: impl Into<Value>) -> Self {
        self.predicate(Predicate::Eq, value.into())
    }

    pub fn neq(self, value: impl Into<Value>) -> Self {
        self.predicate(Predicate::Neq, value.into())
    }

    pub fn lt(self, value: impl Into<Value>) -> Self {
        self.predicate(Predicate::Lt, value.into())
    }

    pub fn lte(self, value: impl Into<Value>) -> Self {
        self.predicate(Predicate::Lte, value.into())
    }

    pub fn gt(self, value: impl Into<Value>) -> Self {
        self.predicate(Predicate::Gt, value.into())
    }

    pub fn gte(self, value: impl Into<Value>) -> Self {
        self.predicate(Predicate::Gte, value.into())
    }

    pub fn contains(self, value: impl Into<Value>) -> Self {
        self.predicate(Predicate::Contains, value.into())
    }

    pub fn like(self, pattern: impl Into<String>) -> Self {
        self.predicate(Predicate::Like, Value::String(pattern.into()))
    }
}

impl TypeStatement {
    fn constrain(mut self, constraint: TypeConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn sub(self, type_: impl Into<TypeRef>) -> Self {
        self.constrain(TypeConstraint::Sub(SubConstraint {
            type_: type_.into(),
            explicit: false,
        }))
    }

    pub fn sub_x(self, type_: impl Into<TypeRef>) -> Self {
        self.constrain(TypeConstraint::Sub(SubConstraint {
            type_: type_.into(),
            explicit: true,
        }))
    }

    pub fn type_(self, label: impl Into<Label>) -> Self {
        self.constrain(TypeConstraint::Type(label.into()))
    }

    pub fn owns(self, constraint: impl Into<OwnsConstraint>) -> Self {
        self.constrain(TypeConstraint::Owns(constraint.into()))
    }

    pub fn relates(self, constraint: impl Into<RelatesConstraint>) -> Self {
        self.constrain(TypeConstraint::Relates(constraint.into()))
    }

    pub fn plays(self, constraint: impl Into<PlaysConstraint>) -> Self {
        self.constrain(TypeConstraint::Plays(constraint.into()))
    }

    pub fn value(self, value_type: ValueType) -> Self {
        self.constrain(TypeConstraint::ValueType(value_type))
    }

    pub fn regex(self, pattern: impl Into<String>) -> Self {
        self.constrain(TypeConstraint::Regex(pattern.into()))
    }

    pub fn abstract_(self) -> Self {
        self.constrain(TypeConstraint::Abstract)
    }
}

// ============ Predicate helpers (for `has` payloads) ============

pub fn eq(value: impl Into<Value>) -> ValueConstraint {
    ValueConstraint::new(Predicate::Eq, value.into())
}

pub fn neq(value: impl Into<Value>) -> ValueConstraint {
    ValueConstraint::new(Predicate::Neq, value.into())
}

pub fn lt(value: impl Into<Value>) -> ValueConstraint {
    ValueConstraint::new(Predicate::Lt, value.into())
}

pub fn lte(value: impl Into<Value>) -> ValueConstraint {
    ValueConstraint::new(Predicate::Lte, value.into())
}

pub fn gt(value: impl Into<Value>) -> ValueConstraint {
    ValueConstraint::new(Predicate::Gt, value.into())
}

pub fn gte(value: impl Into<Value>) -> ValueConstraint {
    ValueConstraint::new(Predicate::Gte, value.into())
}

pub fn contains(value: impl Into<Value>) -> ValueConstraint {
    ValueConstraint::new(Predicate::Contains, value.into())
}

pub fn like(pattern: impl Into<String>) -> ValueConstraint {
    ValueConstraint::new(Predicate::Like, Value::String(pattern.into()))
}

// ============ Conversions for constraint arguments ============

impl From<&str> for RolePlayer {
    fn from(player: &str) -> Self {
        RolePlayer {
            role: None,
            player: Variable::from(player),
        }
    }
}

impl From<(&str, &str)> for RolePlayer {
    fn from((role, player): (&str, &str)) -> Self {
        RolePlayer {
            role: Some(TypeRef::from(role)),
            player: Variable::from(player),
        }
    }
}

impl From<UnboundVariable> for RolePlayer {
    fn from(player: UnboundVariable) -> Self {
        RolePlayer {
            role: None,
            player: player.0,
        }
    }
}

impl From<(&str, UnboundVariable)> for RolePlayer {
    fn from((role, player): (&str, UnboundVariable)) -> Self {
        RolePlayer {
            role: Some(TypeRef::from(role)),
            player: player.0,
        }
    }
}

impl From<(UnboundVariable, UnboundVariable)> for RolePlayer {
    fn from((role, player): (UnboundVariable, UnboundVariable)) -> Self {
        RolePlayer {
            role: Some(TypeRef::Variable(role.0)),
            player: player.0,
        }
    }
}

impl From<UnboundVariable> for HasConstraint {
    fn from(variable: UnboundVariable) -> Self {
        HasConstraint {
            attribute: None,
            value: HasValue::Variable(variable.0),
        }
    }
}

impl From<(&str, UnboundVariable)> for HasConstraint {
    fn from((attribute, variable): (&str, UnboundVariable)) -> Self {
        HasConstraint {
            attribute: Some(attribute.to_string()),
            value: HasValue::Variable(variable.0),
        }
    }
}

impl From<(&str, ValueConstraint)> for HasConstraint {
    fn from((attribute, constraint): (&str, ValueConstraint)) -> Self {
        HasConstraint {
            attribute: Some(attribute.to_string()),
            value: HasValue::Constraint(constraint),
        }
    }
}

fn has_value(attribute: &str, value: Value) -> HasConstraint {
    HasConstraint {
        attribute: Some(attribute.to_string()),
        value: HasValue::Constraint(ValueConstraint::new(Predicate::Eq, value)),
    }
}

impl From<(&str, &str)> for HasConstraint {
    fn from((attribute, value): (&str, &str)) -> Self {
        has_value(attribute, Value::from(value))
    }
}

impl From<(&str, String)> for HasConstraint {
    fn from((attribute, value): (&str, String)) -> Self {
        has_value(attribute, Value::from(value))
    }
}

impl From<(&str, i64)> for HasConstraint {
    fn from((attribute, value): (&str, i64)) -> Self {
        has_value(attribute, Value::from(value))
    }
}

impl From<(&str, i32)> for HasConstraint {
    fn from((attribute, value): (&str, i32)) -> Self {
        has_value(attribute, Value::from(value))
    }
}

impl From<(&str, f64)> for HasConstraint {
    fn from((attribute, value): (&str, f64)) -> Self {
        has_value(attribute, Value::from(value))
    }
}

impl From<(&str, bool)> for HasConstraint {
    fn from((attribute, value): (&str, bool)) -> Self {
        has_value(attribute, Value::from(value))
    }
}

impl From<(&str, NaiveDateTime)> for HasConstraint {
    fn from((attribute, value): (&str, NaiveDateTime)) -> Self {
        has_value(attribute, Value::from(value))
    }
}

impl From<&str> for OwnsConstraint {
    fn from(attribute: &str) -> Self {
        OwnsConstraint {
            attribute: TypeRef::from(attribute),
            overridden: None,
            annotations: Vec::new(),
        }
    }
}

impl From<(&str, &str)> for OwnsConstraint {
    fn from((attribute, overridden): (&str, &str)) -> Self {
        OwnsConstraint {
            attribute: TypeRef::from(attribute),
            overridden: Some(TypeRef::from(overridden)),
            annotations: Vec::new(),
        }
    }
}

impl From<(&str, Annotation)> for OwnsConstraint {
    fn from((attribute, annotation): (&str, Annotation)) -> Self {
        OwnsConstraint {
            attribute: TypeRef::from(attribute),
            overridden: None,
            annotations: vec![annotation],
        }
    }
}

impl From<(&str, &str, Annotation)> for OwnsConstraint {
    fn from((attribute, overridden, annotation): (&str, &str, Annotation)) -> Self {
        OwnsConstraint {
            attribute: TypeRef::from(attribute),
            overridden: Some(TypeRef::from(overridden)),
            annotations: vec![annotation],
        }
    }
}

impl From<&str> for RelatesConstraint {
    fn from(role: &str) -> Self {
        RelatesConstraint {
            role: TypeRef::from(role),
            overridden: None,
        }
    }
}

impl From<UnboundVariable> for RelatesConstraint {
    fn from(role: UnboundVariable) -> Self {
        RelatesConstraint {
            role: TypeRef::Variable(role.0),
            overridden: None,
        }
    }
}

impl From<(&str, &str)> for RelatesConstraint {
    fn from((role, overridden): (&str, &str)) -> Self {
        RelatesConstraint {
            role: TypeRef::from(role),
            overridden: Some(TypeRef::from(overridden)),
        }
    }
}

impl From<&str> for PlaysConstraint {
    fn from(role: &str) -> Self {
        PlaysConstraint {
            role: TypeRef::from(role),
            overridden: None,
        }
    }
}

/// `plays(("starring", "actor"))` is the scoped role `starring:actor`.
impl From<(&str, &str)> for PlaysConstraint {
    fn from((relation, role): (&str, &str)) -> Self {
        PlaysConstraint {
            role: TypeRef::from((relation, role)),
            overridden: None,
        }
    }
}

impl From<(&str, &str, &str)> for PlaysConstraint {
    fn from((relation, role, overridden): (&str, &str, &str)) -> Self {
        PlaysConstraint {
            role: TypeRef::from((relation, role)),
            overridden: Some(TypeRef::from(overridden)),
        }
    }
}

// ============ Query assembly ============

pub fn match_query(patterns: Vec<Pattern>) -> Result<MatchQuery> {
    let query = MatchQuery {
        conjunction: Conjunction::new(patterns),
        modifiers: Modifiers::default(),
        reduction: None,
    };
    scope::validate_match(&query)?;
    Ok(query)
}

pub fn insert_query(statements: Vec<ThingStatement>) -> Result<InsertQuery> {
    scope::validate_insert(&statements)?;
    Ok(InsertQuery {
        match_clause: None,
        statements,
    })
}

pub fn define_query(definables: Vec<Definable>) -> Result<DefineQuery> {
    if definables.is_empty() {
        return Err(TypeQLError::structural(
            "a define query requires at least one definition",
        ));
    }
    for definable in &definables {
        if let Definable::Rule(rule) = definable {
            scope::validate_rule(rule)?;
        }
    }
    Ok(DefineQuery { definables })
}

pub fn undefine_query(definables: Vec<Definable>) -> Result<UndefineQuery> {
    if definables.is_empty() {
        return Err(TypeQLError::structural(
            "an undefine query requires at least one definition",
        ));
    }
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
    Ok(UndefineQuery { definables })
}

impl MatchQuery {
    pub fn get<const N: usize>(mut self, variables: [&str; N]) -> Self {
        self.modifiers.filter = variables.into_iter().map(Variable::from).collect();
        self
    }

    pub fn sort<K: Into<SortKey>, const N: usize>(mut self, keys: [K; N]) -> Self {
        self.modifiers.sorting = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.modifiers.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.modifiers.limit = Some(limit);
        self
    }

    /// Aggregates attach to an open `group` clause when one is pending.
    fn reduce(mut self, method: AggregateMethod, variable: Option<Variable>) -> Self {
        let aggregate = Aggregate { method, variable };
        self.reduction = match self.reduction {
            Some(Reduction::Group(mut group)) if group.aggregate.is_none() => {
                group.aggregate = Some(aggregate);
                Some(Reduction::Group(group))
            }
            _ => Some(Reduction::Aggregate(aggregate)),
        };
        self
    }

    pub fn count(self) -> Self {
        self.reduce(AggregateMethod::Count, None)
    }

    pub fn sum(self, variable: &str) -> Self {
        self.reduce(AggregateMethod::Sum, Some(Variable::from(variable)))
    }

    pub fn max(self, variable: &str) -> Self {
        self.reduce(AggregateMethod::Max, Some(Variable::from(variable)))
    }

    pub fn min(self, variable: &str) -> Self {
        self.reduce(AggregateMethod::Min, Some(Variable::from(variable)))
    }

    pub fn mean(self, variable: &str) -> Self {
        self.reduce(AggregateMethod::Mean, Some(Variable::from(variable)))
    }

    pub fn median(self, variable: &str) -> Self {
        self.reduce(AggregateMethod::Median, Some(Variable::from(variable)))
    }

    pub fn std(self, variable: &str) -> Self {
        self.reduce(AggregateMethod::Std, Some(Variable::from(variable)))
    }

    pub fn group(mut self, variable: &str) -> Self {
        self.reduction = Some(Reduction::Group(GroupClause {
            variable: Variable::from(variable),
            aggregate: None,
        }));
        self
    }

    pub fn insert<const N: usize>(self, statements: [ThingStatement; N]) -> InsertQuery {
        InsertQuery {
            match_clause: Some(self.conjunction),
            statements: statements.into_iter().collect(),
        }
    }

    pub fn delete<const N: usize>(self, statements: [ThingStatement; N]) -> DeleteQuery {
        DeleteQuery {
            match_clause: self.conjunction,
            statements: statements.into_iter().collect(),
        }
    }
}

impl DeleteQuery {
    pub fn insert<const N: usize>(self, statements: [ThingStatement; N]) -> UpdateQuery {
        UpdateQuery {
            match_clause: self.match_clause,
            deletes: self.statements,
            inserts: statements.into_iter().collect(),
        }
    }
}

/// Build a validated match query from patterns.
#[macro_export]
macro_rules! typeql_match {
    ($($pattern:expr),+ $(,)?) => {
        $crate::builder::match_query(vec![$($crate::Pattern::from($pattern)),+])
    };
}

/// Build a validated insert query from thing statements.
#[macro_export]
macro_rules! typeql_insert {
    ($($statement:expr),+ $(,)?) => {
        $crate::builder::insert_query(vec![$($statement),+])
    };
}

/// Build a validated define query from type statements and rules.
#[macro_export]
macro_rules! typeql_define {
    ($($definable:expr),+ $(,)?) => {
        $crate::builder::define_query(vec![$($crate::Definable::from($definable)),+])
    };
}

/// Build a validated undefine query from type statements and rule labels.
#[macro_export]
macro_rules! typeql_undefine {
    ($($definable:expr),+ $(,)?) => {
        $crate::builder::undefine_query(vec![$($crate::Definable::from($definable)),+])
    };
}

/// A conjunction of patterns.
#[macro_export]
macro_rules! and {
    ($($pattern:expr),+ $(,)?) => {
        $crate::Conjunction::new(vec![$($crate::Pattern::from($pattern)),+])
    };
}

/// A disjunction; each argument is one branch.
#[macro_export]
macro_rules! or {
    ($($pattern:expr),+ $(,)?) => {
        $crate::Disjunction { branches: vec![$($crate::Pattern::from($pattern)),+] }
    };
}
