//! Variable-scope validation
//!
//! Walks a parsed (or built) pattern tree and enforces the binding rules:
//! a disjunction only exports variables bound in every branch, a negation
//! exports nothing, and both must share at least one named variable with
//! the statements around them. Comparison-only statements (`$t != ...`,
//! `is`) reference variables rather than bind them, so their variables
//! must be visible from elsewhere. Equality (`$s1 = $s2`) binds.

use std::collections::HashSet;

use chrono::Timelike;

use crate::error::{Result, TypeQLError};
use crate::pattern::*;
use crate::query::*;

pub(crate) fn validate_match(query: &MatchQuery) -> Result<()> {
    let patterns = &query.conjunction.patterns;
    validate_match_clause(&query.conjunction)?;

    let pattern_vars = named_vars_of_patterns(patterns);
    for variable in &query.modifiers.filter {
        if !variable.is_named() {
            return Err(TypeQLError::structural(
                "the get clause cannot select an anonymous variable",
            ));
        }
        if !pattern_vars.contains(variable) {
            return Err(TypeQLError::bound_variable(format!(
                "the variable '{}' in the get clause is not in the match pattern",
                variable
            )));
        }
    }
    let filter: HashSet<Variable> = query.modifiers.filter.iter().cloned().collect();
    let selectable = if filter.is_empty() { &pattern_vars } else { &filter };
    for key in &query.modifiers.sorting {
        if !selectable.contains(&key.variable) {
            return Err(TypeQLError::bound_variable(format!(
                "the sort variable '{}' is not selected by the query",
                key.variable
            )));
        }
    }
    match &query.reduction {
        Some(Reduction::Aggregate(aggregate)) => check_aggregate(aggregate, selectable)?,
        Some(Reduction::Group(group)) => {
            if !selectable.contains(&group.variable) {
                return Err(TypeQLError::bound_variable(format!(
                    "the group variable '{}' is not selected by the query",
                    group.variable
                )));
            }
            if let Some(aggregate) = &group.aggregate {
                check_aggregate(aggregate, selectable)?;
            }
        }
        None => {}
    }
    Ok(())
}

/// Scope rules shared by a match body and the match clause of an
/// insert/delete/update query.
pub(crate) fn validate_match_clause(conjunction: &Conjunction) -> Result<()> {
    if conjunction.patterns.is_empty() {
        return Err(TypeQLError::structural(
            "a match clause requires at least one pattern",
        ));
    }
    each_statement_named(&conjunction.patterns)?;
    check_conjunction(&conjunction.patterns, &HashSet::new())?;
    check_precision_patterns(&conjunction.patterns)
}

pub(crate) fn validate_insert(statements: &[ThingStatement]) -> Result<()> {
    if statements.is_empty() {
        return Err(TypeQLError::structural(
            "an insert clause requires at least one statement",
        ));
    }
    for statement in statements {
        check_precision_statement(statement)?;
    }
    Ok(())
}

/// Every named variable deleted (or rewritten by an update) must be
/// matched first.
pub(crate) fn validate_delete(
    match_clause: &Conjunction,
    statements: &[ThingStatement],
) -> Result<()> {
    if statements.is_empty() {
        return Err(TypeQLError::structural(
            "a delete clause requires at least one statement",
        ));
    }
    let matched = named_vars_of_patterns(&match_clause.patterns);
    for statement in statements {
        check_precision_statement(statement)?;
        for variable in statement.variables() {
            if variable.is_named() && !matched.contains(&variable) {
                return Err(TypeQLError::bound_variable(format!(
                    "the deleted variable '{}' is not bound by the match clause",
                    variable
                )));
            }
        }
    }
    Ok(())
}

/// Rules must be complete inside `define`, and the conclusion may only
/// use variables the condition binds.
pub(crate) fn validate_rule(rule: &Rule) -> Result<()> {
    let (when, then) = match (&rule.when, &rule.then) {
        (Some(when), Some(then)) => (when, then),
        _ => {
            return Err(TypeQLError::structural(format!(
                "rule '{}' requires both a 'when' and a 'then' clause",
                rule.label
            )));
        }
    };
    validate_match_clause(when)?;
    check_precision_statement(then)?;
    let bound = bound_of_patterns(&when.patterns);
    for variable in then.variables() {
        if variable.is_named() && !bound.contains(&variable) {
            return Err(TypeQLError::bound_variable(format!(
                "the variable '{}' in the 'then' of rule '{}' is not bound by its 'when'",
                variable, rule.label
            )));
        }
    }
    Ok(())
}

fn check_aggregate(aggregate: &Aggregate, selectable: &HashSet<Variable>) -> Result<()> {
    match (&aggregate.variable, aggregate.method.takes_variable()) {
        (Some(_), false) => Err(TypeQLError::structural(
            "the count aggregate does not take a variable",
        )),
        (None, true) => Err(TypeQLError::structural(format!(
            "the '{}' aggregate requires a variable",
            aggregate.method
        ))),
        (Some(variable), true) => {
            if !variable.is_named() {
                return Err(TypeQLError::structural(
                    "an aggregate cannot apply to an anonymous variable",
                ));
            }
            if !selectable.contains(variable) {
                return Err(TypeQLError::bound_variable(format!(
                    "the aggregate variable '{}' is not selected by the query",
                    variable
                )));
            }
            Ok(())
        }
        (None, false) => Ok(()),
    }
}

/// Matching requires something nameable to return: a statement made
/// only of anonymous variables cannot appear in a match pattern.
fn each_statement_named(patterns: &[Pattern]) -> Result<()> {
    for pattern in patterns {
        match pattern {
            Pattern::Statement(statement) => {
                if !statement.variables().iter().any(Variable::is_named) {
                    return Err(TypeQLError::structural(format!(
                        "the pattern '{}' has no named variable",
                        statement
                    )));
                }
            }
            Pattern::Conjunction(c) => each_statement_named(&c.patterns)?,
            Pattern::Disjunction(d) => {
                for branch in &d.branches {
                    each_statement_named(branch_patterns(branch))?;
                }
            }
            Pattern::Negation(n) => each_statement_named(branch_patterns(&n.pattern))?,
        }
    }
    Ok(())
}

fn check_conjunction(patterns: &[Pattern], inherited: &HashSet<Variable>) -> Result<()> {
    let mut visible = inherited.clone();
    for pattern in patterns {
        visible.extend(bound_of_pattern(pattern));
    }
    for (i, pattern) in patterns.iter().enumerate() {
        match pattern {
            Pattern::Statement(statement) => {
                if !statement_is_binding(statement) {
                    for variable in statement.variables() {
                        if variable.is_named() && !visible.contains(&variable) {
                            return Err(TypeQLError::bound_variable(format!(
                                "the variable '{}' is not bound by the enclosing pattern",
                                variable
                            )));
                        }
                    }
                }
            }
            Pattern::Conjunction(c) => check_conjunction(&c.patterns, &visible)?,
            Pattern::Disjunction(d) => {
                // a nested pattern is bounded by its siblings, not itself
                let bounds = sibling_bounds(patterns, i, inherited);
                if bounds.is_empty() {
                    return Err(TypeQLError::structural(
                        "a disjunction must be bound by statements in an enclosing conjunction",
                    ));
                }
                for branch in &d.branches {
                    let branch_vars = named_vars_of_pattern(branch);
                    if branch_vars.is_disjoint(&bounds) {
                        return Err(TypeQLError::bound_variable(format!(
                            "the pattern '{}' shares no named variable with its enclosing conjunction",
                            branch
                        )));
                    }
                    check_conjunction(branch_patterns(branch), &bounds)?;
                }
            }
            Pattern::Negation(n) => {
                let bounds = sibling_bounds(patterns, i, inherited);
                let negation_vars = named_vars_of_pattern(&n.pattern);
                if negation_vars.is_disjoint(&bounds) {
                    return Err(TypeQLError::bound_variable(format!(
                        "the pattern '{}' shares no named variable with its enclosing conjunction",
                        n.pattern
                    )));
                }
                check_conjunction(branch_patterns(&n.pattern), &bounds)?;
            }
        }
    }
    Ok(())
}

fn sibling_bounds(
    patterns: &[Pattern],
    skip: usize,
    inherited: &HashSet<Variable>,
) -> HashSet<Variable> {
    let mut bounds = inherited.clone();
    for (j, sibling) in patterns.iter().enumerate() {
        if j != skip {
            bounds.extend(bound_of_pattern(sibling));
        }
    }
    bounds
}

/// Comparison-only statements and `is` reference variables; everything
/// else introduces bindings.
fn statement_is_binding(statement: &Statement) -> bool {
    match statement {
        Statement::Type(_) => true,
        Statement::Thing(thing) => {
            thing.constraints.is_empty()
                || thing.constraints.iter().any(|constraint| match constraint {
                    ThingConstraint::Is(_) => false,
                    ThingConstraint::Value(vc) => !matches!(
                        vc.predicate,
                        Predicate::Neq
                            | Predicate::Lt
                            | Predicate::Lte
                            | Predicate::Gt
                            | Predicate::Gte
                    ),
                    _ => true,
                })
        }
    }
}

fn bound_of_pattern(pattern: &Pattern) -> HashSet<Variable> {
    match pattern {
        Pattern::Statement(statement) => {
            if statement_is_binding(statement) {
                statement
                    .variables()
                    .into_iter()
                    .filter(Variable::is_named)
                    .collect()
            } else {
                HashSet::new()
            }
        }
        Pattern::Conjunction(c) => bound_of_patterns(&c.patterns),
        Pattern::Disjunction(d) => {
            // only variables bound in every branch escape the disjunction
            let mut branches = d.branches.iter().map(bound_of_pattern);
            let mut exported = branches.next().unwrap_or_default();
            for branch in branches {
                exported.retain(|v| branch.contains(v));
            }
            exported
        }
        Pattern::Negation(_) => HashSet::new(),
    }
}

fn bound_of_patterns(patterns: &[Pattern]) -> HashSet<Variable> {
    let mut bound = HashSet::new();
    for pattern in patterns {
        bound.extend(bound_of_pattern(pattern));
    }
    bound
}

fn named_vars_of_pattern(pattern: &Pattern) -> HashSet<Variable> {
    match pattern {
        Pattern::Statement(statement) => statement
            .variables()
            .into_iter()
            .filter(Variable::is_named)
            .collect(),
        Pattern::Conjunction(c) => named_vars_of_patterns(&c.patterns),
        Pattern::Disjunction(d) => {
            let mut vars = HashSet::new();
            for branch in &d.branches {
                vars.extend(named_vars_of_pattern(branch));
            }
            vars
        }
        Pattern::Negation(n) => named_vars_of_pattern(&n.pattern),
    }
}

fn named_vars_of_patterns(patterns: &[Pattern]) -> HashSet<Variable> {
    let mut vars = HashSet::new();
    for pattern in patterns {
        vars.extend(named_vars_of_pattern(pattern));
    }
    vars
}

fn branch_patterns(pattern: &Pattern) -> &[Pattern] {
    match pattern {
        Pattern::Conjunction(c) => &c.patterns,
        other => std::slice::from_ref(other),
    }
}

fn check_precision_patterns(patterns: &[Pattern]) -> Result<()> {
    for pattern in patterns {
        match pattern {
            Pattern::Statement(Statement::Thing(statement)) => {
                check_precision_statement(statement)?;
            }
            Pattern::Statement(Statement::Type(_)) => {}
            Pattern::Conjunction(c) => check_precision_patterns(&c.patterns)?,
            Pattern::Disjunction(d) => {
                for branch in &d.branches {
                    check_precision_patterns(branch_patterns(branch))?;
                }
            }
            Pattern::Negation(n) => check_precision_patterns(branch_patterns(&n.pattern))?,
        }
    }
    Ok(())
}

/// Builder-constructed values bypass the lexer, so sub-millisecond
/// date-times are caught here.
fn check_precision_statement(statement: &ThingStatement) -> Result<()> {
    for constraint in &statement.constraints {
        let value = match constraint {
            ThingConstraint::Has(has) => match &has.value {
                HasValue::Constraint(c) => &c.value,
                HasValue::Variable(_) => continue,
            },
            ThingConstraint::Value(c) => &c.value,
            _ => continue,
        };
        if let Value::DateTime(dt) = value {
            if dt.nanosecond() % 1_000_000 != 0 {
                return Err(TypeQLError::Precision {
                    value: dt.to_string(),
                });
            }
        }
    }
    Ok(())
}
