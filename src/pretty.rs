//! Canonical printer for TypeQL
//!
//! Renders queries and patterns back to source syntax. The output is the
//! canonical form: one statement per line, four-space indentation inside
//! braced groups, chained `has` constraints continued on their own lines,
//! and modifiers collected onto a single line. Parsing the output yields
//! the same AST, which is what the round-trip tests lean on.

use crate::pattern::*;
use crate::query::*;

const INDENT: usize = 4;

/// A printer with indentation tracking
struct Pretty {
    output: String,
    indent_level: usize,
}

impl Pretty {
    fn new(indent_level: usize) -> Self {
        Self {
            output: String::new(),
            indent_level,
        }
    }

    fn finish(self) -> String {
        self.output
    }

    fn indent(&mut self) {
        for _ in 0..(self.indent_level * INDENT) {
            self.output.push(' ');
        }
    }

    fn write(&mut self, s: &str) {
        self.output.push_str(s);
    }

    fn newline(&mut self) {
        self.output.push('\n');
    }

    fn inc_indent(&mut self) {
        self.indent_level += 1;
    }

    fn dec_indent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }
}

impl Pretty {
    fn query(&mut self, query: &Query) {
        match query {
            Query::Match(q) => self.match_query(q),
            Query::Insert(q) => self.insert_query(q),
            Query::Delete(q) => self.delete_query(q),
            Query::Update(q) => self.update_query(q),
            Query::Define(q) => self.define_query(q),
            Query::Undefine(q) => self.undefine_query(q),
        }
    }

    fn match_query(&mut self, query: &MatchQuery) {
        self.match_clause(&query.conjunction);
        self.modifiers(&query.modifiers);
        if let Some(reduction) = &query.reduction {
            self.reduction(reduction);
        }
    }

    fn match_clause(&mut self, conjunction: &Conjunction) {
        self.write("match");
        for pattern in &conjunction.patterns {
            self.newline();
            self.pattern_line(pattern);
        }
    }

    fn modifiers(&mut self, modifiers: &Modifiers) {
        if !modifiers.filter.is_empty() {
            self.newline();
            self.indent();
            self.write("get ");
            for (i, variable) in modifiers.filter.iter().enumerate() {
                if i > 0 {
                    self.write(", ");
                }
                self.write(&variable.to_string());
            }
            self.write(";");
        }
        let mut clauses = Vec::new();
        if !modifiers.sorting.is_empty() {
            let keys: Vec<String> = modifiers.sorting.iter().map(|k| k.to_string()).collect();
            clauses.push(format!("sort {};", keys.join(", ")));
        }
        if let Some(offset) = modifiers.offset {
            clauses.push(format!("offset {};", offset));
        }
        if let Some(limit) = modifiers.limit {
            clauses.push(format!("limit {};", limit));
        }
        if !clauses.is_empty() {
            self.newline();
            self.indent();
            self.write(&clauses.join(" "));
        }
    }

    fn reduction(&mut self, reduction: &Reduction) {
        self.newline();
        self.indent();
        match reduction {
            Reduction::Aggregate(aggregate) => self.write(&aggregate.to_string()),
            Reduction::Group(group) => {
                self.write(&format!("group {};", group.variable));
                if let Some(aggregate) = &group.aggregate {
                    self.write(" ");
                    self.write(&aggregate.to_string());
                }
            }
        }
    }

    fn insert_query(&mut self, query: &InsertQuery) {
        if let Some(match_clause) = &query.match_clause {
            self.match_clause(match_clause);
            self.newline();
        }
        self.write("insert");
        self.statement_lines(&query.statements);
    }

    fn delete_query(&mut self, query: &DeleteQuery) {
        self.match_clause(&query.match_clause);
        self.newline();
        self.write("delete");
        self.statement_lines(&query.statements);
    }

    fn update_query(&mut self, query: &UpdateQuery) {
        self.match_clause(&query.match_clause);
        self.newline();
        self.write("delete");
        self.statement_lines(&query.deletes);
        self.newline();
        self.write("insert");
        self.statement_lines(&query.inserts);
    }

    fn statement_lines(&mut self, statements: &[ThingStatement]) {
        for statement in statements {
            self.newline();
            self.indent();
            self.thing_statement(statement);
            self.write(";");
        }
    }

    fn define_query(&mut self, query: &DefineQuery) {
        self.write("define");
        self.definables(&query.definables);
    }

    fn undefine_query(&mut self, query: &UndefineQuery) {
        self.write("undefine");
        self.definables(&query.definables);
    }

    fn definables(&mut self, definables: &[Definable]) {
        for definable in definables {
            self.newline();
            self.indent();
            match definable {
                Definable::Type(statement) => {
                    self.type_statement(statement);
                    self.write(";");
                }
                Definable::Rule(rule) => {
                    self.rule(rule);
                    self.write(";");
                }
            }
        }
    }

    fn rule(&mut self, rule: &Rule) {
        self.write("rule ");
        self.write(&rule.label);
        let (when, then) = match (&rule.when, &rule.then) {
            (Some(when), Some(then)) => (when, then),
            _ => return, // bare reference, as in undefine
        };
        self.write(": when ");
        self.group(&when.patterns);
        self.write(" then {");
        self.inc_indent();
        self.newline();
        self.indent();
        self.thing_statement(then);
        self.write(";");
        self.dec_indent();
        self.newline();
        self.indent();
        self.write("}");
    }

    /// One pattern as a `;`-terminated line (indentation already applies).
    fn pattern_line(&mut self, pattern: &Pattern) {
        self.indent();
        match pattern {
            Pattern::Statement(statement) => self.statement(statement),
            Pattern::Conjunction(conjunction) => self.group(&conjunction.patterns),
            Pattern::Disjunction(disjunction) => self.disjunction(disjunction),
            Pattern::Negation(negation) => self.negation(negation),
        }
        self.write(";");
    }

    fn disjunction(&mut self, disjunction: &Disjunction) {
        for (i, branch) in disjunction.branches.iter().enumerate() {
            if i > 0 {
                self.write(" or ");
            }
            self.group(branch_patterns(branch));
        }
    }

    fn negation(&mut self, negation: &Negation) {
        let patterns = branch_patterns(&negation.pattern);
        // a single negated statement stays on one line
        if let [Pattern::Statement(statement)] = patterns {
            self.write("not { ");
            self.statement(statement);
            self.write("; }");
        } else {
            self.write("not ");
            self.group(patterns);
        }
    }

    /// A braced pattern block, one pattern per line.
    fn group(&mut self, patterns: &[Pattern]) {
        self.write("{");
        self.inc_indent();
        for pattern in patterns {
            self.newline();
            self.pattern_line(pattern);
        }
        self.dec_indent();
        self.newline();
        self.indent();
        self.write("}");
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Thing(s) => self.thing_statement(s),
            Statement::Type(s) => self.type_statement(s),
        }
    }

    fn thing_statement(&mut self, statement: &ThingStatement) {
        // a relation with an anonymous subject prints without the `$_`
        let mut head_empty = true;
        if !(statement.variable == Variable::Anonymous && statement.has_relation()) {
            self.write(&statement.variable.to_string());
            head_empty = false;
        }
        for (i, constraint) in statement.constraints.iter().enumerate() {
            if head_empty {
                head_empty = false;
            } else if i > 0 && matches!(constraint, ThingConstraint::Has(_)) {
                self.has_continuation();
            } else {
                self.write(" ");
            }
            self.write(&constraint.to_string());
        }
    }

    fn type_statement(&mut self, statement: &TypeStatement) {
        self.write(&statement.subject.to_string());
        for (i, constraint) in statement.constraints.iter().enumerate() {
            if i == 0 {
                self.write(" ");
            } else {
                self.has_continuation();
            }
            self.write(&constraint.to_string());
        }
    }

    /// Chained constraints continue one level deeper than the statement.
    fn has_continuation(&mut self) {
        self.write(",");
        self.newline();
        self.inc_indent();
        self.indent();
        self.dec_indent();
    }

    /// A pattern on its own, without the trailing `;` a query line carries.
    fn bare_pattern(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::Statement(statement) => self.statement(statement),
            Pattern::Conjunction(conjunction) => self.group(&conjunction.patterns),
            Pattern::Disjunction(disjunction) => self.disjunction(disjunction),
            Pattern::Negation(negation) => self.negation(negation),
        }
    }
}

fn branch_patterns(pattern: &Pattern) -> &[Pattern] {
    match pattern {
        Pattern::Conjunction(conjunction) => &conjunction.patterns,
        other => std::slice::from_ref(other),
    }
}

pub(crate) fn print_query(query: &Query) -> String {
    let mut p = Pretty::new(0);
    p.query(query);
    p.finish()
}

pub(crate) fn print_match_query(query: &MatchQuery) -> String {
    let mut p = Pretty::new(0);
    p.match_query(query);
    p.finish()
}

pub(crate) fn print_insert_query(query: &InsertQuery) -> String {
    let mut p = Pretty::new(0);
    p.insert_query(query);
    p.finish()
}

pub(crate) fn print_delete_query(query: &DeleteQuery) -> String {
    let mut p = Pretty::new(0);
    p.delete_query(query);
    p.finish()
}

pub(crate) fn print_update_query(query: &UpdateQuery) -> String {
    let mut p = Pretty::new(0);
    p.update_query(query);
    p.finish()
}

pub(crate) fn print_define_query(query: &DefineQuery) -> String {
    let mut p = Pretty::new(0);
    p.define_query(query);
    p.finish()
}

pub(crate) fn print_undefine_query(query: &UndefineQuery) -> String {
    let mut p = Pretty::new(0);
    p.undefine_query(query);
    p.finish()
}

pub(crate) fn print_pattern(pattern: &Pattern) -> String {
    let mut p = Pretty::new(0);
    p.bare_pattern(pattern);
    p.finish()
}

pub(crate) fn print_thing_statement(statement: &ThingStatement, indent_level: usize) -> String {
    let mut p = Pretty::new(indent_level);
    p.thing_statement(statement);
    p.finish()
}

pub(crate) fn print_type_statement(statement: &TypeStatement, indent_level: usize) -> String {
    let mut p = Pretty::new(indent_level);
    p.type_statement(statement);
    p.finish()
}
