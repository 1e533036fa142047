//! Unit tests for lexer and parser

use chrono::{NaiveDate, NaiveDateTime};
use chumsky::Parser;
use typeql::lexer::{lexer, Token};
use typeql::{
    and, gte, lt, lte, not, or, parse_pattern, parse_queries, parse_query, rel, rule, type_,
    typeql_define, typeql_insert, typeql_match, typeql_undefine, var,
};
use typeql::{Annotation, MatchQuery, Pattern, Query, SortOrder, Value, ValueType};

fn date(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn date_time(year: i32, month: u32, day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

/// Parsed and built queries must be equal, the built query must print as
/// the canonical text, and the printed text must parse back to the same
/// query.
fn assert_query_eq(expected: impl Into<Query>, query: &str) {
    let expected = expected.into();
    let parsed = parse_query(query).unwrap();
    assert_eq!(expected, parsed);
    assert_eq!(query, expected.to_string());
    assert_eq!(expected, parse_query(&parsed.to_string()).unwrap());
}

fn assert_match_eq(expected: MatchQuery, query: &str) {
    assert_query_eq(expected, query);
}

// ============================================================================
// Lexer tests
// ============================================================================

#[test]
fn test_lex_simple_query() {
    let input = "match $x isa movie;";
    let tokens: Vec<_> = lexer()
        .parse(input)
        .unwrap()
        .into_iter()
        .map(|(t, _)| t)
        .collect();
    assert_eq!(
        tokens,
        vec![
            Token::Match,
            Token::Var("x".to_string()),
            Token::Isa,
            Token::Ident("movie".to_string()),
            Token::Semicolon,
        ]
    );
}

#[test]
fn test_lex_date_is_one_token() {
    let input = "1986-03-03T00:00";
    let tokens: Vec<_> = lexer()
        .parse(input)
        .unwrap()
        .into_iter()
        .map(|(t, _)| t)
        .collect();
    assert_eq!(tokens, vec![Token::DateTime(date(1986, 3, 3))]);
}

#[test]
fn test_lex_date_without_time() {
    let input = "1986-03-03";
    let tokens: Vec<_> = lexer()
        .parse(input)
        .unwrap()
        .into_iter()
        .map(|(t, _)| t)
        .collect();
    assert_eq!(tokens, vec![Token::DateTime(date(1986, 3, 3))]);
}

#[test]
fn test_lex_explicit_keywords() {
    let input = "isa! sub!";
    let tokens: Vec<_> = lexer()
        .parse(input)
        .unwrap()
        .into_iter()
        .map(|(t, _)| t)
        .collect();
    assert_eq!(tokens, vec![Token::IsaX, Token::SubX]);
}

#[test]
fn test_lex_double_with_exponent() {
    let input = "1.5e3 2E-2 7e2";
    let tokens: Vec<_> = lexer()
        .parse(input)
        .unwrap()
        .into_iter()
        .map(|(t, _)| t)
        .collect();
    assert_eq!(
        tokens,
        vec![
            Token::Double(1500.0),
            Token::Double(0.02),
            Token::Double(700.0),
        ]
    );
}

#[test]
fn test_lex_comments_skipped() {
    let input = "match # a comment\n$x isa movie;";
    let tokens: Vec<_> = lexer()
        .parse(input)
        .unwrap()
        .into_iter()
        .map(|(t, _)| t)
        .collect();
    assert_eq!(
        tokens,
        vec![
            Token::Match,
            Token::Var("x".to_string()),
            Token::Isa,
            Token::Ident("movie".to_string()),
            Token::Semicolon,
        ]
    );
}

#[test]
fn test_lex_string_keeps_escapes_verbatim() {
    let input = r#""a \"quoted\" word""#;
    let tokens: Vec<_> = lexer()
        .parse(input)
        .unwrap()
        .into_iter()
        .map(|(t, _)| t)
        .collect();
    assert_eq!(
        tokens,
        vec![Token::StringLit(r#"a \"quoted\" word"#.to_string())]
    );
}

// ============================================================================
// Match queries
// ============================================================================

#[test]
fn test_simple_query() {
    let query = "match\n$x isa movie;";
    let expected = typeql_match!(var("x").isa("movie")).unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_named_type_variable() {
    let query = "match\n$a type attribute_label;\nget $a;";
    let expected = typeql_match!(var("a").type_("attribute_label"))
        .unwrap()
        .get(["a"]);
    assert_match_eq(expected, query);
}

#[test]
fn test_string_with_slash() {
    let query = "match\n$x isa person,\n    has name \"alice/bob\";";
    let expected = typeql_match!(var("x").isa("person").has(("name", "alice/bob"))).unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_relation_query() {
    let query = "match\n\
        $brando \"Marl B\" isa name;\n\
        (actor: $brando, $char, production-with-cast: $prod);\n\
        get $char, $prod;";
    let expected = typeql_match!(
        var("brando").eq("Marl B").isa("name"),
        rel(("actor", "brando"))
            .rel("char")
            .rel(("production-with-cast", "prod"))
    )
    .unwrap()
    .get(["char", "prod"]);
    assert_match_eq(expected, query);
}

#[test]
fn test_role_type_scoped_by_variable() {
    let query = "match\n$x relates spouse;";
    let expected = typeql_match!(var("x").relates("spouse")).unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_role_type_not_scoped() {
    let query = "match\nmarriage relates $s;";
    let expected = typeql_match!(type_("marriage").relates(var("s"))).unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_predicate_query_with_disjunction() {
    let query = "match\n\
        $x isa movie,\n    has title $t;\n\
        {\n    $t \"Apocalypse Now\";\n\
        } or {\n    $t < \"Juno\";\n    $t > \"Godfather\";\n\
        } or {\n    $t \"Spy\";\n};\n\
        $t != \"Apocalypse Now\";";
    let expected = typeql_match!(
        var("x").isa("movie").has(("title", var("t"))),
        or!(
            var("t").eq("Apocalypse Now"),
            and!(var("t").lt("Juno"), var("t").gt("Godfather")),
            var("t").eq("Spy")
        ),
        var("t").neq("Apocalypse Now")
    )
    .unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_predicate_query_with_conjunctive_branch() {
    let query = "match\n\
        $x isa movie,\n    has title $t;\n\
        {\n    $t <= \"Juno\";\n    $t >= \"Godfather\";\n    $t != \"Heat\";\n\
        } or {\n    $t \"The Muppets\";\n};";
    let expected = typeql_match!(
        var("x").isa("movie").has(("title", var("t"))),
        or!(
            and!(
                var("t").lte("Juno"),
                var("t").gte("Godfather"),
                var("t").neq("Heat")
            ),
            var("t").eq("The Muppets")
        )
    )
    .unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_predicate_query_contains_and_like() {
    let query = "match\n\
        ($x, $y);\n\
        $y isa person,\n    has name $n;\n\
        {\n    $n contains \"ar\";\n} or {\n    $n like \"^M.*$\";\n};";
    let expected = typeql_match!(
        rel("x").rel("y"),
        var("y").isa("person").has(("name", var("n"))),
        or!(var("n").contains("ar"), var("n").like("^M.*$"))
    )
    .unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_predicate_between_variables() {
    let query = "match\n\
        $x has age $y;\n\
        $y >= $z;\n\
        $z 18 isa age;";
    let expected = typeql_match!(
        var("x").has(("age", var("y"))),
        var("y").gte(var("z")),
        var("z").eq(18).isa("age")
    )
    .unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_concept_variables_and_negations() {
    let query = "match\n\
        $x sub $z;\n\
        $y sub $z;\n\
        $a isa $x;\n\
        $b isa $y;\n\
        not { $x is $y; };\n\
        not { $a is $b; };";
    let expected = typeql_match!(
        var("x").sub(var("z")),
        var("y").sub(var("z")),
        var("a").isa(var("x")),
        var("b").isa(var("y")),
        not(var("x").is("y")),
        not(var("a").is("b"))
    )
    .unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_value_equals_variable() {
    let query = "match\n$s1 = $s2;";
    let expected = typeql_match!(var("s1").eq(var("s2"))).unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_anonymous_statement_with_has_chain() {
    let query = "match\n\
        $x has release-date >= $r;\n\
        $_ has title \"Spy\",\n    has release-date $r;";
    let expected = typeql_match!(
        var("x").has(("release-date", gte(var("r")))),
        var(())
            .has(("title", "Spy"))
            .has(("release-date", var("r")))
    )
    .unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_predicates_on_attribute_values() {
    let query = "match\n\
        $x has release-date < 1986-03-03T00:00,\n\
        \u{20}   has tmdb-vote-count 100,\n\
        \u{20}   has tmdb-vote-average <= 9.0;";
    let expected = typeql_match!(var("x")
        .has(("release-date", lt(date(1986, 3, 3))))
        .has(("tmdb-vote-count", 100))
        .has(("tmdb-vote-average", lte(9.0))))
    .unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_long_predicate_in_has_chain() {
    let query = "match\n$x isa movie,\n    has tmdb-vote-count <= 400;";
    let expected =
        typeql_match!(var("x").isa("movie").has(("tmdb-vote-count", lte(400)))).unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_variables_everywhere() {
    let query = "match\n\
        ($p: $x, $y);\n\
        $x isa $z;\n\
        $y \"crime\";\n\
        $z sub production;\n\
        has-genre relates $p;";
    let expected = typeql_match!(
        rel((var("p"), var("x"))).rel("y"),
        var("x").isa(var("z")),
        var("y").eq("crime"),
        var("z").sub("production"),
        type_("has-genre").relates(var("p"))
    )
    .unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_relates_with_type_variable() {
    let query = "match\n$x isa $type;\n$type relates someRole;";
    let expected =
        typeql_match!(var("x").isa(var("type")), var("type").relates("someRole")).unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_or_query() {
    let query = "match\n\
        $x isa movie;\n\
        {\n    $y \"drama\" isa genre;\n    ($x, $y);\n\
        } or {\n    $x \"The Muppets\";\n};";
    let expected = typeql_match!(
        var("x").isa("movie"),
        or!(
            and!(var("y").eq("drama").isa("genre"), rel("x").rel("y")),
            var("x").eq("The Muppets")
        )
    )
    .unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_nested_conjunction_and_disjunction() {
    let query = "match\n\
        $y isa $p;\n\
        {\n    ($y, $q);\n\
        } or {\n    $x isa $p;\n    {\n        $x has first-name $y;\n\
        \u{20}   } or {\n        $x has last-name $z;\n    };\n};";
    let expected = typeql_match!(
        var("y").isa(var("p")),
        or!(
            rel("y").rel("q"),
            and!(
                var("x").isa(var("p")),
                or!(
                    var("x").has(("first-name", var("y"))),
                    var("x").has(("last-name", var("z")))
                )
            )
        )
    )
    .unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_schema_query_with_sort() {
    let query = "match\n$x plays starring:actor;\nsort $x asc;";
    let expected = typeql_match!(var("x").plays(("starring", "actor")))
        .unwrap()
        .sort([("x", SortOrder::Asc)]);
    assert_match_eq(expected, query);
}

#[test]
fn test_sort_descending() {
    let query = "match\n$x isa movie,\n    has rating $r;\nsort $r desc;";
    let expected = typeql_match!(var("x").isa("movie").has(("rating", var("r"))))
        .unwrap()
        .sort([("r", SortOrder::Desc)]);
    assert_match_eq(expected, query);
}

#[test]
fn test_sort_limit() {
    let query = "match\n$x isa movie,\n    has rating $r;\nsort $r; limit 10;";
    let expected = typeql_match!(var("x").isa("movie").has(("rating", var("r"))))
        .unwrap()
        .sort(["r"])
        .limit(10);
    assert_match_eq(expected, query);
}

#[test]
fn test_sort_offset_limit() {
    let query = "match\n\
        $x isa movie,\n    has rating $r;\n\
        sort $r desc, $x asc; offset 10; limit 10;";
    let expected = typeql_match!(var("x").isa("movie").has(("rating", var("r"))))
        .unwrap()
        .sort([("r", SortOrder::Desc), ("x", SortOrder::Asc)])
        .offset(10)
        .limit(10);
    assert_match_eq(expected, query);
}

#[test]
fn test_offset_limit() {
    let query = "match\n$y isa movie,\n    has title $n;\noffset 2; limit 4;";
    let expected = typeql_match!(var("y").isa("movie").has(("title", var("n"))))
        .unwrap()
        .offset(2)
        .limit(4);
    assert_match_eq(expected, query);
}

#[test]
fn test_value_type_query() {
    let query = "match\n$x value double;";
    let expected = typeql_match!(var("x").value(ValueType::Double)).unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_datetime_value_type() {
    let query = "match\n$x value datetime;";
    let expected = typeql_match!(var("x").value(ValueType::DateTime)).unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_match_as_overrides() {
    let query = "match\n\
        $f sub parenthood,\n\
        \u{20}   relates father as parent,\n\
        \u{20}   relates son as child;";
    let expected = typeql_match!(var("f")
        .sub("parenthood")
        .relates(("father", "parent"))
        .relates(("son", "child")))
    .unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_regex_attribute_type() {
    let query = "match\n$x regex \"(fe)?male\";";
    let expected = typeql_match!(var("x").regex("(fe)?male")).unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_has_without_attribute_value() {
    let query = "match\n$_ has title \"Godfather\",\n    has tmdb-vote-count $x;";
    let expected = typeql_match!(var(())
        .has(("title", "Godfather"))
        .has(("tmdb-vote-count", var("x"))))
    .unwrap();
    assert_match_eq(expected, query);
}

// ============================================================================
// Date-time literals
// ============================================================================

#[test]
fn test_date_with_time() {
    let query = "match\n$x has release-date 1000-11-12T13:14:15;";
    let expected =
        typeql_match!(var("x").has(("release-date", date_time(1000, 11, 12, 13, 14, 15)))).unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_date_big_year() {
    let query = "match\n$x has release-date +12345-12-25T00:00;";
    let expected = typeql_match!(var("x").has(("release-date", date(12345, 12, 25)))).unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_date_small_year() {
    let query = "match\n$x has release-date 0867-01-01T00:00;";
    let expected = typeql_match!(var("x").has(("release-date", date(867, 1, 1)))).unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_date_negative_year() {
    let query = "match\n$x has release-date -3200-01-01T00:00;";
    let expected = typeql_match!(var("x").has(("release-date", date(-3200, 1, 1)))).unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_date_millis() {
    let query = "match\n$x has release-date 1000-11-12T13:14:15.123;";
    let value = NaiveDate::from_ymd_opt(1000, 11, 12)
        .unwrap()
        .and_hms_milli_opt(13, 14, 15, 123)
        .unwrap();
    let expected = typeql_match!(var("x").has(("release-date", value))).unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_date_millis_shorthand() {
    let query = "match\n$x has release-date 1000-11-12T13:14:15.1;";
    let canonical = "match\n$x has release-date 1000-11-12T13:14:15.100;";
    let value = NaiveDate::from_ymd_opt(1000, 11, 12)
        .unwrap()
        .and_hms_milli_opt(13, 14, 15, 100)
        .unwrap();
    let expected = typeql_match!(var("x").has(("release-date", value))).unwrap();
    let parsed = parse_query(query).unwrap().into_match().unwrap();
    assert_eq!(expected, parsed);
    assert_eq!(canonical, parsed.to_string());
}

#[test]
fn test_date_overprecise_fraction_is_rejected() {
    let query = "match\n$x has release-date 1000-11-12T13:14:15.000123456;";
    let error = parse_query(query).unwrap_err();
    assert!(error.to_string().contains("no viable alternative"));
}

#[test]
fn test_datetime_overprecise_nanos_is_rejected() {
    let value = NaiveDate::from_ymd_opt(1000, 11, 12)
        .unwrap()
        .and_hms_nano_opt(13, 14, 15, 123_450_000)
        .unwrap();
    let error = Value::date_time(value).unwrap_err();
    assert!(error.to_string().contains("more precise than 1 millisecond"));
}

// ============================================================================
// Double literals
// ============================================================================

#[test]
fn test_double_exponent_normalizes() {
    let query = "match\n$x has rating 1.5e3;";
    let canonical = "match\n$x has rating 1500.0;";
    let expected = typeql_match!(var("x").has(("rating", 1500.0))).unwrap();
    let parsed = parse_query(query).unwrap().into_match().unwrap();
    assert_eq!(expected, parsed);
    assert_eq!(canonical, parsed.to_string());
}

#[test]
fn test_double_exponent_without_fraction() {
    let expected = typeql_match!(var("x").has(("rating", 2e-2))).unwrap();
    let parsed = parse_query("match\n$x has rating 2E-2;")
        .unwrap()
        .into_match()
        .unwrap();
    assert_eq!(expected, parsed);
    assert_eq!("match\n$x has rating 0.02;", parsed.to_string());
}

#[test]
fn test_long_overflow_is_rejected() {
    let error = parse_query("match\n$x 92233720368547758080;")
        .unwrap_err()
        .to_string();
    assert!(error.contains("no viable alternative"), "error was: {}", error);
}

#[test]
fn test_double_overflow_is_rejected() {
    let error = parse_query("match\n$x 1e999;").unwrap_err().to_string();
    assert!(error.contains("no viable alternative"), "error was: {}", error);
}

// ============================================================================
// Aggregates and grouping
// ============================================================================

#[test]
fn test_aggregate_count() {
    let query = "match\n($x, $y) isa friendship;\nget $x, $y;\ncount;";
    let expected = typeql_match!(rel("x").rel("y").isa("friendship"))
        .unwrap()
        .get(["x", "y"])
        .count();
    assert_match_eq(expected, query);
}

#[test]
fn test_aggregate_group_count() {
    let query = "match\n($x, $y) isa friendship;\nget $x, $y;\ngroup $x; count;";
    let expected = typeql_match!(rel("x").rel("y").isa("friendship"))
        .unwrap()
        .get(["x", "y"])
        .group("x")
        .count();
    assert_match_eq(expected, query);
}

#[test]
fn test_group_aggregate_max() {
    let query = "match\n$x has age $a;\ngroup $x; max $a;";
    let expected = typeql_match!(var("x").has(("age", var("a"))))
        .unwrap()
        .group("x")
        .max("a");
    assert_match_eq(expected, query);
}

#[test]
fn test_multi_line_group_aggregate_max() {
    let query = "match\n\
        ($x, $y) isa friendship;\n\
        $y has age $z;\n\
        group $x; max $z;";
    let expected = typeql_match!(
        rel("x").rel("y").isa("friendship"),
        var("y").has(("age", var("z")))
    )
    .unwrap()
    .group("x")
    .max("z");
    assert_match_eq(expected, query);
}

#[test]
fn test_filtered_group_aggregate_max() {
    let query = "match\n\
        ($x, $y) isa friendship;\n\
        $y has age $z;\n\
        get $x, $y, $z;\n\
        group $x; max $z;";
    let expected = typeql_match!(
        rel("x").rel("y").isa("friendship"),
        var("y").has(("age", var("z")))
    )
    .unwrap()
    .get(["x", "y", "z"])
    .group("x")
    .max("z");
    assert_match_eq(expected, query);
}

#[test]
fn test_count_after_has_chain() {
    let query = "match\n$x isa movie,\n    has title \"Godfather\";\ncount;";
    let expected = typeql_match!(var("x").isa("movie").has(("title", "Godfather")))
        .unwrap()
        .count();
    assert_match_eq(expected, query);
}

#[test]
fn test_group_without_aggregate() {
    let query = "match\n$x isa movie;\ngroup $x;";
    let expected = typeql_match!(var("x").isa("movie")).unwrap().group("x");
    assert_match_eq(expected, query);
}

#[test]
fn test_aggregate_std() {
    let query = "match\n$x isa movie;\nstd $x;";
    let expected = typeql_match!(var("x").isa("movie")).unwrap().std("x");
    assert_match_eq(expected, query);
}

#[test]
fn test_aggregate_round_trip_text() {
    let query = "match\n$x isa movie;\nget $x;\ngroup $x; count;";
    assert_eq!(query, parse_query(query).unwrap().to_string());
}

// ============================================================================
// Insert, delete and update queries
// ============================================================================

#[test]
fn test_insert_query() {
    let query = "insert\n$_ isa movie,\n    has title \"The Title\";";
    let expected = typeql_insert!(var(()).isa("movie").has(("title", "The Title"))).unwrap();
    assert_query_eq(expected, query);
}

#[test]
fn test_delete_query() {
    let query = "match\n\
        $x isa movie,\n    has title \"The Title\";\n\
        $y isa movie;\n\
        delete\n\
        $x isa movie;\n\
        $y isa movie;";
    let expected = typeql_match!(
        var("x").isa("movie").has(("title", "The Title")),
        var("y").isa("movie")
    )
    .unwrap()
    .delete([var("x").isa("movie"), var("y").isa("movie")]);
    assert_query_eq(expected, query);
}

#[test]
fn test_multi_statement_insert() {
    let query = "insert\n\
        $x isa pokemon,\n    has name \"Pichu\";\n\
        $y isa pokemon,\n    has name \"Pikachu\";\n\
        $z isa pokemon,\n    has name \"Raichu\";\n\
        (evolves-from: $x, evolves-to: $y) isa evolution;\n\
        (evolves-from: $y, evolves-to: $z) isa evolution;";
    let expected = typeql_insert!(
        var("x").isa("pokemon").has(("name", "Pichu")),
        var("y").isa("pokemon").has(("name", "Pikachu")),
        var("z").isa("pokemon").has(("name", "Raichu")),
        rel(("evolves-from", "x"))
            .rel(("evolves-to", "y"))
            .isa("evolution"),
        rel(("evolves-from", "y"))
            .rel(("evolves-to", "z"))
            .isa("evolution")
    )
    .unwrap();
    assert_query_eq(expected, query);
}

#[test]
fn test_update_query() {
    let query = "match\n\
        $x isa person,\n    has name \"alice\",\n    has age $a;\n\
        delete\n\
        $x has $a;\n\
        insert\n\
        $x has age 25;";
    let expected = typeql_match!(var("x")
        .isa("person")
        .has(("name", "alice"))
        .has(("age", var("a"))))
    .unwrap()
    .delete([var("x").has(var("a"))])
    .insert([var("x").has(("age", 25))]);
    assert_query_eq(expected, query);
}

#[test]
fn test_match_insert() {
    let query = "match\n$x isa language;\ninsert\n$x has name \"HELLO\";";
    let expected = typeql_match!(var("x").isa("language"))
        .unwrap()
        .insert([var("x").has(("name", "HELLO"))]);
    assert_query_eq(expected, query);
}

#[test]
fn test_insert_boolean() {
    let query = "insert\n$_ has flag true;";
    let expected = typeql_insert!(var(()).has(("flag", true))).unwrap();
    assert_query_eq(expected, query);
}

#[test]
fn test_insert_escaped_string() {
    let input = r#"This has \"double quotes\" and a single-quoted backslash: \'\\\'"#;
    let query = format!("insert\n$_ isa movie,\n    has title \"{}\";", input);
    let expected = typeql_insert!(var(()).isa("movie").has(("title", input))).unwrap();
    assert_query_eq(expected, &query);
}

// ============================================================================
// Define and undefine queries
// ============================================================================

#[test]
fn test_define_as_overrides() {
    let query = "define\n\
        parent sub role;\n\
        child sub role;\n\
        parenthood sub relation,\n\
        \u{20}   relates parent,\n\
        \u{20}   relates child;\n\
        fatherhood sub parenthood,\n\
        \u{20}   relates father as parent,\n\
        \u{20}   relates son as child;";
    let expected = typeql_define!(
        type_("parent").sub("role"),
        type_("child").sub("role"),
        type_("parenthood")
            .sub("relation")
            .relates("parent")
            .relates("child"),
        type_("fatherhood")
            .sub("parenthood")
            .relates(("father", "parent"))
            .relates(("son", "child"))
    )
    .unwrap();
    assert_query_eq(expected, query);
}

#[test]
fn test_define_owns_override() {
    let query = "define\n\
        triangle sub entity;\n\
        triangle owns side-length;\n\
        triangle-right-angled sub triangle;\n\
        triangle-right-angled owns hypotenuse-length as side-length;";
    let expected = typeql_define!(
        type_("triangle").sub("entity"),
        type_("triangle").owns("side-length"),
        type_("triangle-right-angled").sub("triangle"),
        type_("triangle-right-angled").owns(("hypotenuse-length", "side-length"))
    )
    .unwrap();
    assert_query_eq(expected, query);
}

#[test]
fn test_define_plays_override() {
    let query = "define\n\
        pokemon sub entity;\n\
        evolves sub relation;\n\
        evolves relates from,\n    relates to;\n\
        evolves-final sub evolves;\n\
        evolves-final relates from-final as from;\n\
        pokemon plays evolves-final:from-final as from;";
    let expected = typeql_define!(
        type_("pokemon").sub("entity"),
        type_("evolves").sub("relation"),
        type_("evolves").relates("from").relates("to"),
        type_("evolves-final").sub("evolves"),
        type_("evolves-final").relates(("from-final", "from")),
        type_("pokemon").plays(("evolves-final", "from-final", "from"))
    )
    .unwrap();
    assert_query_eq(expected, query);
}

#[test]
fn test_define_schema() {
    let query = "define\n\
        pokemon sub entity;\n\
        evolution sub relation;\n\
        evolves-from sub role;\n\
        evolves-to sub role;\n\
        evolves relates from,\n    relates to;\n\
        pokemon plays evolves:from,\n    plays evolves:to,\n    owns name;";
    let expected = typeql_define!(
        type_("pokemon").sub("entity"),
        type_("evolution").sub("relation"),
        type_("evolves-from").sub("role"),
        type_("evolves-to").sub("role"),
        type_("evolves").relates("from").relates("to"),
        type_("pokemon")
            .plays(("evolves", "from"))
            .plays(("evolves", "to"))
            .owns("name")
    )
    .unwrap();
    assert_query_eq(expected, query);
}

#[test]
fn test_undefine_schema() {
    let query = "undefine\n\
        pokemon sub entity;\n\
        evolution sub relation;\n\
        evolves-from sub role;\n\
        evolves-to sub role;\n\
        evolves relates from,\n    relates to;\n\
        pokemon plays evolves:from,\n    plays evolves:to,\n    owns name;";
    let expected = typeql_undefine!(
        type_("pokemon").sub("entity"),
        type_("evolution").sub("relation"),
        type_("evolves-from").sub("role"),
        type_("evolves-to").sub("role"),
        type_("evolves").relates("from").relates("to"),
        type_("pokemon")
            .plays(("evolves", "from"))
            .plays(("evolves", "to"))
            .owns("name")
    )
    .unwrap();
    assert_query_eq(expected, query);
}

#[test]
fn test_define_abstract_entity() {
    let query = "define\n\
        concrete-type sub entity;\n\
        abstract-type sub entity,\n    abstract;";
    let expected = typeql_define!(
        type_("concrete-type").sub("entity"),
        type_("abstract-type").sub("entity").abstract_()
    )
    .unwrap();
    assert_query_eq(expected, query);
}

#[test]
fn test_define_value_type() {
    let query = "define\nmy-type sub attribute,\n    value long;";
    let expected =
        typeql_define!(type_("my-type").sub("attribute").value(ValueType::Long)).unwrap();
    assert_query_eq(expected, query);
}

#[test]
fn test_define_annotations() {
    let query = "define\ne1 owns a1 @key;\ne2 owns a2 @unique;";
    let expected = typeql_define!(
        type_("e1").owns(("a1", Annotation::Key)),
        type_("e2").owns(("a2", Annotation::Unique))
    )
    .unwrap();
    assert_query_eq(expected, query);
}

#[test]
fn test_define_attribute_regex() {
    let query = "define\ndigit sub attribute,\n    regex \"\\d\";";
    let expected = typeql_define!(type_("digit").sub("attribute").regex("\\d")).unwrap();
    assert_query_eq(expected, query);
}

#[test]
fn test_undefine_attribute_regex() {
    let query = "undefine\ndigit regex \"\\d\";";
    let expected = typeql_undefine!(type_("digit").regex("\\d")).unwrap();
    assert_query_eq(expected, query);
}

#[test]
fn test_define_rule() {
    let query = "define\n\
        rule all-movies-are-drama: when {\n\
        \u{20}   $x isa person;\n\
        \u{20}   not {\n\
        \u{20}       $x has name \"Alice\";\n\
        \u{20}       $x has name \"Bob\";\n\
        \u{20}   };\n\
        \u{20}   {\n\
        \u{20}       ($x) isa friendship;\n\
        \u{20}   } or {\n\
        \u{20}       ($x) isa employment;\n\
        \u{20}   };\n\
        } then {\n\
        \u{20}   $x has is_interesting true;\n\
        };";
    let when = and!(
        var("x").isa("person"),
        not(and!(
            var("x").has(("name", "Alice")),
            var("x").has(("name", "Bob"))
        )),
        or!(
            rel(var("x")).isa("friendship"),
            rel(var("x")).isa("employment")
        )
    );
    let then = var("x").has(("is_interesting", true));
    let expected = typeql_define!(rule("all-movies-are-drama").when(when).then(then)).unwrap();
    assert_query_eq(expected, query);
}

// ============================================================================
// Patterns and miscellany
// ============================================================================

#[test]
fn test_parse_pattern_group() {
    let pattern = "{\n\
        \u{20}   (wife: $a, husband: $b) isa marriage;\n\
        \u{20}   $a has gender \"male\";\n\
        \u{20}   $b has gender \"female\";\n\
        }";
    let parsed = parse_pattern(pattern).unwrap();
    let expected = Pattern::from(and!(
        rel(("wife", "a")).rel(("husband", "b")).isa("marriage"),
        var("a").has(("gender", "male")),
        var("b").has(("gender", "female"))
    ));
    assert_eq!(expected, parsed);
    assert_eq!(pattern, expected.to_string());
    assert_eq!(expected, parse_pattern(&parsed.to_string()).unwrap());
}

#[test]
fn test_comments_are_ignored() {
    let query = "match\n\n# there's a comment here\n$x isa###WOW HERES ANOTHER###\r\nmovie; count;";
    let expected = typeql_match!(var("x").isa("movie")).unwrap().count();
    let parsed = parse_query(query).unwrap().into_match().unwrap();
    assert_eq!(expected, parsed);
    assert_eq!(
        expected,
        parse_query(&parsed.to_string()).unwrap().into_match().unwrap()
    );
}

#[test]
fn test_query_kind_dispatch() {
    assert!(parse_query("match\n$x isa movie;").unwrap().is_match());
}

#[test]
fn test_value_equality_round_trip() {
    let expected = typeql_match!(var("x").eq(var("y"))).unwrap();
    let parsed = parse_query(&expected.to_string()).unwrap().into_match().unwrap();
    assert_eq!(expected, parsed);
}

#[test]
fn test_regex_like_character_class() {
    let query = "match\n$x like \"\\d\";";
    let expected = typeql_match!(var("x").like("\\d")).unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_regex_like_quote() {
    let query = "match\n$x like \"\\\"\";";
    let expected = typeql_match!(var("x").like("\\\"")).unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_regex_like_backslash() {
    let query = "match\n$x like \"\\\\\";";
    let expected = typeql_match!(var("x").like("\\\\")).unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_regex_like_newline() {
    let query = "match\n$x like \"\\n\";";
    let expected = typeql_match!(var("x").like("\\n")).unwrap();
    assert_match_eq(expected, query);
}

#[test]
fn test_regex_like_forward_slash_unescapes() {
    let query = "match\n$x like \"\\/\";";
    let expected = typeql_match!(var("x").like("/")).unwrap();
    assert_match_eq(expected, query);
}

// ============================================================================
// Error reporting
// ============================================================================

#[test]
fn test_syntax_error_at_end_of_input() {
    let error = parse_query("match\n$x isa").unwrap_err().to_string();
    assert!(error.contains("syntax error"));
    assert!(error.contains("line 2"));
    assert!(error.contains("\n$x isa"));
    assert!(error.contains("\n      ^"));
}

#[test]
fn test_syntax_error_ignores_trailing_whitespace() {
    let error = parse_query("match\n$x isa \n").unwrap_err().to_string();
    assert!(error.contains("syntax error"));
    assert!(error.contains("line 2"));
    assert!(error.contains("\n$x isa"));
    assert!(error.contains("\n      ^"));
}

#[test]
fn test_syntax_error_retains_whitespace() {
    let error = parse_query("match\n$x isa ").unwrap_err().to_string();
    assert!(!error.contains("match$xisa"));
    assert!(error.contains("$x isa"));
}

#[test]
fn test_syntax_error_pointer() {
    let error = parse_query("match\n$x of").unwrap_err().to_string();
    assert!(error.contains("\n$x of"));
    assert!(error.contains("\n   ^"));
}

#[test]
fn test_error_line_shows_source() {
    let error = parse_query("define\nperson sub entity has name;")
        .unwrap_err()
        .to_string();
    assert!(error.contains("\nperson sub entity has name;"));
}

#[test]
fn test_empty_query_is_an_error() {
    assert!(parse_query("").is_err());
}

#[test]
fn test_two_queries_as_one_is_an_error() {
    assert!(parse_query("insert\n$x isa movie; insert $y isa movie").is_err());
}

#[test]
fn test_missing_colon_in_relation() {
    assert!(parse_query("match\n(actor $x, $y) isa has-cast;").is_err());
}

#[test]
fn test_missing_comma_in_relation() {
    assert!(parse_query("match\n($x $y) isa has-cast;").is_err());
}

#[test]
fn test_limit_typo() {
    let error = parse_query("match\n($x, $y); limit1;").unwrap_err().to_string();
    assert!(error.contains("limit1"));
}

#[test]
fn test_group_without_variable() {
    assert!(parse_query("match\n$x isa name; group;").is_err());
}

#[test]
fn test_unknown_aggregate_name() {
    assert!(parse_query("match\n$x isa name; hello $x;").is_err());
}

#[test]
fn test_count_does_not_take_a_variable() {
    assert!(parse_query("match\n$x isa name; count $x;").is_err());
}

#[test]
fn test_unterminated_string() {
    assert!(parse_query("match\n$x isa \"movie;").is_err());
}

// ============================================================================
// Multi-query parsing
// ============================================================================

#[test]
fn test_queries_single_match() {
    let queries: Vec<_> = parse_queries("match\n$y isa movie;")
        .map(Result::unwrap)
        .collect();
    let expected = typeql_match!(var("y").isa("movie")).unwrap();
    assert_eq!(vec![Query::from(expected)], queries);
}

#[test]
fn test_queries_single_insert() {
    let queries: Vec<_> = parse_queries("insert\n$x isa movie;")
        .map(Result::unwrap)
        .collect();
    let expected = typeql_insert!(var("x").isa("movie")).unwrap();
    assert_eq!(vec![Query::from(expected)], queries);
}

#[test]
fn test_queries_leading_whitespace() {
    let queries: Vec<_> = parse_queries(" insert $x isa movie;")
        .map(Result::unwrap)
        .collect();
    let expected = typeql_insert!(var("x").isa("movie")).unwrap();
    assert_eq!(vec![Query::from(expected)], queries);
}

#[test]
fn test_queries_leading_comment() {
    let queries: Vec<_> = parse_queries("#hola\ninsert $x isa movie;")
        .map(Result::unwrap)
        .collect();
    let expected = typeql_insert!(var("x").isa("movie")).unwrap();
    assert_eq!(vec![Query::from(expected)], queries);
}

#[test]
fn test_queries_insert_then_match() {
    let queries: Vec<_> = parse_queries("insert\n$x isa movie;match\n$y isa movie;")
        .map(Result::unwrap)
        .collect();
    let insert = typeql_insert!(var("x").isa("movie")).unwrap();
    let match_ = typeql_match!(var("y").isa("movie")).unwrap();
    assert_eq!(vec![Query::from(insert), Query::from(match_)], queries);
}

#[test]
fn test_queries_match_insert_is_one_query() {
    let queries: Vec<_> = parse_queries("match\n$x isa person; insert $x has name \"bob\";")
        .map(Result::unwrap)
        .collect();
    let expected = typeql_match!(var("x").isa("person"))
        .unwrap()
        .insert([var("x").has(("name", "bob"))]);
    assert_eq!(vec![Query::from(expected)], queries);
}

#[test]
fn test_queries_many_match_inserts_without_stack_overflow() {
    let num_queries = 10_000;
    let one = "match\n$x isa person; insert $x has name 'bob';\n";
    let mut text = String::new();
    for _ in 0..num_queries {
        text.push_str(one);
    }

    let expected = typeql_match!(var("x").isa("person"))
        .unwrap()
        .insert([var("x").has(("name", "bob"))]);

    let queries: Vec<_> = parse_queries(&text)
        .map(|q| q.unwrap().into_insert().unwrap())
        .collect();
    assert_eq!(queries.len(), num_queries);
    for query in &queries {
        assert_eq!(&expected, query);
    }
}

#[test]
fn test_queries_stop_after_first_error() {
    let mut queries = parse_queries("match\n$x isa movie;\nmatch\n$y isa");
    assert!(queries.next().unwrap().is_ok());
    assert!(queries.next().unwrap().is_err());
    assert!(queries.next().is_none());
}

#[test]
fn test_queries_lexical_error_is_local_to_its_query() {
    // the bad literal in the second query must not mask the first
    let mut queries = parse_queries("match\n$x isa movie;\nmatch\n$y isa \"oops");
    assert!(queries.next().unwrap().is_ok());
    assert!(queries.next().unwrap().is_err());
    assert!(queries.next().is_none());
}

#[test]
fn test_queries_keyword_inside_string_does_not_split() {
    let queries: Vec<_> = parse_queries("insert\n$x has name \"match one\";")
        .map(Result::unwrap)
        .collect();
    assert_eq!(1, queries.len());
}

#[test]
fn test_queries_variable_named_match_does_not_split() {
    let queries: Vec<_> = parse_queries("match\n$match isa movie;")
        .map(Result::unwrap)
        .collect();
    assert_eq!(1, queries.len());
}

#[test]
fn test_queries_report_lines_per_query() {
    // line numbers are relative to the start of the failing query
    let error = parse_queries("match\n$x isa movie;\nmatch\n$y isa")
        .nth(1)
        .unwrap()
        .unwrap_err()
        .to_string();
    assert!(error.contains("line 2"), "error was: {}", error);
}
