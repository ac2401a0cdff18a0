//! Randomized tests for the statement scanner and administrative guard.
//!
//! Inputs are assembled from well-formed lexical fragments so the expected
//! classification is known, then checked across many random permutations.

use mysql_gateway_mcp::tools::guard::{ADMINISTRATIVE_VERBS, is_administrative_statement};
use mysql_gateway_mcp::tools::sql_validator::is_single_statement;
use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;

const ITERATIONS: usize = 2_000;

/// Code fragments with no `;` at all.
const PLAIN: &[&str] = &[
    "SELECT", " ", "\n", "\t", "*", "FROM", "orders", "WHERE", "id", "=", "?", "1", ",", "(", ")",
    "AND", "name", "LIKE", "'%x%'", "\"y\"", "`col`", "ü", "日本",
];

/// Closed regions that each contain a `;` which must stay inert.
const INERT: &[&str] = &[
    "'a;b'",
    "\"c;d\"",
    "`e;f`",
    "/* ; */",
    "/*! ; */",
    "/*!50000 ; */",
    "-- ;\n",
    "# ;\n",
    "'it''s;'",
    "'\\';'",
    "\"\"\";\"",
    "`a``;`",
];

/// Whitespace or comments that may precede the first real token.
const LEADING_TRIVIA: &[&str] = &[" ", "\n", "\t", "-- note\n", "# note\n", "/* note */", "/*!x*/"];

fn random_word(rng: &mut impl Rng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn random_statement(rng: &mut impl Rng, with_inert: bool) -> String {
    let parts = rng.gen_range(1..12);
    let mut sql = String::from("SELECT ");
    for _ in 0..parts {
        let pool = if with_inert && rng.gen_bool(0.4) { INERT } else { PLAIN };
        if let Some(fragment) = pool.choose(rng) {
            sql.push_str(fragment);
        }
        sql.push(' ');
    }
    sql
}

fn random_whitespace(rng: &mut impl Rng) -> String {
    let len = rng.gen_range(0..6);
    (0..len)
        .filter_map(|_| [" ", "\n", "\t", "\r"].choose(rng).copied())
        .collect()
}

fn random_trivia(rng: &mut impl Rng) -> String {
    let len = rng.gen_range(0..4);
    (0..len)
        .filter_map(|_| LEADING_TRIVIA.choose(rng).copied())
        .collect()
}

#[test]
fn fuzz_statements_without_separator_are_single() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        let sql = random_statement(&mut rng, false);
        assert!(is_single_statement(&sql), "{sql:?}");
    }
}

#[test]
fn fuzz_inert_separators_never_reject() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        let sql = random_statement(&mut rng, true);
        assert!(is_single_statement(&sql), "{sql:?}");
    }
}

#[test]
fn fuzz_trailing_separator_accepted() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        let sql = format!(
            "{}\n;{}",
            random_statement(&mut rng, true),
            random_whitespace(&mut rng)
        );
        assert!(is_single_statement(&sql), "{sql:?}");
    }
}

#[test]
fn fuzz_stacked_statement_rejected() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        // The newline closes any line comment the first statement ended with.
        let sql = format!(
            "{}\n;{}{}",
            random_statement(&mut rng, true),
            random_whitespace(&mut rng),
            random_statement(&mut rng, true)
        );
        assert!(!is_single_statement(&sql), "{sql:?}");
    }
}

#[test]
fn fuzz_arbitrary_input_never_panics() {
    let mut rng = rand::thread_rng();
    let alphabet: Vec<char> = "';\"`#-/*!\\\n abcü日\u{0}".chars().collect();
    for _ in 0..ITERATIONS {
        let len = rng.gen_range(0..64);
        let sql: String = (0..len)
            .filter_map(|_| alphabet.choose(&mut rng).copied())
            .collect();
        let _ = is_single_statement(&sql);
        let _ = is_administrative_statement(&sql);
    }
}

#[test]
fn fuzz_administrative_verbs_behind_trivia() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        let Some(verb) = ADMINISTRATIVE_VERBS.choose(&mut rng) else {
            continue;
        };
        let verb = if rng.gen_bool(0.5) {
            verb.to_lowercase()
        } else {
            verb.to_string()
        };
        let sql = format!("{}{} {}", random_trivia(&mut rng), verb, random_word(&mut rng, 8));
        assert!(is_administrative_statement(&sql), "{sql:?}");
    }
}

#[test]
fn fuzz_identifiers_extending_verbs_allowed() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        let Some(verb) = ADMINISTRATIVE_VERBS.choose(&mut rng) else {
            continue;
        };
        let sql = format!("{}{}_{}", random_trivia(&mut rng), verb, random_word(&mut rng, 4));
        assert!(!is_administrative_statement(&sql), "{sql:?}");
    }
}
