//! Integration tests for the administrative statement guard.

use mysql_gateway_mcp::error::DbError;
use mysql_gateway_mcp::tools::guard::{
    ADMINISTRATIVE_VERBS, administrative_verb, ensure_not_administrative,
    is_administrative_statement,
};
use mysql_gateway_mcp::tools::sql_validator::is_single_statement;

#[test]
fn test_drop_is_administrative_and_single() {
    let sql = "DROP TABLE users";
    assert!(is_administrative_statement(sql));
    assert!(is_single_statement(sql));
}

#[test]
fn test_every_verb_blocked_in_any_case() {
    for verb in ADMINISTRATIVE_VERBS {
        let upper = format!("{verb} something");
        let lower = format!("{} something", verb.to_lowercase());
        assert!(is_administrative_statement(&upper), "{upper}");
        assert!(is_administrative_statement(&lower), "{lower}");
        assert_eq!(administrative_verb(&lower), Some(*verb));
    }
}

#[test]
fn test_leading_trivia_skipped() {
    assert!(is_administrative_statement("   \n\tDROP TABLE t"));
    assert!(is_administrative_statement("-- cleanup\nTRUNCATE t"));
    assert!(is_administrative_statement("# cleanup\nTRUNCATE t"));
    assert!(is_administrative_statement("/* a */ /* b */ ALTER TABLE t ADD c INT"));
    assert!(is_administrative_statement("SET @x = 1"));
}

#[test]
fn test_token_boundary() {
    assert!(is_administrative_statement("KILL(42)"));
    assert!(!is_administrative_statement("DROPS"));
    assert!(!is_administrative_statement("SETTINGS"));
    assert!(!is_administrative_statement("create_report()"));
}

#[test]
fn test_read_statements_allowed() {
    for sql in [
        "",
        "   ",
        "-- only a comment",
        "/* unterminated",
        "SELECT * FROM t WHERE note = 'DROP TABLE x'",
        "SHOW TABLES",
        "DESCRIBE orders",
        "WITH drop_candidates AS (SELECT 1) SELECT * FROM drop_candidates",
        "(SELECT 1)",
        "INSERT INTO audit VALUES (1)",
    ] {
        assert!(!is_administrative_statement(sql), "{sql:?}");
    }
}

#[test]
fn test_ensure_not_administrative_names_verb() {
    let err = ensure_not_administrative("grant all on *.* to intruder").unwrap_err();
    match &err {
        DbError::AdministrativeStatement { verb } => assert_eq!(verb, "GRANT"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_safety_rejection());
    assert!(ensure_not_administrative("SELECT 1").is_ok());
}

#[test]
fn test_dynamic_sql_cannot_smuggle_a_blocked_statement() {
    for (sql, verb) in [
        ("EXECUTE IMMEDIATE 'DROP TABLE users'", "EXECUTE"),
        ("PREPARE s FROM 'DROP TABLE users'", "PREPARE"),
        ("/* reuse */ execute s", "EXECUTE"),
        ("DEALLOCATE PREPARE s", "DEALLOCATE"),
    ] {
        assert!(is_single_statement(sql), "{sql:?}");
        assert_eq!(administrative_verb(sql), Some(verb), "{sql:?}");
    }
}

#[test]
fn test_mysql_specific_comment_forms_follow_plain_comment_rules() {
    // `--` opens a comment even without trailing whitespace.
    assert!(is_single_statement("SELECT 1--1; DROP TABLE t"));
    // Versioned comments are skipped like any other block comment.
    assert!(!is_administrative_statement("/*!50000 DROP TABLE users */"));
}
