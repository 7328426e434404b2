//! Тесты лексера через публичный API.

use proptest::prelude::*;
use screenit_lang::parser::{tokenize, Lexer, Position, TokenKind};

#[test]
fn test_if_else_program_token_stream() {
    let tokens = tokenize("var x = 2; if (x > 1) { screenit x; } else { screenit 0; }");
    assert_eq!(tokens.len(), 23);

    let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "var", "x", "=", "2", ";", "if", "(", "x", ">", "1", ")", "{", "screenit", "x", ";",
            "}", "else", "{", "screenit", "0", ";", "}", ""
        ]
    );
    assert_eq!(tokens[2].kind, TokenKind::Operator);
    assert_eq!(tokens[8].kind, TokenKind::Compare);
    assert_eq!(tokens[16].kind, TokenKind::Keyword);
    assert!(tokens[22].is_eof());
}

#[test]
fn test_debug_form_of_stream() {
    let lines: Vec<String> = tokenize("screenit 1.5;")
        .iter()
        .map(|t| t.to_string())
        .collect();
    assert_eq!(
        lines,
        vec![
            "Token(0, \"screenit\", 1, 1)",
            "Token(2, \"1.5\", 1, 10)",
            "Token(13, \";\", 1, 13)",
            "Token(16, \"\", 1, 14)",
        ]
    );
}

#[test]
fn test_multiline_positions() {
    let tokens = tokenize("func f(a) {\n    return a;\n}\n");
    let ret = tokens.iter().find(|t| t.is_keyword("return")).unwrap();
    assert_eq!(ret.position, Position::new(2, 5));
    let close = tokens.iter().rev().find(|t| t.kind == TokenKind::RightBrace).unwrap();
    assert_eq!(close.position, Position::new(3, 1));
}

#[test]
fn test_anomalies_do_not_stop_scanning() {
    let kinds: Vec<TokenKind> = tokenize("# x $ \"open").iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Unknown,
            TokenKind::Identifier,
            TokenKind::Unknown,
            TokenKind::Unknown,
            TokenKind::EndOfFile,
        ]
    );
}

#[test]
fn test_lexer_keeps_returning_eof() {
    let mut lexer = Lexer::new("x");
    assert_eq!(lexer.next_token().kind, TokenKind::Identifier);
    for _ in 0..3 {
        assert!(lexer.next_token().is_eof());
    }
}

#[test]
fn test_empty_source() {
    let tokens = tokenize("");
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].is_eof());
    assert_eq!(tokens[0].position, Position::new(1, 1));
}

// === Свойства ===

fn source_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9 +\\-*/=!<>(){};,\"\n.@_]{0,64}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_exactly_one_eof_at_end(source in source_strategy()) {
        let tokens = tokenize(&source);
        let eof_count = tokens.iter().filter(|t| t.is_eof()).count();
        prop_assert_eq!(eof_count, 1);
        prop_assert!(tokens.last().unwrap().is_eof());
    }

    #[test]
    fn prop_tokenize_is_deterministic(source in source_strategy()) {
        prop_assert_eq!(tokenize(&source), tokenize(&source));
    }

    #[test]
    fn prop_positions_never_go_back(source in source_strategy()) {
        let tokens = tokenize(&source);
        for pair in tokens.windows(2) {
            let before = (pair[0].position.line, pair[0].position.column);
            let after = (pair[1].position.line, pair[1].position.column);
            prop_assert!(before <= after, "{} then {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn prop_identifiers_round_trip(name in "[a-z_][a-z0-9_]{0,12}") {
        let tokens = tokenize(&name);
        prop_assert_eq!(tokens.len(), 2);
        prop_assert_eq!(&tokens[0].text, &name);
        prop_assert!(matches!(
            tokens[0].kind,
            TokenKind::Identifier | TokenKind::Keyword | TokenKind::BoolLiteral
        ));
    }
}
