//! Chess rules engine tests

use tandem::rules::{ChessRules, MoveRejected, RulesEngine};
use tandem::Side;

const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

fn play(rules: &ChessRules, moves: &[(&str, &str)]) -> String {
    let mut position = rules.initial_position();
    for (from, to) in moves {
        position = rules
            .apply_move(&position, from, to, None)
            .unwrap_or_else(|e| panic!("{}{} should be legal: {}", from, to, e));
    }
    position
}

#[test]
fn test_initial_position() {
    let rules = ChessRules::new();
    assert_eq!(rules.initial_position(), START);
    assert_eq!(rules.side_to_move(START).unwrap(), Side::White);
    assert!(!rules.is_terminal(START));
}

#[test]
fn test_legal_move_advances_turn() {
    let rules = ChessRules::new();
    let position = rules.apply_move(START, "e2", "e4", None).unwrap();

    assert!(position.starts_with("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b"));
    assert_eq!(rules.side_to_move(&position).unwrap(), Side::Black);
}

#[test]
fn test_squares_are_case_insensitive() {
    let rules = ChessRules::new();
    let upper = rules.apply_move(START, "G1", " F3 ", None).unwrap();
    let lower = rules.apply_move(START, "g1", "f3", None).unwrap();
    assert_eq!(upper, lower);
}

#[test]
fn test_illegal_move_rejected() {
    let rules = ChessRules::new();
    assert!(matches!(
        rules.apply_move(START, "e2", "e5", None),
        Err(MoveRejected::IllegalMove(_))
    ));
    // Black piece while white is to move
    assert!(matches!(
        rules.apply_move(START, "e7", "e5", None),
        Err(MoveRejected::IllegalMove(_))
    ));
}

#[test]
fn test_garbage_rejected() {
    let rules = ChessRules::new();
    assert!(matches!(
        rules.apply_move(START, "e2", "e9", None),
        Err(MoveRejected::InvalidMove(_))
    ));
    assert!(matches!(
        rules.apply_move("not a position", "e2", "e4", None),
        Err(MoveRejected::InvalidPosition(_))
    ));
    assert!(rules.side_to_move("nonsense").is_err());
    assert!(!rules.is_terminal("nonsense"));
}

#[test]
fn test_promotion_defaults_to_queen() {
    let rules = ChessRules::new();
    let position = "8/P7/8/8/8/8/8/k6K w - - 0 1";

    let queen = rules.apply_move(position, "a7", "a8", None).unwrap();
    assert!(queen.starts_with("Q7/"), "got {}", queen);

    let knight = rules.apply_move(position, "a7", "a8", Some("n")).unwrap();
    assert!(knight.starts_with("N7/"), "got {}", knight);
}

#[test]
fn test_checkmate_is_terminal() {
    let rules = ChessRules::new();
    let position = play(&rules, &[("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")]);

    assert!(rules.is_terminal(&position));
    assert_eq!(
        rules.apply_move(&position, "e1", "f2", None),
        Err(MoveRejected::GameOver)
    );
}

#[test]
fn test_bare_kings_are_terminal() {
    let rules = ChessRules::new();
    assert!(rules.is_terminal("8/8/8/8/8/8/8/k6K w - - 0 1"));
}

#[test]
fn test_castling_round_trips_through_position() {
    let rules = ChessRules::new();
    let position = play(
        &rules,
        &[
            ("e2", "e4"),
            ("e7", "e5"),
            ("g1", "f3"),
            ("b8", "c6"),
            ("f1", "c4"),
            ("g8", "f6"),
            ("e1", "g1"),
        ],
    );
    assert!(position.contains("RNBQ1RK1"), "got {}", position);
    assert!(position.contains(" b kq "), "got {}", position);
}
