//! Capture rules.
//!
//! A placement is legal iff, along at least one of the eight directions, it
//! sandwiches a non-empty run of opponent discs against a disc of the mover's
//! color. Everything here is a pure function of the board.
use crate::game::board::State::E;
use crate::game::board::{Board, Color, State};

/// the 8 compass offsets `(d_row, d_col)`
pub const DIRECTIONS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// `false` for occupied or out of range cells.
pub fn is_legal(board: &Board, row: usize, col: usize, color: Color) -> bool {
    is_empty_cell(board, row, col)
        && DIRECTIONS
            .iter()
            .any(|&dir| capture_run(board, row, col, color, dir) > 0)
}

/// Cells flipped by playing `color` at `(row, col)`.
///
/// Empty when the move is not legal. Runs from different directions never
/// overlap, so the result holds no duplicates.
pub fn captured_cells(board: &Board, row: usize, col: usize, color: Color) -> Vec<(usize, usize)> {
    if !is_empty_cell(board, row, col) {
        return Vec::new();
    }
    DIRECTIONS
        .iter()
        .flat_map(|&(dr, dc)| {
            let run = capture_run(board, row, col, color, (dr, dc)) as isize;
            (1..=run).map(move |k| {
                (
                    (row as isize + dr * k) as usize,
                    (col as isize + dc * k) as usize,
                )
            })
        })
        .collect()
}

pub fn has_any_legal_move(board: &Board, color: Color) -> bool {
    board
        .cells()
        .any(|(row, col, s)| s == E && is_legal(board, row, col, color))
}

/// all legal cells for `color`, row-major
pub fn legal_moves(board: &Board, color: Color) -> Vec<(usize, usize)> {
    board
        .cells()
        .filter(|&(row, col, s)| s == E && is_legal(board, row, col, color))
        .map(|(row, col, _)| (row, col))
        .collect()
}

#[inline(always)]
fn is_empty_cell(board: &Board, row: usize, col: usize) -> bool {
    matches!(board.get(row, col), Ok(E))
}

/// Length of the opponent run sandwiched in one direction, 0 if none.
#[inline]
fn capture_run(board: &Board, row: usize, col: usize, color: Color, (dr, dc): (isize, isize)) -> usize {
    let own = State::from(color);
    let opponent = State::from(color.switch());
    let (mut r, mut c) = (row as isize + dr, col as isize + dc);
    let mut crossed = 0usize;
    while let Some(s) = board.at(r, c) {
        if s == opponent {
            crossed += 1;
            r += dr;
            c += dc;
        } else if s == own {
            return crossed;
        } else {
            return 0;
        }
    }
    // ran off the board without closing the line
    0
}

#[cfg(test)]
mod test_rules {
    use super::*;
    use crate::game::board::State::{B, W};
    use crate::game::random_mover::RandomMover;
    use Color::{Black, White};

    #[test]
    fn test_opening_moves() {
        let board = Board::new();
        assert!(has_any_legal_move(&board, White));
        assert_eq!(legal_moves(&board, White), vec![(2, 4), (3, 5), (4, 2), (5, 3)]);
        assert_eq!(legal_moves(&board, Black), vec![(2, 3), (3, 2), (4, 5), (5, 4)]);
    }

    #[test]
    fn test_corner_without_line_is_illegal() {
        let board = Board::new();
        for color in [Black, White] {
            assert!(!is_legal(&board, 0, 0, color));
            assert!(!is_legal(&board, 7, 7, color));
            assert!(captured_cells(&board, 0, 0, color).is_empty());
        }
    }

    #[test]
    fn test_occupied_and_out_of_range() {
        let board = Board::new();
        assert!(!is_legal(&board, 3, 3, Black));
        assert!(!is_legal(&board, 8, 2, Black));
        assert!(!is_legal(&board, 2, 100, White));
        assert!(captured_cells(&board, 8, 8, White).is_empty());
    }

    #[test]
    fn test_adjacent_own_color_captures_nothing() {
        let board = Board::from_rows(&[
            [E, B, B, E],
            [E, E, E, E],
            [E, E, E, E],
            [E, E, E, E],
        ])
        .unwrap();
        assert!(!is_legal(&board, 0, 0, Black));
        assert!(!is_legal(&board, 0, 3, Black));
    }

    #[test]
    fn test_unclosed_line_captures_nothing() {
        // white run reaches the edge with no black disc behind it
        let board = Board::from_rows(&[
            [E, W, W, W],
            [E, E, E, E],
            [E, E, E, E],
            [E, E, E, E],
        ])
        .unwrap();
        assert!(!is_legal(&board, 0, 0, Black));
        // a gap breaks the line
        let board = Board::from_rows(&[
            [E, W, E, B],
            [E, E, E, E],
            [E, E, E, E],
            [E, E, E, E],
        ])
        .unwrap();
        assert!(!is_legal(&board, 0, 0, Black));
    }

    #[test]
    fn test_multi_direction_capture() {
        let board = Board::from_rows(&[
            [B, E, B, E, B, E],
            [E, W, W, W, E, E],
            [B, W, E, W, B, E],
            [E, W, W, W, E, E],
            [B, E, B, E, B, E],
            [E, E, E, E, E, E],
        ])
        .unwrap();
        let mut captured = captured_cells(&board, 2, 2, Black);
        captured.sort_unstable();
        assert_eq!(
            captured,
            vec![(1, 1), (1, 2), (1, 3), (2, 1), (2, 3), (3, 1), (3, 2), (3, 3)]
        );
        assert!(is_legal(&board, 2, 2, Black));
        assert!(!is_legal(&board, 2, 2, White));
    }

    #[test]
    fn test_long_run_capture() {
        let board = Board::from_rows(&[
            [E, W, W, W, W, B],
            [E, E, E, E, E, E],
            [E, E, E, E, E, E],
            [E, E, E, E, E, E],
            [E, E, E, E, E, E],
            [E, E, E, E, E, E],
        ])
        .unwrap();
        assert_eq!(
            captured_cells(&board, 0, 0, Black),
            vec![(0, 1), (0, 2), (0, 3), (0, 4)]
        );
    }

    #[test]
    fn test_rules_are_pure() {
        let board = Board::new();
        let before = board.clone();
        assert_eq!(
            captured_cells(&board, 2, 4, White),
            captured_cells(&board, 2, 4, White)
        );
        assert_eq!(is_legal(&board, 2, 4, White), is_legal(&board, 2, 4, White));
        assert_eq!(board, before);
    }

    #[test]
    fn test_properties_over_random_games() {
        let mut mover = RandomMover::seeded(7);
        for _ in 0..20 {
            let mut board = Board::new();
            let mut color = White;
            loop {
                for c in [Black, White] {
                    let moves = legal_moves(&board, c);
                    let any = board
                        .cells()
                        .any(|(row, col, _)| is_legal(&board, row, col, c));
                    assert_eq!(has_any_legal_move(&board, c), any);
                    assert_eq!(moves.is_empty(), !any);
                    for &(row, col) in &moves {
                        assert!(!captured_cells(&board, row, col, c).is_empty());
                    }
                }
                if !has_any_legal_move(&board, color) {
                    color = color.switch();
                    if !has_any_legal_move(&board, color) {
                        break;
                    }
                }
                let (row, col) = mover.choose(&board, color).unwrap();
                let captured = captured_cells(&board, row, col, color);
                let occupied = board.occupied();
                board.set(row, col, color.into()).unwrap();
                for &(r, c) in &captured {
                    board.set(r, c, color.into()).unwrap();
                }
                assert_eq!(board.occupied(), occupied + 1);
                for &(r, c) in &captured {
                    assert_eq!(board.get(r, c).unwrap(), State::from(color));
                }
                color = color.switch();
            }
        }
    }
}
