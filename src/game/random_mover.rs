use crate::game::board::{Board, Color};
use crate::game::error::GameError;
use crate::game::rules::legal_moves;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Pick one legal move for `color` uniformly at random.
///
/// Legal moves are enumerated first, so this always terminates.
pub fn choose_random_legal_move<R: Rng + ?Sized>(
    board: &Board,
    color: Color,
    rng: &mut R,
) -> Result<(usize, usize), GameError> {
    legal_moves(board, color)
        .choose(rng)
        .copied()
        .ok_or(GameError::NoLegalMove(color))
}

/// Drives an unattended player.
pub struct RandomMover {
    rng: StdRng,
}

impl RandomMover {
    pub fn new() -> Self {
        RandomMover {
            rng: StdRng::from_entropy(),
        }
    }

    /// reproducible move sequence
    pub fn seeded(seed: u64) -> Self {
        RandomMover {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn choose(&mut self, board: &Board, color: Color) -> Result<(usize, usize), GameError> {
        choose_random_legal_move(board, color, &mut self.rng)
    }
}

impl Default for RandomMover {
    fn default() -> Self {
        RandomMover::new()
    }
}
