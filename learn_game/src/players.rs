use crate::board::{GameState, Move};
use crate::error::{Error, Result};
use crate::q_table::QTableStore;
use log::debug;
use rand::prelude::SliceRandom;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Anything that can pick a move for the player to move.
pub trait Agent {
    fn name(&self) -> &str;
    fn choose_move(&mut self, state: &GameState) -> Result<Move>;
    /// Called when the move last returned by `choose_move` was refused.
    fn rejected(&mut self, _err: &Error) {}
}

fn build_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Plays uniformly random legal moves.
#[derive(Debug)]
pub struct RandomAgent {
    name: String,
    rng: StdRng,
}

/// Plays the best known move from the Q-table, random when the board is unknown.
#[derive(Debug)]
pub struct QAgent {
    name: String,
    store: QTableStore,
    rng: StdRng,
}

impl RandomAgent {
    pub fn new(name: impl Into<String>, seed: Option<u64>) -> Self {
        RandomAgent {
            name: name.into(),
            rng: build_rng(seed),
        }
    }
}

impl Agent for RandomAgent {
    fn name(&self) -> &str {
        &self.name
    }
    fn choose_move(&mut self, state: &GameState) -> Result<Move> {
        state
            .possible_moves()
            .choose(&mut self.rng)
            .copied()
            .ok_or(Error::NoValidMoves)
    }
}

impl QAgent {
    pub fn new(name: impl Into<String>, store: QTableStore, seed: Option<u64>) -> Self {
        QAgent {
            name: name.into(),
            store,
            rng: build_rng(seed),
        }
    }
}

impl Agent for QAgent {
    fn name(&self) -> &str {
        &self.name
    }
    fn choose_move(&mut self, state: &GameState) -> Result<Move> {
        if let Some(mv) = self.store.best_move(state.board(), &mut self.rng) {
            return Ok(mv);
        }
        debug!("{} has no entry for {}, playing at random", self.name, state.board());
        state
            .possible_moves()
            .choose(&mut self.rng)
            .copied()
            .ok_or(Error::NoValidMoves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, Player};
    use crate::q_table::{Moves, QTable};
    use tempfile::TempDir;

    #[test]
    fn is_random_agent_working() {
        let mut agent = RandomAgent::new("random", Some(9));
        let state = GameState::with_board(Board::from_key("XOXOXO-X-").unwrap(), Player::O);
        for _ in 0..20 {
            let mv = agent.choose_move(&state).unwrap();
            assert!(mv == 6 || mv == 8);
        }
        let full = GameState::with_board(Board::from_key("XOXXOOOXX").unwrap(), Player::O);
        assert!(matches!(agent.choose_move(&full), Err(Error::NoValidMoves)));
    }

    #[test]
    fn is_q_agent_working() {
        let dir = TempDir::new().unwrap();
        let store = QTableStore::new(dir.path().join("q_table.json"));
        let mut q = QTable::new();
        q.insert("----X----".to_owned(), Moves::from([(0, -0.002), (2, 0.004), (6, 0.001)]));
        store.save(&q).unwrap();
        let mut agent = QAgent::new("RLmax", store, Some(1));
        assert_eq!(agent.name(), "RLmax");

        let mut state = GameState::new();
        state.apply_move(4).unwrap();
        assert_eq!(agent.choose_move(&state).unwrap(), 2);

        state.apply_move(2).unwrap();
        let mv = agent.choose_move(&state).unwrap();
        assert!(state.possible_moves().contains(&mv));
    }
}
