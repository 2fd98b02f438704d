use crate::config::PROGRESS_EVERY;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub mod board;
pub mod config;
pub mod error;
pub mod players;
pub mod q_table;

pub use board::{Board, Cell, GameState, GameStatus, HistoryEntry, Move, Player};
pub use config::Config;
pub use error::{Error, Result};
pub use players::{Agent, QAgent, RandomAgent};
pub use q_table::{q_table_from_archive, KeyFormat, Moves, QTable, QTableStore};

/// Two agents taking turns on one game state.
pub struct Game {
    pub state: GameState,
    x_player: Box<dyn Agent>,
    o_player: Box<dyn Agent>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrainingSummary {
    pub episodes: usize,
    pub x_wins: usize,
    pub o_wins: usize,
    pub draws: usize,
}

impl Game {
    pub fn new(x_player: Box<dyn Agent>, o_player: Box<dyn Agent>) -> Self {
        Game {
            state: GameState::new(),
            x_player,
            o_player,
        }
    }
    pub fn agent(&self, player: Player) -> &dyn Agent {
        match player {
            Player::X => self.x_player.as_ref(),
            Player::O => self.o_player.as_ref(),
        }
    }
    /// Asks the player to move for a move until one is accepted.
    /// Returns `None` once the game is over.
    pub fn play_turn(&mut self) -> Result<Option<Move>> {
        if self.state.is_over() {
            return Ok(None);
        }
        let agent = match self.state.current_player() {
            Player::X => &mut self.x_player,
            Player::O => &mut self.o_player,
        };
        loop {
            let mv = agent.choose_move(&self.state)?;
            match self.state.apply_move(mv) {
                Ok(()) => return Ok(Some(mv)),
                Err(err @ Error::InvalidMove { .. }) => {
                    warn!("{} tried an illegal move: {err}", agent.name());
                    agent.rejected(&err);
                }
                Err(err) => return Err(err),
            }
        }
    }
    pub fn play(&mut self) -> Result<Option<Player>> {
        while self.play_turn()?.is_some() {}
        Ok(self.state.winner())
    }
    pub fn reset(&mut self) {
        self.state.reset();
    }
}

/// Random self-play: every finished episode is handed to the store for an update.
pub fn train<R: Rng + ?Sized>(
    store: &QTableStore,
    episodes: usize,
    rng: &mut R,
) -> Result<TrainingSummary> {
    let mut state = GameState::new();
    let mut summary = TrainingSummary::default();
    for episode in 1..=episodes {
        state.reset();
        while !state.is_over() {
            state.apply_random_move(rng);
        }
        let winner = state.winner();
        match winner {
            Some(Player::X) => summary.x_wins += 1,
            Some(Player::O) => summary.o_wins += 1,
            None => summary.draws += 1,
        }
        store.record_and_train(state.history(), winner)?;
        summary.episodes += 1;
        if episode % PROGRESS_EVERY == 0 {
            info!(
                "episode {episode}/{episodes}: {} states known, X {} / O {} / drawn {}",
                store.state_count(),
                summary.x_wins,
                summary.o_wins,
                summary.draws
            );
        }
    }
    Ok(summary)
}

/// The training mode of the driver: optional restore, self-play, optional archive.
pub fn train_rl_agent(config: &Config) -> Result<TrainingSummary> {
    let store = QTableStore::from_config(config);
    if let Some(archive) = &config.restore_from {
        let states = store.restore(archive)?;
        info!("restored {states} states from {}", archive.display());
    }
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    info!(
        "training for {} episodes into {}",
        config.episodes,
        store.path().display()
    );
    let summary = train(&store, config.episodes, &mut rng)?;
    info!(
        "finished {} episodes: X won {}, O won {}, {} drawn; {} states in table",
        summary.episodes,
        summary.x_wins,
        summary.o_wins,
        summary.draws,
        store.state_count()
    );
    if let Some(dir) = &config.archive_dir {
        for path in store.archive(dir)? {
            info!("archived Q-table to {}", path.display());
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use tempfile::TempDir;

    /// Plays a fixed list of moves in order.
    struct Scripted {
        moves: Vec<Move>,
        rejections: Rc<std::cell::Cell<usize>>,
    }

    impl Agent for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }
        fn choose_move(&mut self, _state: &GameState) -> Result<Move> {
            if self.moves.is_empty() {
                return Err(Error::NoValidMoves);
            }
            Ok(self.moves.remove(0))
        }
        fn rejected(&mut self, _err: &Error) {
            self.rejections.set(self.rejections.get() + 1);
        }
    }

    #[test]
    fn is_game_working() {
        let x_rejections = Rc::new(std::cell::Cell::new(0));
        let o_rejections = Rc::new(std::cell::Cell::new(0));
        let x = Box::new(Scripted { moves: vec![4, 0, 8], rejections: x_rejections.clone() });
        let o = Box::new(Scripted { moves: vec![4, 1, 2], rejections: o_rejections.clone() });
        let mut game = Game::new(x, o);
        assert_eq!(game.play().unwrap(), Some(Player::X));
        assert_eq!(x_rejections.get(), 0);
        assert_eq!(o_rejections.get(), 1);
        assert_eq!(game.state.board().to_string(), "XOO-X---X");
        assert_eq!(game.state.history().len(), 5);
        assert_eq!(game.agent(Player::O).name(), "scripted");
        assert_eq!(game.play_turn().unwrap(), None);

        game.reset();
        assert_eq!(game.state, GameState::new());
    }

    #[test]
    fn is_train_working() {
        let dir = TempDir::new().unwrap();
        let store = QTableStore::new(dir.path().join("q_table.json"));
        let mut rng = StdRng::seed_from_u64(2024);
        let summary = train(&store, 30, &mut rng).unwrap();
        assert_eq!(summary.episodes, 30);
        assert_eq!(summary.x_wins + summary.o_wins + summary.draws, 30);
        assert!(summary.x_wins + summary.o_wins > 0);
        assert!(store.state_count() > 0);
    }

    #[test]
    fn is_train_rl_agent_working() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            q_table_path: dir.path().join("data").join("q_table.json"),
            train: true,
            episodes: 20,
            seed: Some(3),
            archive_dir: Some(dir.path().join("archive")),
            ..Config::default()
        };
        let summary = train_rl_agent(&config).unwrap();
        assert_eq!(summary.episodes, 20);
        assert!(config.q_table_path.exists());
        assert_eq!(std::fs::read_dir(dir.path().join("archive")).unwrap().count(), 2);
    }
}
