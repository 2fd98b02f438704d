use anyhow::Result;
use clap::{Parser, ValueEnum};
use learn_game::config::{DEFAULT_EPISODES, DEFAULT_Q_TABLE_PATH};
use learn_game::{Agent, Config, Error, Game, GameState, KeyFormat, Move, Player, QAgent, QTableStore};
use log::info;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "game", version, about = "Tic-tac-toe against a Q-table agent, or train it by self-play")]
struct Cli {
    /// Q-table file, created on first update
    #[arg(long, env = "LEARN_GAME_Q_TABLE", default_value = DEFAULT_Q_TABLE_PATH)]
    q_table: PathBuf,

    /// Run random self-play training instead of an interactive game
    #[arg(long)]
    train: bool,

    /// Number of self-play episodes
    #[arg(long, default_value_t = DEFAULT_EPISODES)]
    episodes: usize,

    #[arg(long)]
    seed: Option<u64>,

    /// Key entries by board and player to move (`----X----|O`)
    #[arg(long)]
    key_with_player: bool,

    /// Write dated JSON and pickle snapshots here after training
    #[arg(long)]
    archive_dir: Option<PathBuf>,

    /// Replace the Q-table with this archive before starting
    #[arg(long)]
    restore: Option<PathBuf>,

    /// The mark the human plays; X moves first
    #[arg(long, value_enum, default_value_t = Side::X)]
    human: Side,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Side {
    X,
    O,
}

impl From<&Cli> for Config {
    fn from(cli: &Cli) -> Self {
        Config {
            q_table_path: cli.q_table.clone(),
            train: cli.train,
            episodes: cli.episodes,
            key_format: if cli.key_with_player {
                KeyFormat::BoardAndPlayer
            } else {
                KeyFormat::Board
            },
            seed: cli.seed,
            archive_dir: cli.archive_dir.clone(),
            restore_from: cli.restore.clone(),
        }
    }
}

#[derive(Debug)]
struct HumanPlayer {
    name: String,
}

impl Agent for HumanPlayer {
    fn name(&self) -> &str {
        &self.name
    }
    fn choose_move(&mut self, state: &GameState) -> learn_game::Result<Move> {
        let read_error = |source| Error::Io {
            operation: "read a move from stdin".to_owned(),
            source,
        };
        println!("\n{}\n", state.board().render());
        loop {
            print!("{}, please, choose a cell (0-8): ", self.name);
            io::stdout().flush().map_err(read_error)?;
            let mut line = String::new();
            if io::stdin().read_line(&mut line).map_err(read_error)? == 0 {
                return Err(read_error(io::ErrorKind::UnexpectedEof.into()));
            }
            match line.trim().parse::<Move>() {
                Ok(mv) => return Ok(mv),
                Err(_) => println!("Unknown symbol, please, try again (a number from 0 to 8)."),
            }
        }
    }
    fn rejected(&mut self, err: &Error) {
        println!("{err}");
    }
}

fn play_human_computer_player(config: &Config, human: Side) -> Result<()> {
    let store = QTableStore::from_config(config);
    if let Some(archive) = &config.restore_from {
        let states = store.restore(archive)?;
        info!("restored {states} states from {}", archive.display());
    }
    info!(
        "Q-table at {} knows {} states",
        store.path().display(),
        store.state_count()
    );
    let person = Box::new(HumanPlayer {
        name: "Human".to_owned(),
    });
    let computer = Box::new(QAgent::new("RLmax", store, config.seed));
    let (human_mark, mut game) = match human {
        Side::X => (Player::X, Game::new(person, computer)),
        Side::O => (Player::O, Game::new(computer, person)),
    };
    while let Some(mv) = game.play_turn()? {
        let mover = game.state.current_player().other();
        println!("{} ({mover}) played {mv}", game.agent(mover).name());
    }
    println!("\n{}\n", game.state.board().render());
    match game.state.winner() {
        Some(winner) if winner == human_mark => println!("Congratulations! You have won!"),
        Some(_) => println!("Really sorry, you have lost."),
        None => println!("The game ended in a draw."),
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = Config::from(&cli);
    if config.train {
        learn_game::train_rl_agent(&config)?;
        return Ok(());
    }
    play_human_computer_player(&config, cli.human)
}
