use crate::board::{Board, HistoryEntry, Move, Player};
use crate::config::{Config, REWARD, VALUE_PRECISION};
use crate::error::{Error, Result};
use chrono::offset::Local;
use itertools::Itertools;
use log::{debug, error, warn};
use rand::prelude::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{prelude::*, BufReader, ErrorKind};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

/// Values of the legal moves of one board.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Moves {
    moves: BTreeMap<Move, f64>,
}

/// Board key to move values. Ordered maps keep the persisted file stable.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QTable {
    qtable: BTreeMap<String, Moves>,
}

/// How a board is turned into a table key.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum KeyFormat {
    /// The 9-character board, e.g. `----X----`.
    #[default]
    Board,
    /// The board followed by `|` and the player to move, e.g. `----X----|O`.
    BoardAndPlayer,
}

/// The persisted Q-table. Every call reads the backing file afresh and
/// every update rewrites it whole.
#[derive(Clone, Debug)]
pub struct QTableStore {
    path: PathBuf,
    key_format: KeyFormat,
}

impl Deref for Moves {
    type Target = BTreeMap<Move, f64>;
    fn deref(&self) -> &<Self as Deref>::Target {
        &self.moves
    }
}
impl DerefMut for Moves {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.moves
    }
}

impl Deref for QTable {
    type Target = BTreeMap<String, Moves>;
    fn deref(&self) -> &<Self as Deref>::Target {
        &self.qtable
    }
}

impl DerefMut for QTable {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.qtable
    }
}

impl From<Vec<Move>> for Moves {
    fn from(value: Vec<Move>) -> Self {
        Moves {
            moves: value.into_iter().map(|mv| (mv, 0.0)).collect(),
        }
    }
}

impl<const N: usize> From<[(Move, f64); N]> for Moves {
    fn from(value: [(Move, f64); N]) -> Self {
        Moves {
            moves: BTreeMap::from(value),
        }
    }
}

impl Moves {
    /// Picks a highest-valued move among those in `legal`, breaking ties uniformly at random.
    pub fn select_max_move<R: Rng + ?Sized>(&self, legal: &[Move], rng: &mut R) -> Option<Move> {
        let max_moves = self
            .iter()
            .filter(|(mv, _)| legal.contains(mv))
            .max_set_by(|(_, value1), (_, value2)| value1.total_cmp(value2))
            .into_iter()
            .map(|(mv, _)| *mv)
            .collect::<Vec<Move>>();
        max_moves.choose(rng).copied()
    }
}

impl QTable {
    pub fn new() -> Self {
        QTable {
            qtable: BTreeMap::new(),
        }
    }
    /// Rejects keys that are not boards (with an optional player suffix) and moves off the board.
    pub fn validate(&self) -> Result<()> {
        for (key, moves) in self.iter() {
            let (board, player) = match key.split_once('|') {
                Some((board, player)) => (board, Some(player)),
                None => (key.as_str(), None),
            };
            let bad_key = || Error::InvalidBoardKey { key: key.clone() };
            Board::from_key(board).map_err(|_| bad_key())?;
            if player.is_some_and(|p| p != "X" && p != "O") {
                return Err(bad_key());
            }
            if moves.keys().any(|&mv| mv > 8) {
                return Err(bad_key());
            }
        }
        Ok(())
    }
}

impl KeyFormat {
    pub fn key(self, board: &Board, to_move: Player) -> String {
        match self {
            KeyFormat::Board => board.to_state_key(),
            KeyFormat::BoardAndPlayer => format!("{}|{}", board, to_move),
        }
    }
}

fn round_value(value: f64) -> f64 {
    let scale = 10_f64.powi(VALUE_PRECISION);
    (value * scale).round() / scale
}

impl QTableStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        QTableStore {
            path: path.into(),
            key_format: KeyFormat::default(),
        }
    }
    pub fn with_key_format(mut self, key_format: KeyFormat) -> Self {
        self.key_format = key_format;
        self
    }
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.q_table_path).with_key_format(config.key_format)
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    pub fn key_format(&self) -> KeyFormat {
        self.key_format
    }
    pub fn state_key(&self, board: &Board, to_move: Player) -> String {
        self.key_format.key(board, to_move)
    }

    /// Never fails: a missing, empty, `null` or malformed file yields an empty table.
    pub fn load(&self) -> QTable {
        match self.try_load() {
            Ok(q) => q,
            Err(err) => {
                error!(
                    "could not load Q-table from {}: {err}; continuing with an empty table",
                    self.path.display()
                );
                QTable::new()
            }
        }
    }

    fn try_load(&self) -> Result<QTable> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no Q-table at {}, starting empty", self.path.display());
                return Ok(QTable::new());
            }
            Err(err) => return Err(Error::io(format!("open {}", self.path.display()), err)),
        };
        let mut reader = BufReader::new(file);
        let mut buf = String::new();
        reader
            .read_to_string(&mut buf)
            .map_err(|err| Error::io(format!("read {}", self.path.display()), err))?;
        if buf.trim().is_empty() {
            warn!("Q-table at {} is empty, starting empty", self.path.display());
            return Ok(QTable::new());
        }
        let decoded: Option<QTable> = serde_json::from_str(&buf)?;
        let Some(q) = decoded else {
            warn!("Q-table at {} is null, starting empty", self.path.display());
            return Ok(QTable::new());
        };
        q.validate()?;
        debug!("loaded {} states from {}", q.len(), self.path.display());
        Ok(q)
    }

    /// Writes a sibling temporary file and renames it over the table.
    pub fn save(&self, q: &QTable) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|err| Error::io(format!("create {}", parent.display()), err))?;
        }
        let data_json = serde_json::to_string(q)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let written = File::create(&tmp)
            .and_then(|mut file| {
                file.write_all(data_json.as_bytes())?;
                file.sync_all()
            })
            .map_err(|err| Error::io(format!("write {}", tmp.display()), err))
            .and_then(|_| {
                fs::rename(&tmp, &self.path)
                    .map_err(|err| Error::io(format!("replace {}", self.path.display()), err))
            });
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }
        debug!("saved {} states to {}", q.len(), self.path.display());
        Ok(())
    }

    /// `None` when the board has no entry; the caller falls back to a random move.
    pub fn best_move<R: Rng + ?Sized>(&self, board: &Board, rng: &mut R) -> Option<Move> {
        let key = self.state_key(board, board.to_move());
        let q = self.load();
        q.get(&key)?.select_max_move(&board.possible_moves(), rng)
    }

    /// Adds +REWARD to every move made by the winner and -REWARD to every
    /// move made by the loser. Drawn games leave the table untouched.
    pub fn record_and_train(&self, history: &[HistoryEntry], winner: Option<Player>) -> Result<()> {
        let Some(winner) = winner else {
            debug!("drawn game, no update");
            return Ok(());
        };
        let mut q = self.load();
        for entry in history {
            let legal = entry.board.possible_moves();
            if !legal.contains(&entry.mv) {
                warn!("skipping move {} not legal on board {}", entry.mv, entry.board);
                continue;
            }
            let reward = if entry.mover == winner { REWARD } else { -REWARD };
            let key = self.state_key(&entry.board, entry.mover);
            let moves = q.entry(key).or_insert_with(|| Moves::from(legal));
            let value = moves.entry(entry.mv).or_insert_with(|| {
                warn!("entry for board {} lacked move {}, adding it", entry.board, entry.mv);
                0.0
            });
            *value = round_value(*value + reward);
        }
        self.save(&q)
    }

    pub fn state_count(&self) -> usize {
        self.load().len()
    }

    /// Snapshots the table as dated JSON and pickle files in `dir`.
    pub fn archive(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let q = self.load();
        let today = Local::now().date_naive();
        fs::create_dir_all(dir).map_err(|err| Error::io(format!("create {}", dir.display()), err))?;
        let q_json = dir.join(format!("qtable-{today}.json"));
        let q_pickle = dir.join(format!("qtable-{today}.pickle"));
        let mut file_json = File::create(&q_json)
            .map_err(|err| Error::io(format!("create {}", q_json.display()), err))?;
        let data_json = serde_json::to_string(&q)?;
        file_json
            .write_all(data_json.as_bytes())
            .map_err(|err| Error::io(format!("write {}", q_json.display()), err))?;
        let mut file = File::create(&q_pickle)
            .map_err(|err| Error::io(format!("create {}", q_pickle.display()), err))?;
        serde_pickle::to_writer(&mut file, &q, serde_pickle::SerOptions::new())?;
        Ok(vec![q_json, q_pickle])
    }

    /// Replaces the live table with an archived one, returning its state count.
    pub fn restore(&self, archive: &Path) -> Result<usize> {
        let q = q_table_from_archive(archive)?;
        self.save(&q)?;
        Ok(q.len())
    }
}

/// Reads an archive written by [`QTableStore::archive`]; `.pickle` files are
/// decoded as pickle, anything else as JSON.
pub fn q_table_from_archive(path: &Path) -> Result<QTable> {
    let file = File::open(path).map_err(|err| Error::io(format!("open {}", path.display()), err))?;
    let mut reader = BufReader::new(file);
    let mut buf: Vec<u8> = vec![];
    reader
        .read_to_end(&mut buf)
        .map_err(|err| Error::io(format!("read {}", path.display()), err))?;
    let decoded: QTable = if path.extension().is_some_and(|ext| ext == "pickle") {
        serde_pickle::from_slice(&buf, serde_pickle::DeOptions::new())?
    } else {
        serde_json::from_slice(&buf)?
    };
    decoded.validate()?;
    Ok(decoded)
}
