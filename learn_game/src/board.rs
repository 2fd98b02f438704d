use crate::error::{Error, Result};
use itertools::Itertools;
use ndarray::prelude::*;
use rand::prelude::SliceRandom;
use rand::Rng;
use std::fmt;

/// Index of a cell, row-major, 0..=8.
pub type Move = usize;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Player {
    X,
    O,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Cell {
    Empty,
    X,
    O,
}

#[derive(Debug, PartialEq)]
pub enum GameStatus {
    InPlay,
    Drawn,
    Won(Player),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: Array2<Cell>,
}

/// One applied move: the board as it was before the move, the move and who made it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub board: Board,
    pub mv: Move,
    pub mover: Player,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    board: Board,
    current_player: Player,
    history: Vec<HistoryEntry>,
}

impl Player {
    pub fn other(self) -> Self {
        match self {
            Self::X => Player::O,
            Self::O => Player::X,
        }
    }
    pub fn as_char(self) -> char {
        match self {
            Self::X => 'X',
            Self::O => 'O',
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl Cell {
    pub fn as_char(self) -> char {
        match self {
            Self::Empty => '-',
            Self::X => 'X',
            Self::O => 'O',
        }
    }
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '-' => Some(Cell::Empty),
            'X' => Some(Cell::X),
            'O' => Some(Cell::O),
            _ => None,
        }
    }
    pub fn player(self) -> Option<Player> {
        match self {
            Self::Empty => None,
            Self::X => Some(Player::X),
            Self::O => Some(Player::O),
        }
    }
}

impl From<Player> for Cell {
    fn from(player: Player) -> Self {
        match player {
            Player::X => Cell::X,
            Player::O => Cell::O,
        }
    }
}

/// The board key: one character per cell in row-major order.
impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.cells.iter().map(|c| c.as_char()).collect::<String>())
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Board {
            cells: Array::from_elem((3, 3), Cell::Empty),
        }
    }
    pub fn from_key(key: &str) -> Result<Self> {
        let invalid = || Error::InvalidBoardKey { key: key.to_owned() };
        let cells = key
            .chars()
            .map(Cell::from_char)
            .collect::<Option<Vec<Cell>>>()
            .filter(|cells| cells.len() == 9)
            .ok_or_else(invalid)?;
        let cells = Array2::from_shape_vec((3, 3), cells).map_err(|_| invalid())?;
        Ok(Board { cells })
    }
    pub fn to_state_key(&self) -> String {
        self.to_string()
    }
    /// The cell addressed by `mv`, or `None` when `mv` is off the board.
    pub fn get(&self, mv: Move) -> Option<Cell> {
        self.cells.get([mv / 3, mv % 3]).copied()
    }
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells.iter().copied()
    }
    fn set(&mut self, mv: Move, cell: Cell) {
        self.cells[[mv / 3, mv % 3]] = cell;
    }
    pub fn render(&self) -> String {
        self.cells
            .rows()
            .into_iter()
            .map(|row| format!(" {} ", row.iter().map(|c| c.as_char()).join(" | ")))
            .join("\n---+---+---\n")
    }
    pub fn possible_moves(&self) -> Vec<Move> {
        self.cells
            .indexed_iter()
            .filter(|(_index, &value)| value == Cell::Empty)
            .map(|((row, col), _)| row * 3 + col)
            .collect()
    }
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|&c| c != Cell::Empty)
    }
    /// Player due to move on this board, assuming X moved first.
    pub fn to_move(&self) -> Player {
        let count = |cell: Cell| self.cells.iter().filter(|&&c| c == cell).count();
        if count(Cell::X) <= count(Cell::O) {
            Player::X
        } else {
            Player::O
        }
    }
    /// Scans rows, then columns, then the two diagonals.
    pub fn winner(&self) -> Option<Player> {
        let anti_diag = self.cells.slice(s![.., ..;-1]).into_diag();
        self.cells
            .rows()
            .into_iter()
            .chain(self.cells.columns())
            .chain([self.cells.diag(), anti_diag])
            .find_map(line_owner)
    }
}

fn line_owner(line: ArrayView1<Cell>) -> Option<Player> {
    let first = line[0];
    let player = first.player()?;
    line.iter().all(|&c| c == first).then_some(player)
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    pub fn new() -> Self {
        GameState {
            board: Board::new(),
            current_player: Player::X,
            history: Vec::new(),
        }
    }
    /// Resume from an arbitrary position with an empty history.
    pub fn with_board(board: Board, current_player: Player) -> Self {
        GameState {
            board,
            current_player,
            history: Vec::new(),
        }
    }
    pub fn board(&self) -> &Board {
        &self.board
    }
    pub fn current_player(&self) -> Player {
        self.current_player
    }
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }
    pub fn possible_moves(&self) -> Vec<Move> {
        self.board.possible_moves()
    }
    pub fn apply_move(&mut self, mv: Move) -> Result<()> {
        let possible = self.possible_moves();
        if !possible.contains(&mv) {
            return Err(Error::InvalidMove { mv, possible });
        }
        self.place(mv);
        Ok(())
    }
    /// Plays a uniformly random legal move; does nothing on a full board.
    pub fn apply_random_move<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Move> {
        let mv = *self.possible_moves().choose(rng)?;
        self.place(mv);
        Some(mv)
    }
    fn place(&mut self, mv: Move) {
        self.history.push(HistoryEntry {
            board: self.board.clone(),
            mv,
            mover: self.current_player,
        });
        self.board.set(mv, self.current_player.into());
        self.current_player = self.current_player.other();
    }
    pub fn winner(&self) -> Option<Player> {
        self.board.winner()
    }
    pub fn is_over(&self) -> bool {
        self.winner().is_some() || self.board.is_full()
    }
    pub fn status(&self) -> GameStatus {
        match self.winner() {
            Some(player) => GameStatus::Won(player),
            None if self.board.is_full() => GameStatus::Drawn,
            None => GameStatus::InPlay,
        }
    }
    pub fn reset(&mut self) {
        *self = GameState::new();
    }
}
