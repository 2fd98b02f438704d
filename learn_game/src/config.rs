use crate::q_table::KeyFormat;
use std::path::PathBuf;

/// Value added to a move whose mover won, subtracted when the mover lost.
pub const REWARD: f64 = 0.001;
/// Decimal places kept for every stored value.
pub const VALUE_PRECISION: i32 = 3;
pub const DEFAULT_Q_TABLE_PATH: &str = "data/q_table.json";
pub const DEFAULT_EPISODES: usize = 10_000;
/// Training progress is logged every this many episodes.
pub const PROGRESS_EVERY: usize = 1_000;

/// Everything the driver hands to the engine at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub q_table_path: PathBuf,
    pub train: bool,
    pub episodes: usize,
    pub key_format: KeyFormat,
    pub seed: Option<u64>,
    /// Where dated snapshots of the table are written after training.
    pub archive_dir: Option<PathBuf>,
    /// Archive to copy into the live table before anything else runs.
    pub restore_from: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            q_table_path: PathBuf::from(DEFAULT_Q_TABLE_PATH),
            train: false,
            episodes: DEFAULT_EPISODES,
            key_format: KeyFormat::default(),
            seed: None,
            archive_dir: None,
            restore_from: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_default_config_working() {
        let config = Config::default();
        assert_eq!(config.q_table_path, PathBuf::from("data/q_table.json"));
        assert!(!config.train);
        assert_eq!(config.episodes, DEFAULT_EPISODES);
        assert_eq!(config.key_format, KeyFormat::Board);
    }
}
