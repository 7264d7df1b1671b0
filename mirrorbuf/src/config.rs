use crate::{Backing, Mode, RingBuffer, RingBufError, DEFAULT_TERMINATOR};
use eyre::WrapErr;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    #[serde(default)]
    pub mode: Mode,

    #[serde(default = "default_terminator")]
    pub terminator: u8,

    #[serde(default)]
    pub backing: Backing,
}

fn default_capacity() -> usize {
    64 << 10
}

fn default_terminator() -> u8 {
    DEFAULT_TERMINATOR
}

impl Default for Config {
    fn default() -> Self {
        Config {
            capacity: default_capacity(),
            mode: Mode::default(),
            terminator: default_terminator(),
            backing: Backing::default(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> eyre::Result<Self> {
        let config: Config = toml::from_str(content).wrap_err("failed to parse config")?;
        Ok(config)
    }

    /// Opens a buffer with these settings, terminator included.
    pub fn open(&self) -> Result<RingBuffer, RingBufError> {
        let mut buffer = RingBuffer::open_with(self.capacity, self.mode, &self.backing)?;
        buffer.set_terminator(self.terminator);
        Ok(buffer)
    }
}
