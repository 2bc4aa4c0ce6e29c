use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("interface {name} not found")]
    InterfaceNotFound { name: String },

    #[error("interface remap table full ({capacity} entries)")]
    RemapTableFull { capacity: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
