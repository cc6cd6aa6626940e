//! Tabular exports of a built game.

pub mod tsv;

pub use tsv::{ExportError, JamTable, read_header, read_jams_file, write_jams, write_jams_file};
