//! Tab-separated table I/O for the biocatalyzer workspace.
//!
//! Every table exchanged with the enumeration core is a TSV file with a header
//! row. Reading is column-name driven with alias support. Writing is atomic:
//! a table is streamed into a temporary file beside its destination and only
//! renamed into place once complete, so an interrupted run never leaves a
//! partial table behind.

pub mod tsv;

pub use tsv::{
    read_records, read_table, write_records_atomic, write_table_atomic, Table,
};
