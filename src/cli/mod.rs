//! The four inspection utilities named in spec §6.4, exposed as
//! subcommands of one binary (mirrors the teacher's single-binary CLI
//! front-end over its library).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::blockfile::{BlockFile, Mode};
use crate::btree::BTree;
use crate::config::StoreConfig;
use crate::rtree::{BBox, RTree};

#[derive(Debug, Parser)]
#[command(name = "stratadb", about = "Inspect and compact stratadb index files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan a raw BlockFile and print each top-level record.
    DecodeRecords { path: PathBuf },
    /// Open a B+Tree and print its metadata, height, and contents.
    DecodeBtree {
        path: PathBuf,
        #[arg(long, default_value_t = StoreConfig::default().btree_order)]
        order: u64,
    },
    /// Open an R-Tree and print its metadata and entries.
    DecodeRtree {
        path: PathBuf,
        #[arg(long, default_value_t = StoreConfig::default().rtree_max_entries)]
        max_entries: u64,
    },
    /// Compact an R-Tree into a fresh file and report space reclaimed.
    RtreeCompact {
        path: PathBuf,
        dest: PathBuf,
        #[arg(long, default_value_t = StoreConfig::default().rtree_max_entries)]
        max_entries: u64,
    },
}

/// Runs a parsed CLI command, printing to stdout.
///
/// # Errors
/// Returns a one-line message suitable for an exit-1 stderr report on
/// any failure (spec §7 / §6.4).
pub fn run(command: Command) -> Result<(), String> {
    match command {
        Command::DecodeRecords { path } => decode_records(&path),
        Command::DecodeBtree { path, order } => decode_btree(&path, order),
        Command::DecodeRtree { path, max_entries } => decode_rtree(&path, max_entries),
        Command::RtreeCompact { path, dest, max_entries } => rtree_compact(&path, &dest, max_entries),
    }
    .map_err(|e| e.to_string())
}

fn decode_records(path: &std::path::Path) -> crate::errors::Result<()> {
    let file = BlockFile::open(path, Mode::Read)?;
    for (i, record) in file.scan().enumerate() {
        println!("[{i}] {:?}", record?);
    }
    Ok(())
}

fn decode_btree(path: &std::path::Path, order: u64) -> crate::errors::Result<()> {
    log::info!("opening b+tree {}", path.display());
    let mut tree = BTree::open(path, order)?;
    println!("size={} height={}", tree.size(), tree.get_height()?);
    for (k, v) in tree.to_array()? {
        println!("{k:?} => {v:?}");
    }
    Ok(())
}

fn decode_rtree(path: &std::path::Path, max_entries: u64) -> crate::errors::Result<()> {
    log::info!("opening r-tree {}", path.display());
    let mut tree = RTree::open(path, max_entries)?;
    println!("size={}", tree.size());
    for hit in tree.search_bbox(&BBox::world())? {
        println!("{} lat={} lng={}", hit.object_id, hit.lat, hit.lng);
    }
    Ok(())
}

fn rtree_compact(path: &std::path::Path, dest: &std::path::Path, max_entries: u64) -> crate::errors::Result<()> {
    let mut tree = RTree::open(path, max_entries)?;
    let report = tree.compact(dest)?;
    log::info!("compacted {} -> {}", path.display(), dest.display());
    println!(
        "oldSize={} newSize={} bytesSaved={}",
        report.old_size(),
        report.new_size(),
        report.bytes_saved()
    );
    Ok(())
}
