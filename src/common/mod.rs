//! Common functionality.

use byte_unit::{Byte, UnitType};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use indexmap::IndexMap;

pub mod io;
pub mod noodles;

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// Helper to print the current memory resident set size via `tracing`.
pub fn trace_rss_now() {
    let rss = procfs::process::Process::myself()
        .and_then(|me| me.stat())
        .map(|stat| stat.rss * procfs::page_size());
    match rss {
        Ok(rss) => tracing::debug!(
            "RSS now: {:.2}",
            Byte::from_u64(rss).get_appropriate_unit(UnitType::Binary)
        ),
        Err(e) => tracing::debug!("could not determine RSS: {}", e),
    }
}

/// Canonicalize a contig name, e.g., `chr1` to `1` and `chrM` to `MT`.
///
/// Names that do not look like a primary chromosome are returned as they are.
pub fn canonicalize(contig: &str) -> String {
    let stripped = contig
        .strip_prefix("chr")
        .or_else(|| contig.strip_prefix("CHR"))
        .or_else(|| contig.strip_prefix("Chr"))
        .unwrap_or(contig);
    match stripped {
        "M" | "m" | "MT" | "mt" | "Mt" => String::from("MT"),
        "x" => String::from("X"),
        "y" => String::from("Y"),
        _ => stripped.to_string(),
    }
}

/// Build mapping from canonical contig name to the spelling used in `names`.
///
/// The first spelling wins if two names canonicalize to the same contig.
pub fn build_contig_map<I, S>(names: I) -> IndexMap<String, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut result = IndexMap::new();
    for name in names {
        let name = name.as_ref();
        result
            .entry(canonicalize(name))
            .or_insert_with(|| name.to_string());
    }
    result
}

/// Return the version of the `prs-scorer` crate and `x.y.z` in tests.
pub fn worker_version() -> &'static str {
    if cfg!(test) {
        "x.y.z"
    } else {
        env!("CARGO_PKG_VERSION")
    }
}
