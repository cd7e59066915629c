use anyhow::Result;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use color_print::cstr;
use log::{debug, info, warn};
use nix::unistd::Uid;
use std::env;
use std::io;
use std::path::PathBuf;

pub mod config;
mod engine;
mod filter;
mod store;
#[cfg(test)]
mod testing;
pub mod utils;
mod zfs;

use engine::{Mode, RunParams};
use filter::{Filter, FilterSet};
use zfs::ZfsCli;

const AFTER_HELP: &str = cstr!(
    r#"
<bold><underline>FILTERS:</underline></bold>
  All filters must match. Names containing ':' are user properties; any other
  name is a built-in ZFS property compared against its displayed value.
  --before and --after take epoch seconds or a duration such as 30d.
  Subshells with the `date` command can be used for epoch timestamps:
      --after=$(date -d 'jan 1 2024' +%s)
      --before=$(date -d 'today -30 days' +%s)

<bold><underline>ENVIRONMENT VARIABLES:</underline></bold>
  <bold>SNAPZAP_CONFIG</bold>
      Path to the TOML configuration file (e.g., /etc/snapzap.toml).
  <bold>RUST_LOG</bold>
      Log verbosity (e.g., debug).
"#
);

#[derive(Parser)]
#[command(
    about,
    version,
    after_help = AFTER_HELP
)]
struct Cli {
    /// Dataset whose snapshots are examined
    dataset: String,
    /// Filter by ZFS property (repeatable)
    #[arg(short, long, value_name = "PROPERTY=VALUE")]
    filter: Vec<String>,
    /// Match snapshots created before this time
    #[arg(short, long, value_name = "EPOCH")]
    before: Vec<String>,
    /// Match snapshots created after this time
    #[arg(short, long, value_name = "EPOCH")]
    after: Vec<String>,
    /// Do not print matching snapshot names
    #[arg(short, long)]
    quiet: bool,
    /// Delete matching snapshots
    #[arg(short, long)]
    delete: bool,
    /// With --delete, also delete same-named snapshots of descendant datasets
    #[arg(short, long)]
    recursive: bool,
    /// Exit with status 2 if any snapshot could not be deleted
    #[arg(long)]
    strict: bool,
    /// Path to configuration file (TOML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Build the filters in the order they appeared on the command line.
    fn filter_set(&self, matches: &ArgMatches) -> Result<FilterSet> {
        let mut indexed: Vec<(usize, Filter)> = Vec::new();
        for (id, values) in [
            ("filter", &self.filter),
            ("before", &self.before),
            ("after", &self.after),
        ] {
            let mut indices = matches.indices_of(id).into_iter().flatten();
            for value in values {
                let filter = if id == "filter" {
                    let (property, value) = utils::split_filter_arg(value)?;
                    Filter::new(property, value)?
                } else {
                    Filter::new(id, value)?
                };
                indexed.push((indices.next().unwrap_or(usize::MAX), filter));
            }
        }
        indexed.sort_by_key(|(index, _)| *index);
        Ok(indexed.into_iter().map(|(_, filter)| filter).collect())
    }
}

fn main() -> Result<()> {
    env_logger::init();
    info!("Starting snapzap");

    // Parse CLI arguments, handling errors explicitly
    let matches = match Cli::command().try_get_matches() {
        Ok(matches) => matches,
        Err(e) => {
            // Usage errors exit 1; --help and --version exit 0
            e.print()?;
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };
    let cli = Cli::from_arg_matches(&matches)?;
    let filters = cli.filter_set(&matches)?;
    if filters.is_empty() {
        info!("No filters given, selecting every snapshot");
    }
    for f in filters.iter() {
        debug!("Filter: {}={}", f.property(), f.value());
    }

    if cli.delete && !Uid::effective().is_root() {
        warn!("Not running as root; deleting requires root or delegated ZFS permissions");
    }

    let config_path = cli
        .config
        .clone()
        .or_else(|| env::var("SNAPZAP_CONFIG").ok().map(PathBuf::from));
    let config = config::load(config_path)?;

    let strict = cli.strict || config.strict;
    let params = RunParams {
        dataset: cli.dataset,
        filters,
        mode: Mode {
            quiet: cli.quiet,
            delete: cli.delete,
            recurse: cli.recursive,
            defer: config.defer_destroy,
        },
    };
    let store = ZfsCli::new(config.zfs_path);
    let report = engine::run(&store, &params, &mut io::stdout().lock())?;

    if strict && !report.is_success() {
        std::process::exit(2);
    }
    Ok(())
}
