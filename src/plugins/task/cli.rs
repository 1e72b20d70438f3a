use crate::plugins::registry::{CliPlugin, QueryCliConfig};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

pub struct SelectorCliPlugin;

impl SelectorCliPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl CliPlugin for SelectorCliPlugin {
    fn name(&self) -> &'static str {
        "selector"
    }

    fn augment_command(&self, cmd: Command) -> Command {
        let flag = |id: &'static str, long: &'static str, help: &'static str| {
            Arg::new(id)
                .long(long)
                .help_heading("Selection")
                .help(help)
                .action(ArgAction::SetTrue)
        };
        cmd.arg(flag("torrent", "torrent", "Treat selectors as torrents (URLs are fetched as .torrent files)"))
            .arg(flag("all", "all", "With no selector, select every task"))
            .arg(flag("completed", "completed", "With no selector, select completed tasks"))
            .arg(flag("deleted", "deleted", "Read the deleted-task listing"))
            .arg(flag("expired", "expired", "Read the expired-task listing"))
            .arg(
                Arg::new("category")
                    .long("category")
                    .help_heading("Selection")
                    .help("Read the listing of one category")
                    .num_args(1),
            )
            .arg(
                Arg::new("input")
                    .long("input")
                    .short('i')
                    .help_heading("Selection")
                    .help("File with extra selectors, one per line")
                    .num_args(1),
            )
    }

    fn apply_matches(&self, matches: &ArgMatches, cfg: &mut QueryCliConfig) -> anyhow::Result<()> {
        cfg.args.torrent = matches.get_flag("torrent");
        cfg.args.all = matches.get_flag("all");
        cfg.args.completed = matches.get_flag("completed");
        cfg.args.deleted = matches.get_flag("deleted");
        cfg.args.expired = matches.get_flag("expired");
        cfg.args.category = matches.get_one::<String>("category").cloned();
        cfg.input = matches.get_one::<String>("input").map(PathBuf::from);
        Ok(())
    }
}
