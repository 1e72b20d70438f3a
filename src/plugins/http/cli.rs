use crate::plugins::registry::{CliPlugin, QueryCliConfig};
use clap::{Arg, ArgAction, ArgMatches, Command};

pub struct ServiceCliPlugin;

impl ServiceCliPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl CliPlugin for ServiceCliPlugin {
    fn name(&self) -> &'static str {
        "service"
    }

    fn augment_command(&self, cmd: Command) -> Command {
        cmd.arg(
            Arg::new("base_url")
                .long("base-url")
                .env("TASK_SERVICE_URL")
                .help_heading("Service")
                .help("Base URL of the remote task service API")
                .default_value("http://127.0.0.1:8080/api")
                .num_args(1),
        )
        .arg(
            Arg::new("header")
                .long("header")
                .help_heading("Service")
                .help("Extra HTTP header (repeatable), e.g. --header 'Cookie: session=xxx'")
                .action(ArgAction::Append)
                .num_args(1),
        )
        .arg(
            Arg::new("user_agent")
                .long("user-agent")
                .help_heading("Service")
                .help("HTTP User-Agent")
                .default_value("remote-task-query/0.1")
                .num_args(1),
        )
        .arg(
            Arg::new("timeout_secs")
                .long("timeout-secs")
                .help_heading("Service")
                .help("Timeout for service calls in seconds")
                .default_value("60")
                .num_args(1),
        )
        .arg(
            Arg::new("torrent_timeout_secs")
                .long("torrent-timeout-secs")
                .help_heading("Service")
                .help("Timeout for downloading remote .torrent files in seconds")
                .default_value("60")
                .num_args(1),
        )
    }

    fn apply_matches(&self, matches: &ArgMatches, cfg: &mut QueryCliConfig) -> anyhow::Result<()> {
        if let Some(url) = matches.get_one::<String>("base_url") {
            cfg.service.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(ua) = matches.get_one::<String>("user_agent") {
            cfg.service.user_agent = ua.clone();
        }
        if let Some(s) = matches.get_one::<String>("timeout_secs") {
            cfg.service.timeout_secs = s.parse()?;
        }
        if let Some(s) = matches.get_one::<String>("torrent_timeout_secs") {
            cfg.service.torrent_timeout_secs = s.parse()?;
        }

        if let Some(values) = matches.get_many::<String>("header") {
            for h in values {
                let (k, v) = h
                    .split_once(':')
                    .ok_or_else(|| anyhow::anyhow!("invalid header format: {}", h))?;
                cfg.service.headers.insert(k.trim().to_string(), v.trim().to_string());
            }
        }

        Ok(())
    }
}
