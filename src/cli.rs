use crate::data_fetcher::PlayerCategory;
use clap::Parser;
use clap::builder::styling::{AnsiColor, Effects, Styles};

fn get_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
        .usage(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Yellow.on_default())
        .error(AnsiColor::Red.on_default().effects(Effects::BOLD))
        .valid(AnsiColor::Green.on_default())
        .invalid(AnsiColor::Red.on_default())
}

/// NHL player statistics ETL
///
/// Fetches current rosters and per-game player statistics from the NHL web
/// API, stages them as CSV in object storage and upserts them into one
/// warehouse table per player category (skaters, goalies).
///
/// Running without any flags performs a full run with the settings from the
/// config file and environment.
#[derive(Parser, Debug, Default)]
#[command(version, about, long_about = None)]
#[command(styles = get_styles())]
pub struct Args {
    /// Config file to use instead of the platform default location.
    #[arg(long = "config", value_name = "PATH", help_heading = "Configuration")]
    pub config_path: Option<String>,

    /// Season to load, e.g. 20242025. Overrides the config file.
    #[arg(short, long, value_name = "SEASON", help_heading = "Run Options")]
    pub season: Option<u32>,

    /// Game type to load: 1 = preseason, 2 = regular season, 3 = playoffs.
    #[arg(short = 't', long = "game-type", value_name = "TYPE", help_heading = "Run Options")]
    pub game_type: Option<u8>,

    /// Only process one player category (skaters or goalies). Both by default.
    #[arg(short, long, value_name = "CATEGORY", help_heading = "Run Options")]
    pub category: Option<PlayerCategory>,

    /// Write logs to this file instead of the default log directory.
    #[arg(long = "log-file", value_name = "PATH", help_heading = "Logging")]
    pub log_file: Option<String>,

    /// Log only to the log file, not to stdout.
    #[arg(short, long, help_heading = "Logging")]
    pub quiet: bool,

    /// Print the effective configuration and exit.
    #[arg(long = "list-config", short = 'l', help_heading = "Configuration")]
    pub list_config: bool,

    /// Write a config file with default settings and exit. Uses the `--config`
    /// path if given. An existing file is never overwritten.
    #[arg(
        long = "init-config",
        conflicts_with = "list_config",
        help_heading = "Configuration"
    )]
    pub init_config: bool,
}

impl Args {
    /// Categories selected on the command line.
    pub fn categories(&self) -> Vec<PlayerCategory> {
        match self.category {
            Some(category) => vec![category],
            None => PlayerCategory::ALL.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_no_flags_runs_everything() {
        let args = Args::try_parse_from(["nhl_etl"]).unwrap();
        assert_eq!(args.categories(), PlayerCategory::ALL.to_vec());
        assert!(args.season.is_none());
        assert!(!args.quiet);
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "nhl_etl",
            "--season",
            "20232024",
            "--game-type",
            "3",
            "--category",
            "goalies",
            "--config",
            "/tmp/nhl.toml",
            "-q",
        ])
        .unwrap();
        assert_eq!(args.season, Some(20232024));
        assert_eq!(args.game_type, Some(3));
        assert_eq!(args.categories(), vec![PlayerCategory::Goalies]);
        assert_eq!(args.config_path.as_deref(), Some("/tmp/nhl.toml"));
        assert!(args.quiet);
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        assert!(Args::try_parse_from(["nhl_etl", "--category", "referees"]).is_err());
    }

    #[test]
    fn test_init_config_excludes_list_config() {
        let args = Args::try_parse_from(["nhl_etl", "--init-config"]).unwrap();
        assert!(args.init_config);
        assert!(Args::try_parse_from(["nhl_etl", "--init-config", "--list-config"]).is_err());
    }
}
