use eslog::extractor::BraceCounting;
use eslog::globals::is_global;
use eslog::profile::{DEFAULT_INI_FILE_PATH, DEFAULT_INI_SECTION};
use eslog::utils::split_assignment;

pub use clap::Parser;
use clap::{Args, Subcommand};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Query templates and log projection for a search-backed log store",
    long_about = None
)]
pub struct CommandLineArgs {
    #[clap(short = 'p', long, default_value = DEFAULT_INI_SECTION, help = "profile name")]
    profile: String,
    #[clap(
        short = 'c',
        long,
        env = "ESLOG_CONFIG",
        default_value = DEFAULT_INI_FILE_PATH,
        help = "profile configuration file"
    )]
    config: String,
    #[clap(
        short = 'v',
        long,
        help = "Print verbose message",
        default_value = "false"
    )]
    verbose: bool,
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Action {
    /// Print the request block found at a line of the buffer
    Extract {
        #[clap(help = "buffer file (stdin when omitted)")]
        file: Option<String>,
        #[clap(short = 'l', long, help = "1-based cursor line")]
        line: usize,
        #[command(flatten)]
        scan: ScanArgs,
    },
    /// List every request block in the buffer
    List {
        #[clap(help = "buffer file (stdin when omitted)")]
        file: Option<String>,
        #[command(flatten)]
        scan: ScanArgs,
    },
    /// Print the placeholders of a template and their defaults
    Vars {
        #[clap(help = "template file (stdin when omitted)")]
        file: Option<String>,
    },
    /// Substitute the placeholders of a template
    Bind {
        #[clap(help = "template file (stdin when omitted)")]
        file: Option<String>,
        #[command(flatten)]
        binding: BindingArgs,
    },
    /// Project a raw search response down to a set of fields
    Project {
        #[clap(help = "response file (stdin when omitted)")]
        file: Option<String>,
        #[command(flatten)]
        display: DisplayArgs,
    },
    /// Resolve a request, send it to the log store and project the response
    Run {
        #[clap(help = "buffer or template file (stdin when omitted)")]
        file: Option<String>,
        #[clap(
            short = 'l',
            long,
            required_unless_present = "template",
            help = "1-based cursor line"
        )]
        line: Option<usize>,
        #[clap(short = 't', long, help = "Treat the input as a template card")]
        template: bool,
        #[clap(long, help = "Print the request instead of sending it")]
        dry_run: bool,
        #[command(flatten)]
        binding: BindingArgs,
        #[command(flatten)]
        display: DisplayArgs,
        #[command(flatten)]
        scan: ScanArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScanArgs {
    #[clap(
        long,
        help = "Count every brace outside string literals instead of one per line"
    )]
    per_character: bool,
}

impl ScanArgs {
    pub fn counting(&self) -> BraceCounting {
        if self.per_character {
            BraceCounting::PerCharacter
        } else {
            BraceCounting::PerLine
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct BindingArgs {
    #[clap(
        short = 's',
        long = "set",
        value_name = "NAME=VALUE",
        value_parser = parse_assignment,
        help = "template variable value"
    )]
    pub variables: Vec<(String, String)>,
    #[clap(
        short = 'g',
        long = "global",
        value_name = "$NAME=VALUE",
        value_parser = parse_global,
        help = "global parameter value"
    )]
    pub globals: Vec<(String, String)>,
    #[clap(long = "last-24h", help = "Set $startTime and $endTime to the last 24 hours")]
    pub last_24h: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DisplayArgs {
    #[clap(
        short = 'f',
        long,
        default_value = "message",
        help = "comma separated fields to keep from each hit"
    )]
    pub fields: String,
    #[clap(long, help = "previously projected output used when the response has no hits")]
    pub previous: Option<String>,
    #[clap(
        long,
        value_name = "FIELD",
        help = "pretty-print JSON embedded in this field"
    )]
    pub expand: Vec<String>,
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    split_assignment(s).map_err(|e| e.to_string())
}

fn parse_global(s: &str) -> Result<(String, String), String> {
    let (name, value) = parse_assignment(s)?;
    if !is_global(&name) {
        return Err(format!("global parameter '{}' must start with '$'", name));
    }
    Ok((name, value))
}

impl CommandLineArgs {
    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn config(&self) -> &str {
        &self.config
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn action(&self) -> &Action {
        &self.action
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cli() {
        use clap::CommandFactory;
        CommandLineArgs::command().debug_assert()
    }

    #[test]
    fn test_parse_run_args() {
        let args = CommandLineArgs::parse_from([
            "eslog",
            "-p",
            "staging",
            "run",
            "cards/errors.txt",
            "-t",
            "-s",
            "level=WARN",
            "-g",
            "$startTime=2024-10-01 00:00:00",
            "-f",
            "message,host",
            "--expand",
            "message",
            "--dry-run",
        ]);

        assert_eq!(args.profile(), "staging");
        assert!(!args.verbose());
        let Action::Run {
            file,
            line,
            template,
            dry_run,
            binding,
            display,
            scan,
        } = args.action()
        else {
            panic!("expected run");
        };
        assert_eq!(file.as_deref(), Some("cards/errors.txt"));
        assert_eq!(*line, None);
        assert!(*template);
        assert!(*dry_run);
        assert_eq!(
            binding.variables,
            vec![("level".to_string(), "WARN".to_string())]
        );
        assert_eq!(
            binding.globals,
            vec![("$startTime".to_string(), "2024-10-01 00:00:00".to_string())]
        );
        assert_eq!(display.fields, "message,host");
        assert_eq!(display.expand, vec!["message".to_string()]);
        assert_eq!(scan.counting(), BraceCounting::PerLine);
    }

    #[test]
    fn test_parse_extract_args() {
        let args =
            CommandLineArgs::parse_from(["eslog", "extract", "-l", "12", "--per-character"]);
        let Action::Extract { file, line, scan } = args.action() else {
            panic!("expected extract");
        };
        assert_eq!(*file, None);
        assert_eq!(*line, 12);
        assert_eq!(scan.counting(), BraceCounting::PerCharacter);
    }

    #[test]
    fn test_run_requires_line_or_template() {
        let result = CommandLineArgs::try_parse_from(["eslog", "run", "buffer.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_requires_prefix() {
        let result = CommandLineArgs::try_parse_from(["eslog", "bind", "-g", "startTime=x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_assignment() {
        let result = CommandLineArgs::try_parse_from(["eslog", "bind", "-s", "level"]);
        assert!(result.is_err());
    }
}
