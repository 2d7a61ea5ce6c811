use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "jinjet")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Jinja-dialect template renderer and formatter", long_about = None)]
pub struct Args {
    #[arg(value_name = "TEMPLATE")]
    pub template: Option<String>,

    #[arg(short, long, value_name = "FILE", conflicts_with = "template")]
    pub file: Option<PathBuf>,

    #[arg(short, long, value_name = "JSON")]
    pub context: Option<String>,

    #[arg(long = "context-file", value_name = "PATH", conflicts_with = "context")]
    pub context_file: Option<PathBuf>,

    #[arg(long = "trim-blocks")]
    pub trim_blocks: bool,

    #[arg(long = "lstrip-blocks")]
    pub lstrip_blocks: bool,

    /// Reformat the template instead of rendering it.
    #[arg(long = "fmt")]
    pub fmt: bool,

    #[arg(long = "indent", value_name = "N", default_value = "4")]
    pub indent: usize,

    /// Render leniently and list variables the context did not supply.
    #[arg(long = "missing")]
    pub missing: bool,

    #[arg(short, long, value_name = "OUTPUT_FILE")]
    pub out: Option<PathBuf>,

    #[arg(long = "color", value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Complete {
        #[arg(value_name = "SHELL")]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "Invalid color choice: {}. Must be 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

pub fn generate_completions(shell: Shell) {
    let mut cmd = Args::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, &bin_name, &mut io::stdout());
}

pub struct AppConfig {
    pub color_enabled: bool,
    pub verbose: bool,
}

impl AppConfig {
    pub fn from_args(args: &Args) -> Self {
        let color_enabled = match args.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => atty::is(atty::Stream::Stderr) && atty::is(atty::Stream::Stdout),
        };

        AppConfig {
            color_enabled,
            verbose: args.verbose,
        }
    }
}
