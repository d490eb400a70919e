use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use tagdeck::app;
use tagdeck::config;
use tagdeck::gateway::Id3FileGateway;
use tagdeck::session::{EditSession, LoadOutcome};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tagdeck")]
#[command(about = "View and edit ID3v2 tags of audio files")]
struct Args {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the tags this editor can create
    Tags,
    /// List editable files in a directory (defaults to the last one used)
    Ls {
        dir: Option<PathBuf>,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Print the tags of a file
    Show { file: PathBuf },
    /// Add or change one tag and save
    Set {
        file: PathBuf,
        key: String,
        value: String,
    },
    /// Delete one tag and save
    Rm { file: PathBuf, key: String },
    /// Edit tags interactively
    Edit { file: Option<PathBuf> },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "tagdeck=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_env_filter(filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut settings = config::load_settings().unwrap_or_else(|err| {
        warn!("using default settings: {err:#}");
        config::EditorSettings::default()
    });
    let mut session = EditSession::new(Id3FileGateway::from_settings(&settings));
    let mut stdout = io::stdout().lock();

    match args.command {
        Command::Tags => app::print_catalog(&mut stdout)?,
        Command::Ls { dir, recursive } => {
            app::list_directory(&mut settings, dir.as_deref(), recursive, &mut stdout)?
        }
        Command::Show { file } => {
            app::show_file(&mut session, &file, &mut stdout)?;
            config::remember_directory(&mut settings, &file);
        }
        Command::Set { file, key, value } => {
            app::set_tag(&mut session, &file, &key, &value)?;
            config::remember_directory(&mut settings, &file);
        }
        Command::Rm { file, key } => {
            app::remove_tag(&mut session, &file, &key)?;
            config::remember_directory(&mut settings, &file);
        }
        Command::Edit { file } => {
            if let Some(file) = file {
                match session.load(&file) {
                    Ok(LoadOutcome::Loaded { frames }) => {
                        writeln!(stdout, "{}: {frames} frames", file.display())?
                    }
                    Ok(LoadOutcome::NoHeaderFound) => {
                        writeln!(stdout, "{}: no tag yet, starting empty", file.display())?
                    }
                    Err(err) => anyhow::bail!("failed to open {}: {err}", file.display()),
                }
                config::remember_directory(&mut settings, &file);
            }
            app::run_editor(&mut session, &mut settings, io::stdin().lock(), &mut stdout)?;
        }
    }

    if let Err(err) = config::save_settings(&settings) {
        warn!("failed to save settings: {err:#}");
    }
    Ok(())
}
