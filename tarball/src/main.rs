use std::path::PathBuf;

use structopt::StructOpt;
use tarball_kit::Filter;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;

use commands::AddOptions;

use structopt::clap::AppSettings::*;

#[derive(Debug, StructOpt)]
enum Commands {
    #[structopt(name = "c", visible_alias = "create", about = "Create a new archive")]
    Create {
        #[structopt(short = "z", long, help = "Compress the archive with gzip")]
        gzip: bool,

        #[structopt(
            short = "j",
            long,
            conflicts_with = "gzip",
            help = "Compress the archive with bzip2"
        )]
        bzip2: bool,

        #[structopt(short, long, help = "Recursively handle provided paths")]
        recursive: bool,

        #[structopt(short, long, help = "Include hidden files when recursing")]
        all: bool,

        #[structopt(
            name = "archive",
            parse(from_os_str),
            help = "Path to the .tar archive"
        )]
        path: PathBuf,

        #[structopt(
            name = "files",
            parse(from_os_str),
            help = "Files/directories to add to the archive"
        )]
        selected_files: Vec<PathBuf>,
    },

    #[structopt(
        name = "a",
        visible_alias = "append",
        about = "Append files to an existing archive"
    )]
    Append {
        #[structopt(short, long, help = "Recursively handle provided paths")]
        recursive: bool,

        #[structopt(short, long, help = "Include hidden files when recursing")]
        all: bool,

        #[structopt(
            name = "archive",
            parse(from_os_str),
            help = "Path to the .tar archive"
        )]
        path: PathBuf,

        #[structopt(
            name = "files",
            parse(from_os_str),
            help = "Files/directories to add to the archive"
        )]
        selected_files: Vec<PathBuf>,
    },

    #[structopt(name = "l", visible_alias = "list", about = "List files of an archive")]
    List {
        #[structopt(long, help = "Print the listing as JSON")]
        json: bool,

        #[structopt(
            name = "archive",
            parse(from_os_str),
            help = "Path to the .tar archive"
        )]
        path: PathBuf,
    },

    #[structopt(
        name = "p",
        visible_alias = "cat",
        about = "Print one file of an archive to stdout"
    )]
    Cat {
        #[structopt(
            name = "archive",
            parse(from_os_str),
            help = "Path to the .tar archive"
        )]
        path: PathBuf,

        #[structopt(name = "member", help = "Path of the file inside the archive")]
        member: String,
    },

    #[structopt(
        name = "x",
        visible_alias = "extract",
        about = "Extract files from an archive"
    )]
    Extract {
        #[structopt(
            short,
            long,
            parse(from_os_str),
            help = "Directory to extract into [default: current directory]"
        )]
        output: Option<PathBuf>,

        #[structopt(
            name = "archive",
            parse(from_os_str),
            help = "Path to the .tar archive"
        )]
        path: PathBuf,
    },

    #[structopt(
        name = "s",
        visible_alias = "scan",
        about = "List the archives in a directory"
    )]
    Scan {
        #[structopt(name = "dir", parse(from_os_str), help = "Directory to scan")]
        dir: PathBuf,
    },
}

#[derive(Debug, StructOpt)]
#[structopt(
    name = "tarball",
    about = "Create, modify and extract tar archives.",
    settings = &[SubcommandRequiredElseHelp, DisableHelpSubcommand, VersionlessSubcommands],
    usage = "tarball (a|c|l|p|s|x) [FLAGS|OPTIONS] <archive> [files]..."
)]
struct CliOpts {
    #[structopt(short, long, help = "Show verbose output", global = true)]
    verbose: bool,

    #[structopt(subcommand)]
    cmd: Commands,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> miette::Result<()> {
    let opts = CliOpts::from_iter(wild::args_os());
    init_tracing(opts.verbose);

    let verbose = opts.verbose;
    match opts.cmd {
        Commands::Create {
            gzip,
            bzip2,
            recursive,
            all,
            path,
            selected_files,
        } => {
            let filter = match (gzip, bzip2) {
                (true, _) => Filter::Gzip,
                (_, true) => Filter::Bzip2,
                _ => Filter::None,
            };
            commands::create(
                path,
                selected_files,
                filter,
                AddOptions {
                    recursive,
                    all,
                    verbose,
                },
            )?
        }
        Commands::Append {
            recursive,
            all,
            path,
            selected_files,
        } => commands::append(
            path,
            selected_files,
            AddOptions {
                recursive,
                all,
                verbose,
            },
        )?,
        Commands::List { json, path } => commands::list(path, json, verbose)?,
        Commands::Cat { path, member } => commands::cat(path, member)?,
        Commands::Extract { output, path } => commands::extract(path, output, verbose)?,
        Commands::Scan { dir } => commands::scan(dir)?,
    }

    Ok(())
}
