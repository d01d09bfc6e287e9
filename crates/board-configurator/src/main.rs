use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use board_configurator::Result;
use board_configurator::config::ToolConfig;
use board_configurator::process::SystemRunner;
use board_configurator::records::{BoardIdentity, FileRecord};
use board_configurator::session::Session;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Tool configuration TOML (default: ./boardcfg.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level regardless of BOARDCFG_LOG
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive menu (default)
    Menu,
    /// List the vendor/board catalog
    Boards,
    /// Print the definition files that apply to a board, in merge order
    Discover {
        #[arg(long)]
        vendor: String,
        #[arg(long)]
        board: String,
    },
    /// Merge board defaults into the configuration state and remember the board
    Select {
        #[arg(long)]
        vendor: String,
        #[arg(long)]
        board: String,
    },
    /// Edit the configuration and regenerate the header for the selected board
    Configure,
    /// Run the configured build steps for the selected board
    Build,
    /// Create cloud resources for a new thing
    Provision {
        #[arg(long)]
        thing_name: String,
    },
    /// Delete the current thing's cloud resources
    Cleanup,
    /// Fix function-macro quoting in a generated header
    FixHeader {
        raw: PathBuf,
        out: PathBuf,
        /// Name suffix marking function-like values (default from config)
        #[arg(long)]
        tag: Option<String>,
    },
    /// Show the selected board, thing and resolved configuration
    Status {
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("BOARDCFG_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    // A local .env may carry BOARDCFG_IOT_ENDPOINT and BOARDCFG_LOG.
    dotenv::dotenv().ok();
    init_logging(args.verbose);

    let cfg = ToolConfig::load(args.config.as_deref())?;
    let ws = board_configurator::workspace::load_paths(&cfg.workspace)?;
    let runner = SystemRunner;
    let boards = FileRecord::new(&ws.board_record);
    let things = FileRecord::new(&ws.thing_record);
    let session = Session::new(&cfg, &ws, &runner, &boards, &things);

    match args.cmd.unwrap_or(Command::Menu) {
        Command::Menu => {
            let stdin = io::stdin();
            board_configurator::menu::run(&session, &mut stdin.lock(), &mut io::stdout())
        }
        Command::Boards => {
            for v in &cfg.catalog {
                println!("{}: {}", v.vendor, v.boards.join(", "));
            }
            Ok(())
        }
        Command::Discover { vendor, board } => {
            let board = BoardIdentity::new(vendor, board);
            println!("{}", ws.base_definition.display());
            for f in session.discover(&board)? {
                println!("{}", f.display());
            }
            Ok(())
        }
        Command::Select { vendor, board } => {
            let board = BoardIdentity::new(vendor, board);
            let files = session.select_board(&board)?;
            println!("Selected the {board} ({} definition file(s))", files.len());
            Ok(())
        }
        Command::Configure => session.configure(),
        Command::Build => session.build(),
        Command::Provision { thing_name } => {
            let thing = session.provision(&thing_name)?;
            println!("Provisioned thing '{thing}'");
            Ok(())
        }
        Command::Cleanup => {
            match session.cleanup()? {
                Some(t) => println!("Cleaned up thing '{t}'"),
                None => println!("No thing to clean up"),
            }
            Ok(())
        }
        Command::FixHeader { raw, out, tag } => {
            let tag = tag.unwrap_or_else(|| cfg.header.function_tag.clone());
            board_configurator::header::correct(&raw, &out, &tag)
        }
        Command::Status { json } => cmd_status(&session, json),
    }
}

fn cmd_status(session: &Session<'_>, json: bool) -> Result<()> {
    let status = session.status()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    match &status.board {
        Some(b) => println!("board:  {b}"),
        None => println!("board:  (none selected)"),
    }
    match &status.thing {
        Some(t) => println!("thing:  {t}"),
        None => println!("thing:  (none provisioned)"),
    }
    println!(
        "header: {} ({})",
        status.final_header.display(),
        if status.final_header_exists {
            "present"
        } else {
            "missing"
        }
    );
    println!(
        "state:  {} ({} entries)",
        status.state_file.display(),
        status.state_entries.len()
    );
    for e in &status.state_entries {
        println!("  {}={}", e.key, e.value);
    }
    Ok(())
}
