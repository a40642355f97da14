//! cmdq CLI - コマンドラインインターフェース
//!
//! GPUコマンドキューのメモリイメージをデコードするツール

mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cmdq_core::errors::ERR_UNKNOWN_COMMAND;
use cmdq_core::parse::parse_address;
use cmdq_core::{Command, DecodedRecord, Session};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// cmdq - GPU command queue decoder
#[derive(Parser)]
#[command(name = "cmdq")]
#[command(version = "0.1.0")]
#[command(about = "Decode GPU command-queue structures from a captured memory image", long_about = None)]
struct Cli {
    /// Path to the captured memory image
    image: String,

    /// GPU virtual address of the first byte of the image
    #[arg(short, long, default_value = "0", value_parser = parse_address_arg)]
    base: u64,

    /// The image is a text hex dump instead of raw bytes
    #[arg(long)]
    hexdump: bool,

    /// Maximum pointer depth to follow
    #[arg(long)]
    max_depth: Option<usize>,

    /// Print decoded trees as JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Decode one record or variant table at an address
    Decode {
        /// Schema or variant table name (e.g. CmdBufWork, CommandQueueInfo)
        schema: String,

        /// Address of the record
        #[arg(value_parser = parse_address_arg)]
        address: u64,
    },

    /// List the known schemas
    Schemas,

    /// Start the interactive shell (default)
    Repl,
}

fn parse_address_arg(s: &str) -> std::result::Result<u64, String> {
    parse_address(s).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut session = open_session(&cli)?;
    if let Some(depth) = cli.max_depth {
        session.set_max_depth(depth)?;
    }

    match cli.command.unwrap_or(CliCommand::Repl) {
        CliCommand::Decode { schema, address } => {
            let record = session.decode(&schema, address)?;
            print_record(&record, cli.json)?;
        }
        CliCommand::Schemas => print_schemas(&session),
        CliCommand::Repl => run_repl(&mut session, cli.json)?,
    }

    Ok(())
}

/// ログ出力を初期化する
///
/// 標準出力をデコード結果専用にするため、ログは標準エラー出力に書きます。
fn init_tracing(verbose: u8) {
    let env_filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// メモリイメージを読み込んでセッションを作成する
fn open_session(cli: &Cli) -> Result<Session> {
    debug!("opening {} at 0x{:x}", cli.image, cli.base);
    if cli.hexdump {
        Session::open_hexdump(&cli.image, cli.base)
    } else {
        Session::open(&cli.image, cli.base)
    }
}

fn print_record(record: &DecodedRecord, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
    } else {
        print!("{}", render::render(record));
    }

    let unresolved = record.unresolved_pointers();
    if !unresolved.is_empty() && !json {
        println!();
        println!("Unresolved pointers ({}):", unresolved.len());
        for (path, pointer) in unresolved {
            println!("  {}: {}", path, pointer);
        }
    }
    Ok(())
}

fn print_schemas(session: &Session) {
    println!("Known schemas:");
    for name in session.schema_names() {
        if session.registry().is_table(name) {
            println!("  {} (variant table)", name);
        } else if let Ok(schema) = session.registry().record(name) {
            let leaf = if schema.is_leaf() { ", leaf" } else { "" };
            println!("  {} ({:#x} bytes{})", name, schema.size(), leaf);
        }
    }
}

fn print_info(session: &Session) {
    let image = session.image();
    println!("Image: {:#x}..{:#x} ({:#x} bytes)", image.base(), image.end(), image.len());
    println!("Max depth: {}", session.config().max_depth);
    println!("Schemas: {}", session.schema_names().len());
}

/// REPLループを実行する
fn run_repl(session: &mut Session, json: bool) -> Result<()> {
    println!("cmdq - GPU command queue decoder");
    print_info(session);
    println!("Type 'help' for available commands, 'quit' to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("(cmdq) ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                match handle_command(session, line, json) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => eprintln!("Error: {:#}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

/// コマンドを実行する。終了する場合は `false` を返す
fn handle_command(session: &mut Session, line: &str, json: bool) -> Result<bool> {
    match Command::parse(line) {
        Some(Command::Work(address)) => print_record(&session.decode_work(address)?, json)?,
        Some(Command::Queue(address)) => print_record(&session.decode_queue(address)?, json)?,
        Some(Command::Notify(address)) => print_record(&session.decode_notify(address)?, json)?,
        Some(Command::Decode { schema, address }) => {
            print_record(&session.decode(&schema, address)?, json)?
        }
        Some(Command::Schemas) => print_schemas(session),
        Some(Command::Info) => print_info(session),
        Some(Command::Depth(depth)) => {
            session.set_max_depth(depth)?;
            println!("Max depth set to {}", depth);
        }
        Some(Command::Help) => print_help(),
        Some(Command::Quit) => {
            println!("Goodbye!");
            return Ok(false);
        }
        None => println!("{}", ERR_UNKNOWN_COMMAND),
    }

    Ok(true)
}

fn print_help() {
    println!("Available commands:");
    println!();
    println!("  help                   - Show this help message");
    println!("  quit/exit/q            - Exit");
    println!();
    println!("Decode commands:");
    println!("  work <addr>            - Decode a work command (dispatch on its leading word)");
    println!("  queue <addr>           - Decode a CommandQueueInfo");
    println!("  notify <addr>          - Decode a NotifyCmdQueueWork message");
    println!("  decode <schema> <addr> - Decode any schema or variant table");
    println!();
    println!("Session commands:");
    println!("  schemas                - List known schemas");
    println!("  info                   - Show image and decode settings");
    println!("  depth <n>              - Set the maximum pointer depth");
    println!();
    println!("Examples:");
    println!("  work 0xffffffa00c378000");
    println!("  decode WorkCommandSubC 0xffffffa00c3d80c0");
}
