use clap::Parser;
use murmur::core::config::{self, CliOverrides};
use murmur::core::conversation::Conversation;
use murmur::core::lifecycle::MessageState;
use murmur::transport::TransportSelector;
use murmur::{Chat, TransportPreference, headless, tui};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::File;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "murmur", about = "Streaming chat client")]
struct Args {
    /// Transport for new sessions
    #[arg(short, long, value_enum)]
    transport: Option<TransportPreference>,

    /// Backend base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Send one prompt, stream the reply to stdout, and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// With --prompt: print the final message as JSON instead of streaming text
    #[arg(long, requires = "prompt")]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Initialize file logger - writes to murmur.log in current directory
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();

    if let Ok(log_file) = File::create("murmur.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }

    let file_config = config::load_config().unwrap_or_else(|e| {
        log::warn!("{}, using defaults", e);
        config::MurmurConfig::default()
    });
    let resolved = config::resolve(
        &file_config,
        &CliOverrides {
            base_url: args.base_url,
            transport: args.transport,
        },
    );

    log::info!(
        "murmur starting up: backend={} transport={:?}",
        resolved.base_url,
        resolved.transport
    );

    let selector = TransportSelector::http(
        &resolved.base_url,
        resolved.transport,
        resolved.event_stream_supported,
    );
    let mut chat = Chat::with_conversation(selector, Conversation::new());

    match args.prompt {
        Some(prompt) => {
            let mut stdout = std::io::stdout();
            match headless::run(&mut chat, &prompt, args.json, &mut stdout).await {
                Ok(MessageState::Error) => ExitCode::FAILURE,
                Ok(_) => ExitCode::SUCCESS,
                Err(e) => {
                    log::warn!("Headless run failed: {}", e);
                    eprintln!("murmur: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        None => match tui::run(chat, &resolved) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("murmur: {e}");
                ExitCode::FAILURE
            }
        },
    }
}
