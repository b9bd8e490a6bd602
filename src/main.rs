use clap::{Parser, Subcommand};
use story_tests_lib::config::{ServeArgs, TestdataArgs};

/// Story Tests - turn user stories into structured test case tables
#[derive(Parser, Debug)]
#[command(name = "story-tests")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Server options (used when no subcommand is given)
    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch synthetic person rows from Mockaroo and print them as JSON
    Testdata(TestdataArgs),
}

fn main() {
    // .env must be loaded before clap reads env fallbacks
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Command::Testdata(args)) => rt.block_on(run_testdata(args)),
        None => rt.block_on(run_server_mode(cli.serve)),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_server_mode(args: ServeArgs) -> anyhow::Result<()> {
    use story_tests_lib::server::{self, ServerAppState};
    use story_tests_lib::shutdown::{register_signal_handlers, ShutdownState};

    let config = args.into_config();

    let shutdown_state = ShutdownState::new();
    if let Err(e) = register_signal_handlers(shutdown_state.clone()) {
        log::warn!("Failed to register signal handlers: {}", e);
    }

    let state = ServerAppState::new(&config, shutdown_state)?;

    server::run_server(config, state)
        .await
        .map_err(|e| anyhow::anyhow!(e))
}

async fn run_testdata(args: TestdataArgs) -> anyhow::Result<()> {
    use std::time::Duration;
    use story_tests_lib::testdata::{write_rows, MockarooClient};

    let client = MockarooClient::new(Duration::from_secs(30))?;
    let rows = client.generate(&args.api_key, args.count).await?;
    write_rows(&rows, args.output.as_deref())?;
    Ok(())
}
