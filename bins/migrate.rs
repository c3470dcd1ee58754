use dotenvy::dotenv;
use migration::MigratorTrait;
use tracing::{error, info};

fn init_logging() {
    // load .env first so RUST_LOG and DATABASE_URL apply
    dotenv().ok();
    common::utils::logging::init_logging_default();
    info!(service = "migrate", event = "logger_init", "tracing subscriber initialized");
}

enum Command {
    Up,
    Down,
    Status,
}

fn parse_command() -> Result<Command, String> {
    match std::env::args().nth(1).as_deref() {
        None | Some("up") => Ok(Command::Up),
        Some("down") => Ok(Command::Down),
        Some("status") => Ok(Command::Status),
        Some(other) => Err(format!("unknown command '{other}', expected up, down or status")),
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    let cfg = configs::AppConfig::load_or_env()?;
    let db = models::db::connect_with_config(&cfg.database).await?;
    match command {
        Command::Up => {
            migration::Migrator::up(&db, None).await?;
            info!(service = "migrate", event = "applied", "all pending migrations applied");
        }
        Command::Down => {
            migration::Migrator::down(&db, Some(1)).await?;
            info!(service = "migrate", event = "reverted", "last migration reverted");
        }
        Command::Status => migration::Migrator::status(&db).await?,
    }
    Ok(())
}

fn main() -> std::process::ExitCode {
    init_logging();

    let command = match parse_command() {
        Ok(c) => c,
        Err(msg) => {
            error!(service = "migrate", event = "bad_arguments", error = %msg, "invalid arguments");
            return std::process::ExitCode::FAILURE;
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "migrate", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return std::process::ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(command)) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!(service = "migrate", event = "run_failed", error = %e, "migration run failed");
            std::process::ExitCode::FAILURE
        }
    }
}
