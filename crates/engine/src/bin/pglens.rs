//! Minimal command-line runner: lint, explain, or optimize one statement
//! against the database named by `DATABASE_URL`.

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use pglens_common::AdvisorConfig;
use pglens_engine::{Engine, ExplainOptions, OptimizeOptions};
use pglens_gateway::{PgGateway, PgGatewayConfig};

fn usage() -> ExitCode {
    eprintln!("usage: pglens <lint|explain|optimize> <sql>");
    ExitCode::from(2)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let (command, sql) = match args.as_slice() {
        [_, command, sql] => (command.as_str(), sql.as_str()),
        _ => return usage(),
    };

    let conn_string = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgresql://postgres@localhost:5432/postgres".to_string());
    let gateway = match PgGateway::new(&PgGatewayConfig { conn_string }) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("pglens: {e}");
            return ExitCode::FAILURE;
        }
    };
    let engine = Engine::new(Arc::new(gateway), AdvisorConfig::default());

    let rendered = match command {
        "lint" => serde_json::to_string_pretty(&engine.lint(sql)),
        "explain" => match engine.explain(sql, &ExplainOptions::default()).await {
            Ok(response) => serde_json::to_string_pretty(&response),
            Err(e) => {
                eprintln!("pglens: {e}");
                return ExitCode::FAILURE;
            }
        },
        "optimize" => match engine.optimize(sql, &OptimizeOptions::default()).await {
            Ok(response) => serde_json::to_string_pretty(&response),
            Err(e) => {
                eprintln!("pglens: {e}");
                return ExitCode::FAILURE;
            }
        },
        _ => return usage(),
    };

    match rendered {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("pglens: {e}");
            ExitCode::FAILURE
        }
    }
}
