mod capabilities;
mod client;
mod context;
mod tests;
#[allow(dead_code)] // fields exist for serde deserialization
mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use capabilities::Capabilities;
use client::KioskClient;
use context::TestContext;

#[derive(Parser)]
#[command(name = "kiosk-test", about = "Acceptance tests for a live kiosk's HTTP remote")]
struct Cli {
    /// Kiosk address as host:port (required unless --list)
    #[arg(long)]
    host: Option<String>,

    /// Allow tests that start and stop apps on the kiosk's screen
    #[arg(long)]
    launch: bool,
}

async fn setup(host: &str, cli: &Cli) -> Result<Arc<TestContext>> {
    let client = KioskClient::new(host);
    let status = client
        .get_status()
        .await
        .context("initial connection to kiosk failed")?;

    let capabilities = Capabilities {
        http: true,
        launch: cli.launch,
    };

    eprintln!("Connected to kiosk at {host}");
    eprintln!(
        "  running={:?}, launch={}",
        status.active_scripts, capabilities.launch,
    );

    Ok(Arc::new(TestContext {
        client,
        capabilities,
    }))
}

fn register_all(caps: &Capabilities) -> Vec<libtest_mimic::Trial> {
    let mut tests = Vec::new();
    tests.extend(tests::status::register(caps));
    tests.extend(tests::remote::register(caps));
    tests
}

fn main() {
    let all_args: Vec<String> = std::env::args().collect();

    // clap handles --host/--launch, libtest-mimic handles --list/filters/etc.
    let mut our_args = vec![all_args[0].clone()];
    let mut test_args = vec![all_args[0].clone()];
    let mut i = 1;
    while i < all_args.len() {
        match all_args[i].as_str() {
            "--host" => {
                our_args.push(all_args[i].clone());
                if i + 1 < all_args.len() {
                    i += 1;
                    our_args.push(all_args[i].clone());
                }
            }
            "--launch" => our_args.push(all_args[i].clone()),
            _ if all_args[i].starts_with("--host=") => {
                our_args.push(all_args[i].clone());
            }
            _ => {
                test_args.push(all_args[i].clone());
            }
        }
        i += 1;
    }

    let cli = Cli::parse_from(&our_args);
    let mut mimic_args = libtest_mimic::Arguments::from_iter(test_args);

    if mimic_args.list {
        let dummy_caps = Capabilities {
            http: true,
            launch: true,
        };
        libtest_mimic::run(&mimic_args, register_all(&dummy_caps)).exit();
    }

    let host = cli.host.as_deref().unwrap_or_else(|| {
        eprintln!("error: --host is required when running tests");
        eprintln!("usage: kiosk-test --host <ADDRESS:PORT> [--launch]");
        std::process::exit(1);
    });

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    let ctx = rt.block_on(setup(host, &cli)).unwrap_or_else(|e| {
        eprintln!("Failed to connect to kiosk: {e:#}");
        std::process::exit(1);
    });

    let tests = register_all(&ctx.capabilities);
    if ctx.capabilities.launch {
        // there is only one screen to fight over
        mimic_args.test_threads = Some(1);
    }
    context::set_context(ctx);
    libtest_mimic::run(&mimic_args, tests).exit();
}
