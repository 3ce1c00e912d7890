//! Download a binary once and run it from memory.
//!
//! Run with: `cargo run --example run_remote -- <URL> [ARGS]...`

use std::time::Duration;

use clap::Parser;
use memrun::{Config, Session};

#[derive(Parser, Debug)]
#[command(name = "run_remote")]
#[command(about = "Download a binary and run it without touching disk")]
struct Args {
    /// URL to download the binary from
    url: String,

    /// Arguments passed to the binary
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Download timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Program name the binary sees as argv[0]
    #[arg(long)]
    arg0: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "memrun=debug" } else { "memrun=info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut builder = Config::builder()
        .source_url(&args.url)
        .fetch_timeout(Duration::from_secs(args.timeout));
    if let Some(arg0) = &args.arg0 {
        builder = builder.arg0(arg0);
    }

    println!("Downloading: {}", args.url);
    let session = Session::new_async(builder.build()).await?;

    match session.execute(&args.args).await {
        Ok(output) => {
            print!("{}", output.stdout_lossy());
            eprint!("{}", String::from_utf8_lossy(&output.stderr));
            println!("Finished in {:?}", output.duration);
        }
        Err(error) => {
            print!("{}", String::from_utf8_lossy(error.stdout()));
            eprintln!("Error: {error}");
        }
    }

    session.close()?;
    Ok(())
}
