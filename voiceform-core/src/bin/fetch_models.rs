//! Dev utility: run the artifact acquisition queue from a shell.
//!
//! ```text
//! cargo run -p voiceform-core --bin fetch_models -- \
//!   [--dir <models-dir>] [--token <hf-token>]
//! ```
//!
//! The bearer token may also come from `VOICEFORM_HF_TOKEN`.

use std::path::PathBuf;

use voiceform_core::acquisition::{default_data_dir, ModelManager};

#[derive(Debug)]
struct Args {
    dir: PathBuf,
    token: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut dir: Option<PathBuf> = None;
    let mut token: Option<String> = None;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--dir" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --dir".into());
                };
                dir = Some(PathBuf::from(v));
            }
            "--token" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --token".into());
                };
                token = Some(v);
            }
            "--help" | "-h" => {
                println!(
                    "Usage: cargo run -p voiceform-core --bin fetch_models -- \\
  [--dir <models-dir>] [--token <hf-token>]"
                );
                std::process::exit(0);
            }
            other => {
                return Err(format!("unknown argument: {other}"));
            }
        }
    }

    Ok(Args {
        dir: dir.unwrap_or_else(default_data_dir),
        token: token.or_else(|| std::env::var("VOICEFORM_HF_TOKEN").ok()),
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("fetch_models: {e}");
            std::process::exit(2);
        }
    };

    println!("Fetching model artifacts into {}", args.dir.display());
    if args.token.is_none() {
        println!("(no bearer token configured — gated artifacts may fail)");
    }

    let manager = ModelManager::new(&args.dir, args.token);
    let mut progress = manager.subscribe_progress();
    let printer = tokio::spawn(async move {
        while let Ok(event) = progress.recv().await {
            println!("  {} {:>3}%", event.file_name, event.percent);
        }
    });

    match manager.check_and_download().await {
        Ok(paths) => {
            printer.abort();
            println!("All artifacts present:");
            println!("  STT encoder: {}", paths.stt_encoder.display());
            println!("  STT decoder: {}", paths.stt_decoder.display());
            println!("  STT tokens:  {}", paths.stt_tokens.display());
            println!("  LLM weights: {}", paths.llm_weights.display());
        }
        Err(e) => {
            printer.abort();
            eprintln!("fetch_models failed: {e}");
            std::process::exit(1);
        }
    }
}
