//!
//! calfix CLI binary
//! -----------------
//! Prints the rewritten form of an InfluxQL query, post-processes a saved raw
//! response for it, or runs it against an InfluxDB server.

use std::env;
use std::fs;
use std::io::{self, Read};

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use calfix::client::InfluxClient;
use calfix::config::{compact_output, ClientConfig, FixConfig};
use calfix::fix_with;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} --query \"<InfluxQL>\"                       # print the rewritten query\n  {program} --query \"<InfluxQL>\" --result <file|->      # post-process a raw JSON response\n  {program} --query \"<InfluxQL>\" --execute [--url <u>] [--db <db>]\n  {program}                                            # reads query text from stdin\n\nFlags:\n  -q, --query <q>     Query text; if omitted, read from stdin\n  --result <file|->   Raw /query JSON response to post-process ('-' for stdin)\n  --execute           Run the rewritten query and print the post-processed result\n  --url <url>         InfluxDB base URL (default: $CALFIX_INFLUX_URL or http://127.0.0.1:8086)\n  --db <db>           Database (default: $CALFIX_INFLUX_DB)\n  -h, --help          Show this help\n\nEnvironment:\n  CALFIX_DEFAULT_TZ         zone used when the query has no TZ() (default UTC)\n  CALFIX_REWRITE_INTERVAL   bucket sent in place of months/years (default 1d)\n  CALFIX_OUTPUT=json        compact JSON output"
    );
}

fn print_json(v: &serde_json::Value) -> Result<()> {
    let text = if compact_output() { serde_json::to_string(v)? } else { serde_json::to_string_pretty(v)? };
    println!("{}", text);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);

    let mut query: Option<String> = None;
    let mut result_path: Option<String> = None;
    let mut execute = false;
    let mut client_cfg = ClientConfig::from_env();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--query" | "-q" => {
                if i + 1 >= args.len() { eprintln!("--query requires a value"); print_usage(&program); std::process::exit(2); }
                query = Some(args[i + 1].clone());
                i += 2; continue;
            }
            "--result" => {
                if i + 1 >= args.len() { eprintln!("--result requires a file or '-'"); print_usage(&program); std::process::exit(2); }
                result_path = Some(args[i + 1].clone());
                i += 2; continue;
            }
            "--url" => {
                if i + 1 >= args.len() { eprintln!("--url requires a value"); print_usage(&program); std::process::exit(2); }
                client_cfg.url = args[i + 1].clone();
                i += 2; continue;
            }
            "--db" => {
                if i + 1 >= args.len() { eprintln!("--db requires a value"); print_usage(&program); std::process::exit(2); }
                client_cfg.db = Some(args[i + 1].clone());
                i += 2; continue;
            }
            "--execute" => { execute = true; i += 1; continue; }
            "-h" | "--help" => {
                print_usage(&program);
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_usage(&program);
                std::process::exit(2);
            }
        }
    }

    if execute && result_path.is_some() {
        bail!("--execute and --result cannot be combined");
    }

    let query = match query {
        Some(q) => q,
        None => {
            if result_path.as_deref() == Some("-") {
                bail!("--result - reads the response from stdin, so the query must be given with --query");
            }
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).context("reading query from stdin")?;
            buf
        }
    };
    if query.trim().is_empty() {
        print_usage(&program);
        std::process::exit(2);
    }

    let fix_cfg = FixConfig::from_env()?;
    info!("calfix: default_tz={} rewrite_interval={}", fix_cfg.default_timezone, fix_cfg.rewrite_interval);

    if execute {
        let client = InfluxClient::from_config(&client_cfg)?.with_fix_config(fix_cfg);
        info!("calfix: executing against {} db={:?}", client_cfg.url, client_cfg.db);
        let resp = client.query_fixed(&query).await?;
        return print_json(&resp.to_json()?);
    }

    let fixed = match fix_with(&query, &fix_cfg) {
        Ok(f) => f,
        Err(e) if e.is_analysis() => {
            eprintln!("Cannot rewrite query: {}", e);
            std::process::exit(2);
        }
        Err(e) => return Err(e.into()),
    };
    match result_path {
        None => {
            println!("{}", fixed.cql);
        }
        Some(path) => {
            let text = if path == "-" {
                let mut buf = String::new();
                io::stdin().read_to_string(&mut buf).context("reading response from stdin")?;
                buf
            } else {
                fs::read_to_string(&path).with_context(|| format!("reading response from {}", path))?
            };
            let raw: serde_json::Value = serde_json::from_str(&text).context("response is not valid JSON")?;
            print_json(&fixed.apply_json(raw)?)?;
        }
    }
    Ok(())
}
