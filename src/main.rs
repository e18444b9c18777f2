// src/main.rs
use mini_kvstore_v2::{Database, StoreConfig};
use std::io::{self, Write};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let db = Database::open(StoreConfig::from_env()).await?;

    println!("mini-kvstore-v2 (type help for instructions)");

    loop {
        print!("> ");
        io::stdout().flush().ok();
        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            continue;
        }

        let mut parts = input.trim().splitn(3, ' ');
        let cmd = match parts.next() {
            Some(c) => c,
            None => continue,
        };

        match cmd {
            "set" => {
                let key = match parts.next() {
                    Some(k) => k,
                    None => {
                        println!("Usage: set <key> <value>");
                        continue;
                    }
                };
                let value = parts.next().unwrap_or("");
                match db.put(key, value).await {
                    Ok(()) => println!("OK"),
                    Err(e) => println!("Error: {e}"),
                }
            }

            "get" => {
                let key = match parts.next() {
                    Some(k) => k,
                    None => {
                        println!("Usage: get <key>");
                        continue;
                    }
                };
                match db.get(key).await {
                    Ok(v) => println!("{v}"),
                    Err(e) => println!("Error: {e}"),
                }
            }

            "stats" => match db.stats().await {
                Ok(stats) => println!("{stats}"),
                Err(e) => println!("Error: {e}"),
            },

            "help" => print_help(),
            "quit" | "exit" => break,

            other => println!("Unknown command: '{other}'"),
        }
    }

    db.close().await?;
    Ok(())
}

fn print_help() {
    println!("Available commands:");
    println!("  set <key> <value>");
    println!("  get <key>");
    println!("  stats");
    println!("  help");
    println!("  quit / exit");
}
