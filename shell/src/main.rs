use std::io::{self, BufRead, Write};
use std::sync::Arc;

use node::{NodeAddress, NodeConfig};

fn print_usage(prog: &str) {
    eprintln!("Usage: {prog} create <port>");
    eprintln!("       {prog} join <port> <seed_ip:seed_port>");
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let prog = args.first().cloned().unwrap_or_else(|| "tschrou".to_string());

    if args.len() < 3 {
        print_usage(&prog);
        std::process::exit(1);
    }

    let mode = args[1].as_str();
    let port: u16 = match args[2].parse() {
        Ok(p) => p,
        Err(_) => {
            eprintln!("invalid port: {}", args[2]);
            std::process::exit(1);
        }
    };

    let config = NodeConfig::default().with_address("0.0.0.0".to_string(), port);
    let node = node::Node::new(config);

    let started = match mode {
        "create" => node.create().await,
        "join" => {
            let Some(seed) = args.get(3) else {
                print_usage(&prog);
                std::process::exit(1);
            };
            let Some((host, port)) = seed.rsplit_once(':') else {
                eprintln!("seed must be host:port");
                std::process::exit(1);
            };
            let Ok(port) = port.parse() else {
                eprintln!("invalid seed port: {port}");
                std::process::exit(1);
            };
            node.join(NodeAddress::new(host.to_string(), port)).await
        }
        other => {
            eprintln!("unknown mode: {other}");
            print_usage(&prog);
            std::process::exit(1);
        }
    };

    if let Err(e) = started {
        eprintln!("failed to start: {e}");
        std::process::exit(1);
    }

    install_signal_handler(node.clone());
    run_interactive(node).await;
}

fn install_signal_handler(node: Arc<node::Node>) {
    let result = ctrlc::set_handler(move || {
        let node = node.clone();
        tokio::spawn(async move {
            node.leave().await;
            std::process::exit(0);
        });
    });
    if let Err(e) = result {
        log::warn!("failed to install signal handler: {e}");
    }
}

async fn run_interactive(node: Arc<node::Node>) {
    let stdin = io::stdin();
    println!("ready. type 'help' for commands.");
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(3, ' ');
        let command = parts.next().unwrap_or("");

        match command {
            "quit" | "exit" => {
                node.leave().await;
                break;
            }
            "help" => {
                println!("commands: put <key> <value>, get <key>, state, fingers, hash <string>, quit");
            }
            "state" => {
                println!("{}", node.print_state());
            }
            "fingers" => {
                println!("{}", node.print_finger_table());
            }
            "put" => {
                let key = parts.next().unwrap_or("").to_string();
                let value = parts.next().unwrap_or("").to_string();
                let ok = node.put(key, value).await;
                println!("{}", ok);
            }
            "get" => {
                let key = parts.next().unwrap_or("");
                match node.get(key).await {
                    Some(v) => println!("{v}"),
                    None => println!("(not found)"),
                }
            }
            "hash" => {
                let s = parts.next().unwrap_or("");
                println!("{:#010x}", node::hash::hash_key(s));
            }
            _ => {
                println!("unknown command: {command}");
            }
        }
        io::stdout().flush().ok();
    }
}
