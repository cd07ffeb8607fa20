//! TableTally client: scan for a room, join it, track your chips.
//!
//! The client holds no authority. It mirrors the host's snapshots and
//! sends contribution and ready requests; everything else happens on the
//! host's console.

use std::{
    io::Write,
    net::SocketAddr,
    time::{Duration, Instant},
};

use anyhow::{bail, Context, Error};
use pico_args::Arguments;
use tabletally::{
    discovery::{bind_scanner, spawn_scanner, DiscoveredRoom},
    game::Chips,
    net::client::{ClientEvent, SessionClient},
    session::SessionSnapshot,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
    time,
};

const HELP: &str = "\
Join a TableTally chip-tracking session on the local network

USAGE:
  tt_client [OPTIONS]

OPTIONS:
  --name NAME           Your player name       [default: login name]
  --buy-in CHIPS        Your starting stack    [default: 1000]
  --host IP:PORT        Skip discovery and connect directly

FLAGS:
  -h, --help            Print help information
";

/// How long the scanner runs before the room list is offered.
const SCAN_WINDOW: Duration = Duration::from_secs(4);

struct Args {
    name: String,
    buy_in: Chips,
    host: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let mut pargs = Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        name: pargs
            .value_from_str("--name")
            .unwrap_or_else(|_| whoami::username()),
        buy_in: pargs.value_from_str("--buy-in").unwrap_or(1000),
        host: pargs.opt_value_from_str("--host")?,
    };

    env_logger::builder().format_target(false).init();

    let addr = match args.host {
        Some(addr) => addr,
        None => pick_room().await?,
    };

    println!("Joining {addr} as {}...", args.name);
    let (client, snapshot) = SessionClient::connect(addr, &args.name, args.buy_in).await?;
    println!("Joined. Type 'help' for commands.");
    print_table(&snapshot);

    run_console(client).await
}

/// Scan the LAN for a few seconds and let the user pick a room.
async fn pick_room() -> Result<SocketAddr, Error> {
    println!("Scanning for rooms...");
    let socket = bind_scanner().await?;
    let (tx, mut rx) = mpsc::channel(16);
    let scan_task = spawn_scanner(socket, tx);

    let deadline = Instant::now() + SCAN_WINDOW;
    let mut rooms: Vec<DiscoveredRoom> = Vec::new();
    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        match time::timeout(deadline - now, rx.recv()).await {
            Ok(Some(latest)) => rooms = latest,
            Ok(None) | Err(_) => break,
        }
    }
    scan_task.abort();

    if rooms.is_empty() {
        bail!("no rooms found; is a host running on this network?");
    }

    println!("Rooms:");
    for (i, room) in rooms.iter().enumerate() {
        let phase = if room.game_started {
            if room.allow_mid_game_join { "in progress, open" } else { "in progress" }
        } else {
            "waiting"
        };
        println!("  {}. {room} ({phase})", i + 1);
    }
    print!("Select room (1-{}): ", rooms.len());
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let index: usize = input.trim().parse().context("invalid room number")?;
    if index == 0 || index > rooms.len() {
        bail!("invalid room selection");
    }
    let room = &rooms[index - 1];
    Ok(SocketAddr::new(room.host_ip, room.tcp_port))
}

const CONSOLE_HELP: &str = "\
Commands:
  contrib AMOUNT        Enter your contribution for the current hand
  ready on|off          Toggle your ready flag
  state                 Show the table
  quit                  Leave the session
";

/// Interleave host updates with console input.
async fn run_console(mut client: SessionClient) -> Result<(), Error> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut table = SessionSnapshot::default();
    loop {
        tokio::select! {
            event = client.next_event() => match event {
                Some(ClientEvent::Sync(snapshot)) => {
                    table = snapshot;
                }
                Some(ClientEvent::Error(reason)) => {
                    println!("host says: {reason}");
                }
                Some(ClientEvent::Disconnected) | None => {
                    println!("disconnected from host");
                    break;
                }
            },
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let parts: Vec<&str> = line.split_whitespace().collect();
                match parts.as_slice() {
                    [] => {}
                    ["help"] => print!("{CONSOLE_HELP}"),
                    ["contrib", amount] => client.send_contribution(amount).await,
                    ["ready", flag @ ("on" | "off")] => {
                        client.send_ready(*flag == "on").await;
                    }
                    ["state"] => print_table(&table),
                    ["quit" | "exit"] => break,
                    _ => println!("unknown command, try 'help'"),
                }
            }
        }
    }
    client.shutdown();
    Ok(())
}

fn print_table(snapshot: &SessionSnapshot) {
    let phase = if snapshot.game_started {
        format!("hand-{} in progress", snapshot.hand_counter + 1)
    } else {
        "between hands".to_string()
    };
    println!("Table ({phase}):");
    for player in &snapshot.players {
        let input = snapshot
            .contributions
            .get(&player.id)
            .map(String::as_str)
            .unwrap_or("");
        let mut markers = String::new();
        if player.is_host {
            markers.push_str(" [host]");
        }
        if player.is_ready {
            markers.push_str(" [ready]");
        }
        println!(
            "  {}. {} - {} chips, contribution '{}'{}",
            player.seat_order, player.name, player.chips, input, markers
        );
    }
    if let Some(blinds) = &snapshot.blinds_state {
        println!("  blinds: {blinds}");
    }
}
