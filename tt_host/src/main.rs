//! TableTally host: owns the session, serves clients, advertises the room.
//!
//! The host process is also a player. It joins its own session first, then
//! drives hands from a line-based console: start a hand, pick winners,
//! enter contributions for players without a device, settle.

mod store;

use std::{io::Write, net::Ipv4Addr, path::PathBuf, sync::Arc};

use anyhow::Error;
use ctrlc::set_handler;
use log::info;
use pico_args::Arguments;
use tabletally::{
    discovery::{advertise_socket, advertiser::AdvertiseConfig, spawn_advertiser},
    game::{BlindsConfig, Chips, PlayerId},
    net::server::spawn_server,
    session::{
        CoordinatorHandle, DeviceIdentity, FixedDeviceIdentity, SessionConfig, SessionCoordinator,
    },
    SESSION_PORT,
};
use tokio::net::TcpListener;

use store::FileLedgerStore;

const HELP: &str = "\
Host a TableTally chip-tracking session on the local network

USAGE:
  tt_host [OPTIONS]

OPTIONS:
  --room NAME           Room name shown to scanners  [default: <user>'s game]
  --name NAME           Your player name             [default: login name]
  --port PORT           TCP session port             [default: 45454]
  --buy-in CHIPS        Your starting stack          [default: 1000]
  --small-blind CHIPS   Small blind                  [default: 10]
  --big-blind CHIPS     Big blind                    [default: 20]
  --ledger FILE         Ledger file                  [default: tabletally-ledger.json]
  --late-join           Allow joining after the first hand has started

FLAGS:
  --no-blinds           Disable blind tracking
  -h, --help            Print help information
";

struct Args {
    room: String,
    name: String,
    port: u16,
    buy_in: Chips,
    small_blind: Chips,
    big_blind: Chips,
    ledger: PathBuf,
    blinds_enabled: bool,
    allow_mid_game_join: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let name: String = pargs
        .value_from_str("--name")
        .unwrap_or_else(|_| whoami::username());
    let args = Args {
        room: pargs
            .value_from_str("--room")
            .unwrap_or_else(|_| format!("{name}'s game")),
        port: pargs.value_from_str("--port").unwrap_or(SESSION_PORT),
        buy_in: pargs.value_from_str("--buy-in").unwrap_or(1000),
        small_blind: pargs.value_from_str("--small-blind").unwrap_or(10),
        big_blind: pargs.value_from_str("--big-blind").unwrap_or(20),
        ledger: pargs
            .value_from_str("--ledger")
            .unwrap_or_else(|_| PathBuf::from("tabletally-ledger.json")),
        blinds_enabled: !pargs.contains("--no-blinds"),
        allow_mid_game_join: pargs.contains("--late-join"),
        name,
    };

    // Catching signals for exit.
    set_handler(|| std::process::exit(0))?;

    env_logger::builder().format_target(false).init();

    let config = SessionConfig {
        room_name: args.room.clone(),
        blinds: BlindsConfig {
            small_blind: args.small_blind,
            big_blind: args.big_blind,
        },
        blinds_enabled: args.blinds_enabled,
        allow_mid_game_join: args.allow_mid_game_join,
    };
    let store = Arc::new(FileLedgerStore::new(args.ledger));
    let (coordinator, handle) = SessionCoordinator::host(config, store);
    let connections = coordinator.connections();
    tokio::spawn(coordinator.run());

    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, args.port)).await?;
    info!("room '{}' listening on {}", args.room, listener.local_addr()?);
    let server_task = spawn_server(listener, handle.clone(), connections);

    let (socket, target) = advertise_socket().await?;
    let advertise_task = spawn_advertiser(
        socket,
        target,
        handle.clone(),
        AdvertiseConfig {
            room_name: args.room.clone(),
            tcp_port: args.port,
            host_name: args.name.clone(),
            allow_mid_game_join: args.allow_mid_game_join,
        },
    );

    // The host plays too.
    let identity = FixedDeviceIdentity(whoami::devicename());
    handle
        .join(&args.name, args.buy_in, &identity.device_id(), true)
        .await?;
    println!(
        "Hosting '{}' as {} with {} chips. Type 'help' for commands.",
        args.room, args.name, args.buy_in
    );

    run_console(&handle).await?;

    advertise_task.abort();
    server_task.abort();
    handle.stop().await;
    info!("session closed");
    Ok(())
}

const CONSOLE_HELP: &str = "\
Commands:
  players               List seats, stacks, and contribution inputs
  start                 Rotate blinds and start the next hand
  winner N              Toggle seat N in the winner set
  contrib N AMOUNT      Enter a contribution for seat N
  ready N on|off        Toggle a seat's ready flag
  settle                Settle the current hand against the winners
  log                   Show recent ledger entries
  quit                  End the session
";

/// The host's line-based console. Stdin reads block a worker thread,
/// which is fine for a single interactive session.
async fn run_console(handle: &CoordinatorHandle) -> Result<(), Error> {
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [] => {}
            ["help"] => print!("{CONSOLE_HELP}"),
            ["players"] => print_players(handle).await,
            ["start"] => match handle.start_hand().await {
                Ok(()) => {
                    if let Some(snapshot) = handle.snapshot().await {
                        println!("hand-{} started", snapshot.hand_counter + 1);
                    }
                }
                Err(error) => println!("can't start: {error}"),
            },
            ["winner", seat] => match seat_to_player(handle, seat).await {
                Some((id, name)) => match handle.toggle_winner(id).await {
                    Ok(()) => println!("toggled winner: {name}"),
                    Err(error) => println!("can't toggle: {error}"),
                },
                None => println!("no such seat"),
            },
            ["contrib", seat, amount] => match seat_to_player(handle, seat).await {
                Some((id, name)) => {
                    handle.submit_contribution(id, amount).await;
                    println!("{name} contributes '{amount}'");
                }
                None => println!("no such seat"),
            },
            ["ready", seat, flag @ ("on" | "off")] => {
                match seat_to_player(handle, seat).await {
                    Some((id, _)) => handle.ready_toggle(id, *flag == "on").await,
                    None => println!("no such seat"),
                }
            }
            ["settle"] => match handle.settle().await {
                Ok(settlement) => {
                    for pot in &settlement.pots {
                        println!("{pot}");
                    }
                    for player in &settlement.players {
                        println!("  {} now has {} chips", player.name, player.chips);
                    }
                }
                Err(error) => println!("can't settle: {error}"),
            },
            ["log"] => print_ledger(handle).await,
            ["quit" | "exit"] => return Ok(()),
            _ => println!("unknown command, try 'help'"),
        }
    }
}

async fn print_players(handle: &CoordinatorHandle) {
    let Some(snapshot) = handle.snapshot().await else {
        println!("session closed");
        return;
    };
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
        if let Some(blinds) = &snapshot.blinds_state {
            if blinds.dealer_index == player.seat_order {
                markers.push_str(" [dealer]");
            }
            if blinds.small_blind_index == player.seat_order {
                markers.push_str(" [sb]");
            }
            if blinds.big_blind_index == player.seat_order {
                markers.push_str(" [bb]");
            }
        }
        println!(
            "  {}. {} - {} chips, contribution '{}'{}",
            player.seat_order, player.name, player.chips, input, markers
        );
    }
}

async fn print_ledger(handle: &CoordinatorHandle) {
    let Some(snapshot) = handle.snapshot().await else {
        println!("session closed");
        return;
    };
    if snapshot.transactions.is_empty() {
        println!("no transactions yet");
        return;
    }
    for entry in &snapshot.transactions {
        println!(
            "  {} {} {:+} ({}) -> {}",
            entry.timestamp.format("%H:%M:%S"),
            entry.player_name,
            entry.amount,
            entry.note,
            entry.balance_after
        );
    }
}

/// Resolve a console seat number to a player.
async fn seat_to_player(handle: &CoordinatorHandle, seat: &str) -> Option<(PlayerId, String)> {
    let seat: usize = seat.parse().ok()?;
    let snapshot = handle.snapshot().await?;
    snapshot
        .players
        .iter()
        .find(|player| player.seat_order == seat)
        .map(|player| (player.id, player.name.clone()))
}
