use std::io::{self, BufRead};
use std::process;
use std::thread;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use mms_sim::SimulatedBoard;
use mms_stream::args::resolve_config;
use mms_stream::SessionController;

/// Streams accelerometer, gyroscope, and magnetometer samples from one MMS
/// board to stdout. The board button toggles sampling; Ctrl-C ends the
/// session and prints the per-channel totals.
#[derive(Parser)]
#[command(name = "stream_mms")]
struct Cli {
    /// Link-layer address of the board, e.g. EC:2C:09:81:22:AC
    mac_address: String,

    /// Optional quintuple `acc_odr acc_range gyro_odr gyro_range mag_preset`
    /// (e.g. `50 4 50 1000 regular`); all five or none.
    #[arg(value_name = "CONFIG")]
    config: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Usage problems are not process failures: print the help text
            // and leave with a clean status, before any connection attempt.
            err.print()?;
            process::exit(0);
        }
    };
    let config = match resolve_config(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            eprintln!();
            Cli::command().print_help()?;
            process::exit(0);
        }
    };

    let board = SimulatedBoard::connect(&cli.mac_address)?;
    let session = SessionController::new(board);
    println!("[STATUS] Connected to {} over BLE", cli.mac_address);

    println!("[STATUS] Configuring device ({config})");
    session.configure(&config)?;
    session.subscribe_channels()?;
    println!("[STATUS] Device ready");

    // stdin stands in for the physical push button: each line is one
    // press/release pair.
    let button_board = session.board();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            if line.is_err() {
                break;
            }
            button_board.inject_button(true);
            button_board.inject_button(false);
        }
    });

    session.start_sampling();
    println!("[STATUS] Streaming; press Enter to toggle sampling, Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    println!();
    println!("[Interrupt] Stopping device now...");

    let counts = session.teardown();
    println!("[STATUS] Device disconnected");
    println!("[RESULT] Total samples received:");
    println!("acc --> {}", counts.accel);
    println!("gyro -> {}", counts.gyro);
    println!("mag --> {}", counts.mag);
    println!("Total -> {}", counts.total);

    Ok(())
}
