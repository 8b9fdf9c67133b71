//
// Vidoxide - Image acquisition for amateur astronomy
// Copyright (c) 2020-2021 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Manual exercise harness: opens a real serial port, runs Handshake + Init,
//! then slews the RA axis at sidereal rate for a few seconds before stopping.
//! Not part of the library; useful to sanity-check a mount connection from
//! the command line with full protocol-level logging turned on.
//!
//! Usage: `cargo run --example mock_session -- /dev/ttyUSB0`
//!

use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use skywatcher_mount::config::DriverConfig;
use skywatcher_mount::executor::Executor;
use skywatcher_mount::model::Axis;

fn main() {
    TermLogger::init(LevelFilter::Debug, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)
        .expect("failed to initialize terminal logger");

    let path = std::env::args().nth(1).unwrap_or_else(|| {
        eprintln!("usage: mock_session <serial-port-path>");
        std::process::exit(1);
    });

    let port = serialport::new(&path, 9600)
        .timeout(std::time::Duration::from_millis(500))
        .open()
        .unwrap_or_else(|e| {
            eprintln!("failed to open {}: {}", path, e);
            std::process::exit(1);
        });

    let mut mount = Executor::new(port, DriverConfig::default());

    log::info!("running handshake...");
    mount.handshake().expect("handshake failed");
    log::info!("mount identified as {} (mount_code=0x{:02X})", mount.model().mount_name(), mount.model().mount_code());

    log::info!("running init...");
    mount.init().expect("init failed");

    log::info!("slewing RA at 1x sidereal for 5 seconds...");
    mount.start_tracking(Axis::Ra, skywatcher_mount::executor::STELLAR_ARCSEC_PER_SEC).expect("start_tracking failed");
    std::thread::sleep(std::time::Duration::from_secs(5));

    log::info!("stopping...");
    mount.stop_wait_motor(Axis::Ra).expect("stop failed");
    log::info!("done.");
}
