//! Desktop walk-through of a bridge session against scripted hardware.
//!
//! The demo plays the part of a trainbox and a mobile station on the bus:
//!
//! - answers the start-up ping from both devices
//! - drives a locomotive from a simulated phone throttle
//! - serves the loco list and two locomotive configurations
//!
//! The converted roster is printed at the end, in the central-station file
//! dialect.
//!
//! # Usage
//!
//! ```sh
//! RUST_LOG=debug cargo run --example roster_fetch
//! ```

use std::io::Write;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{info, LevelFilter};

use rs_trainbridge::hal::{MockBus, MockStation, MockStore, RosterRecorder};
use rs_trainbridge::traits::{Clock, StdClock};
use rs_trainbridge::{
    BridgeConfig, BridgeController, BusEvent, ClientRequest, PowerState, StationConfig,
    StepConfig,
};

const TICK: Duration = Duration::from_millis(20);

const LOCO_LIST: &str = "[lokliste]\nlok\n .name=BR 86\n .adresse=0x6\nlok\n .name=V 200\n .adresse=0x4007\n";

const BR86: &str = "[lokomotive]\nlok\n .name=BR 86\n .adresse=0x6\n .typ=mm2_prg\n .fkt\n  ..typ=1\n  ..dauer2=0\n .fkt\n  ..typ=51\n";

const V200: &str = "[lokomotive]\nlok\n .name=V 200\n .adresse=0x4007\n .typ=mfx\n .fkt\n  ..typ=1\n .fkt2\n  ..typ2=7\n  ..wert2=1\n";

fn init_logging() {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format(|buf, record| writeln!(buf, "[{} {}] {}", record.level(), record.target(), record.args()))
        .init();
}

/// Run one main-loop pass at the current wall-clock time.
fn tick(
    bridge: &mut BridgeController<MockBus, MockStation, MockStore>,
    clock: &StdClock,
) -> u64 {
    thread::sleep(TICK);
    let now = clock.now_ms();
    bridge.cyclic(now);
    now
}

fn main() -> Result<()> {
    init_logging();

    let config = BridgeConfig::default()
        .with_station(StationConfig::default().with_serial_number(0x0000_1234));
    let mut bridge: BridgeController<_, _, _> =
        BridgeController::new(config, MockBus::new(), MockStation::new(), MockStore::new());

    let clock = StdClock::new();
    bridge.begin(clock.now_ms());

    // Both devices answer the ping
    bridge.bus_mut().queue(BusEvent::Ping {
        hash: 0x2F4A,
        uid: 0x4D54_1234,
        sw_version: 0x0127,
        hw_ident: 0x0010,
    });
    bridge.bus_mut().queue(BusEvent::Ping {
        hash: 0x4711,
        uid: 0x4D53_0001,
        sw_version: 0x0300,
        hw_ident: 0x0032,
    });
    tick(&mut bridge, &clock);
    info!(
        "{} trainbox(es), {} mobile station(s)",
        bridge.trainboxes().len(),
        bridge.stations().len()
    );

    // A phone throttle switches the track on and drives address 6
    bridge.clients_mut().queue(ClientRequest::SetPower(PowerState::Normal));
    bridge.clients_mut().queue(ClientRequest::LocoSpeed {
        address: 6,
        steps: StepConfig::Step28,
        speed: 0x80 | 0x0C,
    });
    let now = tick(&mut bridge, &clock);
    for command in &bridge.bus().sent {
        info!("bus <- {command:?}");
    }
    bridge.bus_mut().clear_sent();

    // Download the roster from the mobile station
    let roster = RosterRecorder::new();
    if !bridge.fetch_roster(roster.clone(), now) {
        bail!("roster download did not start");
    }
    for response in [LOCO_LIST, BR86, V200] {
        bridge.bus_mut().queue_config_stream(response);
        tick(&mut bridge, &clock);
    }

    let success = roster
        .results()
        .first()
        .copied()
        .context("roster download did not finish")?;
    if !success {
        bail!("roster download failed");
    }

    println!("{}", roster.text());
    info!(
        "{} locos converted, {} config requests sent",
        bridge.session().names().len(),
        bridge.bus().config_requests().len()
    );
    Ok(())
}
