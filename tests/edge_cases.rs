//! Edge case and boundary condition tests for the bridge

use rs_trainbridge::{
    hal::{MockBus, MockStation, MockStore, RosterRecorder},
    BridgeConfig, BridgeController, BusCommand, BusEvent, ClientRequest, DecoderMode,
    SessionPhase, StationConfig, StationMessage, StepConfig, TurnoutPosition,
};

type SmallBridge = BridgeController<MockBus, MockStation, MockStore, 2, 2>;

fn small() -> SmallBridge {
    let mut bridge =
        BridgeController::new(BridgeConfig::default(), MockBus::new(), MockStation::new(), MockStore::new());
    bridge.begin(0);
    bridge.bus_mut().clear_sent();
    bridge
}

fn drive(address: u16, steps: StepConfig, speed: u8) -> ClientRequest {
    ClientRequest::LocoSpeed { address, steps, speed }
}

fn last_bus_speed(bus: &MockBus) -> Option<u16> {
    bus.sent.iter().rev().find_map(|c| match c {
        BusCommand::LocoSpeed { speed, .. } => Some(*speed),
        _ => None,
    })
}

// ============================================================================
// Capacity
// ============================================================================

#[test]
fn oldest_loco_is_evicted_when_full() {
    let mut bridge = small();
    for (t, address) in [1u16, 2, 3].into_iter().enumerate() {
        bridge.clients_mut().queue(ClientRequest::GetLocoState { address });
        bridge.cyclic(t as u64 * 10);
    }

    assert_eq!(bridge.locos().len(), 2);
    assert!(bridge.locos().find(1).is_none());
    assert!(bridge.locos().find(3).is_some());
    assert_eq!(
        bridge.store().get_raw("z21", "locomode").map(<[u8]>::len),
        Some(8)
    );
}

#[test]
fn turnout_overflow_starts_over() {
    let mut bridge = small();
    for address in [1u16, 2, 3] {
        bridge
            .clients_mut()
            .queue(ClientRequest::Accessory { address, output: 1, active: true });
    }
    bridge.cyclic(10);

    assert_eq!(bridge.turnouts().len(), 1);
    assert_eq!(bridge.turnouts().get(3), TurnoutPosition::Thrown);
    assert_eq!(bridge.turnouts().get(1), TurnoutPosition::Unknown);
}

#[test]
fn persisted_blob_larger_than_registry_is_truncated() {
    let mut bridge: SmallBridge = BridgeController::new(
        BridgeConfig::default(),
        MockBus::new(),
        MockStation::new(),
        MockStore::new(),
    );
    bridge
        .store_mut()
        .put_raw("z21", "locomode", &[1, 0, 1, 3, 2, 0, 1, 3, 3, 0, 1, 3]);
    bridge.begin(0);
    assert_eq!(bridge.locos().len(), 2);
    assert!(bridge.locos().find(3).is_none());
}

#[test]
fn trailing_partial_record_is_ignored() {
    let mut bridge: SmallBridge = BridgeController::new(
        BridgeConfig::default(),
        MockBus::new(),
        MockStation::new(),
        MockStore::new(),
    );
    bridge.store_mut().put_raw("z21", "locomode", &[3, 0, 0, 2, 9]);
    assert_eq!(bridge.load_loco_config(), Ok(1));
    assert_eq!(bridge.locos().find(3).unwrap().mode, DecoderMode::Dcc);
}

// ============================================================================
// Address and speed boundaries
// ============================================================================

#[test]
fn highest_address_stays_in_dcc128_band() {
    let mut bridge = small();
    bridge.clients_mut().queue(drive(u16::MAX, StepConfig::Step14, 0x80));
    bridge.cyclic(10);

    let loco = bridge.locos().find(u16::MAX).unwrap();
    assert_eq!(loco.bus_address, 0xC000 + u32::from(u16::MAX - 6000));
    assert_eq!(loco.mode, DecoderMode::Dcc);
}

#[test]
fn band_start_addresses_are_exclusive() {
    let mut bridge = small();
    bridge.clients_mut().queue(ClientRequest::GetLocoState { address: 2000 });
    bridge.clients_mut().queue(ClientRequest::GetLocoState { address: 2001 });
    bridge.cyclic(10);

    let managed = bridge.locos().find(2000).unwrap();
    assert_eq!(managed.mode, DecoderMode::Motorola);
    assert_eq!(managed.bus_address, 2000);
    let dcc14 = bridge.locos().find(2001).unwrap();
    assert_eq!(dcc14.mode, DecoderMode::Dcc);
    assert_eq!(dcc14.data.steps, StepConfig::Step14);
    assert_eq!(dcc14.bus_address, 0xC001);
}

#[test]
fn full_speed_28_steps() {
    let mut bridge = small();
    bridge.clients_mut().queue(drive(3, StepConfig::Step28, 0x80 | 0x1F));
    bridge.cyclic(10);
    assert_eq!(last_bus_speed(bridge.bus()), Some(1000));

    bridge.bus_mut().queue(BusEvent::LocoSpeed { id: 3, speed: 1000 });
    bridge.cyclic(20);
    let Some(StationMessage::LocoInfo(info)) = bridge.clients().last() else {
        panic!("expected loco info");
    };
    assert_eq!(info.speed_code(), 0x1F);
}

#[test]
fn first_28_step_code() {
    let mut bridge = small();
    bridge.clients_mut().queue(drive(3, StepConfig::Step28, 0x80 | 0x02));
    bridge.cyclic(10);
    assert_eq!(last_bus_speed(bridge.bus()), Some(35));
}

#[test]
fn full_speed_128_steps() {
    let mut bridge = small();
    bridge.clients_mut().queue(drive(3, StepConfig::Step128, 0x80 | 0x7F));
    bridge.cyclic(10);
    assert_eq!(last_bus_speed(bridge.bus()), Some((1000u32 * 126 / 128) as u16));
}

#[test]
fn bus_speed_above_full_scale_reports_full_speed() {
    let mut bridge = small();
    bridge.clients_mut().queue(drive(3, StepConfig::Step128, 0x80));
    bridge.cyclic(10);

    bridge.bus_mut().queue(BusEvent::LocoSpeed { id: 3, speed: 1016 });
    bridge.cyclic(20);
    let Some(StationMessage::LocoInfo(info)) = bridge.clients().last() else {
        panic!("expected loco info");
    };
    assert_eq!(info.speed_code(), 0x7F);
}

#[test]
fn zero_interval_never_throttles() {
    let config = BridgeConfig::default()
        .with_station(StationConfig::default().with_min_speed_interval_ms(0));
    let mut bridge: SmallBridge =
        BridgeController::new(config, MockBus::new(), MockStation::new(), MockStore::new());
    for t in 1..=3 {
        bridge.clients_mut().queue(drive(3, StepConfig::Step128, 0x85));
        bridge.cyclic(t);
    }
    let speeds = bridge
        .bus()
        .sent
        .iter()
        .filter(|c| matches!(c, BusCommand::LocoSpeed { .. }))
        .count();
    assert_eq!(speeds, 3);
}

#[test]
fn step_change_is_persisted() {
    let mut bridge = small();
    bridge.clients_mut().queue(drive(3, StepConfig::Step128, 0x80));
    bridge.cyclic(10);
    bridge.clients_mut().queue(drive(3, StepConfig::Step14, 0x80));
    bridge.cyclic(500);
    assert_eq!(bridge.store().get_raw("z21", "locomode"), Some(&[3, 0, 1, 0][..]));
}

// ============================================================================
// Transport faults
// ============================================================================

#[test]
fn data_frame_without_header_is_ignored() {
    let mut bridge = small();
    let roster = RosterRecorder::new();
    bridge.fetch_roster(roster.clone(), 0);

    bridge.bus_mut().queue(BusEvent::ConfigStreamData { data: *b"lokliste" });
    bridge.cyclic(10);

    assert_eq!(bridge.session().phase(), SessionPhase::AwaitingLocoList);
    assert!(roster.results().is_empty());
}

#[test]
fn new_header_discards_partial_stream() {
    let mut bridge = small();
    let roster = RosterRecorder::new();
    bridge.fetch_roster(roster.clone(), 0);

    bridge.bus_mut().queue(BusEvent::ConfigStreamHeader { length: 64, crc: 0 });
    bridge.bus_mut().queue(BusEvent::ConfigStreamData { data: [b'x'; 8] });
    bridge.bus_mut().queue_config_stream("[lokliste]\n");
    bridge.cyclic(10);

    assert_eq!(roster.results(), [false]);
}

#[test]
fn failing_bus_does_not_stop_session_timers() {
    let mut bridge = small();
    bridge.bus_mut().fail_sends = true;
    let roster = RosterRecorder::new();
    assert!(bridge.fetch_roster(roster.clone(), 0));

    for tick in 1..=8 {
        bridge.cyclic(tick * 1001);
    }
    assert_eq!(roster.results(), [false]);
    assert!(bridge.bus().sent.is_empty());
}

#[test]
fn client_replies_continue_when_bus_fails() {
    let mut bridge = small();
    bridge.bus_mut().fail_sends = true;
    bridge.clients_mut().queue(ClientRequest::SetPower(rs_trainbridge::PowerState::Normal));
    bridge.cyclic(10);
    assert_eq!(
        bridge.clients().last(),
        Some(&StationMessage::TrackPower(rs_trainbridge::PowerState::Normal))
    );
}

#[test]
fn unavailable_store_does_not_block_driving() {
    let mut bridge = small();
    bridge.store_mut().fail_open = true;
    bridge.clients_mut().queue(drive(3, StepConfig::Step128, 0x85));
    bridge.cyclic(10);

    assert_eq!(bridge.locos().len(), 1);
    assert_eq!(last_bus_speed(bridge.bus()), Some(4 * 1000 / 128));
}
