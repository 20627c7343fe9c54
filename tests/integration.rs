//! Integration tests for the ARP responder.
//!
//! These tests drive the frame loop end to end through an in-memory device.

use std::collections::VecDeque;
use std::io;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use pnet::util::MacAddr;

use taplink::error::ProtocolError;
use taplink::interface::{Activity, FrameLoop, Interface, InterfaceConfig};
use taplink::network::{ArpResponder, Buffer, Device, Injector, Packet, ResponderConfig};

const LOCAL_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 100, 1);
const LOCAL_MAC: MacAddr = MacAddr(0x02, 0x4d, 0x48, 0x4d, 0x00, 0x01);
const PEER_MAC: [u8; 6] = [0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee];
const PEER_IP: [u8; 4] = [192, 168, 100, 42];

/// In-memory device shared between the test and the worker.
#[derive(Clone, Default)]
struct TestDevice {
    inbound: Arc<Mutex<VecDeque<Vec<u8>>>>,
    written: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl TestDevice {
    fn with_frames(frames: impl IntoIterator<Item = Vec<u8>>) -> Self {
        let device = Self::default();
        device.inbound.lock().unwrap().extend(frames);
        device
    }

    fn written(&self) -> Vec<Vec<u8>> {
        self.written.lock().unwrap().clone()
    }
}

impl Device for TestDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(frame) = self.inbound.lock().unwrap().pop_front() else {
            return Ok(0);
        };
        buf[..frame.len()].copy_from_slice(&frame);
        Ok(frame.len())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.lock().unwrap().push(buf.to_vec());
        Ok(buf.len())
    }
}

fn responder_config(cooldown: Duration) -> ResponderConfig {
    ResponderConfig {
        local_ip: LOCAL_IP,
        local_mac: LOCAL_MAC,
        rebroadcast_cooldown: cooldown,
    }
}

/// Broadcast who-has request from the peer, built byte by byte.
fn who_has(target: [u8; 4]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(42);
    frame.extend_from_slice(&[0xff; 6]);
    frame.extend_from_slice(&PEER_MAC);
    frame.extend_from_slice(&[0x08, 0x06]);
    frame.extend_from_slice(&[0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01]);
    frame.extend_from_slice(&PEER_MAC);
    frame.extend_from_slice(&PEER_IP);
    frame.extend_from_slice(&[0x00; 6]);
    frame.extend_from_slice(&target);
    frame
}

fn frame_loop(device: TestDevice, cooldown: Duration) -> FrameLoop<TestDevice> {
    FrameLoop::new(device, ArpResponder::new(responder_config(cooldown)), None)
}

#[test]
fn test_reply_matches_expected_bytes() {
    let device = TestDevice::with_frames([who_has(LOCAL_IP.octets())]);
    let mut frame_loop = frame_loop(device.clone(), Duration::from_secs(1));

    assert_eq!(frame_loop.poll_once(Instant::now()), Activity::Handled);

    let local_mac = [0x02, 0x4d, 0x48, 0x4d, 0x00, 0x01];
    let mut expected = Vec::new();
    expected.extend_from_slice(&PEER_MAC);
    expected.extend_from_slice(&local_mac);
    expected.extend_from_slice(&[0x08, 0x06]);
    expected.extend_from_slice(&[0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x02]);
    expected.extend_from_slice(&local_mac);
    expected.extend_from_slice(&LOCAL_IP.octets());
    expected.extend_from_slice(&PEER_MAC);
    expected.extend_from_slice(&PEER_IP);

    assert_eq!(device.written(), vec![expected]);
}

#[test]
fn test_reply_to_padded_request() {
    let mut request = who_has(LOCAL_IP.octets());
    request.resize(60, 0);
    let device = TestDevice::with_frames([request]);
    let mut frame_loop = frame_loop(device.clone(), Duration::from_secs(1));

    frame_loop.poll_once(Instant::now());

    let written = device.written();
    assert_eq!(written.len(), 1);
    assert_eq!(&written[0][..6], &PEER_MAC);
    assert_eq!(written[0][21], 0x02);
}

#[test]
fn test_foreign_broadcast_is_rate_limited() {
    let request = who_has([192, 168, 100, 77]);
    let device = TestDevice::with_frames([request.clone(), request.clone(), request.clone()]);
    let mut frame_loop = frame_loop(device.clone(), Duration::from_millis(100));
    let start = Instant::now();

    frame_loop.poll_once(start);
    frame_loop.poll_once(start + Duration::from_millis(50));
    frame_loop.poll_once(start + Duration::from_millis(151));

    assert_eq!(device.written(), vec![request.clone(), request]);
    let report = frame_loop.report();
    assert_eq!(report.total.rebroadcasts, 2);
    assert_eq!(report.total.suppressed, 1);
}

#[test]
fn test_wide_hardware_broadcast_is_rebroadcast() {
    let mut request = Vec::with_capacity(46);
    request.extend_from_slice(&[0xff; 6]);
    request.extend_from_slice(&PEER_MAC);
    request.extend_from_slice(&[0x08, 0x06]);
    request.extend_from_slice(&[0x00, 0x06, 0x08, 0x00, 0x08, 0x04, 0x00, 0x01]);
    request.extend_from_slice(&[0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x00, 0x01]);
    request.extend_from_slice(&PEER_IP);
    request.extend_from_slice(&[0x00; 8]);
    request.extend_from_slice(&LOCAL_IP.octets());

    let device = TestDevice::with_frames([request.clone(), request.clone()]);
    let mut frame_loop = frame_loop(device.clone(), Duration::from_secs(1));
    let now = Instant::now();

    frame_loop.poll_once(now);
    frame_loop.poll_once(now + Duration::from_millis(10));

    assert_eq!(device.written(), vec![request]);
    let report = frame_loop.report();
    assert_eq!(report.total.dropped, 0);
    assert_eq!(report.total.replies, 0);
    assert_eq!(report.total.rebroadcasts, 1);
    assert_eq!(report.total.suppressed, 1);
}

#[test]
fn test_ipv4_traffic_is_not_echoed() {
    let mut frame = vec![0u8; 14 + 20];
    frame[..6].copy_from_slice(&[0x02, 0x4d, 0x48, 0x4d, 0x00, 0x01]);
    frame[6..12].copy_from_slice(&PEER_MAC);
    frame[12..14].copy_from_slice(&[0x08, 0x00]);
    frame[14] = 0x45;
    frame[16..18].copy_from_slice(&20u16.to_be_bytes());
    frame[22] = 64;
    frame[23] = 17;
    frame[26..30].copy_from_slice(&PEER_IP);
    frame[30..34].copy_from_slice(&LOCAL_IP.octets());

    let device = TestDevice::with_frames([frame]);
    let mut frame_loop = frame_loop(device.clone(), Duration::from_secs(1));

    assert_eq!(frame_loop.poll_once(Instant::now()), Activity::Handled);
    assert!(device.written().is_empty());
    assert_eq!(frame_loop.report().total.ignored, 1);
}

#[test]
fn test_ipv6_payload_mismatch_is_rejected() {
    let mut frame = vec![0u8; 14 + 40 + 4];
    frame[..6].copy_from_slice(&[0x33, 0x33, 0x00, 0x00, 0x00, 0x01]);
    frame[6..12].copy_from_slice(&PEER_MAC);
    frame[12..14].copy_from_slice(&[0x86, 0xdd]);
    frame[14] = 0x60;
    frame[18..20].copy_from_slice(&8u16.to_be_bytes());
    frame[20] = 58;
    frame[21] = 255;

    let err = Packet::parse(7, Buffer::from_slice(&frame)).unwrap_err();
    assert_eq!(err.index, 7);
    assert_eq!(
        err.source,
        ProtocolError::PayloadLengthMismatch {
            declared: 8,
            actual: 4
        }
    );

    let device = TestDevice::with_frames([frame]);
    let mut frame_loop = frame_loop(device.clone(), Duration::from_secs(1));
    frame_loop.poll_once(Instant::now());
    assert_eq!(frame_loop.report().total.dropped, 1);
    assert!(device.written().is_empty());
}

#[test]
fn test_injected_frame_reaches_device() {
    let (tx, injector) = Injector::channel(8);
    let device = TestDevice::default();
    let mut frame_loop = FrameLoop::new(
        device.clone(),
        ArpResponder::new(responder_config(Duration::from_secs(1))),
        Some(injector),
    );

    let request = who_has(LOCAL_IP.octets());
    let line: String = request.iter().map(|byte| format!("{byte:02X}")).collect();
    tx.try_send(line).unwrap();
    tx.try_send("0g".to_owned()).unwrap();

    assert_eq!(frame_loop.poll_once(Instant::now()), Activity::Idle);
    assert_eq!(frame_loop.drain_injector(), 1);
    assert_eq!(device.written(), vec![request]);
}

#[test]
fn test_worker_answers_and_stops() {
    let device = TestDevice::with_frames([who_has(LOCAL_IP.octets())]);
    let config = InterfaceConfig {
        responder: responder_config(Duration::from_secs(1)),
        idle_backoff: Duration::from_millis(1),
    };
    let mut interface = Interface::start(config, device.clone(), None).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while device.written().is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    interface.stop();

    assert!(!interface.is_running());
    let report = interface.report();
    assert_eq!(report.total.received.packets, 1);
    assert_eq!(report.total.replies, 1);
}
