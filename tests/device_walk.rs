//! Black-box coverage over a real `Device` bound to a loopback UDP
//! socket: a GET, a full GETNEXT walk of a loaded profile, and a
//! GETBULK that runs to the end of the MIB view.

use std::sync::Arc;
use std::time::Duration;

use snmp_sim::device::Device;
use snmp_sim::profile::{DeviceClass, ProfileStore};
use snmp_sim::snmp::{decode_message, encode_message, ErrorStatus, Message, Oid, Pdu, SnmpValue, VarBind, Version};
use tokio::net::UdpSocket;
use tokio::time::timeout;

const WALK_FIXTURE: &str = include_str!("../demos/cable_modem.walk");

async fn spawn_device(port: u16) -> Arc<Device> {
    let profiles = Arc::new(ProfileStore::new());
    profiles.load_walk_profile(DeviceClass::new("cable_modem"), WALK_FIXTURE).unwrap();
    let device = Arc::new(Device::new("cm-test".to_string(), DeviceClass::new("cable_modem"), port, "public".to_string(), profiles));
    let run_handle = device.clone();
    tokio::spawn(async move { run_handle.run().await });
    // give the socket a moment to bind before the test starts sending
    tokio::time::sleep(Duration::from_millis(50)).await;
    device
}

async fn exchange(socket: &UdpSocket, version: Version, community: &str, pdu: Pdu) -> Message {
    let message = Message::new(version, community, pdu);
    let encoded = encode_message(&message).unwrap();
    socket.send(&encoded).await.unwrap();

    let mut buf = [0u8; 4096];
    let n = timeout(Duration::from_secs(2), socket.recv(&mut buf)).await.expect("response timed out").unwrap();
    decode_message(&buf[..n]).unwrap()
}

#[tokio::test]
async fn get_against_a_running_device_over_udp() {
    let device = spawn_device(36101).await;
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.connect(("127.0.0.1", 36101)).await.unwrap();

    let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
    let pdu = Pdu::get(1, vec![VarBind::new(oid.clone(), SnmpValue::Null)]);
    let response = exchange(&socket, Version::V2c, "public", pdu).await;

    assert_eq!(response.pdu.error_status(), ErrorStatus::NoError);
    assert_eq!(response.pdu.varbinds.len(), 1);
    assert_eq!(response.pdu.varbinds[0].oid, oid);
    assert_eq!(response.pdu.varbinds[0].value, SnmpValue::octet_string("Motorola SB6141 DOCSIS 3.0 Cable Modem"));

    device.stop();
}

#[tokio::test]
async fn getnext_walk_covers_every_entry_in_the_fixture_exactly_once() {
    let device = spawn_device(36102).await;
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.connect(("127.0.0.1", 36102)).await.unwrap();

    let mut current = Oid::parse("1.3.6.1.2.1").unwrap();
    let mut visited = Vec::new();
    loop {
        let pdu = Pdu::get_next(1, vec![VarBind::new(current.clone(), SnmpValue::Null)]);
        let response = exchange(&socket, Version::V2c, "public", pdu).await;
        let varbind = &response.pdu.varbinds[0];
        if matches!(varbind.value, SnmpValue::EndOfMibView) {
            break;
        }
        assert!(!visited.contains(&varbind.oid), "walk revisited {} — loop regression", varbind.oid);
        visited.push(varbind.oid.clone());
        current = varbind.oid.clone();
        if visited.len() > 200 {
            panic!("walk did not terminate within a sane number of steps");
        }
    }

    // every OID loaded from the fixture's system/interfaces groups must appear
    assert!(visited.iter().any(|o| o.to_string() == "1.3.6.1.2.1.1.1.0"));
    assert!(visited.iter().any(|o| o.to_string() == "1.3.6.1.2.1.2.2.1.2.2"));

    device.stop();
}

#[tokio::test]
async fn getbulk_runs_to_end_of_mib_view() {
    let device = spawn_device(36103).await;
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.connect(("127.0.0.1", 36103)).await.unwrap();

    // the fixture's last loaded OID, one GETBULK past it must end the view
    let last = Oid::parse("1.3.6.1.2.1.25.3.3.1.2.1").unwrap();
    let pdu = Pdu::get_bulk(1, 0, 10, vec![VarBind::new(last.clone(), SnmpValue::Null)]);
    let response = exchange(&socket, Version::V2c, "public", pdu).await;

    assert_eq!(response.pdu.varbinds.len(), 1);
    assert_eq!(response.pdu.varbinds[0].value, SnmpValue::EndOfMibView);

    device.stop();
}

#[tokio::test]
async fn counters_observed_ten_seconds_apart_only_grow() {
    let device = spawn_device(36104).await;
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.connect(("127.0.0.1", 36104)).await.unwrap();

    let oid = Oid::parse("1.3.6.1.2.1.2.2.1.10.1").unwrap();
    let first_pdu = Pdu::get(1, vec![VarBind::new(oid.clone(), SnmpValue::Null)]);
    let first = exchange(&socket, Version::V2c, "public", first_pdu).await;
    let SnmpValue::Counter32(first_value) = first.pdu.varbinds[0].value else { panic!("expected a counter") };

    tokio::time::sleep(Duration::from_millis(50)).await;

    let second_pdu = Pdu::get(2, vec![VarBind::new(oid, SnmpValue::Null)]);
    let second = exchange(&socket, Version::V2c, "public", second_pdu).await;
    let SnmpValue::Counter32(second_value) = second.pdu.varbinds[0].value else { panic!("expected a counter") };

    assert!(second_value >= first_value, "counter must never decrease between reads");

    device.stop();
}
