mod support;

use std::time::Duration;

use plantnode_mcu::{ConnectionState, Credentials, Flow, Method, Node, NodeConfig, Request};
use plantnode_proto::TelemetryPayload;
use support::{Rig, TestBoard, AP_SSID, API, IDENTITY};

fn save_credentials(body: &str) -> Request {
    Request::new(Method::Post, "/saveCredentials").with_body(body)
}

#[test]
fn empty_flash_boots_into_access_point() {
    let rig = Rig::new();
    let mut node = rig.node();

    assert_eq!(node.boot(), Flow::Continue);
    assert_eq!(node.state(), ConnectionState::AccessPointMode);

    let world = rig.world.borrow();
    assert_eq!(world.ap.as_deref(), Some(AP_SSID));
    assert!(world.listening);
    assert!(world.joins.is_empty());
    drop(world);
    assert!(node.supervisor().has_control_path());
}

#[test]
fn operator_provisions_over_access_point() {
    let rig = Rig::new().with_network("net", "pw");
    let mut node = rig.node();
    node.boot();

    rig.send(save_credentials("ssid=net&password=pw"));
    assert_eq!(node.step(), Flow::Continue);

    let response = rig.last_response();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "ok");
    assert_eq!(rig.store().load(), Credentials::new("net", "pw").unwrap());

    assert_eq!(node.state(), ConnectionState::Registered);
    let world = rig.world.borrow();
    assert_eq!(world.joins, vec!["net"]);
    assert_eq!(world.ap, None);
    assert!(!world.listening);
    assert!(world.session);
    assert_eq!(
        world.registration_urls,
        vec![format!("{API}/sensors/am_i_registered/{IDENTITY}")]
    );
}

#[test]
fn failed_operator_attempt_keeps_access_point_up() {
    let rig = Rig::new();
    let mut node = rig.node();
    node.boot();

    rig.send(save_credentials("ssid=elsewhere&password=pw"));
    node.step();

    assert_eq!(rig.last_response().status, 200);
    assert_eq!(node.state(), ConnectionState::AccessPointMode);
    let world = rig.world.borrow();
    assert_eq!(world.ap.as_deref(), Some(AP_SSID));
    assert_eq!(world.ap_starts, 1);
    assert!(world.listening);
    // three polls, one second apart
    assert_eq!(world.sleeps, vec![Duration::from_secs(1); 2]);
    drop(world);
    assert!(node.supervisor().has_control_path());
}

#[test]
fn bad_submission_changes_nothing() {
    let rig = Rig::new().with_network("net", "pw");
    let mut node = rig.node();
    node.boot();

    rig.send(save_credentials("ssid=net"));
    node.step();

    let response = rig.last_response();
    assert_eq!(response.status, 400);
    assert_eq!(response.body, "Missing SSID or password.");
    assert!(!rig.store().load().is_provisioned());
    assert!(rig.world.borrow().joins.is_empty());
    assert_eq!(node.state(), ConnectionState::AccessPointMode);
}

#[test]
fn access_point_answers_scan_and_identity() {
    let rig = Rig::new();
    let mut node = rig.node();
    node.boot();

    rig.send(Request::new(Method::Get, "/ssid"));
    node.step();
    let response = rig.last_response();
    assert_eq!(
        response.body,
        r#"[{"ssid":"garden","encryption":4},{"ssid":"cafe","encryption":7}]"#
    );
    assert_eq!(response.header("Access-Control-Allow-Origin"), Some("*"));

    rig.send(Request::new(Method::Get, "/mac"));
    node.step();
    assert_eq!(rig.last_response().body, IDENTITY);

    rig.send(Request::new(Method::Get, "/connect"));
    node.step();
    assert_eq!(rig.last_response().status, 409);
}

#[test]
fn connect_request_retries_stored_credentials() {
    // stored credentials that did not work at boot
    let rig = Rig::new().with_stored("net", "pw");
    let mut node = rig.node();
    node.boot();
    assert_eq!(node.state(), ConnectionState::AccessPointMode);

    // the network comes back, operator asks for another try
    rig.world
        .borrow_mut()
        .networks
        .push(("net".into(), "pw".into()));
    rig.send(Request::new(Method::Get, "/connect"));
    node.step();

    assert_eq!(rig.last_response().status, 200);
    assert_eq!(node.state(), ConnectionState::Registered);
    assert_eq!(rig.world.borrow().joins, vec!["net", "net"]);
}

#[test]
fn stored_credentials_go_straight_to_telemetry() {
    let rig = Rig::new().with_network("net", "pw").with_stored("net", "pw");
    let mut node = rig.node();

    assert_eq!(node.boot(), Flow::Continue);
    assert_eq!(node.state(), ConnectionState::Registered);
    assert_eq!(rig.world.borrow().ap_starts, 0);

    node.step();
    let world = rig.world.borrow();
    let (topic, payload) = &world.published[0];
    assert_eq!(topic, &format!("/sensors/{IDENTITY}"));
    assert_eq!(
        std::str::from_utf8(payload).unwrap(),
        r#"{"temp":21.5,"humidity":41.0,"soil":612.0,"light":153.5}"#
    );
    assert_eq!(world.sleeps.last(), Some(&Duration::from_secs(5)));
}

#[test]
fn unregistered_device_wipes_and_restarts() {
    let rig = Rig::new().with_network("net", "pw").with_stored("net", "pw");
    rig.world.borrow_mut().registration = Ok(204);

    let mut node = rig.node();
    assert_eq!(node.boot(), Flow::Restart);
    assert_eq!(node.state(), ConnectionState::Unregistered);
    assert_eq!(node.step(), Flow::Restart);
    assert_eq!(rig.world.borrow().region, [0u8; 96]);
    assert!(rig.world.borrow().published.is_empty());

    // next boot finds nothing and asks for credentials
    let mut next = rig.node();
    next.boot();
    assert_eq!(next.state(), ConnectionState::AccessPointMode);
}

#[test]
fn unclear_registration_keeps_credentials() {
    for answer in [Ok(500), Ok(404), Err("timed out".to_string())] {
        let rig = Rig::new().with_network("net", "pw").with_stored("net", "pw");
        rig.world.borrow_mut().registration = answer.clone();

        let mut node = rig.node();
        assert_eq!(node.boot(), Flow::Continue, "{answer:?}");
        assert_eq!(node.state(), ConnectionState::Registered);
        assert!(rig.store().load().is_provisioned());
    }
}

#[test]
fn failed_temperature_read_still_publishes() {
    let rig = Rig::new().with_network("net", "pw").with_stored("net", "pw");
    rig.world.borrow_mut().temperature = None;

    let mut node = rig.node();
    node.boot();
    node.step();

    let world = rig.world.borrow();
    let payload = TelemetryPayload::from_bytes(&world.published[0].1).unwrap();
    assert_eq!(payload.temp, None);
    assert_eq!(payload.humidity, Some(41.0));
    assert_eq!(payload.soil, 612.0);
    assert_eq!(payload.light, 153.5);
}

#[test]
fn session_drop_suppresses_publish_and_reconnects() {
    let rig = Rig::new().with_network("net", "pw").with_stored("net", "pw");
    let mut node = rig.node();
    node.boot();
    node.step();
    assert_eq!(rig.world.borrow().published.len(), 1);

    rig.world.borrow_mut().session = false;
    node.step();
    {
        let world = rig.world.borrow();
        assert_eq!(world.published.len(), 1);
        assert_eq!(world.session_connects, 2);
        assert!(world.session);
    }
    assert_eq!(node.state(), ConnectionState::Registered);

    node.step();
    assert_eq!(rig.world.borrow().published.len(), 2);
}

#[test]
fn station_loss_reconnects_without_second_registration() {
    let rig = Rig::new().with_network("net", "pw").with_stored("net", "pw");
    let mut node = rig.node();
    node.boot();

    rig.world.borrow_mut().drop_station();
    node.step();

    assert_eq!(node.state(), ConnectionState::Registered);
    let world = rig.world.borrow();
    assert_eq!(world.joins.len(), 2);
    assert_eq!(world.registration_urls.len(), 1);
    assert!(world.published.is_empty());
}

#[test]
fn station_loss_without_network_falls_back_to_access_point() {
    let rig = Rig::new().with_network("net", "pw").with_stored("net", "pw");
    let mut node = rig.node();
    node.boot();

    {
        let mut world = rig.world.borrow_mut();
        world.networks.clear();
        world.drop_station();
    }
    node.step();

    assert_eq!(node.state(), ConnectionState::AccessPointMode);
    assert!(node.supervisor().has_control_path());
    assert_eq!(rig.world.borrow().ap.as_deref(), Some(AP_SSID));
}

#[test]
fn broker_connect_is_abandoned_when_station_drops() {
    let rig = Rig::new().with_network("net", "pw").with_stored("net", "pw");
    {
        let mut world = rig.world.borrow_mut();
        world.broker_up = false;
        world.lose_network_on_sleep = true;
    }

    let mut node = rig.node();
    assert_eq!(node.boot(), Flow::Continue);

    assert_eq!(node.state(), ConnectionState::AccessPointMode);
    assert!(node.supervisor().has_control_path());
    let world = rig.world.borrow();
    assert_eq!(world.session_connects, 1);
    assert!(world.registration_urls.is_empty());
}

#[test]
fn always_has_a_control_path() {
    let rig = Rig::new().with_network("net", "pw");
    let mut node = rig.node();
    node.boot();
    assert!(node.supervisor().has_control_path());

    rig.send(Request::new(Method::Get, "/health"));
    rig.send(save_credentials("ssid=net&password=pw"));
    for _ in 0..3 {
        node.step();
        assert!(node.supervisor().has_control_path());
    }

    rig.world.borrow_mut().session = false;
    node.step();
    assert!(node.supervisor().has_control_path());

    {
        let mut world = rig.world.borrow_mut();
        world.networks.clear();
        world.drop_station();
    }
    node.step();
    assert!(node.supervisor().has_control_path());
    node.step();
    assert!(node.supervisor().has_control_path());
}

#[test]
fn invalid_config_is_rejected() {
    let rig = Rig::new();
    let mut config = NodeConfig::default();
    config.access_point.password = "short".into();
    assert!(Node::<TestBoard>::new(config, rig.peripherals()).is_err());
}
