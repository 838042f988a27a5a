mod common;

use common::{data_path, default_builder, default_config, CLIENT_ID, SERVER_ID};
use pretty_assertions::assert_eq;
use quic_loopback::alert::AlertDescription;
use quic_loopback::pump::TRANSFER_BUFFER_SIZE;
use quic_loopback::{
    drive_handshake, pump_round, Connection, DebugSink, Error, HandshakePump, Progress, PumpError,
    Role,
};
use std::sync::{Arc, Mutex};

fn pair(config: &quic_loopback::Config) -> (Connection, Connection) {
    let client = Connection::connect(None, &CLIENT_ID, config).unwrap();
    let server = Connection::accept(&SERVER_ID, None, config).unwrap();
    (client, server)
}

#[test]
fn test_default_handshake_completes() {
    let config = default_config();
    let (mut client, mut server) = pair(&config);

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    let summary = drive_handshake(&mut client, &mut server, &mut buf).unwrap();

    assert!(client.is_established());
    assert!(server.is_established());
    assert!(summary.rounds <= 10, "took {} rounds", summary.rounds);
    assert!(!client.is_closed());
    assert!(!server.is_closed());
}

#[test]
fn test_first_flight_is_not_empty() {
    let config = default_config();
    let mut client = Connection::connect(None, &CLIENT_ID, &config).unwrap();

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    assert_eq!(client.emit(&mut buf).unwrap(), Progress::Progressed(1200));
}

#[test]
fn test_application_protocol_negotiated() {
    let config = default_config();
    let (mut client, mut server) = pair(&config);

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    drive_handshake(&mut client, &mut server, &mut buf).unwrap();

    assert_eq!(client.application_proto(), Some(&b"proto1"[..]));
    assert_eq!(client.application_proto(), server.application_proto());
    assert_eq!(client.negotiated_cipher_suite(), server.negotiated_cipher_suite());
}

#[test]
fn test_rounds_hand_over_every_byte() {
    let config = default_config();
    let (mut client, mut server) = pair(&config);

    let mut reports = Vec::new();
    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    HandshakePump::new()
        .observe(|report| reports.push(*report))
        .run(&mut client, &mut server, &mut buf)
        .unwrap();

    for window in reports.windows(2) {
        assert_eq!(window[1].consumed, window[0].produced);
        assert_ne!(window[0].role, window[1].role);
    }
    assert_eq!(reports.first().map(|r| r.role), Some(Role::Initiator));
    assert_eq!(reports.last().map(|r| r.role), Some(Role::Responder));
}

#[test]
fn test_idle_emit_is_repeatable() {
    let config = default_config();
    let (mut client, mut server) = pair(&config);

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    drive_handshake(&mut client, &mut server, &mut buf).unwrap();

    let stats = client.stats();
    for _ in 0..3 {
        assert_eq!(client.emit(&mut buf).unwrap(), Progress::NoProgress);
        assert!(client.is_established());
    }
    assert_eq!(client.stats(), stats);
}

#[test]
fn test_responder_learns_initiator_id() {
    let config = default_config();
    let mut client = Connection::connect(None, &CLIENT_ID, &config).unwrap();
    let mut server = Connection::accept(&SERVER_ID, Some(&[]), &config).unwrap();
    assert_eq!(server.peer_connection_id(), None);

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    let len = client.emit(&mut buf).unwrap().bytes();
    assert_eq!(server.ingest(&buf[..len]).unwrap(), Progress::Progressed(len));
    assert_eq!(server.peer_connection_id(), Some(&CLIENT_ID[..]));

    // Finish the handshake by hand from here
    let mut len = quic_loopback::pump_round(&mut server, &mut buf, 0).unwrap();
    len = quic_loopback::pump_round(&mut client, &mut buf, len).unwrap();
    quic_loopback::pump_round(&mut server, &mut buf, len).unwrap();

    assert!(client.is_established());
    assert!(server.is_established());
    assert_eq!(client.peer_connection_id(), Some(&SERVER_ID[..]));
}

#[test]
fn test_wrong_original_destination_id() {
    let config = default_config();
    let mut client = Connection::connect(None, &CLIENT_ID, &config).unwrap();
    let mut server = Connection::accept(&SERVER_ID, Some(&[9; 8]), &config).unwrap();

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    let err = drive_handshake(&mut client, &mut server, &mut buf).unwrap_err();

    assert!(matches!(
        err,
        PumpError::Round {
            role: Role::Initiator,
            source: Error::InvalidTransportParam(_),
        }
    ));
    assert!(client.is_closed());
}

#[test]
fn test_transport_params_exchanged() {
    let config = default_builder().set_initial_max_data(4096).build().unwrap();
    let (mut client, mut server) = pair(&config);

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    drive_handshake(&mut client, &mut server, &mut buf).unwrap();

    let from_server = client.peer_transport_params().unwrap();
    assert_eq!(from_server.initial_max_data, 4096);
    assert_eq!(from_server.initial_max_streams_bidi, 3);
    assert_eq!(from_server.initial_source_connection_id.as_deref(), Some(&SERVER_ID[..]));
    assert!(from_server.original_destination_connection_id.is_some());

    let from_client = server.peer_transport_params().unwrap();
    assert_eq!(from_client.initial_max_stream_data_uni, 10);
    assert_eq!(from_client.initial_source_connection_id.as_deref(), Some(&CLIENT_ID[..]));
    assert_eq!(from_client.original_destination_connection_id, None);
}

#[test]
fn test_mismatched_private_key_fails() {
    let config = default_builder()
        .load_priv_key_from_pem_file(data_path("other.key"))
        .build()
        .unwrap();
    let (mut client, mut server) = pair(&config);

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    let err = drive_handshake(&mut client, &mut server, &mut buf).unwrap_err();

    assert!(matches!(
        err,
        PumpError::Round {
            role: Role::Initiator,
            source: Error::HandshakeFailure {
                alert: AlertDescription::DecryptError,
                ..
            },
        }
    ));
    assert!(client.is_closed());
    assert!(!server.is_established());
}

#[test]
fn test_verify_peer_accepts_matching_name() {
    let config = default_builder()
        .verify_peer(true)
        .load_trust_anchors_from_pem_file(data_path("cert.crt"))
        .build()
        .unwrap();
    let mut client = Connection::connect(Some("quic.tech"), &CLIENT_ID, &config).unwrap();
    let mut server = Connection::accept(&SERVER_ID, None, &config).unwrap();

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    drive_handshake(&mut client, &mut server, &mut buf).unwrap();
    assert!(client.is_established());
}

#[test]
fn test_verify_peer_rejects_other_name() {
    let config = default_builder().verify_peer(true).build().unwrap();
    let mut client = Connection::connect(Some("example.org"), &CLIENT_ID, &config).unwrap();
    let mut server = Connection::accept(&SERVER_ID, None, &config).unwrap();

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    let err = drive_handshake(&mut client, &mut server, &mut buf).unwrap_err();

    assert!(matches!(
        err,
        PumpError::Round {
            role: Role::Initiator,
            source: Error::HandshakeFailure { .. },
        }
    ));
}

#[test]
fn test_verify_peer_rejects_untrusted_issuer() {
    let config = default_builder()
        .verify_peer(true)
        .load_trust_anchors_from_pem_file(data_path("other.crt"))
        .build()
        .unwrap();
    let mut client = Connection::connect(Some("quic.tech"), &CLIENT_ID, &config).unwrap();
    let mut server = Connection::accept(&SERVER_ID, None, &config).unwrap();

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    let err = drive_handshake(&mut client, &mut server, &mut buf).unwrap_err();

    assert!(matches!(
        err.endpoint_error(),
        Some(Error::HandshakeFailure {
            alert: AlertDescription::UnknownCa,
            ..
        })
    ));
}

#[test]
fn test_verify_peer_without_anchors_fails() {
    let config = default_builder().verify_peer(true).build().unwrap();
    let mut client = Connection::connect(Some("quic.tech"), &CLIENT_ID, &config).unwrap();
    let mut server = Connection::accept(&SERVER_ID, None, &config).unwrap();

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    let err = drive_handshake(&mut client, &mut server, &mut buf).unwrap_err();

    assert!(matches!(
        err.endpoint_error(),
        Some(Error::HandshakeFailure {
            alert: AlertDescription::UnknownCa,
            ..
        })
    ));
    assert!(!client.is_established());
}

#[test]
fn test_no_common_application_protocol() {
    let server_config = default_config();
    let client_config = default_builder().set_application_protos(b"\x05other").build().unwrap();
    let mut client = Connection::connect(None, &CLIENT_ID, &client_config).unwrap();
    let mut server = Connection::accept(&SERVER_ID, None, &server_config).unwrap();

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    let err = drive_handshake(&mut client, &mut server, &mut buf).unwrap_err();

    assert!(matches!(
        err,
        PumpError::Round {
            role: Role::Responder,
            source: Error::HandshakeFailure {
                alert: AlertDescription::NoApplicationProtocol,
                ..
            },
        }
    ));
    assert!(server.is_closed());
}

#[test]
fn test_stats_match_summary() {
    let config = default_config();
    let (mut client, mut server) = pair(&config);

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    let summary = drive_handshake(&mut client, &mut server, &mut buf).unwrap();

    let client_stats = client.stats();
    let server_stats = server.stats();

    // Initial + Handshake from the client; Initial, Handshake and 1-RTT back
    assert_eq!(client_stats.sent, 2);
    assert_eq!(server_stats.recv, 2);
    assert_eq!(server_stats.sent, 3);
    assert_eq!(client_stats.recv, 2);
    assert_eq!(client_stats.sent_bytes, summary.initiator_bytes as u64);
    assert_eq!(server_stats.sent_bytes, summary.responder_bytes as u64);
    assert!(client_stats.to_string().starts_with("recv=2 sent=2"));
}

#[test]
fn test_application_close_reaches_peer() {
    let config = default_config();
    let (mut client, mut server) = pair(&config);

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    drive_handshake(&mut client, &mut server, &mut buf).unwrap();

    client.close(true, 7, b"done").unwrap();
    assert!(matches!(client.close(true, 7, b"again"), Err(Error::InvalidState(_))));

    let len = client.emit(&mut buf).unwrap().bytes();
    assert!(len > 0);
    assert!(client.is_closed());
    assert_eq!(client.emit(&mut buf).unwrap(), Progress::NoProgress);
    assert!(matches!(client.emit(&mut buf), Err(Error::InvalidState(_))));

    match server.ingest(&buf[..len]) {
        Err(Error::PeerClosed { code, reason }) => {
            assert_eq!(code, 7);
            assert_eq!(reason, "done");
        }
        other => panic!("expected PeerClosed, got {:?}", other),
    }
    assert!(server.is_closed());
    assert_eq!(server.ingest(&buf[..len]).unwrap(), Progress::NoProgress);
}

#[test]
fn test_responder_close_after_handshake_done() {
    let config = default_config();
    let (mut client, mut server) = pair(&config);

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    drive_handshake(&mut client, &mut server, &mut buf).unwrap();

    // The trailing round ended with a 1-RTT HANDSHAKE_DONE
    server.close(true, 7, b"bye").unwrap();
    let len = pump_round(&mut server, &mut buf, 0).unwrap();
    assert!(len > 0);
    assert!(server.is_closed());

    match pump_round(&mut client, &mut buf, len) {
        Err(Error::PeerClosed { code, reason }) => {
            assert_eq!(code, 7);
            assert_eq!(reason, "bye");
        }
        other => panic!("expected PeerClosed, got {:?}", other),
    }
    assert!(client.is_closed());
}

#[test]
fn test_duplicate_packet_is_dropped() {
    let config = default_config();
    let (mut client, mut server) = pair(&config);

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    let len = client.emit(&mut buf).unwrap().bytes();
    let first_flight = buf[..len].to_vec();

    server.ingest(&first_flight).unwrap();
    assert_eq!(server.ingest(&first_flight).unwrap(), Progress::Progressed(len));
    assert_eq!(server.stats().recv, 1);
    assert!(!server.is_closed());
}

#[test]
fn test_tampered_packet_is_fatal() {
    let config = default_config();
    let (mut client, mut server) = pair(&config);

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    let len = client.emit(&mut buf).unwrap().bytes();
    buf[len / 2] ^= 0xFF;

    assert!(matches!(server.ingest(&buf[..len]), Err(Error::CryptoError(_))));
    assert!(server.is_closed());
}

#[test]
fn test_round_ceiling() {
    let config = default_config();
    let (mut client, mut server) = pair(&config);

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    let result = HandshakePump::new()
        .max_rounds(0)
        .run(&mut client, &mut server, &mut buf);

    assert!(matches!(result, Err(PumpError::RoundLimitExceeded(0))));
}

#[test]
fn test_debug_sink_receives_prefixed_lines() {
    let lines = Arc::new(Mutex::new(Vec::<String>::new()));
    let captured = Arc::clone(&lines);
    let sink: Arc<dyn DebugSink> = Arc::new(move |line: &str| {
        captured.lock().unwrap().push(line.to_string());
    });

    let config = default_builder().enable_debug_logging(sink).build().unwrap();
    let (mut client, mut server) = pair(&config);

    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    drive_handshake(&mut client, &mut server, &mut buf).unwrap();

    let lines = lines.lock().unwrap();
    assert!(lines.iter().any(|l| l.starts_with("client 01000000 ")));
    assert!(lines.iter().any(|l| l.starts_with("server 02000000 ")));
    assert!(lines.iter().any(|l| l.contains("handshake completed")));
}

#[test]
fn test_harness_binary_succeeds() {
    let output = std::process::Command::new(env!("CARGO_BIN_EXE_quic-loopback"))
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("client sent 1200 bytes"));
    assert!(stdout.trim_end().ends_with("connected"));
}

#[test]
fn test_harness_binary_reports_phase() {
    let output = std::process::Command::new(env!("CARGO_BIN_EXE_quic-loopback"))
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .args(["--cert", "tests/data/missing.crt"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("config build"));
}
