//! Session-level RTMP scenarios that exercise the handshake, chunk
//! stream, and command negotiation together against an in-memory duplex
//! pipe, rather than any single module in isolation.

use streamkit::amf::Amf0Value;
use streamkit::format::rtmp::control::type_id as control_type;
use streamkit::format::rtmp::{
    accept_session, advance_session, Command, ControlMessage, LimitType, Role,
};
use streamkit::format::rtmp::chunk::{ChunkReader, ChunkWriter};

/// A `connect` arriving right after the handshake must be answered with
/// WindowAckSize, SetPeerBandwidth(dynamic), SetChunkSize(4096), then
/// `_result` carrying `NetConnection.Connect.Success`, strictly in that
/// order, before the server reads `createStream`.
#[tokio::test]
async fn connect_elicits_window_bandwidth_chunk_size_then_result_in_order() {
    let (client_stream, server_stream) = tokio::io::duplex(1 << 16);
    let (client_read, client_write) = tokio::io::split(client_stream);
    let (server_read, server_write) = tokio::io::split(server_stream);

    let server = tokio::spawn(async move { accept_session(server_read, server_write).await });

    let mut client_reader = ChunkReader::new(client_read);
    let mut client_writer = ChunkWriter::new(client_write);

    let connect = Command::new(
        "connect",
        1.0,
        vec![Amf0Value::Object(vec![
            ("app".into(), Amf0Value::String("live".into())),
            ("tcUrl".into(), Amf0Value::String("rtmp://example.invalid/live".into())),
        ])],
    );
    client_writer
        .write(3, 0, 20, 0, &connect.encode().unwrap())
        .await
        .unwrap();

    let window = client_reader.read_message().await.unwrap();
    assert_eq!(window.type_id, control_type::WINDOW_ACK_SIZE);
    assert_eq!(
        ControlMessage::decode(window.type_id, &window.payload).unwrap(),
        ControlMessage::WindowAckSize(2_500_000)
    );

    let bandwidth = client_reader.read_message().await.unwrap();
    assert_eq!(bandwidth.type_id, control_type::SET_PEER_BANDWIDTH);
    assert_eq!(
        ControlMessage::decode(bandwidth.type_id, &bandwidth.payload).unwrap(),
        ControlMessage::SetPeerBandwidth(2_500_000, LimitType::Dynamic)
    );

    let chunk_size = client_reader.read_message().await.unwrap();
    assert_eq!(chunk_size.type_id, control_type::SET_CHUNK_SIZE);
    assert_eq!(
        ControlMessage::decode(chunk_size.type_id, &chunk_size.payload).unwrap(),
        ControlMessage::SetChunkSize(4096)
    );
    client_reader.set_chunk_size(4096);

    let result = client_reader.read_message().await.unwrap();
    let command = Command::decode(result.type_id, &result.payload).unwrap();
    assert_eq!(command.name, "_result");
    assert_eq!(
        command.command_object_str("code"),
        Some("NetConnection.Connect.Success")
    );

    // Finish the negotiation so the server task completes cleanly.
    let create_stream = Command::new("createStream", 2.0, vec![Amf0Value::Null]);
    client_writer
        .write(3, 0, 20, 0, &create_stream.encode().unwrap())
        .await
        .unwrap();
    let create_stream_resp = client_reader.read_message().await.unwrap();
    let create_stream_resp = Command::decode(create_stream_resp.type_id, &create_stream_resp.payload).unwrap();
    let msg_stream_id = create_stream_resp.args[1].as_f64().unwrap() as u32;

    let publish = Command::new(
        "publish",
        0.0,
        vec![
            Amf0Value::Null,
            Amf0Value::String("camera1".into()),
            Amf0Value::String("live".into()),
        ],
    );
    client_writer
        .write(3, 0, 20, msg_stream_id, &publish.encode().unwrap())
        .await
        .unwrap();

    let (accepted, _reader, _writer) = server.await.unwrap().unwrap();
    assert_eq!(accepted.stream_key, "live/camera1");
    assert_eq!(accepted.role, Role::Publish);
}

/// A client driven through [`advance_session`] against a server driven
/// through [`accept_session`] agree on the same stream key for playback.
#[tokio::test]
async fn client_play_is_accepted_by_server() {
    let (client_stream, server_stream) = tokio::io::duplex(1 << 16);
    let (client_read, client_write) = tokio::io::split(client_stream);
    let (server_read, server_write) = tokio::io::split(server_stream);

    let mut client_reader = ChunkReader::new(client_read);
    let mut client_writer = ChunkWriter::new(client_write);

    let server = tokio::spawn(async move { accept_session(server_read, server_write).await });

    let client = tokio::spawn(async move {
        advance_session(
            &mut client_reader,
            &mut client_writer,
            "live",
            "rtmp://example.invalid/live",
            "camera1",
            Role::Play,
        )
        .await
    });

    let (client_res, server_res) = tokio::join!(client, server);
    client_res.unwrap().unwrap();
    let (accepted, _reader, _writer) = server_res.unwrap().unwrap();
    assert_eq!(accepted.stream_key, "live/camera1");
    assert_eq!(accepted.role, Role::Play);
}
