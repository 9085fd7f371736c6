//! RTMP AMF0 command messages (`connect`, `createStream`, `publish`,
//! `play`, `onStatus`, `_result`) and the server/client accept state
//! machines built on top of them.

use crate::amf::Amf0Value;
use crate::error::{Result, VdkError};

use super::chunk::{ChunkMessage, ChunkReader, ChunkWriter};
use super::control::{type_id as control_type, user_control_event, ControlMessage};

/// RTMP message type id carrying an AMF0 command.
pub const COMMAND_AMF0_TYPE_ID: u8 = 20;
/// RTMP message type id carrying an AMF3 command (treated as AMF0 after a
/// leading zero byte).
pub const COMMAND_AMF3_TYPE_ID: u8 = 17;

const CONTROL_CSID: u32 = 2;
const COMMAND_CSID: u32 = 3;

/// A decoded AMF0 command: name, transaction id, and positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Command name, e.g. `"connect"`, `"_result"`, `"onStatus"`.
    pub name: String,
    /// Transaction id echoed by the corresponding `_result`/`_error`.
    pub transaction_id: f64,
    /// Remaining AMF0 values after name and transaction id.
    pub args: Vec<Amf0Value>,
}

impl Command {
    /// Builds a command from its parts.
    pub fn new(name: impl Into<String>, transaction_id: f64, args: Vec<Amf0Value>) -> Self {
        Self {
            name: name.into(),
            transaction_id,
            args,
        }
    }

    /// Decodes a command message body (handles the AMF3-after-leading-zero
    /// convention transparently).
    pub fn decode(type_id: u8, mut body: &[u8]) -> Result<Self> {
        if type_id == COMMAND_AMF3_TYPE_ID {
            if body.is_empty() || body[0] != 0 {
                return Err(VdkError::MalformedInput(
                    "amf3 command missing leading zero byte".into(),
                ));
            }
            body = &body[1..];
        } else if type_id != COMMAND_AMF0_TYPE_ID {
            return Err(VdkError::MalformedInput(format!(
                "not a command message type id: {type_id}"
            )));
        }

        let values = Amf0Value::decode_all(body)?;
        let mut it = values.into_iter();
        let name = it
            .next()
            .and_then(|v| v.as_str().map(String::from))
            .ok_or_else(|| VdkError::MalformedInput("command missing name".into()))?;
        let transaction_id = it
            .next()
            .and_then(|v| v.as_f64())
            .ok_or_else(|| VdkError::MalformedInput("command missing transaction id".into()))?;
        let args = it.collect();

        Ok(Self {
            name,
            transaction_id,
            args,
        })
    }

    /// Encodes this command as an AMF0 command message body.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        Amf0Value::String(self.name.clone()).encode(&mut out)?;
        Amf0Value::Number(self.transaction_id).encode(&mut out)?;
        for arg in &self.args {
            arg.encode(&mut out)?;
        }
        Ok(out)
    }

    /// Looks up a string field inside the first `Object`/`EcmaArray`-typed
    /// argument (used to read `app`, `tcUrl`, `flashVer`, `streamName`).
    pub fn command_object_str(&self, key: &str) -> Option<&str> {
        self.args.first()?.get(key)?.as_str()
    }

    /// Reads the stream name out of `play`/`publish`'s first argument.
    pub fn stream_name(&self) -> Option<&str> {
        self.args.first()?.as_str()
    }
}

/// Derives the stream key used to key published/played streams: `app +
/// "/" + streamName`.
pub fn stream_key(app: &str, stream_name: &str) -> String {
    format!("{app}/{stream_name}")
}

const WINDOW_ACK_SIZE: u32 = 2_500_000;
const DEFAULT_PEER_CHUNK_SIZE: u32 = 4096;

async fn write_control<W: tokio::io::AsyncWrite + Unpin + Send>(
    writer: &mut ChunkWriter<W>,
    msg: ControlMessage,
) -> Result<()> {
    let (type_id, body) = msg.encode();
    writer.write(CONTROL_CSID, 0, type_id, 0, &body).await
}

async fn write_command<W: tokio::io::AsyncWrite + Unpin + Send>(
    writer: &mut ChunkWriter<W>,
    msg_stream_id: u32,
    command: &Command,
) -> Result<()> {
    let body = command.encode()?;
    writer
        .write(COMMAND_CSID, 0, COMMAND_AMF0_TYPE_ID, msg_stream_id, &body)
        .await
}

async fn read_command<R: tokio::io::AsyncRead + Unpin + Send>(
    reader: &mut ChunkReader<R>,
) -> Result<Command> {
    loop {
        let message: ChunkMessage = reader.read_message().await?;
        match message.type_id {
            control_type::SET_CHUNK_SIZE => {
                let ControlMessage::SetChunkSize(size) =
                    ControlMessage::decode(message.type_id, &message.payload)?
                else {
                    unreachable!()
                };
                reader.set_chunk_size(size as usize);
            }
            COMMAND_AMF0_TYPE_ID | COMMAND_AMF3_TYPE_ID => {
                return Command::decode(message.type_id, &message.payload);
            }
            _ => continue,
        }
    }
}

/// Outcome of a completed server-side accept handshake: the derived stream
/// key and whether the peer requested publish or playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Peer is publishing media in.
    Publish,
    /// Peer wants to play a stream back.
    Play,
}

/// Result of [`accept_session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedSession {
    /// `app + "/" + streamName`.
    pub stream_key: String,
    /// Whether the peer is publishing or playing.
    pub role: Role,
    /// The message stream id `createStream` assigned (always 1 here).
    pub msg_stream_id: u32,
}

/// Drives the server-side accept state machine after the RTMP handshake
/// completes: `connect` -> window/bandwidth/chunk-size announcement ->
/// `createStream` -> `publish` or `play` -> status response.
///
/// Takes a split read/write pair (e.g. `tokio::io::split(tcp_stream)`)
/// rather than a single duplex value, since the chunk reader and writer
/// run independently once negotiation is done. Returns the `ChunkReader`
/// and `ChunkWriter` alongside the negotiated session so the caller can keep
/// driving the connection (e.g. streaming media tags) once accept returns.
pub async fn accept_session<R, W>(
    reader: R,
    writer: W,
) -> Result<(AcceptedSession, ChunkReader<R>, ChunkWriter<W>)>
where
    R: tokio::io::AsyncRead + Unpin + Send,
    W: tokio::io::AsyncWrite + Unpin + Send,
{
    let mut reader = ChunkReader::new(reader);
    let mut writer = ChunkWriter::new(writer);

    let connect = read_command(&mut reader).await?;
    if connect.name != "connect" {
        return Err(VdkError::ProtocolViolation(format!(
            "expected connect, got {}",
            connect.name
        )));
    }
    let app = connect
        .command_object_str("app")
        .ok_or_else(|| VdkError::MalformedInput("connect missing app".into()))?
        .to_string();

    write_control(&mut writer, ControlMessage::WindowAckSize(WINDOW_ACK_SIZE)).await?;
    write_control(
        &mut writer,
        ControlMessage::SetPeerBandwidth(WINDOW_ACK_SIZE, super::control::LimitType::Dynamic),
    )
    .await?;
    write_control(
        &mut writer,
        ControlMessage::SetChunkSize(DEFAULT_PEER_CHUNK_SIZE),
    )
    .await?;
    writer.set_chunk_size(DEFAULT_PEER_CHUNK_SIZE as usize);

    let result = Command::new(
        "_result",
        connect.transaction_id,
        vec![
            Amf0Value::Object(vec![
                ("fmsVer".into(), Amf0Value::String("FMS/3,0,1,123".into())),
                ("capabilities".into(), Amf0Value::Number(31.0)),
            ]),
            Amf0Value::Object(vec![
                ("level".into(), Amf0Value::String("status".into())),
                (
                    "code".into(),
                    Amf0Value::String("NetConnection.Connect.Success".into()),
                ),
                (
                    "description".into(),
                    Amf0Value::String("Connection succeeded.".into()),
                ),
            ]),
        ],
    );
    write_command(&mut writer, 0, &result).await?;

    let create_stream = read_command(&mut reader).await?;
    if create_stream.name != "createStream" {
        return Err(VdkError::ProtocolViolation(format!(
            "expected createStream, got {}",
            create_stream.name
        )));
    }
    let msg_stream_id = 1u32;
    let result = Command::new(
        "_result",
        create_stream.transaction_id,
        vec![Amf0Value::Null, Amf0Value::Number(msg_stream_id as f64)],
    );
    write_command(&mut writer, 0, &result).await?;

    let publish_or_play = read_command(&mut reader).await?;
    let stream_name = publish_or_play
        .stream_name()
        .ok_or_else(|| VdkError::MalformedInput("missing stream name".into()))?
        .to_string();
    let stream_key = stream_key(&app, &stream_name);

    match publish_or_play.name.as_str() {
        "publish" => {
            let status = Command::new(
                "onStatus",
                0.0,
                vec![
                    Amf0Value::Null,
                    Amf0Value::Object(vec![
                        ("level".into(), Amf0Value::String("status".into())),
                        (
                            "code".into(),
                            Amf0Value::String("NetStream.Publish.Start".into()),
                        ),
                        (
                            "description".into(),
                            Amf0Value::String(format!("{stream_name} is now published.")),
                        ),
                    ]),
                ],
            );
            write_command(&mut writer, msg_stream_id, &status).await?;
            Ok((
                AcceptedSession {
                    stream_key,
                    role: Role::Publish,
                    msg_stream_id,
                },
                reader,
                writer,
            ))
        }
        "play" => {
            write_control(
                &mut writer,
                ControlMessage::UserControl(
                    user_control_event::STREAM_IS_RECORDED,
                    msg_stream_id.to_be_bytes().to_vec(),
                ),
            )
            .await?;
            write_control(
                &mut writer,
                ControlMessage::UserControl(
                    user_control_event::STREAM_BEGIN,
                    msg_stream_id.to_be_bytes().to_vec(),
                ),
            )
            .await?;

            for (code, description) in [
                ("NetStream.Play.Reset", "Playing and resetting stream."),
                ("NetStream.Play.Start", "Started playing stream."),
                ("NetStream.Data.Start", "Started data stream."),
                ("NetStream.Play.PublishNotify", "Now publishing."),
            ] {
                let status = Command::new(
                    "onStatus",
                    0.0,
                    vec![
                        Amf0Value::Null,
                        Amf0Value::Object(vec![
                            ("level".into(), Amf0Value::String("status".into())),
                            ("code".into(), Amf0Value::String(code.into())),
                            ("description".into(), Amf0Value::String(description.into())),
                        ]),
                    ],
                );
                write_command(&mut writer, msg_stream_id, &status).await?;
            }

            Ok((
                AcceptedSession {
                    stream_key,
                    role: Role::Play,
                    msg_stream_id,
                },
                reader,
                writer,
            ))
        }
        other => Err(VdkError::ProtocolViolation(format!(
            "expected publish or play, got {other}"
        ))),
    }
}

/// Drives the client-side advance through `connect` -> `createStream` ->
/// `publish`/`play`, returning the assigned message stream id.
pub async fn advance_session<R, W>(
    reader: &mut ChunkReader<R>,
    writer: &mut ChunkWriter<W>,
    app: &str,
    tc_url: &str,
    stream_name: &str,
    role: Role,
) -> Result<u32>
where
    R: tokio::io::AsyncRead + Unpin + Send,
    W: tokio::io::AsyncWrite + Unpin + Send,
{
    let connect = Command::new(
        "connect",
        1.0,
        vec![Amf0Value::Object(vec![
            ("app".into(), Amf0Value::String(app.into())),
            ("flashVer".into(), Amf0Value::String("FMLE/3.0".into())),
            ("tcUrl".into(), Amf0Value::String(tc_url.into())),
        ])],
    );
    write_command(writer, 0, &connect).await?;
    let connect_resp = read_command(reader).await?;
    if connect_resp.name != "_result" {
        return Err(VdkError::PeerRejected(format!(
            "connect rejected: {}",
            connect_resp.name
        )));
    }
    if connect_resp.transaction_id != connect.transaction_id {
        return Err(VdkError::ProtocolViolation(format!(
            "connect _result transaction id {} does not match request {}",
            connect_resp.transaction_id, connect.transaction_id
        )));
    }

    let create_stream = Command::new("createStream", 2.0, vec![Amf0Value::Null]);
    write_command(writer, 0, &create_stream).await?;
    let create_stream_resp = read_command(reader).await?;
    let msg_stream_id = create_stream_resp
        .args
        .get(1)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| VdkError::MalformedInput("createStream response missing stream id".into()))?
        as u32;

    let name = match role {
        Role::Publish => "publish",
        Role::Play => "play",
    };
    let mut args = vec![Amf0Value::Null, Amf0Value::String(stream_name.into())];
    if role == Role::Publish {
        args.push(Amf0Value::String("live".into()));
    }
    let command = Command::new(name, 0.0, args);
    write_command(writer, msg_stream_id, &command).await?;

    let expected_code = match role {
        Role::Publish => "NetStream.Publish.Start",
        Role::Play => "NetStream.Play.Start",
    };
    loop {
        let status = read_command(reader).await?;
        if status.name != "onStatus" {
            return Err(VdkError::PeerRejected(format!(
                "expected onStatus after {name}, got {}",
                status.name
            )));
        }
        let code = status.args.get(1).and_then(|v| v.get("code")?.as_str());
        if status.args.get(1).and_then(|v| v.get("level")?.as_str()) == Some("error") {
            return Err(VdkError::PeerRejected(format!(
                "{name} rejected: {code:?}"
            )));
        }
        if code == Some(expected_code) {
            break;
        }
    }

    Ok(msg_stream_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_key_joins_app_and_name() {
        assert_eq!(stream_key("live", "camera1"), "live/camera1");
    }

    #[test]
    fn command_roundtrips_through_amf0() {
        let command = Command::new(
            "connect",
            1.0,
            vec![Amf0Value::Object(vec![(
                "app".into(),
                Amf0Value::String("live".into()),
            )])],
        );
        let body = command.encode().unwrap();
        let decoded = Command::decode(COMMAND_AMF0_TYPE_ID, &body).unwrap();
        assert_eq!(decoded, command);
        assert_eq!(decoded.command_object_str("app"), Some("live"));
    }

    #[test]
    fn amf3_command_requires_leading_zero_byte() {
        let command = Command::new("publish", 0.0, vec![Amf0Value::Null]);
        let mut body = vec![0u8];
        body.extend_from_slice(&command.encode().unwrap());
        let decoded = Command::decode(COMMAND_AMF3_TYPE_ID, &body).unwrap();
        assert_eq!(decoded, command);
    }

    #[tokio::test]
    async fn client_publish_is_accepted_by_server() {
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
                Role::Publish,
            )
            .await
        });

        let (client_res, server_res) = tokio::join!(client, server);
        client_res.unwrap().unwrap();
        let (accepted, _reader, _writer) = server_res.unwrap().unwrap();
        assert_eq!(accepted.stream_key, "live/camera1");
        assert_eq!(accepted.role, Role::Publish);
    }
}
