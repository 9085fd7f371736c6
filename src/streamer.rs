//! The `Streamer` pipeline abstraction: a directed graph of named nodes
//! that pass [`crate::av::MediaPacket`]s downstream through `source()`.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::av::MediaPacket;
use crate::error::Result;

/// Receives out-of-band diagnostics from a `Streamer` (errors, transport
/// events, metadata reports).
pub trait Reporter: Send + Sync {
    /// Reports an event. `kind` is a short tag such as `"error"`,
    /// `"metadata"`, `"transport_connect"`; `value` is a short diagnostic.
    fn on_report(&self, name: &str, kind: &str, value: &str);
}

/// A `Reporter` that discards every event; the default when no reporter has
/// been attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn on_report(&self, _name: &str, _kind: &str, _value: &str) {}
}

/// A downstream consumer of `MediaPacket`s.
#[async_trait]
pub trait MediaSink: Send {
    /// Unique name of this sink, used for `remove_sinker` lookups.
    fn name(&self) -> &str;

    /// Accepts one inbound packet.
    async fn source(&mut self, packet: MediaPacket) -> Result<()>;
}

/// A node in a media pipeline: a name, an option map, a reporter handle,
/// and an ordered list of downstream sinkers.
#[async_trait]
pub trait Streamer: Send {
    /// Unique name for this streamer instance, e.g. `"mpegtsdemux_<id>"`.
    fn name(&self) -> &str;

    /// Sets the reporter used for diagnostic events.
    fn set_reporter(&mut self, reporter: Box<dyn Reporter>);

    /// Appends a downstream sinker and returns the new sinker count.
    fn add_sinker(&mut self, sinker: Box<dyn MediaSink>) -> usize;

    /// Removes a downstream sinker by name and returns the remaining count.
    fn remove_sinker(&mut self, name: &str) -> usize;

    /// Accepts one inbound packet, typically fanning it out to sinkers.
    async fn source(&mut self, packet: MediaPacket) -> Result<()>;

    /// Sets or overwrites a recognized option. Implementations reject
    /// unrecognized keys with an error.
    fn add_option(&mut self, key: &str, value: &str) -> Result<()>;

    /// Optionally begins wire I/O against `url`; streamers with no network
    /// role may leave this a no-op.
    async fn start_network(&mut self, url: &str) -> Result<()>;
}

/// A reusable base implementing the bookkeeping common to every concrete
/// `Streamer`: name, sinkers, reporter, and option map. Concrete streamers
/// embed this and delegate the shared methods to it.
pub struct StreamerBase {
    name: String,
    sinkers: Vec<Box<dyn MediaSink>>,
    reporter: Box<dyn Reporter>,
    options: HashMap<String, String>,
}

impl StreamerBase {
    /// Creates a new base with the given name and a `NullReporter`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sinkers: Vec::new(),
            reporter: Box::new(NullReporter),
            options: HashMap::new(),
        }
    }

    /// Returns this streamer's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replaces the reporter.
    pub fn set_reporter(&mut self, reporter: Box<dyn Reporter>) {
        self.reporter = reporter;
    }

    /// Appends a sinker, returning the new count.
    pub fn add_sinker(&mut self, sinker: Box<dyn MediaSink>) -> usize {
        self.sinkers.push(sinker);
        self.sinkers.len()
    }

    /// Removes a sinker by name, returning the remaining count.
    pub fn remove_sinker(&mut self, name: &str) -> usize {
        self.sinkers.retain(|s| s.name() != name);
        self.sinkers.len()
    }

    /// Fans `packet` out to every sinker in order, cloning for all but the
    /// last sinker, which takes ownership of the original.
    pub async fn fan_out(&mut self, packet: MediaPacket) -> Result<()> {
        let len = self.sinkers.len();
        if len == 0 {
            return Ok(());
        }
        for sinker in self.sinkers[..len - 1].iter_mut() {
            sinker.source(packet.clone()).await?;
        }
        self.sinkers[len - 1].source(packet).await?;
        Ok(())
    }

    /// Records a diagnostic event against the attached reporter.
    pub fn report(&self, kind: &str, value: &str) {
        self.reporter.on_report(&self.name, kind, value);
    }

    /// Stores a recognized option.
    pub fn set_option(&mut self, key: &str, value: &str) {
        self.options.insert(key.to_string(), value.to_string());
    }

    /// Reads a previously stored option.
    pub fn get_option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::av::{CodecType, MediaType};

    struct CountingSink {
        name: String,
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MediaSink for CountingSink {
        fn name(&self) -> &str {
            &self.name
        }
        async fn source(&mut self, _packet: MediaPacket) -> Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn fan_out_reaches_every_sinker() {
        let mut base = StreamerBase::new("test");
        let count = Arc::new(AtomicUsize::new(0));
        base.add_sinker(Box::new(CountingSink {
            name: "a".into(),
            count: count.clone(),
        }));
        base.add_sinker(Box::new(CountingSink {
            name: "b".into(),
            count: count.clone(),
        }));

        let packet = MediaPacket::new(MediaType::Video, CodecType::H264, Bytes::from_static(b"x"));
        base.fan_out(packet).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn remove_sinker_drops_by_name() {
        let mut base = StreamerBase::new("test");
        base.add_sinker(Box::new(CountingSink {
            name: "a".into(),
            count: Arc::new(AtomicUsize::new(0)),
        }));
        assert_eq!(base.remove_sinker("a"), 0);
    }
}
