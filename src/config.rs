//! # Configuration
//!
//! Component default values, loaded from environment variables first and
//! then an optional `./streamkit.toml` in the working directory.

use lazy_static::lazy_static;
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::RwLock;

lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::new());
}

/// Toolkit-wide defaults, overridable per-Streamer via `add_option`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default RTMP chunk size negotiated after the handshake.
    pub rtmp_chunk_size: u32,
    /// How often (ms) the MPEG-TS muxer re-emits PAT/PMT absent a keyframe.
    pub patpmt_interval_ms: u64,
    /// DTS jump (ms) after which the real-time pacer re-anchors.
    pub pacer_reanchor_ms: i64,
    /// Slack (ms) the real-time pacer allows wall-clock to trail DTS by.
    pub pacer_slack_ms: i64,
    /// Optional listen address for a server-mode Streamer.
    pub listen_addr: Option<String>,
}

impl Config {
    fn new() -> Self {
        let mut config = Config {
            rtmp_chunk_size: 128,
            patpmt_interval_ms: 3000,
            pacer_reanchor_ms: 5000,
            pacer_slack_ms: 30,
            listen_addr: None,
        };

        if let Ok(v) = env::var("STREAMKIT_RTMP_CHUNK_SIZE") {
            if let Ok(n) = v.parse() {
                config.rtmp_chunk_size = n;
            }
        }
        if let Ok(v) = env::var("STREAMKIT_PATPMT_INTERVAL_MS") {
            if let Ok(n) = v.parse() {
                config.patpmt_interval_ms = n;
            }
        }
        if let Ok(v) = env::var("STREAMKIT_LISTEN_ADDR") {
            config.listen_addr = Some(v);
        }

        let config_paths = ["./streamkit.toml", "./config.toml"];
        for path in &config_paths {
            if let Ok(mut file) = File::open(path) {
                let mut content = String::new();
                if file.read_to_string(&mut content).is_ok() {
                    config.apply_toml_lines(&content);
                }
            }
        }

        config
    }

    fn apply_toml_lines(&mut self, content: &str) {
        for line in content.lines() {
            let line = line.trim();
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            match key {
                "rtmp_chunk_size" => {
                    if let Ok(n) = value.parse() {
                        self.rtmp_chunk_size = n;
                    }
                }
                "patpmt_interval_ms" => {
                    if let Ok(n) = value.parse() {
                        self.patpmt_interval_ms = n;
                    }
                }
                "pacer_reanchor_ms" => {
                    if let Ok(n) = value.parse() {
                        self.pacer_reanchor_ms = n;
                    }
                }
                "pacer_slack_ms" => {
                    if let Ok(n) = value.parse() {
                        self.pacer_slack_ms = n;
                    }
                }
                "listen_addr" if !value.is_empty() => {
                    self.listen_addr = Some(value.to_string());
                }
                _ => {}
            }
        }
    }

    /// Re-reads environment and config file, replacing the global config.
    pub fn reload() {
        let new_config = Config::new();
        if let Ok(mut config) = CONFIG.write() {
            *config = new_config;
        }
    }

    /// Returns a clone of the current global configuration.
    pub fn get() -> Config {
        get()
    }
}

/// Returns a clone of the current global configuration.
pub fn get() -> Config {
    CONFIG.read().unwrap().clone()
}

/// Creates a default config template file if it doesn't exist.
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        let template = r#"# streamkit configuration

rtmp_chunk_size = 128
patpmt_interval_ms = 3000
pacer_reanchor_ms = 5000
pacer_slack_ms = 30
# listen_addr = "0.0.0.0:1935"
"#;
        std::fs::write(path, template)?;
    }
    Ok(())
}
