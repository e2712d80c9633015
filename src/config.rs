use std::path::PathBuf;

use crate::arena::Geometry;
use crate::error::LogError;

/// Default byte budget of each mirror.
pub const DEFAULT_BUFFER_SIZE: usize = 50 * 1024 * 1024;

pub const KEY_WRITER: &str = "log_writer";
pub const KEY_HOST_BUFFER_SIZE: &str = "log_host_buffer_size";
pub const KEY_DEVICE_BUFFER_SIZE: &str = "log_device_buffer_size";

/// Which sink drains the log, and where it writes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SinkSpec {
    /// `binary <events_path> <bodies_path>`
    Binary {
        events_path: PathBuf,
        bodies_path: PathBuf,
    },
    /// `console`
    Console,
    /// `null`
    #[default]
    Null,
}

impl SinkSpec {
    /// Parses a writer selection such as `"binary events.bin bodies.bin"`.
    pub fn parse(text: &str) -> Result<Self, LogError> {
        let mut words = text.split_whitespace();
        let name = words.next().unwrap_or("null");
        let spec = match name {
            "binary" => match (words.next(), words.next()) {
                (Some(events), Some(bodies)) => SinkSpec::Binary {
                    events_path: PathBuf::from(events),
                    bodies_path: PathBuf::from(bodies),
                },
                _ => {
                    return Err(LogError::config(
                        KEY_WRITER,
                        "Expected 'binary <events_path> <bodies_path>' form of configuration for writer.",
                    ))
                }
            },
            "console" => SinkSpec::Console,
            "null" => SinkSpec::Null,
            other => return Err(LogError::UnknownWriter(other.to_string())),
        };
        if let Some(extra) = words.next() {
            return Err(LogError::config(
                KEY_WRITER,
                format!("unexpected argument `{}` for the {} writer", extra, name),
            ));
        }
        Ok(spec)
    }
}

/// Settings consumed by [`LogManager::init`](crate::LogManager::init).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub host_buffer_size: usize,
    pub device_buffer_size: usize,
    pub writer: SinkSpec,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            host_buffer_size: DEFAULT_BUFFER_SIZE,
            device_buffer_size: DEFAULT_BUFFER_SIZE,
            writer: SinkSpec::Null,
        }
    }
}

impl LogConfig {
    /// Builds a configuration from `key = value` pairs.
    ///
    /// Keys this log does not know about are ignored, since the same
    /// configuration usually carries settings for other components.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, LogError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut config = LogConfig::default();
        for (key, value) in pairs {
            let value = value.trim();
            match key.trim() {
                KEY_WRITER => config.writer = SinkSpec::parse(value)?,
                KEY_HOST_BUFFER_SIZE => config.host_buffer_size = parse_size(KEY_HOST_BUFFER_SIZE, value)?,
                KEY_DEVICE_BUFFER_SIZE => {
                    config.device_buffer_size = parse_size(KEY_DEVICE_BUFFER_SIZE, value)?
                }
                _ => {}
            }
        }
        Ok(config)
    }

    /// Parses `key = value` lines. Blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Result<Self, LogError> {
        let mut pairs = Vec::new();
        for (number, line) in text.lines().enumerate() {
            let line = match line.split_once('#') {
                Some((content, _)) => content,
                None => line,
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            match line.split_once('=') {
                Some(pair) => pairs.push(pair),
                None => {
                    return Err(LogError::config(
                        line,
                        format!("line {} is not of the form `key = value`", number + 1),
                    ))
                }
            }
        }
        Self::from_pairs(pairs)
    }

    /// Slab geometry shared by both mirrors.
    ///
    /// The smaller budget wins, so a device generation always fits in the
    /// host mirror it is downloaded into.
    pub fn geometry(&self) -> Geometry {
        Geometry::for_bytes(self.host_buffer_size.min(self.device_buffer_size))
    }
}

fn parse_size(key: &str, value: &str) -> Result<usize, LogError> {
    let size: usize = value
        .parse()
        .map_err(|err| LogError::config(key, format!("`{}` is not a byte count: {}", value, err)))?;
    if size == 0 {
        return Err(LogError::config(key, "buffer size must be positive"));
    }
    Ok(size)
}
