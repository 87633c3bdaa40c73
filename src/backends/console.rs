//! Standard error backend

use crate::core::encoder::encode_unbounded;
use crate::core::{Backend, LogConfig, Record, Result, SessionInfo};
use std::io::Write;
use std::sync::Arc;

#[cfg(feature = "console")]
use colored::Colorize;

/// Writes every line to stderr. Nothing to open or close.
pub struct ConsoleBackend {
    #[cfg_attr(not(feature = "console"), allow(dead_code))]
    use_colors: bool,
}

impl ConsoleBackend {
    pub fn new() -> Self {
        Self { use_colors: false }
    }

    /// Colours follow `config.colors` when the `console` feature is on
    pub fn from_config(config: &LogConfig) -> Self {
        Self {
            use_colors: cfg!(feature = "console") && config.colors,
        }
    }

    /// Colour the `<timestamp>/<identity>/<app>:` prefix by severity
    #[cfg(feature = "console")]
    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    fn render(&self, session: &SessionInfo, record: &Record<'_>) -> Vec<u8> {
        let mut line = Vec::with_capacity(128);

        #[cfg(feature = "console")]
        {
            if self.use_colors {
                let prefix = format!("{}/{}/{}:", record.timestamp, session.call_id(), session.app());
                let _ = write!(line, "{} ", prefix.color(record.level.color_code()));
                let _ = line.write_fmt(record.message);
                if let Some(error) = record.error {
                    let _ = write!(line, ": {}", error);
                }
                line.push(b'\n');
                return line;
            }
        }

        encode_unbounded(&mut line, &record.line_parts(session));
        line
    }
}

impl Default for ConsoleBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for ConsoleBackend {
    fn open(&mut self, _session: &Arc<SessionInfo>) -> Result<()> {
        Ok(())
    }

    fn write(&self, session: &Arc<SessionInfo>, record: &Record<'_>) {
        let line = self.render(session, record);
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(&line);
    }

    fn close(self: Box<Self>, _session: Arc<SessionInfo>) {}

    fn name(&self) -> &str {
        "stderr"
    }
}
