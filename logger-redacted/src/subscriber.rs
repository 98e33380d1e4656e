//! Global tracing subscriber whose output is redacted line by line.

use crate::config::{LogFormat, LoggerConfig};
use crate::redactor::{PiiRedactor, RedactionConfig};
use std::io::{self, Write};
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("Tracing subscriber already initialised: {0}")]
    AlreadyInitialised(String),
}

/// `MakeWriter` that redacts each formatted event before writing to stdout.
#[derive(Clone)]
pub struct RedactingMakeWriter {
    redactor: Option<Arc<PiiRedactor>>,
}

impl RedactingMakeWriter {
    pub fn new(redactor: Option<PiiRedactor>) -> Self {
        Self {
            redactor: redactor.map(Arc::new),
        }
    }
}

impl<'a> MakeWriter<'a> for RedactingMakeWriter {
    type Writer = RedactingWriter<io::Stdout>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: io::stdout(),
            redactor: self.redactor.clone(),
        }
    }
}

pub struct RedactingWriter<W: Write> {
    inner: W,
    redactor: Option<Arc<PiiRedactor>>,
}

impl<W: Write> RedactingWriter<W> {
    pub fn new(inner: W, redactor: Option<PiiRedactor>) -> Self {
        Self {
            inner,
            redactor: redactor.map(Arc::new),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &self.redactor {
            Some(redactor) => {
                // The fmt layer hands over one complete event per call
                let line = String::from_utf8_lossy(buf);
                self.inner.write_all(redactor.redact(&line).as_bytes())?;
                Ok(buf.len())
            }
            None => self.inner.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `config.log_level`.
pub fn init_tracing(config: &LoggerConfig) -> Result<(), LoggerError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!(
            "{level},tower_http=info,sqlx=warn,hyper=info,reqwest=info",
            level = config.log_level
        ))
        .map_err(|e| LoggerError::InvalidFilter(e.to_string()))?,
    };

    let redactor = config.redaction_enabled.then(|| {
        PiiRedactor::new(RedactionConfig {
            hash_for_correlation: config.hash_for_correlation,
            ..Default::default()
        })
    });
    let writer = RedactingMakeWriter::new(redactor);

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(true)
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(writer),
            )
            .try_init(),
    };

    result.map_err(|e| LoggerError::AlreadyInitialised(e.to_string()))
}
