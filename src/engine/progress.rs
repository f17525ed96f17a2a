//! Progress output from an engine pull
//!
//! The engine answers a pull with a stream of JSON records, one per line.
//! We forward the bytes untouched and only look inside to notice an error
//! record, which the engine can send after it has already answered 200.

use crate::errors::EngineError;
use std::io::Write;

/// One record of pull progress
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ProgressMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub progress: Option<String>,
    #[serde(default, rename = "progressDetail")]
    pub progress_detail: Option<ProgressDetail>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, rename = "errorDetail")]
    pub error_detail: Option<ErrorDetail>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ProgressDetail {
    #[serde(default)]
    pub current: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ProgressMessage {
    /// The error this record carries, if any
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().or_else(|| {
            self.error_detail
                .as_ref()
                .and_then(|detail| detail.message.as_deref())
        })
    }
}

/// Copies a progress stream to a sink, watching for error records
pub(crate) struct ProgressCopier<'a> {
    sink: &'a mut (dyn Write + Send),
    line: Vec<u8>,
    error: Option<String>,
}

impl<'a> ProgressCopier<'a> {
    pub fn new(sink: &'a mut (dyn Write + Send)) -> Self {
        ProgressCopier {
            sink,
            line: Vec::new(),
            error: None,
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), EngineError> {
        self.sink.write_all(chunk)?;
        for &byte in chunk {
            if byte == b'\n' {
                self.end_line();
            } else {
                self.line.push(byte);
            }
        }
        Ok(())
    }

    /// Flush the sink and report the first error record seen
    pub fn finish(mut self) -> Result<(), EngineError> {
        self.end_line();
        self.sink.flush()?;
        match self.error {
            Some(message) => Err(EngineError::Stream(message)),
            None => Ok(()),
        }
    }

    fn end_line(&mut self) {
        let line = std::mem::take(&mut self.line);
        if self.error.is_some() || line.iter().all(u8::is_ascii_whitespace) {
            return;
        }
        match serde_json::from_slice::<ProgressMessage>(&line) {
            Ok(message) => {
                if let Some(error) = message.error_message() {
                    log::warn!("pull reported an error: {}", error);
                    self.error = Some(error.to_owned());
                } else {
                    log::trace!("pull progress {:?}", message);
                }
            }
            Err(err) => log::trace!(
                "unparsed progress line ({}): {:?}",
                err,
                String::from_utf8_lossy(&line)
            ),
        }
    }
}
