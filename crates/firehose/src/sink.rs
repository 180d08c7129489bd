use std::io;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum SinkError {
	#[error("Output closed")]
	Closed,

	#[error("Write failed: {0}")]
	Io(#[source] io::Error),
}

impl From<io::Error> for SinkError {
	fn from(err: io::Error) -> Self {
		match err.kind() {
			io::ErrorKind::BrokenPipe => Self::Closed,
			_ => Self::Io(err),
		}
	}
}

/// Destination of formatted lines
#[async_trait::async_trait]
pub trait Sink: Send {
	async fn write_line(&mut self, line: &str) -> Result<(), SinkError>;
}

/// Writes each line followed by a newline and flushes it right away
pub struct WriterSink<W> {
	writer: W,
}

impl<W> WriterSink<W> {
	pub const fn new(writer: W) -> Self {
		Self { writer }
	}

	pub fn into_inner(self) -> W {
		self.writer
	}
}

impl WriterSink<tokio::io::Stdout> {
	pub fn stdout() -> Self {
		Self::new(tokio::io::stdout())
	}
}

#[async_trait::async_trait]
impl<W: AsyncWrite + Unpin + Send> Sink for WriterSink<W> {
	async fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
		self.writer.write_all(line.as_bytes()).await?;
		self.writer.write_all(b"\n").await?;
		self.writer.flush().await?;
		Ok(())
	}
}
