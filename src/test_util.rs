use parking_lot::Mutex;
use tracing::subscriber::DefaultGuard;

use std::io;
use std::sync::Arc;

/// Collects formatted log lines for assertions
#[derive(Clone, Default)]
pub(crate) struct CaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CaptureWriter {
    /// Route this thread's logs into a new writer until the guard drops
    pub(crate) fn install() -> (Self, DefaultGuard) {
        let writer = CaptureWriter::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(writer.clone())
            .with_ansi(false)
            .finish();

        (writer, tracing::subscriber::set_default(subscriber))
    }

    pub(crate) fn lines_at(&self, level: &str) -> usize {
        String::from_utf8_lossy(&self.buffer.lock())
            .lines()
            .filter(|line| line.contains(level))
            .count()
    }
}

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CaptureWriter {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
