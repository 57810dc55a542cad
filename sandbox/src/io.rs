//! This module defines IO related facilities used by the runner, namely the collectors that drain
//! the output pipes of child processes.
//!

use std::io::{ErrorKind, Read};
use std::sync::{Arc, Mutex};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;


/// Bytes collected from one output stream.
#[derive(Debug, Default)]
pub struct CollectedOutput {
    /// The collected bytes, at most as many as the collector's limit.
    pub data: Vec<u8>,

    /// Did the stream produce more bytes than the limit?
    pub truncated: bool,
}

impl CollectedOutput {
    /// Decode the collected bytes as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Drain a pipe on a dedicated thread so that neither output stream of a child process can block
/// it or the monitor loop.
pub struct OutputCollector {
    /// Output collected so far. Shared with the collector thread.
    shared: Arc<Mutex<CollectedOutput>>,

    /// Receives a message when the collector thread hits end of file or a read error.
    done: Receiver<()>,
}

impl OutputCollector {
    /// Start a collector thread reading from the given pipe. At most `limit` bytes are kept; the
    /// rest of the stream is read and discarded.
    pub fn start<R>(mut reader: R, limit: usize) -> OutputCollector
        where R: Read + Send + 'static {
        let shared = Arc::new(Mutex::new(CollectedOutput::default()));
        let (sender, done) = mpsc::channel();

        let thread_shared = shared.clone();
        std::thread::spawn(move || {
            let mut buffer = [0u8; 8192];
            loop {
                let count = match reader.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(count) => count,
                    Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        debug!("Output collector stopped on read error: {}", e);
                        break;
                    }
                };

                let mut output = thread_shared.lock().unwrap_or_else(|e| e.into_inner());
                let room = limit.saturating_sub(output.data.len());
                if count > room {
                    output.truncated = true;
                }
                let kept = std::cmp::min(count, room);
                output.data.extend_from_slice(&buffer[..kept]);
            }

            // The receiver may already be gone if the grace period expired.
            sender.send(()).ok();
        });

        OutputCollector { shared, done }
    }

    /// Wait at most `grace` for the collector thread to reach end of file, then take whatever has
    /// been collected. A pipe held open by a process that escaped its process group therefore
    /// cannot block the caller.
    pub fn finish(self, grace: Duration) -> CollectedOutput {
        if self.done.recv_timeout(grace).is_err() {
            warn!("Output pipe still open {:?} after the process terminated; giving up on it",
                grace);
        }

        let mut output = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *output)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    #[test]
    fn collects_everything_below_the_limit() {
        let collector = OutputCollector::start(Cursor::new(b"hello".to_vec()), 100);
        let output = collector.finish(Duration::from_secs(5));

        assert_eq!(b"hello", &output.data[..]);
        assert!(!output.truncated);
        assert_eq!("hello", output.text());
    }

    #[test]
    fn truncates_at_the_limit() {
        let collector = OutputCollector::start(Cursor::new(vec![b'x'; 20000]), 10000);
        let output = collector.finish(Duration::from_secs(5));

        assert_eq!(10000, output.data.len());
        assert!(output.truncated);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let collector = OutputCollector::start(Cursor::new(vec![b'a', 0xff, b'b']), 100);
        assert_eq!("a\u{fffd}b", collector.finish(Duration::from_secs(5)).text());
    }
}
