use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver, Sender};

/// Log sink that hands formatted records to the frame loop instead of
/// writing them from whichever thread logged.
struct QueueWriter {
    tx: Sender<Vec<u8>>,
}

impl Write for QueueWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "console closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Console {
    rx: Receiver<Vec<u8>>,
}

impl Console {
    /// Installs the global logger. Output only appears when [`Console::drain`] runs.
    pub fn install() -> Self {
        let (tx, rx) = mpsc::channel();

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .target(env_logger::Target::Pipe(Box::new(QueueWriter { tx })))
            .init();

        Self { rx }
    }

    /// Prints everything queued so far, in logging order.
    pub fn drain(&self) {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for chunk in self.rx.try_iter() {
            let _ = out.write_all(&chunk);
        }
        let _ = out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_preserves_order() {
        let (tx, rx) = mpsc::channel();
        let mut writer = QueueWriter { tx };

        writer.write_all(b"first\n").unwrap();
        writer.write_all(b"second\n").unwrap();

        let chunks: Vec<Vec<u8>> = rx.try_iter().collect();
        assert_eq!(chunks, vec![b"first\n".to_vec(), b"second\n".to_vec()]);
    }

    #[test]
    fn test_write_after_close_fails() {
        let (tx, rx) = mpsc::channel();
        let mut writer = QueueWriter { tx };
        drop(rx);

        assert!(writer.write(b"lost").is_err());
    }
}
