use std::future::Future;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

/// Returns a flag that stays `true` until Ctrl+C.
pub fn install() -> io::Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    watch(Arc::clone(&running), tokio::signal::ctrl_c())?;
    Ok(running)
}

/// Clears `flag` once `signal` resolves successfully. The future runs on a
/// current-thread runtime owned by a dedicated thread.
fn watch<F>(flag: Arc<AtomicBool>, signal: F) -> io::Result<JoinHandle<()>>
where
    F: Future<Output = io::Result<()>> + Send + 'static,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("shutdown".to_string())
        .spawn(move || match runtime.block_on(signal) {
            Ok(()) => {
                log::info!("Received Ctrl+C, shutting down");
                flag.store(false, Ordering::SeqCst);
            }
            Err(e) => log::error!("Failed to listen for Ctrl+C: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_clears_flag() {
        let flag = Arc::new(AtomicBool::new(true));
        let handle = watch(Arc::clone(&flag), async { Ok(()) }).unwrap();
        handle.join().unwrap();

        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_listener_failure_keeps_running() {
        let flag = Arc::new(AtomicBool::new(true));
        let failing = async { Err(io::Error::other("no signal support")) };
        let handle = watch(Arc::clone(&flag), failing).unwrap();
        handle.join().unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }
}
