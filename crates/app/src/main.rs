use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use looper_core::{EngineRegistry, LooperConfig, Session};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Headless looper: JSON lines in on stdin, engine events out on stdout.
///
/// Each input line is a control message (`{"action": "play", "clipId": ...}`)
/// or a transport update (`{"transport": {...}}`). Transport times are in
/// seconds of audio rendered since startup.
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = LooperConfig::load();
    let mut sessions = EngineRegistry::new();
    let active = sessions.register(Session::start(&config)?);
    log::info!("session {} started", active.0);

    let (line_tx, line_rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    let stdout = io::stdout();
    loop {
        match line_rx.recv_timeout(POLL_INTERVAL) {
            Ok(line) => {
                let line = line.trim();
                if !line.is_empty()
                    && let Some(session) = sessions.get_mut(active)
                    && let Err(err) = session.handle_json(line)
                {
                    log::warn!("ignoring input line: {err}");
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let mut out = stdout.lock();
        for (id, session) in sessions.iter_mut() {
            for event in session.poll() {
                writeln!(out, "{}", event.to_json()?)?;
            }
            for take in session.drain_recorded() {
                log::info!(
                    "session {}: take on clip {} ready ({} frames, token {})",
                    id.0,
                    take.clip_id,
                    take.audio.frames(),
                    take.token.as_deref().unwrap_or("not loaded")
                );
            }
        }
        out.flush()?;
    }

    log::info!("stdin closed, shutting down");
    // Dropping the session closes its device streams.
    sessions.remove(active);
    Ok(())
}
