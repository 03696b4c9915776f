// SpeechEngine - queued text-to-speech on a dedicated worker thread
//
// Constructed explicitly and handed to whoever needs to speak; there is no
// process-wide instance. Requests travel over an unbounded tokio mpsc channel
// that the worker drains with `blocking_recv`, so `say` never blocks the
// caller. `clear_queue` bumps a generation counter and the worker drops every
// request tagged with an older generation.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tokio::sync::{mpsc, oneshot};

use crate::config::SpeechConfig;
use crate::engine::backend::{SpeechBackend, SpeechSynthesizer};
use crate::error::{log_sensor_error, SensorError};

enum SpeechCommand {
    Speak {
        text: String,
        generation: u64,
        done: Option<oneshot::Sender<bool>>,
    },
    Shutdown,
}

struct SpeechShared {
    generation: AtomicU64,
    pending: AtomicUsize,
    running: AtomicBool,
}

pub struct SpeechEngine {
    tx: mpsc::UnboundedSender<SpeechCommand>,
    shared: Arc<SpeechShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    voice: Option<String>,
}

impl SpeechEngine {
    /// Start the worker thread around `backend`.
    ///
    /// The backend picks its voice from `config.voice_preferences` before the
    /// first utterance.
    pub fn new(mut backend: Box<dyn SpeechBackend>, config: &SpeechConfig) -> Self {
        let voice = backend.select_voice(&config.voice_preferences);
        backend.set_rate(config.rate_wpm);
        match &voice {
            Some(name) => log::info!("[SpeechEngine] Using voice {}", name),
            None => log::info!("[SpeechEngine] Using backend default voice"),
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(SpeechShared {
            generation: AtomicU64::new(0),
            pending: AtomicUsize::new(0),
            running: AtomicBool::new(true),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("speech-engine".to_string())
            .spawn(move || speech_worker(backend, rx, worker_shared));

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(err) => {
                log_sensor_error(
                    &SensorError::Unavailable {
                        device: "speech".to_string(),
                        reason: err.to_string(),
                    },
                    "SpeechEngine::new",
                );
                shared.running.store(false, Ordering::SeqCst);
                None
            }
        };

        Self {
            tx,
            shared,
            worker: Mutex::new(worker),
            voice,
        }
    }

    fn enqueue(&self, text: &str, done: Option<oneshot::Sender<bool>>) -> bool {
        if !self.is_running() {
            return false;
        }
        let command = SpeechCommand::Speak {
            text: text.to_string(),
            generation: self.shared.generation.load(Ordering::SeqCst),
            done,
        };
        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(command).is_err() {
            self.shared.pending.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    /// Queue `text` and block until it has been spoken (or dropped).
    ///
    /// # Returns
    /// * `true` - the backend spoke the text
    /// * `false` - engine stopped, queue cleared, or backend failure
    pub fn speak_sync(&self, text: &str) -> bool {
        let (done_tx, done_rx) = oneshot::channel();
        if !self.enqueue(text, Some(done_tx)) {
            return false;
        }
        done_rx.blocking_recv().unwrap_or(false)
    }

    /// Drop every request that has not started playing yet.
    pub fn clear_queue(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        log::debug!("[SpeechEngine] Queue cleared");
    }

    /// Requests queued and not yet finished
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn voice(&self) -> Option<&str> {
        self.voice.as_deref()
    }

    /// Stop accepting requests, let the worker finish what is queued and join it.
    pub fn shutdown(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(SpeechCommand::Shutdown);
        let handle = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("[SpeechEngine] Worker thread panicked");
            }
        }
        log::info!("[SpeechEngine] Shut down");
    }
}

impl SpeechSynthesizer for SpeechEngine {
    fn say(&self, text: &str) {
        if !self.enqueue(text, None) {
            log::warn!("[SpeechEngine] Dropped speech while stopped: {:?}", text);
        }
    }

    fn speak_sync(&self, text: &str) -> bool {
        SpeechEngine::speak_sync(self, text)
    }
}

impl Drop for SpeechEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn speech_worker(
    mut backend: Box<dyn SpeechBackend>,
    mut rx: mpsc::UnboundedReceiver<SpeechCommand>,
    shared: Arc<SpeechShared>,
) {
    log::debug!("[SpeechEngine] Worker started");
    while let Some(command) = rx.blocking_recv() {
        match command {
            SpeechCommand::Speak {
                text,
                generation,
                done,
            } => {
                let spoken = if generation < shared.generation.load(Ordering::SeqCst) {
                    false
                } else {
                    match backend.speak_blocking(&text) {
                        Ok(()) => true,
                        Err(reason) => {
                            log_sensor_error(
                                &SensorError::ReadFailed {
                                    device: "speech".to_string(),
                                    reason,
                                },
                                "speech_worker",
                            );
                            false
                        }
                    }
                };
                shared.pending.fetch_sub(1, Ordering::SeqCst);
                if let Some(done) = done {
                    let _ = done.send(spoken);
                }
            }
            SpeechCommand::Shutdown => break,
        }
    }
    backend.stop();
    log::debug!("[SpeechEngine] Worker stopped");
}
