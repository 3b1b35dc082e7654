//! Worker thread hosting the telemetry loop

use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};

use crate::audio::{AudioSink, CueDispatcher, SoundBank, SoundDecoder};
use crate::control::{self, CancellationToken, ControlHandle, LoopEvent};
use crate::error::Result;
use crate::pacenotes::PacenoteStore;
use crate::runner::params::RuntimeParameters;
use crate::runner::state::LoopExit;
use crate::runner::telemetry_loop::TelemetryLoop;
use crate::stages::StageTable;
use crate::telemetry::PacketSource;

/// Everything the worker owns once started
pub struct WorkerSetup<S> {
    pub source: S,
    pub stages: StageTable,
    pub store: Box<dyn PacenoteStore>,
    /// Co-driver sound files, decoded on the worker before the loop starts
    pub sound_files: Vec<PathBuf>,
    pub decoder: Box<dyn SoundDecoder + Send>,
    pub sink: Box<dyn AudioSink>,
    pub params: RuntimeParameters,
}

/// Owner's handle on a running worker
pub struct WorkerHandle {
    thread: Option<JoinHandle<LoopExit>>,
    done: Receiver<()>,
    cancel: CancellationToken,
}

impl WorkerHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Request a stop and wait up to `timeout` for the worker to exit.
    ///
    /// Returns `None` if the worker didn't finish in time; it is then left
    /// to exit on its own.
    pub fn shutdown(mut self, timeout: Duration) -> Option<LoopExit> {
        self.cancel.cancel();

        match self.done.recv_timeout(timeout) {
            // Disconnected: the worker dropped its sender, possibly by panicking
            Ok(()) | Err(RecvTimeoutError::Disconnected) => self.join(),
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!("Telemetry worker did not stop within {:?}", timeout);
                None
            }
        }
    }

    /// Block until the worker exits on its own
    pub fn wait(mut self) -> Option<LoopExit> {
        self.join()
    }

    fn join(&mut self) -> Option<LoopExit> {
        match self.thread.take()?.join() {
            Ok(exit) => Some(exit),
            Err(_) => {
                tracing::error!("Telemetry worker panicked");
                None
            }
        }
    }
}

/// Start the telemetry worker on its own thread
pub fn spawn<S>(setup: WorkerSetup<S>) -> Result<(ControlHandle, WorkerHandle)>
where
    S: PacketSource + 'static,
{
    let (handle, controls) = control::channel();
    let cancel = handle.cancellation().clone();
    let (done_tx, done_rx) = bounded::<()>(1);

    let thread = thread::Builder::new()
        .name("telemetry".to_string())
        .spawn(move || {
            let WorkerSetup {
                source,
                stages,
                store,
                sound_files,
                decoder,
                sink,
                params,
            } = setup;

            let notifier = controls.notifier().clone();
            let bank = SoundBank::load(&sound_files, &*decoder, |loaded, total| {
                notifier.notify(LoopEvent::AssetLoadProgress { loaded, total });
            });

            let dispatcher = CueDispatcher::new(bank, sink, params.gain_db, notifier);
            let telemetry = TelemetryLoop::new(
                source,
                stages,
                store,
                dispatcher,
                controls,
                params.delay_offset,
                params.countdown,
            );

            let exit = telemetry.run();
            let _ = done_tx.send(());
            exit
        })?;

    Ok((
        handle,
        WorkerHandle {
            thread: Some(thread),
            done: done_rx,
            cancel,
        },
    ))
}
