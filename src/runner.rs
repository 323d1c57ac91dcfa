//! Running a session in the background.
//!
//! [`MeasurementClient::run_threaded`] moves the client onto its own OS
//! thread with a single-threaded tokio runtime, so callers on a UI loop
//! stay responsive while the test runs. Progress reaches the caller
//! through the client's notifier and the final record through the
//! completion callback and [`SessionHandle::join`].

use crate::errors::{ErrorKind, SpeedTestError};
use crate::results::ResultRecord;
use crate::session::MeasurementClient;
use crate::speedtest::SpeedProvider;
use log::{debug, error};
use std::thread::{self, JoinHandle};
use tokio::runtime::Builder;

const THREAD_NAME: &str = "speedcheck-session";

/// Which server a background session measures against.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionTarget {
    /// Pick the lowest-latency server among the closest ones.
    #[default]
    BestAvailable,
    /// Use the server with this id.
    Server(String),
}

/// Handle to a session running on its own thread.
///
/// Sessions cannot be cancelled. Dropping the handle detaches the thread,
/// which still runs to completion and still invokes its callback.
#[derive(Debug)]
pub struct SessionHandle {
    thread: JoinHandle<Option<ResultRecord>>,
}

impl SessionHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the session and return its record.
    pub fn join(self) -> Option<ResultRecord> {
        match self.thread.join() {
            Ok(record) => record,
            Err(_) => {
                error!("Session thread panicked");
                None
            }
        }
    }
}

impl<P> MeasurementClient<P>
where
    P: SpeedProvider + Send + 'static,
{
    /// Run a full session on a new thread.
    ///
    /// `on_complete` is called exactly once on that thread, with the record
    /// or `None` when the session produced none.
    pub fn run_threaded<F>(
        mut self,
        target: SessionTarget,
        on_complete: F,
    ) -> Result<SessionHandle, SpeedTestError>
    where
        F: FnOnce(Option<ResultRecord>) + Send + 'static,
    {
        let thread = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || {
                let record = match Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime.block_on(async move {
                        match target {
                            SessionTarget::BestAvailable => self.run_full_test().await,
                            SessionTarget::Server(id) => self.test_with_server(&id).await,
                        }
                    }),
                    Err(e) => {
                        error!("Could not start session runtime: {}", e);
                        None
                    }
                };

                debug!("Session thread finished, result: {}", record.is_some());
                on_complete(record.clone());
                record
            })
            .map_err(|e| {
                SpeedTestError::new(
                    ErrorKind::Unknown,
                    format!("could not spawn session thread: {}", e),
                )
                .with_source(e)
            })?;

        Ok(SessionHandle { thread })
    }
}
