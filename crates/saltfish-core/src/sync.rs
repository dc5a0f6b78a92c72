//! Fan-in barrier for scatter/gather replies.

use std::sync::Mutex;

type Postlude = Box<dyn FnOnce() + Send>;

/// Collects `n_acks` acknowledgements from concurrent tasks and runs exactly
/// one continuation: the success continuation on the final `ok()`, or the
/// first error continuation handed to `error()`. Whichever fires first wins;
/// every later call is a no-op.
///
/// ```
/// use saltfish_core::ReplySync;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// let fired = Arc::new(AtomicU32::new(0));
/// let counter = fired.clone();
/// let sync = ReplySync::new(2, move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
/// sync.ok();
/// sync.ok();
/// assert_eq!(fired.load(Ordering::SeqCst), 1);
/// ```
pub struct ReplySync {
    n_acks: u32,
    state: Mutex<State>,
}

struct State {
    ok_received: u32,
    replied: bool,
    success: Option<Postlude>,
}

impl ReplySync {
    pub fn new(n_acks: u32, success: impl FnOnce() + Send + 'static) -> Self {
        Self {
            n_acks,
            state: Mutex::new(State {
                ok_received: 0,
                replied: false,
                success: Some(Box::new(success)),
            }),
        }
    }

    /// Number of acknowledgements received so far.
    pub fn ok_received(&self) -> u32 {
        self.state.lock().unwrap().ok_received
    }

    /// Records one acknowledgement; the Nth runs the success continuation
    /// unless an error already replied.
    pub fn ok(&self) {
        let mut state = self.state.lock().unwrap();
        state.ok_received += 1;
        debug_assert!(
            state.ok_received <= self.n_acks,
            "received more acknowledgements than expected"
        );
        if state.ok_received == self.n_acks && !state.replied {
            state.replied = true;
            if let Some(success) = state.success.take() {
                success();
            }
        }
    }

    /// Runs `error_handler` exactly once, unless a continuation already ran.
    pub fn error(&self, error_handler: impl FnOnce() + Send) {
        let mut state = self.state.lock().unwrap();
        if state.replied {
            return;
        }
        state.replied = true;
        state.success = None;
        error_handler();
    }
}
