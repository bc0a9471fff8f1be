//! Pass requests.
//!
//! A [`Request`] is an [`Information`] that names the pass being executed and
//! carries its parameters. It also exposes the update's [`AbortHandle`], so a
//! long-running handler can poll for cancellation.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::information::{keys, Information};

/// The passes of the request protocol, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pass {
    /// Create or replace output data objects.
    DataObject,
    /// Publish per-output metadata, upstream first.
    Information,
    /// Declare what each input needs, downstream first.
    UpdateExtent,
    /// Produce output data, upstream first.
    Data,
}

impl Pass {
    /// Every pass, in execution order.
    pub const ALL: [Pass; 4] = [Pass::DataObject, Pass::Information, Pass::UpdateExtent, Pass::Data];

    /// Integer code stored under [`keys::REQUEST`].
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Pass::DataObject => 0,
            Pass::Information => 1,
            Pass::UpdateExtent => 2,
            Pass::Data => 3,
        }
    }

    /// Inverse of [`Pass::code`].
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Pass> {
        match code {
            0 => Some(Pass::DataObject),
            1 => Some(Pass::Information),
            2 => Some(Pass::UpdateExtent),
            3 => Some(Pass::Data),
            _ => None,
        }
    }

    /// Handler name, as used in log output.
    #[must_use]
    pub const fn handler_name(self) -> &'static str {
        match self {
            Pass::DataObject => "REQUEST_DATA_OBJECT",
            Pass::Information => "REQUEST_INFORMATION",
            Pass::UpdateExtent => "REQUEST_UPDATE_EXTENT",
            Pass::Data => "REQUEST_DATA",
        }
    }

    /// Returns true for passes that walk from consumers to producers.
    #[must_use]
    pub const fn is_downstream_first(self) -> bool {
        matches!(self, Pass::UpdateExtent)
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.handler_name())
    }
}

/// Shared cooperative-cancellation flag.
///
/// Cloning shares the flag. The executive checks it before every stage;
/// handlers may also poll it through [`Request::abort_requested`].
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    /// Create an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running update to stop at the next stage boundary.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns true if an abort has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Clear the flag.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// An information container naming one pass.
#[derive(Debug, Clone)]
pub struct Request {
    pass: Pass,
    info: Information,
    abort: AbortHandle,
}

impl Request {
    /// Create a request for `pass` with a private abort flag.
    #[must_use]
    pub fn new(pass: Pass) -> Self {
        Self::with_abort(pass, AbortHandle::new())
    }

    /// Create a request sharing `abort`.
    #[must_use]
    pub fn with_abort(pass: Pass, abort: AbortHandle) -> Self {
        let mut info = Information::new();
        keys::REQUEST.set(&mut info, pass);
        Self { pass, info, abort }
    }

    /// The pass this request drives.
    #[must_use]
    pub fn pass(&self) -> Pass {
        self.pass
    }

    /// Output port the request is addressed to, if any.
    #[must_use]
    pub fn from_output_port(&self) -> Option<usize> {
        keys::FROM_OUTPUT_PORT.get_opt(&self.info).and_then(|p| usize::try_from(p).ok())
    }

    /// Returns true if the update this request belongs to should stop.
    #[must_use]
    pub fn abort_requested(&self) -> bool {
        self.abort.is_requested()
    }

    /// The shared abort flag.
    #[must_use]
    pub fn abort_handle(&self) -> &AbortHandle {
        &self.abort
    }
}

impl Deref for Request {
    type Target = Information;

    fn deref(&self) -> &Information {
        &self.info
    }
}

impl DerefMut for Request {
    fn deref_mut(&mut self) -> &mut Information {
        &mut self.info
    }
}
