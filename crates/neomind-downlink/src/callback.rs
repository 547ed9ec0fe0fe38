//! Completion contract between the handler and its caller.

use std::collections::BTreeSet;

use crate::command::Command;
use crate::error::TransportError;
use crate::request::{DownlinkRequest, DownlinkResponse};

/// Successful outcome of a command.
#[derive(Debug, Clone, PartialEq)]
pub enum DownlinkReply {
    /// The device answered a submitted request.
    Response {
        request: DownlinkRequest,
        response: DownlinkResponse,
    },
    /// Active observation descriptors.
    Observations(BTreeSet<String>),
    /// Number of observations cancelled.
    Cancelled(usize),
    /// Registration object links in CoRE link format.
    Links(Vec<String>),
}

/// Receives the outcome of one command.
///
/// Exactly one of `on_success`, `on_validation_error` or `on_error` is
/// called per command, unless the command is dropped because the device
/// sleeps or `on_sent` declined it. Validation errors are reported on the
/// calling task; the other two run on the callback pool and may block.
pub trait DownlinkCallback: Send + Sync {
    /// Called right before submission. Returning `false` drops the request.
    fn on_sent(&self, _request: &DownlinkRequest) -> bool {
        true
    }

    fn on_success(&self, command: &Command, reply: DownlinkReply);

    fn on_validation_error(&self, command: &Command, message: &str);

    fn on_error(&self, command: &Command, error: &TransportError);
}
