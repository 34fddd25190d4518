//! Per-transform output collection: a routing helper that sorts frames onto
//! `:out` vs `:sys-out` by `SYSTEM_FRAMES` membership, while still allowing
//! explicit named ports for processors that own extra ones (spec §4.1,
//! §8 invariant 2).

use crate::frame::{self, Frame, Plane};
use crate::processor::command::Command;

pub const OUT: &str = "out";
pub const SYS_OUT: &str = "sys-out";

/// One item emitted from a `transform` call: either a frame or a pure-data
/// command for an init-owned executor (spec §4.12).
#[derive(Debug, Clone)]
pub enum Emission {
    Frame(Frame),
    Command(Command),
}

/// Ordered, per-port emissions from a single `transform` invocation. Order
/// within a port is preserved end to end (spec §4.1 property 2, §5 "FIFO per
/// edge").
#[derive(Debug, Default)]
pub struct Outputs {
    items: Vec<(String, Emission)>,
}

impl Outputs {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Emit a frame on the default port, chosen automatically by
    /// `SYSTEM_FRAMES` membership.
    pub fn emit(&mut self, frame: Frame) -> &mut Self {
        let port = match frame::route(&frame) {
            Plane::System => SYS_OUT,
            Plane::Data => OUT,
        };
        self.items.push((port.to_string(), Emission::Frame(frame)));
        self
    }

    /// Emit a frame on an explicitly named port (e.g. a processor's own
    /// `tool-write`, `audio-writer`, or `timer-out` port).
    pub fn emit_on(&mut self, port: impl Into<String>, frame: Frame) -> &mut Self {
        self.items
            .push((port.into(), Emission::Frame(frame)));
        self
    }

    /// Emit a command on a named port for the init-owned executor to act on.
    pub fn emit_command(&mut self, port: impl Into<String>, command: Command) -> &mut Self {
        self.items
            .push((port.into(), Emission::Command(command)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<(String, Emission)> {
        self.items
    }
}
