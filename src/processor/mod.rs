//! The processor contract and the runtime that schedules processors
//! (spec §4.1, §4.2, §5).

pub mod command;
pub mod ports;
pub mod router;
pub mod runtime;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;
pub use ports::{Emission, Outputs};

/// Declares whether a processor mostly blocks on I/O or burns CPU, used by
/// the scheduler to decide how eagerly to spawn its worker tasks (spec §4.1
/// arity-0 descriptor `workload?`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    Io,
    Compute,
}

/// The lifecycle phase passed to [`Processor::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Stop,
}

/// A processor's static shape: which ports it exposes and which params its
/// `init` recognizes (spec §4.1 arity-0, §6 "Processor descriptor").
#[derive(Debug, Clone, Default)]
pub struct Descriptor {
    /// port name -> human-readable doc
    pub ins: HashMap<String, String>,
    pub outs: HashMap<String, String>,
    /// param key -> human-readable doc
    pub params: HashMap<String, String>,
    pub workload: Option<Workload>,
}

impl Descriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_in(mut self, port: impl Into<String>, doc: impl Into<String>) -> Self {
        self.ins.insert(port.into(), doc.into());
        self
    }

    pub fn with_out(mut self, port: impl Into<String>, doc: impl Into<String>) -> Self {
        self.outs.insert(port.into(), doc.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, doc: impl Into<String>) -> Self {
        self.params.insert(key.into(), doc.into());
        self
    }

    pub fn with_workload(mut self, workload: Workload) -> Self {
        self.workload = Some(workload);
        self
    }

    /// Every processor implicitly carries a privileged `sys-in`/`sys-out`
    /// pair (spec §2) used for the system-frame router's auto-wiring.
    pub fn has_sys_in(&self) -> bool {
        self.ins.contains_key("sys-in")
    }

    pub fn has_sys_out(&self) -> bool {
        self.outs.contains_key("sys-out")
    }
}

/// A unit of computation in the dataflow graph: a pure `transform` over
/// `(state, port, frame)` plus lifecycle hooks for side-effecting setup and
/// teardown (spec §4.1). `state` here is `&mut self` rather than a value
/// threaded explicitly — the idiomatic Rust shape for "opaque state owned by
/// one processor, mutated only by that processor."
#[async_trait]
pub trait Processor: Send {
    /// Arity-0: describe ports and recognized params. Must not depend on
    /// `self`'s mutable state; called before `init`.
    fn describe(&self) -> Descriptor;

    /// Arity-1: validate `params` and perform side-effecting setup (spawn
    /// workers, open resources). Missing required params must return
    /// [`crate::error::SimulflowError::InvalidConfig`].
    async fn init(&mut self, params: Value) -> Result<()>;

    /// Arity-2: `Phase::Stop` must close every port this processor owns and
    /// release resources; must be idempotent (spec §4.1 property 3, §5
    /// cancellation).
    async fn transition(&mut self, phase: Phase) -> Result<()>;

    /// Arity-3: react to one frame arriving on `port`, producing zero or
    /// more outgoing frames/commands. Must not suspend (spec §5).
    fn transform(&mut self, port: &str, frame: crate::frame::Frame) -> Outputs;

    /// Extra in-ports the runtime should poll on this processor's behalf,
    /// beyond the ones wired by graph edges — e.g. a dispatcher worker's
    /// result channel, created and owned entirely inside `init` (spec §4.1
    /// arity-1: "register extra in/out ports... in the returned state").
    /// Called once, immediately after `init`.
    fn extra_in_ports(&mut self) -> Vec<(String, mpsc::Receiver<crate::frame::Frame>)> {
        Vec::new()
    }
}
