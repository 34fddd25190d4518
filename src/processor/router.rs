//! The system-frame router: a stateless fan-out processor, plus the
//! auto-wiring rule that attaches every processor's `sys-in`/`sys-out` to it
//! by descriptor introspection (spec §4.2).

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::frame::Frame;
use crate::processor::{Descriptor, Outputs, Phase, Processor, Workload};

pub const SYS_IN: &str = "sys-in";
pub const SYS_OUT: &str = "sys-out";

/// Forwards every frame whose type is in `SYSTEM_FRAMES` arriving on
/// `sys-in` back out on `sys-out`; drops anything else (logging the drop).
#[derive(Debug, Default)]
pub struct SystemFrameRouter;

impl SystemFrameRouter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Processor for SystemFrameRouter {
    fn describe(&self) -> Descriptor {
        Descriptor::new()
            .with_in(SYS_IN, "system frames from any processor")
            .with_out(SYS_OUT, "rebroadcast of every system frame")
            .with_workload(Workload::Compute)
    }

    async fn init(&mut self, _params: Value) -> Result<()> {
        Ok(())
    }

    async fn transition(&mut self, _phase: Phase) -> Result<()> {
        Ok(())
    }

    fn transform(&mut self, port: &str, frame: Frame) -> Outputs {
        let mut out = Outputs::new();
        if port != SYS_IN {
            return out;
        }
        if frame.is_system_frame() {
            out.emit_on(SYS_OUT, frame);
        } else {
            tracing::debug!(kind = frame.kind(), "system router dropped non-system frame");
        }
        out
    }
}

/// A single directed wire between two processors' named ports.
#[derive(Debug, Clone)]
pub struct Edge {
    pub from: String,
    pub from_port: String,
    pub to: String,
    pub to_port: String,
}

/// Given every processor's descriptor, wire the system plane without
/// requiring N×N manual edges (spec §4.2): any processor declaring
/// `sys-out` feeds the router's `sys-in`; any processor declaring `sys-in`
/// is fed from the router's `sys-out`.
pub fn auto_wire_system_plane(
    descriptors: &HashMap<String, Descriptor>,
    router_name: &str,
) -> Vec<Edge> {
    let mut edges = Vec::new();
    for (name, descriptor) in descriptors {
        if name == router_name {
            continue;
        }
        if descriptor.has_sys_out() {
            edges.push(Edge {
                from: name.clone(),
                from_port: SYS_OUT.to_string(),
                to: router_name.to_string(),
                to_port: SYS_IN.to_string(),
            });
        }
        if descriptor.has_sys_in() {
            edges.push(Edge {
                from: router_name.to_string(),
                from_port: SYS_OUT.to_string(),
                to: name.clone(),
                to_port: SYS_IN.to_string(),
            });
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_forwards_system_frames() {
        let mut router = SystemFrameRouter::new();
        let out = router.transform(SYS_IN, Frame::user_speech_start(true));
        let items = out.into_vec();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].0, SYS_OUT);
    }

    #[test]
    fn router_drops_non_system_frames() {
        let mut router = SystemFrameRouter::new();
        let out = router.transform(SYS_IN, Frame::transcription("hi".into()));
        assert!(out.into_vec().is_empty());
    }

    #[test]
    fn auto_wire_connects_declared_sys_ports() {
        let mut descriptors = HashMap::new();
        descriptors.insert(
            "vad".to_string(),
            Descriptor::new().with_out(SYS_OUT, "vad events"),
        );
        descriptors.insert(
            "mute".to_string(),
            Descriptor::new().with_in(SYS_IN, "mute control"),
        );
        let edges = auto_wire_system_plane(&descriptors, "router");
        assert!(edges
            .iter()
            .any(|e| e.from == "vad" && e.to == "router"));
        assert!(edges
            .iter()
            .any(|e| e.from == "router" && e.to == "mute"));
    }
}
