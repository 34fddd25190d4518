//! The graph runtime: owns bounded per-edge channels, spawns one task per
//! processor, and guarantees serialized `transform` + FIFO-per-edge
//! delivery (spec §4.1 properties, §5).

use std::collections::HashMap;

use futures_util::stream::{select_all, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::frame::Frame;
use crate::processor::router::{auto_wire_system_plane, Edge, SystemFrameRouter};
use crate::processor::{Descriptor, Emission, Phase, Processor};

/// A dataflow graph under construction: named processors plus the edges
/// wiring their ports together.
pub struct Graph {
    processors: HashMap<String, Box<dyn Processor>>,
    edges: Vec<Edge>,
    channel_capacity: usize,
}

impl Graph {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            processors: HashMap::new(),
            edges: Vec::new(),
            channel_capacity,
        }
    }

    pub fn add_processor(&mut self, name: impl Into<String>, processor: Box<dyn Processor>) -> &mut Self {
        self.processors.insert(name.into(), processor);
        self
    }

    pub fn add_edge(
        &mut self,
        from: impl Into<String>,
        from_port: impl Into<String>,
        to: impl Into<String>,
        to_port: impl Into<String>,
    ) -> &mut Self {
        self.edges.push(Edge {
            from: from.into(),
            from_port: from_port.into(),
            to: to.into(),
            to_port: to_port.into(),
        });
        self
    }

    /// Adds the system-frame router and wires every processor's `sys-in`/
    /// `sys-out` to it by descriptor introspection (spec §4.2).
    pub fn with_system_router(&mut self, router_name: impl Into<String>) -> &mut Self {
        let router_name = router_name.into();
        let descriptors: HashMap<String, Descriptor> = self
            .processors
            .iter()
            .map(|(name, processor)| (name.clone(), processor.describe()))
            .collect();
        self.processors
            .insert(router_name.clone(), Box::new(SystemFrameRouter::new()));
        self.edges
            .extend(auto_wire_system_plane(&descriptors, &router_name));
        self
    }

    /// Runs `init` then `transition(Start)` on every processor, spawns one
    /// task per processor, and blocks until `stop` is cancelled or every
    /// processor's input ports have closed.
    pub async fn run(mut self, params: &HashMap<String, Value>, stop: CancellationToken) -> Result<()> {
        let mut extra_in_ports: HashMap<String, Vec<(String, mpsc::Receiver<Frame>)>> =
            HashMap::new();
        for (name, processor) in self.processors.iter_mut() {
            let processor_params = params.get(name).cloned().unwrap_or(Value::Null);
            processor.init(processor_params).await?;
            let extra = processor.extra_in_ports();
            if !extra.is_empty() {
                extra_in_ports.insert(name.clone(), extra);
            }
        }
        for processor in self.processors.values_mut() {
            processor.transition(Phase::Start).await?;
        }

        // One bounded channel per distinct (processor, in-port) pair;
        // backpressure (spec §4.1 property 4) falls directly out of the
        // bounded capacity here.
        let mut senders: HashMap<(String, String), mpsc::Sender<Frame>> = HashMap::new();
        let mut receivers: HashMap<(String, String), mpsc::Receiver<Frame>> = HashMap::new();
        for edge in &self.edges {
            let key = (edge.to.clone(), edge.to_port.clone());
            senders.entry(key.clone()).or_insert_with(|| {
                let (tx, rx) = mpsc::channel(self.channel_capacity);
                receivers.insert(key.clone(), rx);
                tx
            });
        }

        // Fan-out table: for a given (processor, out-port), every downstream
        // sender to push a frame onto, in edge-declaration order.
        let mut fanout: HashMap<(String, String), Vec<mpsc::Sender<Frame>>> = HashMap::new();
        for edge in &self.edges {
            let dest = senders
                .get(&(edge.to.clone(), edge.to_port.clone()))
                .expect("sender created above for every edge target")
                .clone();
            fanout
                .entry((edge.from.clone(), edge.from_port.clone()))
                .or_default()
                .push(dest);
        }

        let mut handles = Vec::new();
        for (name, processor) in self.processors.drain() {
            let mut own_in_ports: Vec<(String, mpsc::Receiver<Frame>)> = receivers
                .keys()
                .filter(|(owner, _)| owner == &name)
                .cloned()
                .collect::<Vec<_>>()
                .into_iter()
                .filter_map(|key| receivers.remove(&key).map(|rx| (key.1, rx)))
                .collect();
            if let Some(extra) = extra_in_ports.remove(&name) {
                own_in_ports.extend(extra);
            }
            let name_for_task = name.clone();
            let fanout_for_task = fanout.clone();
            let stop_for_task = stop.clone();
            handles.push(tokio::spawn(async move {
                run_processor(name_for_task, processor, own_in_ports, fanout_for_task, stop_for_task)
                    .await;
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
        Ok(())
    }
}

async fn run_processor(
    name: String,
    mut processor: Box<dyn Processor>,
    in_ports: Vec<(String, mpsc::Receiver<Frame>)>,
    fanout: HashMap<(String, String), Vec<mpsc::Sender<Frame>>>,
    stop: CancellationToken,
) {
    if in_ports.is_empty() {
        // Source-only processors (e.g. a transport fed by an init-owned
        // worker) have nothing to select on here; they emit entirely through
        // channels they own internally. Just wait for shutdown.
        stop.cancelled().await;
    } else {
        let streams = in_ports.into_iter().map(|(port, rx)| {
            ReceiverStream::new(rx).map(move |frame| (port.clone(), frame))
        });
        let mut merged = select_all(streams);

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                item = merged.next() => {
                    match item {
                        Some((port, frame)) => dispatch(&name, &mut *processor, &port, frame, &fanout).await,
                        None => break,
                    }
                }
            }
        }
    }

    if let Err(err) = processor.transition(Phase::Stop).await {
        tracing::warn!(processor = %name, error = %err, "error during stop transition");
    }
}

async fn dispatch(
    name: &str,
    processor: &mut dyn Processor,
    port: &str,
    frame: Frame,
    fanout: &HashMap<(String, String), Vec<mpsc::Sender<Frame>>>,
) {
    // `transform` itself is synchronous (spec §5: no suspension); only the
    // delivery of its outputs below is async.
    let outputs = processor.transform(port, frame);
    for (out_port, emission) in outputs.into_vec() {
        match emission {
            Emission::Frame(frame) => {
                if let Some(dests) = fanout.get(&(name.to_string(), out_port.clone())) {
                    for dest in dests {
                        if dest.send(frame.clone()).await.is_err() {
                            tracing::debug!(processor = %name, port = %out_port, "downstream port closed");
                        }
                    }
                }
            }
            Emission::Command(_command) => {
                // The generic runtime has no opinion on command execution —
                // a processor that emits commands owns its own executor
                // worker from `init` and reads results back on its own
                // channel (spec §4.12). Nothing to do here but note it.
                tracing::trace!(processor = %name, port = %out_port, "command emitted");
            }
        }
    }
}
