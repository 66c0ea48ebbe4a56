use crate::message::{Message, Packet, Stream};
use crate::topology::{NodeId, TreeTopology};
use crate::TreeDbscanError;
use std::collections::VecDeque;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Messaging layer of the reduction tree as seen from one node.
///
/// Sends never block. Messages between two nodes are delivered in order within a stream.
pub trait Transport {
    fn node(&self) -> NodeId;

    fn num_children(&self) -> usize;

    /// Number of other children of this node's parent.
    fn num_siblings(&self) -> usize;

    /// Sends a message to the parent. Fails on the root.
    fn send_up(&self, message: Message) -> Result<(), TreeDbscanError>;

    /// Sends a copy of the message to every child.
    fn send_down(&self, message: Message) -> Result<(), TreeDbscanError>;

    /// Next packet on any stream, blocking until one arrives.
    fn recv(&mut self) -> Result<Packet, TreeDbscanError>;

    /// Next packet on the given stream. Packets of other streams arriving meanwhile are kept for
    /// later calls.
    fn recv_on(&mut self, stream: Stream) -> Result<Packet, TreeDbscanError>;
}

#[derive(Debug)]
enum Delivery {
    Packet(Packet),
    Abort(NodeId),
}

/// Wakes every node of a wired tree up with an error, so a failure cannot leave the rest of the
/// tree waiting forever.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    inboxes: Vec<UnboundedSender<Delivery>>,
}

impl AbortHandle {
    pub fn abort(&self, failed: NodeId) {
        for inbox in &self.inboxes {
            // Nodes that already finished dropped their inbox
            let _ = inbox.send(Delivery::Abort(failed));
        }
    }
}

/// In-process transport over tokio unbounded channels, one inbox per node. Meant to be driven from
/// plain OS threads through `blocking_recv`.
#[derive(Debug)]
pub struct ChannelTransport {
    node: NodeId,
    parent: Option<UnboundedSender<Delivery>>,
    children: Vec<UnboundedSender<Delivery>>,
    num_siblings: usize,
    inbox: UnboundedReceiver<Delivery>,
    pending: VecDeque<Packet>,
}

impl ChannelTransport {
    /// Creates the endpoints of every node of the topology, indexed by node id, and the handle
    /// that aborts them all.
    pub fn wire(topology: &TreeTopology) -> (Vec<ChannelTransport>, AbortHandle) {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            topology.nodes().map(|_| unbounded_channel::<Delivery>()).unzip();

        let transports = receivers
            .into_iter()
            .enumerate()
            .map(|(node, inbox)| ChannelTransport {
                node,
                parent: topology.parent(node).map(|p| senders[p].clone()),
                children: topology.children(node).iter().map(|&c| senders[c].clone()).collect(),
                num_siblings: topology.siblings(node).len(),
                inbox,
                pending: VecDeque::new(),
            })
            .collect();
        (transports, AbortHandle { inboxes: senders })
    }

    fn receive(&mut self) -> Result<Packet, TreeDbscanError> {
        match self.inbox.blocking_recv() {
            Some(Delivery::Packet(packet)) => Ok(packet),
            Some(Delivery::Abort(failed)) => Err(TreeDbscanError::Transport(format!(
                "run aborted after node {failed} failed"
            ))),
            None => Err(TreeDbscanError::Transport(format!("inbox of node {} closed", self.node))),
        }
    }
}

impl Transport for ChannelTransport {
    fn node(&self) -> NodeId {
        self.node
    }

    fn num_children(&self) -> usize {
        self.children.len()
    }

    fn num_siblings(&self) -> usize {
        self.num_siblings
    }

    fn send_up(&self, message: Message) -> Result<(), TreeDbscanError> {
        let parent = self.parent.as_ref().ok_or_else(|| {
            TreeDbscanError::Transport(format!("node {} has no parent", self.node))
        })?;
        parent.send(Delivery::Packet(Packet::up(self.node, message))).map_err(|_| {
            TreeDbscanError::Transport(format!("parent of node {} is gone", self.node))
        })
    }

    fn send_down(&self, message: Message) -> Result<(), TreeDbscanError> {
        for child in &self.children {
            child.send(Delivery::Packet(Packet::down(self.node, message.clone()))).map_err(|_| {
                TreeDbscanError::Transport(format!("a child of node {} is gone", self.node))
            })?;
        }
        Ok(())
    }

    fn recv(&mut self) -> Result<Packet, TreeDbscanError> {
        match self.pending.pop_front() {
            Some(packet) => Ok(packet),
            None => self.receive(),
        }
    }

    fn recv_on(&mut self, stream: Stream) -> Result<Packet, TreeDbscanError> {
        if let Some(idx) = self.pending.iter().position(|p| p.stream == stream) {
            if let Some(packet) = self.pending.remove(idx) {
                return Ok(packet);
            }
        }
        loop {
            let packet = self.receive()?;
            if packet.stream == stream {
                return Ok(packet);
            }
            self.pending.push_back(packet);
        }
    }
}
