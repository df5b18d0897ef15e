use crate::messages::wire::WireMessage;

/// The outbound half of the transport collaborator: one per connection.
/// Framing, retransmission, and ordering of raw packets are the transport's
/// job; the engine only chooses the payload and the reliability.
pub trait PeerTransport {
    fn send(&mut self, message: &WireMessage, reliable: bool);
}
