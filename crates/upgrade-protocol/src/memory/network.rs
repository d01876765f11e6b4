use std::collections::BTreeMap;

use async_trait::async_trait;
use strata_upgrade_types::PubKey;
use tokio::sync::{mpsc, Mutex};
use tracing::*;

use crate::{errors::TransportError, transport::UpgradeMessage, PeerTransport};

/// Fully connected set of participants, one mpsc channel per ordered pair.
#[derive(Debug)]
pub struct InMemoryNetwork {
    endpoints: BTreeMap<PubKey, InMemoryEndpoint>,
}

impl InMemoryNetwork {
    pub fn new(participants: &[PubKey], capacity: usize) -> Self {
        let mut outboxes: BTreeMap<PubKey, BTreeMap<PubKey, mpsc::Sender<UpgradeMessage>>> =
            BTreeMap::new();
        let mut inboxes: BTreeMap<PubKey, BTreeMap<PubKey, Mutex<mpsc::Receiver<UpgradeMessage>>>> =
            BTreeMap::new();

        for from in participants {
            for to in participants.iter().filter(|to| *to != from) {
                let (tx, rx) = mpsc::channel(capacity);
                outboxes.entry(*from).or_default().insert(*to, tx);
                inboxes.entry(*to).or_default().insert(*from, Mutex::new(rx));
            }
        }

        let endpoints = participants
            .iter()
            .map(|me| {
                let endpoint = InMemoryEndpoint {
                    me: *me,
                    outboxes: outboxes.remove(me).unwrap_or_default(),
                    inboxes: inboxes.remove(me).unwrap_or_default(),
                };
                (*me, endpoint)
            })
            .collect();

        Self { endpoints }
    }

    /// Takes the endpoint owned by `key`. Each endpoint can only be taken once.
    pub fn take_endpoint(&mut self, key: &PubKey) -> Option<InMemoryEndpoint> {
        self.endpoints.remove(key)
    }

    pub fn into_endpoints(self) -> BTreeMap<PubKey, InMemoryEndpoint> {
        self.endpoints
    }
}

/// One participant's end of an [`InMemoryNetwork`].
///
/// Dropping it closes all of its channels, so peers see sends to it fail.
#[derive(Debug)]
pub struct InMemoryEndpoint {
    me: PubKey,
    outboxes: BTreeMap<PubKey, mpsc::Sender<UpgradeMessage>>,
    inboxes: BTreeMap<PubKey, Mutex<mpsc::Receiver<UpgradeMessage>>>,
}

impl InMemoryEndpoint {
    pub fn key(&self) -> &PubKey {
        &self.me
    }
}

#[async_trait]
impl PeerTransport for InMemoryEndpoint {
    async fn send(&self, to: &PubKey, msg: UpgradeMessage) -> Result<(), TransportError> {
        let outbox = self
            .outboxes
            .get(to)
            .ok_or(TransportError::UnknownPeer(*to))?;
        trace!(from = %self.me, %to, kind = msg.kind(), "sending message");
        outbox
            .send(msg)
            .await
            .map_err(|_| TransportError::ChannelClosed(*to))
    }

    async fn recv_from(&self, from: &PubKey) -> Result<UpgradeMessage, TransportError> {
        let inbox = self
            .inboxes
            .get(from)
            .ok_or(TransportError::UnknownPeer(*from))?;
        let msg = inbox
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::ChannelClosed(*from))?;
        trace!(to = %self.me, %from, kind = msg.kind(), "received message");
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use strata_upgrade_types::{Buf32, TxId};

    use super::*;

    fn abort(b: u8) -> UpgradeMessage {
        UpgradeMessage::Abort {
            txid: TxId::from([b; 32]),
            reason: String::new(),
        }
    }

    #[tokio::test]
    async fn test_point_to_point_delivery() {
        let keys = [Buf32::new([1; 32]), Buf32::new([2; 32]), Buf32::new([3; 32])];
        let mut net = InMemoryNetwork::new(&keys, 4);
        let a = net.take_endpoint(&keys[0]).unwrap();
        let b = net.take_endpoint(&keys[1]).unwrap();
        let c = net.take_endpoint(&keys[2]).unwrap();

        a.send(&keys[1], abort(1)).await.unwrap();
        a.send(&keys[1], abort(2)).await.unwrap();
        c.send(&keys[1], abort(3)).await.unwrap();

        assert_eq!(b.recv_from(&keys[2]).await.unwrap(), abort(3));
        assert_eq!(b.recv_from(&keys[0]).await.unwrap(), abort(1));
        assert_eq!(b.recv_from(&keys[0]).await.unwrap(), abort(2));
        assert!(net.take_endpoint(&keys[0]).is_none());
    }

    #[tokio::test]
    async fn test_unknown_and_closed_peers() {
        let keys = [Buf32::new([1; 32]), Buf32::new([2; 32])];
        let mut endpoints = InMemoryNetwork::new(&keys, 4).into_endpoints();
        let a = endpoints.remove(&keys[0]).unwrap();

        let stranger = Buf32::new([9; 32]);
        assert_eq!(
            a.send(&stranger, abort(1)).await,
            Err(TransportError::UnknownPeer(stranger))
        );

        drop(endpoints);
        assert_eq!(
            a.send(&keys[1], abort(1)).await,
            Err(TransportError::ChannelClosed(keys[1]))
        );
        assert_eq!(
            a.recv_from(&keys[1]).await,
            Err(TransportError::ChannelClosed(keys[1]))
        );
    }
}
