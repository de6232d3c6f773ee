// service/events.rs
//
// In-process fan-out of state changes to presentation-layer subscribers.
// Updates flow core -> subscriber only; delivery is at-least-once and
// consumers tolerate duplicates.
use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::models::offermodel::OfferStatus;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CoreEvent {
    OfferChanged {
        offer_id: Uuid,
        status: OfferStatus,
    },
    ChatMessage {
        session_id: Uuid,
        message_id: Uuid,
        sender_id: Uuid,
    },
}

pub fn offer_topic(offer_id: Uuid) -> String {
    format!("offer:{}", offer_id)
}

pub fn chat_topic(session_id: Uuid) -> String {
    format!("chat:{}", session_id)
}

#[derive(Debug, Clone)]
pub struct EventBroker {
    topics: Arc<RwLock<HashMap<String, broadcast::Sender<CoreEvent>>>>,
}

impl Default for EventBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroker {
    pub fn new() -> Self {
        Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Publish never blocks and never fails; a topic with no subscribers is
    /// pruned so abandoned entities do not accumulate senders.
    pub async fn publish(&self, topic: &str, event: CoreEvent) {
        let mut topics = self.topics.write().await;
        if let Some(sender) = topics.get(topic) {
            if sender.send(event).is_err() {
                // Last receiver is gone.
                topics.remove(topic);
            }
        }
    }

    /// Subscribing creates the topic on demand. Dropping the returned
    /// receiver is all a subscriber needs to do to cancel; other
    /// subscribers on the topic are unaffected.
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<CoreEvent> {
        let mut topics = self.topics.write().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub async fn topic_count(&self) -> usize {
        self.topics.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let broker = EventBroker::new();
        let offer_id = Uuid::new_v4();
        let topic = offer_topic(offer_id);

        let mut rx = broker.subscribe(&topic).await;
        broker
            .publish(
                &topic,
                CoreEvent::OfferChanged {
                    offer_id,
                    status: OfferStatus::Accepted,
                },
            )
            .await;

        match rx.recv().await.unwrap() {
            CoreEvent::OfferChanged { offer_id: id, status } => {
                assert_eq!(id, offer_id);
                assert_eq!(status, OfferStatus::Accepted);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn fan_out_reaches_every_subscriber() {
        let broker = EventBroker::new();
        let session_id = Uuid::new_v4();
        let topic = chat_topic(session_id);

        let mut rx1 = broker.subscribe(&topic).await;
        let mut rx2 = broker.subscribe(&topic).await;

        broker
            .publish(
                &topic,
                CoreEvent::ChatMessage {
                    session_id,
                    message_id: Uuid::new_v4(),
                    sender_id: Uuid::new_v4(),
                },
            )
            .await;

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn dropping_one_subscriber_leaves_others_intact() {
        let broker = EventBroker::new();
        let topic = offer_topic(Uuid::new_v4());

        let rx1 = broker.subscribe(&topic).await;
        let mut rx2 = broker.subscribe(&topic).await;
        drop(rx1);

        broker
            .publish(
                &topic,
                CoreEvent::OfferChanged {
                    offer_id: Uuid::new_v4(),
                    status: OfferStatus::Completed,
                },
            )
            .await;

        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn abandoned_topics_are_pruned_on_publish() {
        let broker = EventBroker::new();
        let topic = offer_topic(Uuid::new_v4());

        let rx = broker.subscribe(&topic).await;
        assert_eq!(broker.topic_count().await, 1);
        drop(rx);

        broker
            .publish(
                &topic,
                CoreEvent::OfferChanged {
                    offer_id: Uuid::new_v4(),
                    status: OfferStatus::Canceled,
                },
            )
            .await;

        assert_eq!(broker.topic_count().await, 0);
    }

    #[tokio::test]
    async fn unrelated_topics_do_not_cross_deliver() {
        let broker = EventBroker::new();
        let topic_a = offer_topic(Uuid::new_v4());
        let topic_b = offer_topic(Uuid::new_v4());

        let mut rx_b = broker.subscribe(&topic_b).await;
        broker
            .publish(
                &topic_a,
                CoreEvent::OfferChanged {
                    offer_id: Uuid::new_v4(),
                    status: OfferStatus::Pending,
                },
            )
            .await;

        assert!(rx_b.try_recv().is_err());
    }
}
