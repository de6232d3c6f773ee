// service/offer_service.rs
//
// The offer lifecycle state machine. Every transition runs as one database
// transaction: row-lock the offer, check the guard, move funds, CAS the
// status. A failure anywhere rolls the whole step back, so there is never a
// debit without a status change or a status change without its debit.
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    db::{
        chatdb,
        chatdb::ChatExt,
        db::DBClient,
        ledgerdb, offerdb,
        offerdb::OfferExt,
    },
    models::{
        chatmodel::{ChatSession, Message, MessageKind},
        ledgermodel::{EntryDirection, LedgerEntryKind},
        offermodel::{JobPostingStatus, Offer, OfferStatus},
    },
    service::{
        error::ServiceError,
        events::{chat_topic, offer_topic, CoreEvent, EventBroker},
        job_store::JobPostingStore,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferAction {
    Accept,
    Reject,
    Complete,
    Cancel,
}

impl OfferAction {
    pub fn target_status(&self) -> OfferStatus {
        match self {
            OfferAction::Accept => OfferStatus::Accepted,
            OfferAction::Reject => OfferStatus::Rejected,
            OfferAction::Complete => OfferStatus::Completed,
            OfferAction::Cancel => OfferStatus::Canceled,
        }
    }
}

/// Pure transition guard: authorization first, then the state graph.
/// Accept/reject/complete are advertiser-only; cancel is open to either
/// participant (observed product behavior, kept as-is).
pub fn guard_transition(
    offer: &Offer,
    actor_id: Uuid,
    action: OfferAction,
) -> Result<OfferStatus, ServiceError> {
    let authorized = match action {
        OfferAction::Accept | OfferAction::Reject | OfferAction::Complete => {
            actor_id == offer.advertiser_id
        }
        OfferAction::Cancel => {
            actor_id == offer.advertiser_id || actor_id == offer.applicant_id
        }
    };

    if !authorized {
        return Err(ServiceError::Unauthorized(actor_id, offer.id));
    }

    let target = action.target_status();
    if !offer.status.can_transition_to(target) {
        return Err(ServiceError::InvalidTransition(offer.id, action, offer.status));
    }

    Ok(target)
}

/// Message-write gate: sender must be a participant and the owning offer
/// must currently be accepted.
pub fn ensure_chat_writable(
    session: &ChatSession,
    offer_status: OfferStatus,
    sender_id: Uuid,
) -> Result<(), ServiceError> {
    if !session.is_participant(sender_id) {
        return Err(ServiceError::Unauthorized(sender_id, session.offer_id));
    }
    if offer_status != OfferStatus::Accepted {
        return Err(ServiceError::ChatNotActive(session.id));
    }
    Ok(())
}

#[derive(Clone)]
pub struct OfferService {
    db_client: Arc<DBClient>,
    job_store: Arc<dyn JobPostingStore>,
    events: Arc<EventBroker>,
    min_offer_price: i64,
}

impl OfferService {
    pub fn new(
        db_client: Arc<DBClient>,
        job_store: Arc<dyn JobPostingStore>,
        events: Arc<EventBroker>,
        min_offer_price: i64,
    ) -> Self {
        Self {
            db_client,
            job_store,
            events,
            min_offer_price,
        }
    }

    pub async fn submit_offer(
        &self,
        job_posting_id: Uuid,
        applicant_id: Uuid,
        title: String,
        description: String,
        offer_price: i64,
    ) -> Result<Offer, ServiceError> {
        if offer_price <= 0 {
            return Err(ServiceError::InvalidAmount(offer_price));
        }
        if offer_price < self.min_offer_price {
            return Err(ServiceError::PriceTooLow {
                offered: offer_price,
                minimum: self.min_offer_price,
            });
        }

        let posting = self
            .job_store
            .get_job_posting(job_posting_id)
            .await?
            .filter(|p| p.status == JobPostingStatus::Active)
            .ok_or(ServiceError::JobPostingNotFound(job_posting_id))?;

        // Bidding on your own posting makes no sense.
        if posting.created_by == applicant_id {
            return Err(ServiceError::Unauthorized(applicant_id, job_posting_id));
        }

        let offer = self
            .db_client
            .create_offer(
                job_posting_id,
                applicant_id,
                posting.created_by,
                title,
                description,
                offer_price,
            )
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                    ServiceError::DuplicateOffer {
                        job_posting_id,
                        applicant_id,
                    }
                }
                _ => ServiceError::Database(e),
            })?;

        tracing::info!(
            "offer {} submitted on job {} by applicant {} at {}",
            offer.id,
            job_posting_id,
            applicant_id,
            offer_price
        );

        self.publish_offer_changed(&offer).await;
        Ok(offer)
    }

    /// Escrow-hold acceptance. Retried accepts on an already-accepted offer
    /// are a no-op that returns the existing chat session; the advertiser is
    /// debited exactly once.
    pub async fn accept(
        &self,
        offer_id: Uuid,
        actor_id: Uuid,
    ) -> Result<(Offer, ChatSession), ServiceError> {
        let mut tx = self.db_client.pool.begin().await?;

        let offer = offerdb::get_offer_for_update(&mut tx, offer_id)
            .await?
            .ok_or(ServiceError::OfferNotFound(offer_id))?;

        if offer.status == OfferStatus::Accepted {
            if actor_id != offer.advertiser_id {
                return Err(ServiceError::Unauthorized(actor_id, offer_id));
            }
            let session = chatdb::get_or_create_session(&mut tx, &offer).await?;
            tx.commit().await?;
            tracing::debug!("accept retried on offer {}, returning existing session", offer_id);
            return Ok((offer, session));
        }

        guard_transition(&offer, actor_id, OfferAction::Accept)?;

        let available = ledgerdb::lock_balance(&mut tx, offer.advertiser_id)
            .await?
            .ok_or(ServiceError::UserNotFound(offer.advertiser_id))?;

        if available < offer.offer_price {
            // Dropping the transaction rolls everything back; the balance
            // and the offer stay untouched.
            return Err(ServiceError::InsufficientFunds {
                required: offer.offer_price,
                available,
            });
        }

        ledgerdb::apply_debit(
            &mut tx,
            offer.advertiser_id,
            Some(offer.id),
            offer.offer_price,
            LedgerEntryKind::EscrowDebit,
            "Escrow hold",
            None,
        )
        .await?;

        let updated = offerdb::update_status_guarded(
            &mut tx,
            offer_id,
            OfferStatus::Pending,
            OfferStatus::Accepted,
        )
        .await?
        .ok_or(ServiceError::InvalidTransition(
            offer_id,
            OfferAction::Accept,
            offer.status,
        ))?;

        let session = chatdb::get_or_create_session(&mut tx, &updated).await?;

        tx.commit().await?;

        tracing::info!(
            "offer {} accepted by advertiser {}, {} held in escrow",
            offer_id,
            actor_id,
            updated.offer_price
        );

        self.publish_offer_changed(&updated).await;
        Ok((updated, session))
    }

    pub async fn reject(&self, offer_id: Uuid, actor_id: Uuid) -> Result<Offer, ServiceError> {
        let mut tx = self.db_client.pool.begin().await?;

        let offer = offerdb::get_offer_for_update(&mut tx, offer_id)
            .await?
            .ok_or(ServiceError::OfferNotFound(offer_id))?;

        guard_transition(&offer, actor_id, OfferAction::Reject)?;

        // Funds were never held for a pending offer; no ledger effect.
        let updated = offerdb::update_status_guarded(
            &mut tx,
            offer_id,
            OfferStatus::Pending,
            OfferStatus::Rejected,
        )
        .await?
        .ok_or(ServiceError::InvalidTransition(
            offer_id,
            OfferAction::Reject,
            offer.status,
        ))?;

        tx.commit().await?;

        tracing::info!("offer {} rejected by advertiser {}", offer_id, actor_id);
        self.publish_offer_changed(&updated).await;
        Ok(updated)
    }

    /// Releases the escrow to the applicant and records a settlement entry
    /// for each party. A second complete fails the status guard and leaves
    /// balances unchanged.
    pub async fn complete(&self, offer_id: Uuid, actor_id: Uuid) -> Result<Offer, ServiceError> {
        let mut tx = self.db_client.pool.begin().await?;

        let offer = offerdb::get_offer_for_update(&mut tx, offer_id)
            .await?
            .ok_or(ServiceError::OfferNotFound(offer_id))?;

        guard_transition(&offer, actor_id, OfferAction::Complete)?;

        // Both balances are locked in ascending-id order before any update,
        // so two settlements with swapped roles cannot deadlock.
        let mut advertiser_balance = None;
        for user_id in ledgerdb::lock_order(offer.advertiser_id, offer.applicant_id) {
            let balance = ledgerdb::lock_balance(&mut tx, user_id)
                .await?
                .ok_or(ServiceError::UserNotFound(user_id))?;
            if user_id == offer.advertiser_id {
                advertiser_balance = Some(balance);
            }
        }
        let advertiser_balance =
            advertiser_balance.ok_or(ServiceError::UserNotFound(offer.advertiser_id))?;

        ledgerdb::apply_credit(
            &mut tx,
            offer.applicant_id,
            Some(offer.id),
            offer.offer_price,
            LedgerEntryKind::EscrowCredit,
            "Sale proceeds",
            None,
        )
        .await?;

        // The advertiser's balance already moved at accept time; this entry
        // only records the purchase side of the settlement.
        ledgerdb::record_entry(
            &mut tx,
            offer.advertiser_id,
            Some(offer.id),
            LedgerEntryKind::EscrowCredit,
            EntryDirection::Debit,
            offer.offer_price,
            advertiser_balance,
            "Purchase settlement",
            None,
        )
        .await?;

        let updated = offerdb::update_status_guarded(
            &mut tx,
            offer_id,
            OfferStatus::Accepted,
            OfferStatus::Completed,
        )
        .await?
        .ok_or(ServiceError::InvalidTransition(
            offer_id,
            OfferAction::Complete,
            offer.status,
        ))?;

        tx.commit().await?;

        tracing::info!(
            "offer {} completed, {} released to applicant {}",
            offer_id,
            updated.offer_price,
            updated.applicant_id
        );

        self.publish_offer_changed(&updated).await;
        Ok(updated)
    }

    /// Returns the escrowed amount to the advertiser. Either participant may
    /// cancel an accepted offer.
    pub async fn cancel(&self, offer_id: Uuid, actor_id: Uuid) -> Result<Offer, ServiceError> {
        let mut tx = self.db_client.pool.begin().await?;

        let offer = offerdb::get_offer_for_update(&mut tx, offer_id)
            .await?
            .ok_or(ServiceError::OfferNotFound(offer_id))?;

        guard_transition(&offer, actor_id, OfferAction::Cancel)?;

        ledgerdb::apply_credit(
            &mut tx,
            offer.advertiser_id,
            Some(offer.id),
            offer.offer_price,
            LedgerEntryKind::Refund,
            "Escrow refund",
            None,
        )
        .await?;

        let updated = offerdb::update_status_guarded(
            &mut tx,
            offer_id,
            OfferStatus::Accepted,
            OfferStatus::Canceled,
        )
        .await?
        .ok_or(ServiceError::InvalidTransition(
            offer_id,
            OfferAction::Cancel,
            offer.status,
        ))?;

        tx.commit().await?;

        tracing::info!(
            "offer {} canceled by {}, {} refunded to advertiser {}",
            offer_id,
            actor_id,
            updated.offer_price,
            updated.advertiser_id
        );

        self.publish_offer_changed(&updated).await;
        Ok(updated)
    }

    /// Appends a chat message under a shared lock on the owning offer. The
    /// accepted-only gate and the insert commit in one transaction, so a
    /// transition landing concurrently either waits behind the lock or has
    /// already flipped the status the gate reads.
    pub async fn post_message(
        &self,
        session_id: Uuid,
        sender_id: Uuid,
        kind: MessageKind,
        content: String,
        media_ref: Option<String>,
    ) -> Result<Message, ServiceError> {
        let session = self
            .db_client
            .get_session(session_id)
            .await?
            .ok_or(ServiceError::ChatNotFound(session_id))?;

        let mut tx = self.db_client.pool.begin().await?;

        let offer = offerdb::get_offer_for_share(&mut tx, session.offer_id)
            .await?
            .ok_or(ServiceError::OfferNotFound(session.offer_id))?;

        ensure_chat_writable(&session, offer.status, sender_id)?;

        let message =
            chatdb::append_message(&mut tx, session_id, sender_id, kind, content, media_ref)
                .await?;

        tx.commit().await?;

        self.events
            .publish(
                &chat_topic(session_id),
                CoreEvent::ChatMessage {
                    session_id,
                    message_id: message.id,
                    sender_id: message.sender_id,
                },
            )
            .await;

        Ok(message)
    }

    async fn publish_offer_changed(&self, offer: &Offer) {
        tracing::debug!("offer {} now {}", offer.id, offer.status.to_str());
        self.events
            .publish(
                &offer_topic(offer.id),
                CoreEvent::OfferChanged {
                    offer_id: offer.id,
                    status: offer.status,
                },
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn offer(advertiser: Uuid, applicant: Uuid, price: i64, status: OfferStatus) -> Offer {
        Offer {
            id: Uuid::new_v4(),
            job_posting_id: Uuid::new_v4(),
            applicant_id: applicant,
            advertiser_id: advertiser,
            title: "Fix the fence".to_string(),
            description: String::new(),
            offer_price: price,
            status,
            created_at: None,
            updated_at: None,
        }
    }

    fn session_for(o: &Offer) -> ChatSession {
        ChatSession {
            id: Uuid::new_v4(),
            offer_id: o.id,
            advertiser_id: o.advertiser_id,
            applicant_id: o.applicant_id,
            last_message_at: None,
            created_at: None,
        }
    }

    #[test]
    fn only_advertiser_may_accept_reject_complete() {
        let advertiser = Uuid::new_v4();
        let applicant = Uuid::new_v4();

        let pending = offer(advertiser, applicant, 5000, OfferStatus::Pending);
        assert!(matches!(
            guard_transition(&pending, applicant, OfferAction::Accept),
            Err(ServiceError::Unauthorized(_, _))
        ));
        assert!(matches!(
            guard_transition(&pending, applicant, OfferAction::Reject),
            Err(ServiceError::Unauthorized(_, _))
        ));
        assert!(guard_transition(&pending, advertiser, OfferAction::Accept).is_ok());

        let accepted = offer(advertiser, applicant, 5000, OfferStatus::Accepted);
        assert!(matches!(
            guard_transition(&accepted, applicant, OfferAction::Complete),
            Err(ServiceError::Unauthorized(_, _))
        ));
        assert!(guard_transition(&accepted, advertiser, OfferAction::Complete).is_ok());
    }

    #[test]
    fn either_participant_may_cancel_but_nobody_else() {
        let advertiser = Uuid::new_v4();
        let applicant = Uuid::new_v4();
        let accepted = offer(advertiser, applicant, 5000, OfferStatus::Accepted);

        assert!(guard_transition(&accepted, advertiser, OfferAction::Cancel).is_ok());
        assert!(guard_transition(&accepted, applicant, OfferAction::Cancel).is_ok());
        assert!(matches!(
            guard_transition(&accepted, Uuid::new_v4(), OfferAction::Cancel),
            Err(ServiceError::Unauthorized(_, _))
        ));
    }

    #[test]
    fn terminal_offers_refuse_every_action() {
        let advertiser = Uuid::new_v4();
        let applicant = Uuid::new_v4();

        for status in [
            OfferStatus::Rejected,
            OfferStatus::Completed,
            OfferStatus::Canceled,
        ] {
            let o = offer(advertiser, applicant, 5000, status);
            for action in [
                OfferAction::Accept,
                OfferAction::Reject,
                OfferAction::Complete,
                OfferAction::Cancel,
            ] {
                assert!(matches!(
                    guard_transition(&o, advertiser, action),
                    Err(ServiceError::InvalidTransition(_, _, _))
                ));
            }
        }
    }

    #[test]
    fn chat_gate_requires_participant_and_accepted_offer() {
        let advertiser = Uuid::new_v4();
        let applicant = Uuid::new_v4();
        let o = offer(advertiser, applicant, 5000, OfferStatus::Accepted);
        let session = session_for(&o);

        assert!(ensure_chat_writable(&session, OfferStatus::Accepted, applicant).is_ok());
        assert!(ensure_chat_writable(&session, OfferStatus::Accepted, advertiser).is_ok());
        assert!(matches!(
            ensure_chat_writable(&session, OfferStatus::Accepted, Uuid::new_v4()),
            Err(ServiceError::Unauthorized(_, _))
        ));
    }

    // In-memory double for the balance side of a transition, used to walk
    // the end-to-end scenarios without a database.
    struct TestLedger {
        balances: HashMap<Uuid, i64>,
    }

    impl TestLedger {
        fn new(entries: &[(Uuid, i64)]) -> Self {
            Self {
                balances: entries.iter().copied().collect(),
            }
        }

        fn balance(&self, user: Uuid) -> i64 {
            self.balances[&user]
        }

        fn accept(&mut self, o: &mut Offer, actor: Uuid) -> Result<ChatSession, ServiceError> {
            guard_transition(o, actor, OfferAction::Accept)?;
            let available = self.balance(o.advertiser_id);
            if available < o.offer_price {
                return Err(ServiceError::InsufficientFunds {
                    required: o.offer_price,
                    available,
                });
            }
            *self.balances.get_mut(&o.advertiser_id).unwrap() -= o.offer_price;
            o.status = OfferStatus::Accepted;
            Ok(session_for(o))
        }

        fn complete(&mut self, o: &mut Offer, actor: Uuid) -> Result<(), ServiceError> {
            guard_transition(o, actor, OfferAction::Complete)?;
            *self.balances.get_mut(&o.applicant_id).unwrap() += o.offer_price;
            o.status = OfferStatus::Completed;
            Ok(())
        }

        fn cancel(&mut self, o: &mut Offer, actor: Uuid) -> Result<(), ServiceError> {
            guard_transition(o, actor, OfferAction::Cancel)?;
            *self.balances.get_mut(&o.advertiser_id).unwrap() += o.offer_price;
            o.status = OfferStatus::Canceled;
            Ok(())
        }
    }

    #[test]
    fn scenario_accept_holds_escrow_and_opens_chat() {
        let advertiser = Uuid::new_v4();
        let applicant = Uuid::new_v4();
        let mut ledger = TestLedger::new(&[(advertiser, 100), (applicant, 0)]);
        let mut o = offer(advertiser, applicant, 50, OfferStatus::Pending);

        let session = ledger.accept(&mut o, advertiser).unwrap();

        assert_eq!(ledger.balance(advertiser), 50);
        assert_eq!(o.status, OfferStatus::Accepted);
        assert_eq!(session.offer_id, o.id);
    }

    #[test]
    fn scenario_complete_pays_applicant_once() {
        let advertiser = Uuid::new_v4();
        let applicant = Uuid::new_v4();
        let mut ledger = TestLedger::new(&[(advertiser, 100), (applicant, 0)]);
        let mut o = offer(advertiser, applicant, 50, OfferStatus::Pending);

        ledger.accept(&mut o, advertiser).unwrap();
        ledger.complete(&mut o, advertiser).unwrap();

        assert_eq!(ledger.balance(applicant), 50);
        assert_eq!(ledger.balance(advertiser), 50);
        assert_eq!(o.status, OfferStatus::Completed);

        // Second complete fails the status guard and moves no money.
        assert!(matches!(
            ledger.complete(&mut o, advertiser),
            Err(ServiceError::InvalidTransition(_, _, _))
        ));
        assert_eq!(ledger.balance(applicant), 50);
        assert_eq!(ledger.balance(advertiser), 50);
    }

    #[test]
    fn scenario_cancel_restores_advertiser_balance() {
        let advertiser = Uuid::new_v4();
        let applicant = Uuid::new_v4();
        let mut ledger = TestLedger::new(&[(advertiser, 100), (applicant, 0)]);
        let mut o = offer(advertiser, applicant, 50, OfferStatus::Pending);

        ledger.accept(&mut o, advertiser).unwrap();
        ledger.cancel(&mut o, advertiser).unwrap();

        assert_eq!(ledger.balance(advertiser), 100);
        assert_eq!(ledger.balance(applicant), 0);
        assert_eq!(o.status, OfferStatus::Canceled);
    }

    #[test]
    fn scenario_insufficient_funds_aborts_accept() {
        let advertiser = Uuid::new_v4();
        let applicant = Uuid::new_v4();
        let mut ledger = TestLedger::new(&[(advertiser, 10), (applicant, 0)]);
        let mut o = offer(advertiser, applicant, 50, OfferStatus::Pending);

        assert!(matches!(
            ledger.accept(&mut o, advertiser),
            Err(ServiceError::InsufficientFunds {
                required: 50,
                available: 10
            })
        ));
        assert_eq!(o.status, OfferStatus::Pending);
        assert_eq!(ledger.balance(advertiser), 10);
    }

    #[test]
    fn scenario_chat_closes_when_offer_completes() {
        let advertiser = Uuid::new_v4();
        let applicant = Uuid::new_v4();
        let mut ledger = TestLedger::new(&[(advertiser, 100), (applicant, 0)]);
        let mut o = offer(advertiser, applicant, 50, OfferStatus::Pending);

        let session = ledger.accept(&mut o, advertiser).unwrap();
        ledger.complete(&mut o, advertiser).unwrap();

        assert!(matches!(
            ensure_chat_writable(&session, o.status, applicant),
            Err(ServiceError::ChatNotActive(_))
        ));
    }

    #[test]
    fn scenario_message_racing_a_transition_sees_the_final_status() {
        let advertiser = Uuid::new_v4();
        let applicant = Uuid::new_v4();
        let mut ledger = TestLedger::new(&[(advertiser, 100), (applicant, 0)]);
        let mut o = offer(advertiser, applicant, 50, OfferStatus::Pending);

        let session = ledger.accept(&mut o, advertiser).unwrap();

        // The sender's cached view still says accepted, but the completion
        // lands first. The write gate runs against the status read under
        // the lock at insert time, not the sender's snapshot.
        let stale_view = o.status;
        assert_eq!(stale_view, OfferStatus::Accepted);
        ledger.complete(&mut o, advertiser).unwrap();

        assert!(matches!(
            ensure_chat_writable(&session, o.status, applicant),
            Err(ServiceError::ChatNotActive(_))
        ));
    }

    #[test]
    fn escrow_sum_is_conserved_across_accept_and_complete() {
        let advertiser = Uuid::new_v4();
        let applicant = Uuid::new_v4();
        let mut ledger = TestLedger::new(&[(advertiser, 100), (applicant, 30)]);
        let mut o = offer(advertiser, applicant, 50, OfferStatus::Pending);

        let total_before = ledger.balance(advertiser) + ledger.balance(applicant);
        ledger.accept(&mut o, advertiser).unwrap();
        // Held amount plus both balances equals the starting total.
        assert_eq!(
            ledger.balance(advertiser) + ledger.balance(applicant) + o.offer_price,
            total_before
        );
        ledger.complete(&mut o, advertiser).unwrap();
        assert_eq!(
            ledger.balance(advertiser) + ledger.balance(applicant),
            total_before
        );
    }
}
