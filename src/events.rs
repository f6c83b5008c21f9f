// 11.0: every state change produces an event. used for audit trails and for
// reconstructing what the vault did across shifts, slides and sweeps.
// the log is bounded; the oldest events are dropped first.

use crate::position::Slot;
use crate::types::{AccountId, Amount, Holder, Liquidity, Tick, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Liquidity events
    Initialized(InitializedEvent),
    RangeDeployed(RangeEvent),
    RangeWithdrawn(RangeEvent),
    Shifted(ShiftEvent),
    Slid(SlideEvent),

    // Lending events
    LoanOpened(LoanOpenedEvent),
    LoanRepaid(LoanRepaidEvent),
    LoanRolled(LoanRolledEvent),
    CollateralAdded(CollateralAddedEvent),
    LoanDefaulted(LoanDefaultedEvent),
    SelfRepaySwept(SelfRepaySweptEvent),

    // Treasury events
    ProtocolFunded(ProtocolFundedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializedEvent {
    pub spot_tick: Tick,
    pub floor_price: Decimal,
    pub total_supply: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeEvent {
    pub slot: Slot,
    pub lower: Tick,
    pub upper: Tick,
    pub liquidity: Liquidity,
    pub token: Amount,
    pub reserve: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftEvent {
    pub spot_tick: Tick,
    pub previous_floor_tick: Tick,
    pub new_floor_tick: Tick,
    pub minted: Amount,
    pub skimmed: Amount,
    pub circulating: Amount,
    pub floor_top_up: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideEvent {
    pub spot_tick: Tick,
    pub burned: Amount,
    pub circulating: Amount,
    pub floor_top_up: Amount,
    pub anchor_lower: Tick,
    pub anchor_upper: Tick,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanOpenedEvent {
    pub borrower: AccountId,
    pub borrowed: Amount,
    pub collateral: Amount,
    pub fee: Amount,
    pub expiry: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRepaidEvent {
    pub borrower: AccountId,
    pub repaid: Amount,
    pub collateral_released: Amount,
    pub self_repaid: bool,
    pub closed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRolledEvent {
    pub borrower: AccountId,
    pub increment: Amount,
    pub fee: Amount,
    pub new_expiry: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralAddedEvent {
    pub borrower: AccountId,
    pub amount: Amount,
    pub total_collateral: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanDefaultedEvent {
    pub borrower: AccountId,
    pub borrowed: Amount,
    pub seized: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfRepaySweptEvent {
    pub eligible: usize,
    pub total_repaid: Amount,
    pub next_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolFundedEvent {
    pub from: Holder,
    pub amount: Amount,
    pub balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<Event>,
    next_id: u64,
    max_events: usize,
}

impl EventLog {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
            max_events,
        }
    }

    pub fn record(&mut self, timestamp: Timestamp, payload: EventPayload) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        tracing::debug!(event_id = id.0, %timestamp, ?payload, "event");
        self.events.push(Event::new(id, timestamp, payload));

        if self.events.len() > self.max_events {
            let drain_count = self.events.len() - self.max_events;
            self.events.drain(0..drain_count);
        }
        id
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
