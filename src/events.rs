use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::LoanId;

/// notifications emitted once the matching ledger change is committed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    EmiReminder {
        loan_id: LoanId,
        installment_no: u32,
        amount: Money,
        due_date: NaiveDate,
    },
    EmiDueToday {
        loan_id: LoanId,
        installment_no: u32,
        amount: Money,
        due_date: NaiveDate,
    },
    PaymentOverdue {
        loan_id: LoanId,
        installment_no: u32,
        amount: Money,
        penalty: Money,
    },
    LoanCompleted {
        loan_id: LoanId,
    },
    LoanDefaulted {
        loan_id: LoanId,
        oldest_due_date: NaiveDate,
    },
}

impl Event {
    pub fn loan_id(&self) -> LoanId {
        match self {
            Event::EmiReminder { loan_id, .. }
            | Event::EmiDueToday { loan_id, .. }
            | Event::PaymentOverdue { loan_id, .. }
            | Event::LoanCompleted { loan_id }
            | Event::LoanDefaulted { loan_id, .. } => *loan_id,
        }
    }
}

/// Outbound notification channel. Fire-and-forget: delivery failures are the
/// implementor's concern and never flow back into the ledger.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: Event);

    fn notify_all(&self, events: Vec<Event>) {
        for event in events {
            self.notify(event);
        }
    }
}

/// in-process recorder, useful for tests and for hosts that drain events in batches
#[derive(Debug, Default)]
pub struct EventStore {
    events: Mutex<Vec<Event>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: Event) {
        self.events.lock().push(event);
    }

    pub fn take_events(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }

    /// snapshot of everything recorded so far
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Notifier for EventStore {
    fn notify(&self, event: Event) {
        self.emit(event);
    }
}
