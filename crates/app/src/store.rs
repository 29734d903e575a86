//! In-memory aggregate arena.
//!
//! One arena per aggregate type, keyed by the aggregate's typed id. `execute`
//! holds the write lock across handle → journal append → apply, so mutations
//! on the same key are serialized and a rejected command leaves both the
//! aggregate and the journal untouched.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use uuid::Uuid;

use shopledger_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use shopledger_events::{Event, Journal, JournalEntry};

use crate::error::{AppError, AppResult};

pub struct Arena<A: Aggregate<Error = DomainError>> {
    /// Journal stream label, e.g. `"order"`.
    name: &'static str,
    journal: Arc<Journal>,
    seed: fn(A::Id) -> A,
    slots: RwLock<HashMap<A::Id, A>>,
}

impl<A> Arena<A>
where
    A: Aggregate<Error = DomainError> + Clone,
    A::Id: Copy + Into<Uuid>,
    A::Event: Event + Serialize,
{
    pub fn new(name: &'static str, journal: Arc<Journal>, seed: fn(A::Id) -> A) -> Self {
        Self {
            name,
            journal,
            seed,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Run a command against the aggregate at `id`, journaling and applying
    /// the emitted events. The slot is created on first touch.
    pub fn execute(&self, id: A::Id, command: &A::Command) -> AppResult<Vec<A::Event>> {
        self.execute_expecting(id, ExpectedVersion::Any, command)
    }

    /// Like [`Arena::execute`], but fails with `Conflict` when the aggregate
    /// has moved past `expected`. Callers working from a snapshot pass
    /// `ExpectedVersion::Exact(snapshot.version())` so a concurrent change
    /// surfaces instead of being silently overwritten.
    pub fn execute_expecting(
        &self,
        id: A::Id,
        expected: ExpectedVersion,
        command: &A::Command,
    ) -> AppResult<Vec<A::Event>> {
        let mut slots = self.slots.write().map_err(|_| AppError::Poisoned)?;
        let aggregate = slots.entry(id).or_insert_with(|| (self.seed)(id));
        expected.check(aggregate.version())?;
        let events = aggregate.handle(command)?;
        self.journal
            .append(AggregateId::from_uuid(id.into()), self.name, &events)?;
        for event in &events {
            aggregate.apply(event);
        }
        Ok(events)
    }

    /// Clone out the current state, if the slot exists.
    pub fn get(&self, id: A::Id) -> AppResult<Option<A>> {
        let slots = self.slots.read().map_err(|_| AppError::Poisoned)?;
        Ok(slots.get(&id).cloned())
    }

    /// Read a projection of the current state without cloning the aggregate.
    pub fn read<R>(&self, id: A::Id, f: impl FnOnce(&A) -> R) -> AppResult<Option<R>> {
        let slots = self.slots.read().map_err(|_| AppError::Poisoned)?;
        Ok(slots.get(&id).map(f))
    }

    /// The audit trail for one aggregate, in sequence order.
    pub fn stream(&self, id: A::Id) -> AppResult<Vec<JournalEntry>> {
        Ok(self.journal.load_stream(AggregateId::from_uuid(id.into()))?)
    }
}
