use std::sync::Arc;

use stockline_core::ActorId;

/// Identity boundary: who is performing the current operation.
///
/// The surrounding application owns sessions and authentication; the core
/// only ever asks for the current actor id to stamp movements and counts.
pub trait ActorProvider: Send + Sync {
    fn current_actor(&self) -> ActorId;
}

impl<A> ActorProvider for Arc<A>
where
    A: ActorProvider + ?Sized,
{
    fn current_actor(&self) -> ActorId {
        (**self).current_actor()
    }
}

/// A constant actor, for wiring and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedActor(ActorId);

impl FixedActor {
    pub fn new(actor_id: ActorId) -> Self {
        Self(actor_id)
    }
}

impl ActorProvider for FixedActor {
    fn current_actor(&self) -> ActorId {
        self.0
    }
}
