//! Per-tag handler table

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::codec::{Envelope, Inbound};
use crate::Result;

type Handler<Ctx> = Box<dyn Fn(&mut Ctx, &Envelope) -> Result<()> + Send + Sync>;

/// What happened to a dispatched envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A handler ran
    Handled,
    /// No handler registered for the tag; envelope discarded
    Unhandled,
    /// Handler registered but the payload did not match its schema; discarded
    Undecodable,
}

/// Routes envelopes to handlers keyed by type tag.
///
/// `Ctx` is the state the handlers act on, passed in at dispatch time so the
/// table never holds a reference to its owner.
pub struct Dispatcher<Ctx> {
    handlers: HashMap<&'static str, Handler<Ctx>>,
}

impl<Ctx> Dispatcher<Ctx> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for `P`'s tag, replacing any earlier one
    pub fn register<P, F>(&mut self, handler: F)
    where
        P: Inbound,
        F: Fn(&mut Ctx, P) + Send + Sync + 'static,
    {
        self.handlers.insert(
            P::TAG,
            Box::new(move |ctx, envelope| {
                let payload = envelope.decode::<P>()?;
                handler(ctx, payload);
                Ok(())
            }),
        );
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.handlers.contains_key(tag)
    }

    /// Decode `envelope` under its tag's schema and run the handler.
    ///
    /// Unknown tags and undecodable payloads are dropped without error.
    pub fn dispatch(&self, ctx: &mut Ctx, envelope: &Envelope) -> Dispatch {
        let Some(handler) = self.handlers.get(envelope.tag.as_str()) else {
            trace!("No handler for '{}', discarding", envelope.tag);
            return Dispatch::Unhandled;
        };

        match handler(ctx, envelope) {
            Ok(()) => Dispatch::Handled,
            Err(e) => {
                debug!("Discarding undecodable '{}': {}", envelope.tag, e);
                Dispatch::Undecodable
            }
        }
    }
}

impl<Ctx> Default for Dispatcher<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx> std::fmt::Debug for Dispatcher<Ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("tags", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
