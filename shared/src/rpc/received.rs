use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

use crate::{rpc::rpc::Rpc, types::ConnectionId};

/// RPCs decoded by the default executor, waiting for the application to
/// take them by type
#[derive(Default)]
pub struct ReceivedRpcs {
    inbox: HashMap<TypeId, Box<dyn Any + Send>>,
    count: usize,
}

impl ReceivedRpcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<R: Rpc>(&mut self, connection: ConnectionId, rpc: R) {
        let list = self
            .inbox
            .entry(TypeId::of::<R>())
            .or_insert_with(|| Box::new(Vec::<(ConnectionId, R)>::new()));
        if let Some(list) = list.downcast_mut::<Vec<(ConnectionId, R)>>() {
            list.push((connection, rpc));
            self.count += 1;
        }
    }

    /// Take every received `R`, in arrival order
    pub fn take<R: Rpc>(&mut self) -> Vec<(ConnectionId, R)> {
        let Some(list) = self.inbox.remove(&TypeId::of::<R>()) else {
            return Vec::new();
        };
        match list.downcast::<Vec<(ConnectionId, R)>>() {
            Ok(list) => {
                self.count -= list.len();
                *list
            }
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
