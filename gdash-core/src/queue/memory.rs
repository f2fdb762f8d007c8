use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{BrokerError, ConnectError, MessageProperties, QueueChannel, QueueTransport};

/// In-memory transport for tests and single-process deployments.
///
/// Records declared queues and published messages. Connection and publish
/// failures can be injected to exercise the publisher's retry and cleanup
/// behavior. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    fail_connects: u32,
    fail_publish: bool,
    connect_attempts: u32,
    declared: Vec<(String, bool)>,
    messages: Vec<StoredMessage>,
    closed_channels: u32,
}

/// One message captured by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub queue: String,
    pub body: Vec<u8>,
    pub properties: MessageProperties,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` connection attempts fail.
    pub fn fail_connects(&self, n: u32) {
        self.lock().fail_connects = n;
    }

    /// Make every publish on an open channel fail.
    pub fn fail_publish(&self, fail: bool) {
        self.lock().fail_publish = fail;
    }

    pub fn connect_attempts(&self) -> u32 {
        self.lock().connect_attempts
    }

    pub fn declared_queues(&self) -> Vec<(String, bool)> {
        self.lock().declared.clone()
    }

    pub fn messages(&self) -> Vec<StoredMessage> {
        self.lock().messages.clone()
    }

    pub fn closed_channels(&self) -> u32 {
        self.lock().closed_channels
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl QueueTransport for MemoryTransport {
    async fn connect(&self) -> Result<Box<dyn QueueChannel>, ConnectError> {
        let mut state = self.lock();
        state.connect_attempts += 1;

        if state.fail_connects > 0 {
            state.fail_connects -= 1;
            return Err(ConnectError("connection refused".to_string()));
        }

        Ok(Box::new(MemoryChannel { state: Arc::clone(&self.state) }))
    }
}

struct MemoryChannel {
    state: Arc<Mutex<State>>,
}

impl MemoryChannel {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl QueueChannel for MemoryChannel {
    async fn declare_queue(&mut self, name: &str, durable: bool) -> Result<(), BrokerError> {
        self.lock().declared.push((name.to_string(), durable));
        Ok(())
    }

    async fn publish(
        &mut self,
        routing_key: &str,
        body: &[u8],
        properties: &MessageProperties,
    ) -> Result<(), BrokerError> {
        let mut state = self.lock();

        if state.fail_publish {
            return Err(BrokerError("basic.publish refused".to_string()));
        }

        state.messages.push(StoredMessage {
            queue: routing_key.to_string(),
            body: body.to_vec(),
            properties: properties.clone(),
        });
        Ok(())
    }

    async fn close(self: Box<Self>) {
        self.lock().closed_channels += 1;
    }
}
