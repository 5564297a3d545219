//! Mock Panel Channel for Testing
//!
//! Records every open/send the router performs.

use async_trait::async_trait;
use lenspanel::error::{PanelError, PanelResult};
use lenspanel::panel::PanelMessage;
use lenspanel::router::PanelChannel;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct MockChannel {
    pub opened: Arc<Mutex<usize>>,
    pub sent: Arc<Mutex<Vec<PanelMessage>>>,
    pub fail_open: bool,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<PanelMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        *self.opened.lock().unwrap()
    }
}

#[async_trait]
impl PanelChannel for MockChannel {
    async fn open(&self) -> PanelResult<()> {
        *self.opened.lock().unwrap() += 1;
        if self.fail_open {
            return Err(PanelError::PanelUnavailable("mock panel closed".to_string()));
        }
        Ok(())
    }

    async fn send(&self, message: PanelMessage) -> PanelResult<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}
