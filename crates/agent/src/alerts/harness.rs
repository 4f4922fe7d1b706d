//! Test doubles shared by the alerting test suites.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use notifications::DigestEmail;

use super::dispatcher::{ChannelError, EmailSender};

#[derive(Debug, Clone)]
pub struct TestSender(Arc<Mutex<TestSenderInner>>);

#[derive(Debug, Default)]
struct TestSenderInner {
    fail_recipients: HashMap<String, ChannelError>,
    fail_all: Option<ChannelError>,
    sent: Vec<DigestEmail>,
}

impl TestSender {
    pub fn new() -> TestSender {
        TestSender(Arc::new(Mutex::new(TestSenderInner::default())))
    }

    pub async fn fail_recipient(&self, email: &str, error: ChannelError) {
        let mut lock = self.0.lock().await;
        lock.fail_recipients.insert(email.to_string(), error);
    }

    pub async fn fail_all(&self, error: ChannelError) {
        self.0.lock().await.fail_all = Some(error);
    }

    pub async fn clear_failures(&self) {
        let mut lock = self.0.lock().await;
        lock.fail_recipients.clear();
        lock.fail_all = None;
    }

    pub async fn sent(&self) -> Vec<DigestEmail> {
        self.0.lock().await.sent.clone()
    }

    pub async fn take_sent(&self) -> Vec<DigestEmail> {
        let mut lock = self.0.lock().await;
        std::mem::take(&mut lock.sent)
    }
}

impl EmailSender for TestSender {
    async fn send<'s>(&'s self, email: &'s DigestEmail) -> Result<String, ChannelError> {
        let mut lock = self.0.lock().await;
        if let Some(error) = &lock.fail_all {
            return Err(error.clone());
        }
        if let Some(error) = lock.fail_recipients.get(&email.recipient.email) {
            return Err(error.clone());
        }
        lock.sent.push(email.clone());
        Ok(format!("msg-{}", lock.sent.len()))
    }
}
