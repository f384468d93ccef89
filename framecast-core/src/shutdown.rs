//! Stop requests from outside the capture loop.
//!
//! A [`ShutdownTrigger`] is held by whatever watches for the operator
//! (Ctrl-C handler, stdin reader). The loop holds a [`ShutdownSignal`]
//! and checks it between stages. The first request wins; later ones are
//! ignored so the reported cause is stable.

use std::sync::Arc;

use tokio::sync::watch;

/// Why the operator asked the stream to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopRequest {
    /// Ctrl-C or an equivalent signal.
    Interrupt,
    /// The control input reached end-of-file.
    EndOfInput,
}

/// Sending half. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<Option<StopRequest>>>,
}

/// Receiving half, observed by the capture loop.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<Option<StopRequest>>,
}

/// Create a connected trigger/signal pair.
pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(None);
    (ShutdownTrigger { tx: Arc::new(tx) }, ShutdownSignal { rx })
}

impl ShutdownTrigger {
    /// Record `request` unless one is already pending.
    ///
    /// Returns `true` if this call set the request.
    pub fn request(&self, request: StopRequest) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(request);
                true
            } else {
                false
            }
        })
    }

    pub fn interrupt(&self) -> bool {
        self.request(StopRequest::Interrupt)
    }

    pub fn end_of_input(&self) -> bool {
        self.request(StopRequest::EndOfInput)
    }

    /// A new signal observing this trigger.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl ShutdownSignal {
    /// The pending request, if any. Never blocks.
    pub fn current(&self) -> Option<StopRequest> {
        *self.rx.borrow()
    }

    /// Resolve once a stop is requested.
    ///
    /// Never resolves if every trigger is dropped without a request.
    /// Cancel-safe.
    pub async fn requested(&mut self) -> StopRequest {
        loop {
            if let Some(request) = *self.rx.borrow_and_update() {
                return request;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_request_wins() {
        let (trigger, signal) = channel();
        assert_eq!(signal.current(), None);

        assert!(trigger.end_of_input());
        assert!(!trigger.interrupt());
        assert_eq!(signal.current(), Some(StopRequest::EndOfInput));
    }

    #[tokio::test]
    async fn requested_wakes_on_trigger() {
        let (trigger, mut signal) = channel();
        let waiter = tokio::spawn(async move { signal.requested().await });

        tokio::task::yield_now().await;
        trigger.interrupt();

        let got = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("timeout")
            .unwrap();
        assert_eq!(got, StopRequest::Interrupt);
    }

    #[tokio::test]
    async fn subscribers_see_earlier_requests() {
        let (trigger, _signal) = channel();
        trigger.interrupt();
        let mut late = trigger.subscribe();
        assert_eq!(late.requested().await, StopRequest::Interrupt);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_trigger_never_resolves() {
        let (trigger, mut signal) = channel();
        drop(trigger);
        let res = tokio::time::timeout(Duration::from_secs(1), signal.requested()).await;
        assert!(res.is_err());
    }
}
