//! Condition flag groups
//!
//! A flag group is a word of independent bits that tasks can set, clear and
//! wait on. Waiting is level-triggered: a wait on a bit that is already set
//! returns immediately.

use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

pub type EventBits = u32;

/// Set while the station link holds an address
pub const LINK_CONNECTED_BIT: EventBits = 1 << 0;
/// Set after every messaging event
pub const SESSION_STATUS_BIT: EventBits = 1 << 1;

/// How a wait is satisfied and what happens afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Clear the waited bits once the wait is satisfied
    pub clear_on_exit: bool,
    /// Require every bit of the mask instead of any of them
    pub wait_for_all: bool,
    /// `None` waits forever
    pub timeout: Option<Duration>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            clear_on_exit: false,
            wait_for_all: true,
            timeout: None,
        }
    }
}

impl WaitOptions {
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn clearing(mut self) -> Self {
        self.clear_on_exit = true;
        self
    }

    pub fn any(mut self) -> Self {
        self.wait_for_all = false;
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlagWaitError {
    #[error("Timed out after {waited:?} waiting for bits {mask:#x}")]
    TimedOut { mask: EventBits, waited: Duration },
    #[error("Flag group closed")]
    Closed,
}

/// Named group of condition flags
#[derive(Debug)]
pub struct EventGroup {
    name: &'static str,
    bits: watch::Sender<EventBits>,
}

impl EventGroup {
    pub fn new(name: &'static str) -> Self {
        let (bits, _) = watch::channel(0);
        Self { name, bits }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Set bits, returning the value after the update
    pub fn set(&self, mask: EventBits) -> EventBits {
        let mut after = 0;
        self.bits.send_modify(|bits| {
            *bits |= mask;
            after = *bits;
        });
        after
    }

    /// Clear bits, returning the value before the update
    pub fn clear(&self, mask: EventBits) -> EventBits {
        let mut before = 0;
        self.bits.send_modify(|bits| {
            before = *bits;
            *bits &= !mask;
        });
        before
    }

    pub fn get(&self) -> EventBits {
        *self.bits.borrow()
    }

    pub fn is_set(&self, mask: EventBits) -> bool {
        self.get() & mask == mask
    }

    /// Block until `mask` is satisfied per `options`
    ///
    /// Returns the bits observed when the wait was satisfied, before any
    /// clear-on-exit is applied.
    pub async fn wait(
        &self,
        mask: EventBits,
        options: WaitOptions,
    ) -> Result<EventBits, FlagWaitError> {
        let mut rx = self.bits.subscribe();
        let wait_for_all = options.wait_for_all;
        let satisfied = move |bits: &EventBits| {
            if wait_for_all {
                bits & mask == mask
            } else {
                bits & mask != 0
            }
        };

        let wait = async {
            rx.wait_for(satisfied)
                .await
                .map(|bits| *bits)
                .map_err(|_| FlagWaitError::Closed)
        };

        let observed = match options.timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| FlagWaitError::TimedOut {
                    mask,
                    waited: limit,
                })??,
            None => wait.await?,
        };

        if options.clear_on_exit {
            self.clear(mask);
        }

        Ok(observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_set_and_clear_are_independent_per_bit() {
        let group = EventGroup::new("test");
        assert_eq!(group.set(LINK_CONNECTED_BIT), LINK_CONNECTED_BIT);
        assert_eq!(
            group.set(SESSION_STATUS_BIT),
            LINK_CONNECTED_BIT | SESSION_STATUS_BIT
        );

        let before = group.clear(LINK_CONNECTED_BIT);
        assert_eq!(before, LINK_CONNECTED_BIT | SESSION_STATUS_BIT);
        assert!(!group.is_set(LINK_CONNECTED_BIT));
        assert!(group.is_set(SESSION_STATUS_BIT));
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_already_set() {
        let group = EventGroup::new("test");
        group.set(LINK_CONNECTED_BIT);

        let bits = group
            .wait(LINK_CONNECTED_BIT, WaitOptions::default())
            .await
            .unwrap();
        assert_eq!(bits, LINK_CONNECTED_BIT);
        assert!(group.is_set(LINK_CONNECTED_BIT));
    }

    #[tokio::test]
    async fn test_wait_wakes_on_set_from_other_task() {
        let group = Arc::new(EventGroup::new("test"));
        let setter = group.clone();

        let waiter = tokio::spawn({
            let group = group.clone();
            async move {
                group
                    .wait(LINK_CONNECTED_BIT, WaitOptions::default())
                    .await
            }
        });

        tokio::task::yield_now().await;
        setter.set(LINK_CONNECTED_BIT);

        let bits = waiter.await.unwrap().unwrap();
        assert_eq!(bits & LINK_CONNECTED_BIT, LINK_CONNECTED_BIT);
    }

    #[tokio::test]
    async fn test_clear_on_exit() {
        let group = EventGroup::new("test");
        group.set(SESSION_STATUS_BIT);

        group
            .wait(SESSION_STATUS_BIT, WaitOptions::default().clearing())
            .await
            .unwrap();
        assert!(!group.is_set(SESSION_STATUS_BIT));
    }

    #[tokio::test]
    async fn test_wait_any_versus_all() {
        let group = EventGroup::new("test");
        group.set(LINK_CONNECTED_BIT);
        let both = LINK_CONNECTED_BIT | SESSION_STATUS_BIT;

        let any = group.wait(both, WaitOptions::default().any()).await;
        assert!(any.is_ok());

        let all = group
            .wait(
                both,
                WaitOptions::default().with_timeout(Some(Duration::from_millis(20))),
            )
            .await;
        assert!(matches!(all, Err(FlagWaitError::TimedOut { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_mask() {
        let group = EventGroup::new("test");
        let result = group
            .wait(
                LINK_CONNECTED_BIT,
                WaitOptions::default().with_timeout(Some(Duration::from_secs(30))),
            )
            .await;

        assert_eq!(
            result,
            Err(FlagWaitError::TimedOut {
                mask: LINK_CONNECTED_BIT,
                waited: Duration::from_secs(30),
            })
        );
    }
}
