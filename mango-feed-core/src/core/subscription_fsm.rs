//! Subscription lifecycle state machine - typestate pattern
//!
//! Every logical subscription moves through these states:
//!
//! ```text
//!      PENDING ──response without result──→ FAILED
//!         │                                    ▲
//!   response with result                   disconnect
//!         │                                    │
//!         ▼                                    │
//!      ACTIVE(server_id) ◄──falsy result──┐  PENDING
//!         │                               │
//!   unsubscribe()                         │
//!         │                               │
//!         ▼                               │
//!   UNSUBSCRIBING ────────────────────────┘
//!         │
//!   truthy result / disconnect
//!         │
//!         ▼
//!      CLOSED(reason)
//! ```
//!
//! Transitions consume the source state, so a closed subscription cannot be
//! activated again and a pending one cannot be unsubscribed.
//! `SubscriptionState` erases the type for storage in the session's maps.
//!
//! # Usage
//!
//! ```
//! use mango_feed_core::core::subscription_fsm::*;
//!
//! let sub = SubscriptionPending::new(0, "bids".to_string());
//! let sub = sub.activate(42);
//! assert_eq!(sub.server_id(), 42);
//!
//! let sub = sub.begin_unsubscribe();
//! match sub.resolve(true) {
//!     UnsubscribeResult::Closed(closed) => {
//!         assert_eq!(closed.reason(), CloseReason::Unsubscribed);
//!     }
//!     UnsubscribeResult::Rejected(_active) => unreachable!(),
//! }
//! ```

use std::fmt;
use std::time::SystemTime;

// ============================================================================
// Subscription Data (shared by all states)
// ============================================================================

/// Why a subscription reached `Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Server confirmed the unsubscribe
    Unsubscribed,
    /// Connection dropped while the subscription was live
    Disconnected,
    /// Session was shut down by its owner
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Unsubscribed => write!(f, "unsubscribed"),
            CloseReason::Disconnected => write!(f, "disconnected"),
            CloseReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Data carried through every state
#[derive(Debug, Clone)]
pub struct SubscriptionData {
    /// Session-local id; subscribe uses this as request id, unsubscribe uses id + 1
    pub local_id: u64,
    /// Human readable label (usually the account address)
    pub label: String,
    pub created_at: SystemTime,
    pub activated_at: Option<SystemTime>,
    pub closed_at: Option<SystemTime>,
    /// Number of unsubscribe attempts the server answered with `false`
    pub unsubscribe_rejections: u32,
}

impl SubscriptionData {
    pub fn new(local_id: u64, label: String) -> Self {
        Self {
            local_id,
            label,
            created_at: SystemTime::now(),
            activated_at: None,
            closed_at: None,
            unsubscribe_rejections: 0,
        }
    }
}

// ============================================================================
// State: Pending
// ============================================================================

/// Subscribe request queued or sent, no response yet
///
/// **Valid Transitions:**
/// - `activate(server_id)` → SubscriptionActive
/// - `fail()` → SubscriptionFailed
#[derive(Debug, Clone)]
pub struct SubscriptionPending {
    data: SubscriptionData,
}

impl SubscriptionPending {
    pub fn new(local_id: u64, label: String) -> Self {
        Self {
            data: SubscriptionData::new(local_id, label),
        }
    }

    pub fn data(&self) -> &SubscriptionData {
        &self.data
    }

    /// Transition: Pending → Active
    pub fn activate(mut self, server_id: u64) -> SubscriptionActive {
        self.data.activated_at = Some(SystemTime::now());
        SubscriptionActive {
            data: self.data,
            server_id,
        }
    }

    /// Transition: Pending → Failed (rejected or connection lost)
    pub fn fail(mut self) -> SubscriptionFailed {
        self.data.closed_at = Some(SystemTime::now());
        SubscriptionFailed { data: self.data }
    }
}

// ============================================================================
// State: Active
// ============================================================================

/// Server acknowledged the subscription and may push notifications
///
/// **Valid Transitions:**
/// - `begin_unsubscribe()` → SubscriptionUnsubscribing
/// - `close(reason)` → SubscriptionClosed
#[derive(Debug, Clone)]
pub struct SubscriptionActive {
    data: SubscriptionData,
    server_id: u64,
}

impl SubscriptionActive {
    pub fn data(&self) -> &SubscriptionData {
        &self.data
    }

    pub fn server_id(&self) -> u64 {
        self.server_id
    }

    /// Transition: Active → Unsubscribing
    pub fn begin_unsubscribe(self) -> SubscriptionUnsubscribing {
        SubscriptionUnsubscribing {
            data: self.data,
            server_id: self.server_id,
        }
    }

    /// Transition: Active → Closed
    pub fn close(mut self, reason: CloseReason) -> SubscriptionClosed {
        self.data.closed_at = Some(SystemTime::now());
        SubscriptionClosed {
            data: self.data,
            server_id: Some(self.server_id),
            reason,
        }
    }
}

// ============================================================================
// State: Unsubscribing
// ============================================================================

/// Unsubscribe queued or sent; notifications are still delivered
///
/// **Valid Transitions:**
/// - `resolve(true)` → SubscriptionClosed
/// - `resolve(false)` → SubscriptionActive
/// - `close(reason)` → SubscriptionClosed
#[derive(Debug, Clone)]
pub struct SubscriptionUnsubscribing {
    data: SubscriptionData,
    server_id: u64,
}

impl SubscriptionUnsubscribing {
    pub fn data(&self) -> &SubscriptionData {
        &self.data
    }

    pub fn server_id(&self) -> u64 {
        self.server_id
    }

    /// Transition on the unsubscribe response
    pub fn resolve(mut self, accepted: bool) -> UnsubscribeResult {
        if accepted {
            self.data.closed_at = Some(SystemTime::now());
            UnsubscribeResult::Closed(SubscriptionClosed {
                data: self.data,
                server_id: Some(self.server_id),
                reason: CloseReason::Unsubscribed,
            })
        } else {
            self.data.unsubscribe_rejections += 1;
            UnsubscribeResult::Rejected(SubscriptionActive {
                data: self.data,
                server_id: self.server_id,
            })
        }
    }

    /// Transition: Unsubscribing → Closed without a response
    pub fn close(mut self, reason: CloseReason) -> SubscriptionClosed {
        self.data.closed_at = Some(SystemTime::now());
        SubscriptionClosed {
            data: self.data,
            server_id: Some(self.server_id),
            reason,
        }
    }
}

// ============================================================================
// Terminal states
// ============================================================================

/// Subscription ended after having been active (terminal)
#[derive(Debug, Clone)]
pub struct SubscriptionClosed {
    data: SubscriptionData,
    server_id: Option<u64>,
    reason: CloseReason,
}

impl SubscriptionClosed {
    pub fn data(&self) -> &SubscriptionData {
        &self.data
    }

    pub fn server_id(&self) -> Option<u64> {
        self.server_id
    }

    pub fn reason(&self) -> CloseReason {
        self.reason
    }
}

/// Subscribe never succeeded (terminal)
#[derive(Debug, Clone)]
pub struct SubscriptionFailed {
    data: SubscriptionData,
}

impl SubscriptionFailed {
    pub fn data(&self) -> &SubscriptionData {
        &self.data
    }
}

// ============================================================================
// Result types for state transitions
// ============================================================================

/// Result of resolve() on Unsubscribing state
#[derive(Debug, Clone)]
pub enum UnsubscribeResult {
    Closed(SubscriptionClosed),
    Rejected(SubscriptionActive),
}

// ============================================================================
// Enum wrapper
// ============================================================================

/// Type-erased subscription state
#[derive(Debug, Clone)]
pub enum SubscriptionState {
    Pending(SubscriptionPending),
    Active(SubscriptionActive),
    Unsubscribing(SubscriptionUnsubscribing),
    Closed(SubscriptionClosed),
    Failed(SubscriptionFailed),
}

impl SubscriptionState {
    pub fn data(&self) -> &SubscriptionData {
        match self {
            SubscriptionState::Pending(s) => s.data(),
            SubscriptionState::Active(s) => s.data(),
            SubscriptionState::Unsubscribing(s) => s.data(),
            SubscriptionState::Closed(s) => s.data(),
            SubscriptionState::Failed(s) => s.data(),
        }
    }

    /// Server subscription id, once assigned
    pub fn server_id(&self) -> Option<u64> {
        match self {
            SubscriptionState::Active(s) => Some(s.server_id()),
            SubscriptionState::Unsubscribing(s) => Some(s.server_id()),
            SubscriptionState::Closed(s) => s.server_id(),
            _ => None,
        }
    }

    /// Check if notifications can still arrive
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            SubscriptionState::Active(_) | SubscriptionState::Unsubscribing(_)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubscriptionState::Closed(_) | SubscriptionState::Failed(_)
        )
    }

    pub fn state_name(&self) -> &'static str {
        match self {
            SubscriptionState::Pending(_) => "Pending",
            SubscriptionState::Active(_) => "Active",
            SubscriptionState::Unsubscribing(_) => "Unsubscribing",
            SubscriptionState::Closed(_) => "Closed",
            SubscriptionState::Failed(_) => "Failed",
        }
    }

    /// Copyable summary for status queries
    pub fn status(&self) -> SubscriptionStatus {
        match self {
            SubscriptionState::Pending(_) => SubscriptionStatus::Pending,
            SubscriptionState::Active(s) => SubscriptionStatus::Active(s.server_id()),
            SubscriptionState::Unsubscribing(s) => {
                SubscriptionStatus::Unsubscribing(s.server_id())
            }
            SubscriptionState::Closed(s) => SubscriptionStatus::Closed(s.reason()),
            SubscriptionState::Failed(_) => SubscriptionStatus::Failed,
        }
    }

    /// Connection lost: Pending fails, live states close, terminal states stay put
    pub fn on_disconnect(self, reason: CloseReason) -> Self {
        match self {
            SubscriptionState::Pending(s) => s.fail().into(),
            SubscriptionState::Active(s) => s.close(reason).into(),
            SubscriptionState::Unsubscribing(s) => s.close(reason).into(),
            terminal => terminal,
        }
    }
}

/// Lightweight view of a subscription's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Pending,
    Active(u64),
    Unsubscribing(u64),
    Closed(CloseReason),
    Failed,
}

impl SubscriptionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Closed(_) | SubscriptionStatus::Failed
        )
    }
}

// Conversions
impl From<SubscriptionPending> for SubscriptionState {
    fn from(s: SubscriptionPending) -> Self {
        SubscriptionState::Pending(s)
    }
}

impl From<SubscriptionActive> for SubscriptionState {
    fn from(s: SubscriptionActive) -> Self {
        SubscriptionState::Active(s)
    }
}

impl From<SubscriptionUnsubscribing> for SubscriptionState {
    fn from(s: SubscriptionUnsubscribing) -> Self {
        SubscriptionState::Unsubscribing(s)
    }
}

impl From<SubscriptionClosed> for SubscriptionState {
    fn from(s: SubscriptionClosed) -> Self {
        SubscriptionState::Closed(s)
    }
}

impl From<SubscriptionFailed> for SubscriptionState {
    fn from(s: SubscriptionFailed) -> Self {
        SubscriptionState::Failed(s)
    }
}

impl From<UnsubscribeResult> for SubscriptionState {
    fn from(r: UnsubscribeResult) -> Self {
        match r {
            UnsubscribeResult::Closed(s) => s.into(),
            UnsubscribeResult::Rejected(s) => s.into(),
        }
    }
}
