//! Message envelopes and body variants.
//!
//! Every message is an envelope `{sender, target, body}`. The body is a
//! tagged union over the runtime's built-in kinds plus opaque user
//! payloads. Bodies never leave the process through this crate, so user
//! payloads stay as boxed trait objects; serializing them for a cross-host
//! transport is the transport plugin's concern.
//!
//! Messages addressed to [`BoxId::NULL`](crate::addr::BoxId::NULL) of a
//! scheduler are control messages for the scheduler itself (actor spawns,
//! migration envelopes, cluster root announcements).

use core::any::Any;
use core::fmt;

use crate::actor::Actor;
use crate::addr::{Addr, PostCode};
use crate::infoton::Infoton;
use crate::migration::MigrationEnvelope;

/// An opaque user-defined message payload.
///
/// Any `'static + Send + Debug` type qualifies through the blanket impl.
/// Handlers recover the concrete type with the inherent `is` and
/// `downcast_ref` helpers, or consume the payload with
/// [`UserBody::into_any`]. Prefer the helpers over calling
/// [`UserBody::as_any`] on the box: the box is itself a `UserBody`, and
/// `as_any` on it reflects the box, not the payload.
pub trait UserBody: Any + Send + fmt::Debug {
    /// Borrows the payload as [`Any`] for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Consumes the payload as [`Any`] for by-value downcasting.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any + Send + fmt::Debug> UserBody for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl dyn UserBody {
    /// Returns true if the payload is a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Borrows the payload as a `T`, if it is one.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }
}

/// The body of a message: a built-in runtime kind or a user payload.
pub enum Body {
    /// Install the carried actor on the target scheduler.
    Spawn(Box<dyn Actor>),
    /// Despawn the target actor.
    Die,
    /// The target of `original` migrated from `old` to `new`; the holder of
    /// the stale address is expected to update its references and resend.
    RecipientMoved {
        /// The stale address the original message was sent to.
        old: Addr,
        /// Where the actor lives now; null if routing failed outright.
        new: Addr,
        /// The undeliverable original message.
        original: Box<Msg>,
    },
    /// Declare a cluster root scheduler.
    ForceAddRoot(PostCode),
    /// Apply a force packet to the target actor's position.
    Infoton(Infoton),
    /// Install a migrated actor on the target scheduler.
    Migrate(MigrationEnvelope),
    /// An opaque user payload, dispatched to the target actor's handler.
    User(Box<dyn UserBody>),
}

impl Body {
    /// Wraps a user payload.
    #[must_use]
    pub fn user(payload: impl UserBody) -> Self {
        Self::User(Box::new(payload))
    }

    /// A short tag for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Spawn(_) => "spawn",
            Self::Die => "die",
            Self::RecipientMoved { .. } => "recipient-moved",
            Self::ForceAddRoot(_) => "force-add-root",
            Self::Infoton(_) => "infoton",
            Self::Migrate(_) => "migrate",
            Self::User(_) => "user",
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(_) => f.write_str("Spawn(..)"),
            Self::Die => f.write_str("Die"),
            Self::RecipientMoved { old, new, original } => f
                .debug_struct("RecipientMoved")
                .field("old", old)
                .field("new", new)
                .field("original", original)
                .finish(),
            Self::ForceAddRoot(pc) => f.debug_tuple("ForceAddRoot").field(pc).finish(),
            Self::Infoton(i) => f.debug_tuple("Infoton").field(i).finish(),
            Self::Migrate(env) => f.debug_tuple("Migrate").field(env).finish(),
            Self::User(body) => f.debug_tuple("User").field(body).finish(),
        }
    }
}

/// A message envelope.
#[derive(Debug)]
pub struct Msg {
    /// Who sent it; may be null for messages injected from outside.
    pub sender: Addr,
    /// Where it goes.
    pub target: Addr,
    /// What it carries.
    pub body: Body,
}

impl Msg {
    /// Creates an envelope.
    #[must_use]
    pub const fn new(sender: Addr, target: Addr, body: Body) -> Self {
        Self {
            sender,
            target,
            body,
        }
    }

    /// Creates a control message for the scheduler at `postcode`.
    #[must_use]
    pub fn control(postcode: PostCode, body: Body) -> Self {
        Self {
            sender: Addr::null(),
            target: Addr::scheduler(postcode),
            body,
        }
    }

    /// Returns true if this targets a scheduler rather than an actor.
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.target.box_id().is_null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Ping(u32);

    #[test]
    fn user_body_downcasts() {
        let body: Box<dyn UserBody> = Box::new(Ping(7));
        assert!(body.is::<Ping>());
        assert_eq!(body.downcast_ref::<Ping>(), Some(&Ping(7)));
        assert!(body.downcast_ref::<String>().is_none());

        let any = body.into_any();
        let ping = any.downcast::<Ping>().unwrap();
        assert_eq!(*ping, Ping(7));
    }

    #[test]
    fn control_messages_target_the_null_box() {
        let msg = Msg::control(PostCode::new("local", 24721), Body::Die);
        assert!(msg.is_control());
        assert!(msg.sender.is_null());
        assert_eq!(msg.target.postcode().port(), 24721);
    }

    #[test]
    fn body_kinds_for_logs() {
        assert_eq!(Body::Die.kind(), "die");
        assert_eq!(Body::user(Ping(1)).kind(), "user");
    }
}
