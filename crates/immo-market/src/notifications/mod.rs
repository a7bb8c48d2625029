//! Push notifications relayed to OneSignal.

pub mod domain;
pub mod gateway;
pub mod router;

pub use domain::{Audience, NotificationDispatch, NotificationRequest, NotificationRequestError};
pub use gateway::{OneSignalClient, PushError, PushGateway, ONESIGNAL_NOTIFICATIONS_URL};
pub use router::{notification_router, NotifyState, NOTIFY_PATH};
