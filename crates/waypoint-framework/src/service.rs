//! Tower integration.
//!
//! [`Dispatcher`] implements `tower::Service<Message>`, so timeouts, rate
//! limits and other middleware can be layered around dispatch:
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//!
//! let service = ServiceBuilder::new()
//!     .concurrency_limit(64)
//!     .service(dispatcher);
//! ```
//!
//! Dispatch is synchronous, so the returned future is always ready.

use std::future::{Ready, ready};
use std::task::{Context, Poll};

use tower::Service;

use waypoint_core::Message;

use crate::dispatcher::{Dispatched, Dispatcher};
use crate::error::DispatchError;

impl Service<Message> for Dispatcher {
    type Response = Dispatched;
    type Error = DispatchError;
    type Future = Ready<Result<Dispatched, DispatchError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, message: Message) -> Self::Future {
        ready(self.handle_message(&message))
    }
}
