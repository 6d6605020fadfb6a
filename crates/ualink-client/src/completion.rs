// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Asynchronous operation results.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use ualink_core::{UaError, UaResult};

/// Sending half kept by the worker.
pub(crate) type Reply<T> = oneshot::Sender<UaResult<T>>;

/// The pending result of an enqueued operation.
///
/// Operations return immediately with a `Completion`; awaiting it yields
/// the outcome once the worker has processed the request. Dropping it
/// does not cancel the operation. If the worker goes away before
/// answering, the completion resolves to a closed-connection error.
#[must_use = "a Completion does nothing unless awaited"]
#[derive(Debug)]
pub struct Completion<T> {
    state: State<T>,
}

#[derive(Debug)]
enum State<T> {
    Pending(oneshot::Receiver<UaResult<T>>),
    Ready(Option<UaResult<T>>),
}

impl<T> Completion<T> {
    /// Creates a completion and the sender that resolves it.
    pub(crate) fn channel() -> (Reply<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (
            tx,
            Self {
                state: State::Pending(rx),
            },
        )
    }

    /// A completion that is already resolved.
    pub fn ready(result: UaResult<T>) -> Self {
        Self {
            state: State::Ready(Some(result)),
        }
    }

    /// Returns the result if it is available without waiting.
    pub fn try_take(&mut self) -> Option<UaResult<T>> {
        match &mut self.state {
            State::Pending(rx) => match rx.try_recv() {
                Ok(result) => Some(result),
                Err(oneshot::error::TryRecvError::Empty) => None,
                Err(oneshot::error::TryRecvError::Closed) => Some(Err(UaError::connection_closed())),
            },
            State::Ready(result) => result.take(),
        }
    }
}

impl<T> Unpin for Completion<T> {}

impl<T> Future for Completion<T> {
    type Output = UaResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            State::Pending(rx) => Pin::new(rx)
                .poll(cx)
                .map(|received| received.unwrap_or_else(|_| Err(UaError::connection_closed()))),
            State::Ready(result) => Poll::Ready(
                result
                    .take()
                    .unwrap_or_else(|| Err(UaError::protocol("completion polled after resolving"))),
            ),
        }
    }
}
