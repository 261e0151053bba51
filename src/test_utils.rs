//! Shared helpers for unit tests.
#![cfg(test)]
#![allow(clippy::panic)]

use std::cell::{
    Cell,
    RefCell,
};
use std::collections::HashMap;
use std::rc::Rc;
use std::task::Poll;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{
    self,
    LocalBoxFuture,
};
use serde_json::Value;

use crate::loader::{
    LoaderError,
    TranslateLoader,
};
use crate::missing::{
    MissingTranslation,
    MissingTranslationHandler,
    MissingTranslationParams,
};
use crate::types::{
    Params,
    TranslationEvent,
};

/// Answer channel of one request.
type Reply = oneshot::Sender<Result<Value, LoaderError>>;

/// Loader whose requests stay pending until the test answers them.
#[derive(Default)]
pub(crate) struct ControlledLoader {
    /// Open requests by language.
    replies: RefCell<HashMap<String, Vec<Reply>>>,
    /// Number of requests made.
    calls: Cell<usize>,
}

impl ControlledLoader {
    /// Answers every open request for `lang` with `table`.
    pub(crate) fn complete(&self, lang: &str, table: Value) {
        self.reply(lang, &Ok(table));
    }

    /// Fails every open request for `lang`.
    pub(crate) fn fail(&self, lang: &str) {
        self.reply(lang, &Err(LoaderError::NotFound(lang.to_string())));
    }

    /// Number of `get_translation` calls so far.
    pub(crate) fn calls(&self) -> usize {
        self.calls.get()
    }

    /// Sends `result` to every open request for `lang`.
    fn reply(&self, lang: &str, result: &Result<Value, LoaderError>) {
        let senders = self.replies.borrow_mut().remove(lang).unwrap_or_default();
        for sender in senders {
            let _ = sender.send(result.clone());
        }
    }
}

impl TranslateLoader for ControlledLoader {
    fn get_translation(&self, lang: &str) -> LocalBoxFuture<'static, Result<Value, LoaderError>> {
        self.calls.set(self.calls.get() + 1);
        let (sender, receiver) = oneshot::channel();
        self.replies.borrow_mut().entry(lang.to_string()).or_default().push(sender);

        let lang = lang.to_string();
        async move { receiver.await.unwrap_or(Err(LoaderError::Cancelled(lang))) }.boxed_local()
    }
}

/// Records every event it receives.
#[derive(Clone, Default)]
pub(crate) struct EventLog {
    /// Received events.
    events: Rc<RefCell<Vec<TranslationEvent>>>,
}

impl EventLog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn recorder(&self) -> impl Fn(&TranslationEvent) + 'static {
        let events = Rc::clone(&self.events);
        move |event| events.borrow_mut().push(event.clone())
    }

    pub(crate) fn events(&self) -> Vec<TranslationEvent> {
        self.events.borrow().clone()
    }

    pub(crate) fn langs(&self) -> Vec<String> {
        self.events.borrow().iter().map(|event| event.lang.clone()).collect()
    }
}

/// Counts dirty notifications.
#[derive(Clone, Default)]
pub(crate) struct DirtyCounter {
    /// Notifications so far.
    count: Rc<Cell<usize>>,
}

impl DirtyCounter {
    pub(crate) fn detector(&self) -> impl Fn() + 'static {
        let count = Rc::clone(&self.count);
        move || count.set(count.get() + 1)
    }

    pub(crate) fn count(&self) -> usize {
        self.count.get()
    }
}

/// Handler answering `"handled: <key>"` on its second poll.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DeferredHandler;

impl MissingTranslationHandler for DeferredHandler {
    fn handle(&self, params: MissingTranslationParams<'_>) -> MissingTranslation {
        let text = format!("handled: {}", params.key);
        MissingTranslation::Pending(
            async move {
                yield_once().await;
                text
            }
            .boxed_local(),
        )
    }
}

/// Builds [`Params`] from a JSON object literal.
pub(crate) fn params(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

/// Returns `Pending` once, waking the task, then `Ready`.
pub(crate) async fn yield_once() {
    let mut yielded = false;
    future::poll_fn(|cx| {
        if yielded {
            return Poll::Ready(());
        }
        yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    })
    .await;
}

/// Lets spawned local tasks run to completion.
pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
