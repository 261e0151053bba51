//! ストア通知のオブザーバー登録
//!
//! 購読者は登録順に同期的に呼び出されます。
//! [`Subscription`] ガードはドロップ時にコールバックを解除するため、
//! 消えた購読者には明示的な後始末なしでイベントが届かなくなります。

use std::cell::{
    Cell,
    RefCell,
};
use std::rc::{
    Rc,
    Weak,
};

/// 共有コールバック型
type Callback<E> = Rc<dyn Fn(&E)>;

/// 購読 ID 付きの登録済みコールバック
struct Registry<E> {
    /// 次の購読 ID
    next_id: Cell<u64>,
    /// 登録順のコールバック
    callbacks: RefCell<Vec<(u64, Callback<E>)>>,
}

/// 単一のイベントストリーム
///
/// クローンは同じ購読者リストを共有します。
pub struct EventEmitter<E> {
    /// 共有レジストリ
    registry: Rc<Registry<E>>,
}

impl<E> Clone for EventEmitter<E> {
    fn clone(&self) -> Self {
        Self { registry: Rc::clone(&self.registry) }
    }
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self {
            registry: Rc::new(Registry { next_id: Cell::new(0), callbacks: RefCell::new(Vec::new()) }),
        }
    }
}

impl<E> EventEmitter<E> {
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.callbacks.borrow().len()
    }
}

impl<E> std::fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<E: 'static> EventEmitter<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `callback` を登録。返されたガードが生きている間は登録されたまま
    pub fn subscribe(&self, callback: impl Fn(&E) + 'static) -> Subscription {
        let id = self.registry.next_id.get();
        self.registry.next_id.set(id + 1);
        let callback: Callback<E> = Rc::new(callback);
        self.registry.callbacks.borrow_mut().push((id, callback));

        let registry: Weak<Registry<E>> = Rc::downgrade(&self.registry);
        Subscription { unsubscribe: Some(Box::new(move || remove(&registry, id))) }
    }

    /// 現在の全購読者を `event` で呼び出す
    ///
    /// 購読者リストは先にスナップショットを取るため、コールバック内での
    /// 購読・解除・再送信で借用が衝突しません。
    pub fn emit(&self, event: &E) {
        let callbacks: Vec<Callback<E>> = self
            .registry
            .callbacks
            .borrow()
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();

        for callback in callbacks {
            callback(event);
        }
    }

}

/// レジストリが残っていれば購読 `id` を解除
fn remove<E>(registry: &Weak<Registry<E>>, id: u64) {
    if let Some(registry) = registry.upgrade() {
        registry.callbacks.borrow_mut().retain(|(other, _)| *other != id);
    }
}

/// コールバックの登録を保持するガード。ドロップで購読解除
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    /// 解除処理（ドロップ時に取り出す）
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// 即座に購読解除
    pub fn unsubscribe(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("active", &self.unsubscribe.is_some()).finish()
    }
}

#[cfg(test)]
mod tests {
    use googletest::prelude::*;

    use super::*;

    #[googletest::test]
    fn subscribers_are_called_in_registration_order() {
        let emitter = EventEmitter::<u32>::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let first_log = Rc::clone(&log);
        let _first = emitter.subscribe(move |n| first_log.borrow_mut().push(format!("first {n}")));
        let second_log = Rc::clone(&log);
        let _second = emitter.subscribe(move |n| second_log.borrow_mut().push(format!("second {n}")));

        emitter.emit(&7);

        let entries = log.borrow().clone();
        expect_that!(entries, elements_are![eq("first 7"), eq("second 7")]);
    }

    #[googletest::test]
    fn dropping_the_guard_unsubscribes() {
        let emitter = EventEmitter::<()>::new();
        let count = Rc::new(Cell::new(0));

        let counter = Rc::clone(&count);
        let subscription = emitter.subscribe(move |_| counter.set(counter.get() + 1));
        emitter.emit(&());
        drop(subscription);
        emitter.emit(&());

        expect_that!(count.get(), eq(1));
        expect_that!(emitter.subscriber_count(), eq(0));
    }

    #[googletest::test]
    fn explicit_unsubscribe_leaves_other_subscribers() {
        let emitter = EventEmitter::<()>::new();
        let count = Rc::new(Cell::new(0));

        let first = emitter.subscribe(|_| {});
        let counter = Rc::clone(&count);
        let _second = emitter.subscribe(move |_| counter.set(counter.get() + 1));
        first.unsubscribe();
        emitter.emit(&());

        expect_that!(count.get(), eq(1));
        expect_that!(emitter.subscriber_count(), eq(1));
    }

    #[googletest::test]
    fn callbacks_may_subscribe_while_emitting() {
        let emitter = EventEmitter::<()>::new();
        let late = Rc::new(RefCell::new(Vec::new()));

        let inner_emitter = emitter.clone();
        let inner_late = Rc::clone(&late);
        let _outer = emitter.subscribe(move |_| {
            inner_late.borrow_mut().push(inner_emitter.subscribe(|_| {}));
        });
        emitter.emit(&());

        expect_that!(emitter.subscriber_count(), eq(2));
    }

    #[googletest::test]
    fn debug_output_reports_subscribers() {
        let emitter = EventEmitter::<&str>::new();
        let _subscription = emitter.subscribe(|_| {});

        expect_that!(format!("{emitter:?}"), eq("EventEmitter { subscribers: 1 }"));
    }

    #[googletest::test]
    fn guard_outliving_the_emitter_is_harmless() {
        let emitter = EventEmitter::<()>::new();
        let subscription = emitter.subscribe(|_| {});
        drop(emitter);
        drop(subscription);
    }
}
