//! 利用側ごとの解決結果キャッシュ
//!
//! [`TranslatePipe`] は描画のたびに同じキーとパラメーターで呼び出されます。
//! 関係する変更がない限りキャッシュから返し、サービスから変更が通知されると
//! 自分で再計算し、表示中の値が古くなったら
//! [`ChangeDetector::mark_for_check`] でビューに知らせます。

use std::cell::RefCell;
use std::rc::{
    Rc,
    Weak,
};
use std::task::Context;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde_json::Value;

use crate::parser::{
    InvalidParameterError,
    normalize,
};
use crate::service::{
    Parsed,
    TranslateService,
};
use crate::store::Subscription;
use crate::types::{
    Params,
    RawParams,
    TranslationEvent,
};

/// ビューの「再描画が必要」フック
pub trait ChangeDetector {
    fn mark_for_check(&self);
}

impl<F: Fn()> ChangeDetector for F {
    fn mark_for_check(&self) {
        self();
    }
}

/// 1 つの [`TranslateService`] に紐づくキャッシュ付き翻訳リゾルバー
///
/// ドロップすると購読を解除し、待機中の非同期結果も破棄します。
pub struct TranslatePipe {
    /// イベントコールバックやタスクから参照される状態
    shared: Rc<PipeShared>,
    /// 言語・デフォルト言語・翻訳変更の購読
    _subscriptions: [Subscription; 3],
}

/// コールバックと共有するパイプの状態
struct PipeShared {
    /// 検索に使うサービス
    service: TranslateService,
    /// 値が変わったときに通知するビュー
    detector: Box<dyn ChangeDetector>,
    /// キャッシュエントリと値
    state: RefCell<PipeState>,
}

/// パイプの可変部分
#[derive(Default)]
struct PipeState {
    /// 直前の解決の入力
    entry: Option<CacheEntry>,
    /// 直前に生成した値
    value: Option<Value>,
    /// 検索ごとに進める。古い検索の遅れて届いた非同期結果は破棄する
    generation: u64,
    /// サービスにスポナーがない場合の、最新の検索のハンドラー結果の配送
    pending: Option<LocalBoxFuture<'static, ()>>,
}

impl std::fmt::Debug for PipeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeState")
            .field("entry", &self.entry)
            .field("value", &self.value)
            .field("generation", &self.generation)
            .field("pending", &self.pending.is_some())
            .finish()
    }
}

/// キャッシュ値の計算元
#[derive(Debug)]
struct CacheEntry {
    /// 翻訳キー
    key: String,
    /// 呼び出し元から渡されたままのパラメーター
    params: Option<RawParams>,
    /// 正規化済みパラメーター
    interpolate_params: Option<Params>,
    /// 値に対応するストアのバージョン
    version: u64,
}

impl std::fmt::Debug for TranslatePipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslatePipe").field("state", &self.shared.state).finish_non_exhaustive()
    }
}

impl TranslatePipe {
    /// パイプを作成し、サービスの変更イベントを購読する
    pub fn new(service: TranslateService, detector: impl ChangeDetector + 'static) -> Self {
        let shared = Rc::new(PipeShared {
            service: service.clone(),
            detector: Box::new(detector),
            state: RefCell::default(),
        });

        let on_lang = Self::refresher(&shared, |_, _| true);
        let on_default_lang = Self::refresher(&shared, |_, _| true);
        let on_translation = Self::refresher(&shared, |service, event| {
            service.current_lang().as_deref() == Some(event.lang.as_str())
                || service.default_lang().as_deref() == Some(event.lang.as_str())
        });

        let subscriptions = [
            service.on_lang_change(on_lang),
            service.on_default_lang_change(on_default_lang),
            service.on_translation_change(on_translation),
        ];

        Self { shared, _subscriptions: subscriptions }
    }

    /// `relevant` が真のときパイプを再計算するイベントコールバック
    fn refresher(
        shared: &Rc<PipeShared>,
        relevant: impl Fn(&TranslateService, &TranslationEvent) -> bool + 'static,
    ) -> impl Fn(&TranslationEvent) + 'static {
        let pipe: Weak<PipeShared> = Rc::downgrade(shared);
        move |event| {
            if let Some(pipe) = pipe.upgrade()
                && relevant(&pipe.service, event)
            {
                pipe.refresh();
            }
        }
    }

    /// 型の緩いエントリポイント
    ///
    /// キーが無い・null・文字列以外・空文字列の場合はそのまま返します。
    /// 引数はオブジェクトか空でない文字列ならパラメーターとして使い、
    /// それ以外はパラメーターなしとして扱います。
    ///
    /// # Errors
    /// 文字列のパラメーターを解析できない場合は [`InvalidParameterError`]
    pub fn transform(
        &self,
        query: Option<&Value>,
        args: Option<&Value>,
    ) -> Result<Option<Value>, InvalidParameterError> {
        let Some(query) = query else {
            return Ok(None);
        };
        let key = match query {
            Value::String(key) if !key.is_empty() => key,
            other => return Ok(Some(other.clone())),
        };

        let params = args.and_then(RawParams::from_value);
        self.resolve(key, params).map(Some)
    }

    /// `key` を `params` で解決（可能ならキャッシュから返す）
    ///
    /// 未翻訳ハンドラーが非同期に答える場合、暫定値は `""` です。
    /// 最終値が届いた時点で保存し、検知側に通知します。
    /// サービスにスポナーが設定されていればそれが結果を駆動し、
    /// ない場合はここでパイプ自身が確認するため、
    /// 準備ができた後の次の呼び出しで反映されます。
    ///
    /// # Errors
    /// 文字列のパラメーターを解析できない場合は [`InvalidParameterError`]。
    /// その場合キャッシュは変更しません。
    pub fn resolve(&self, key: &str, params: Option<RawParams>) -> Result<Value, InvalidParameterError> {
        if key.is_empty() {
            return Ok(Value::String(String::new()));
        }
        let params = params.filter(|params| !params.is_empty());
        self.shared.poll_pending();
        let version = self.shared.service.version();

        if let Some(value) = self.shared.cached(key, params.as_ref(), version) {
            return Ok(value);
        }

        let interpolate_params = params.as_ref().map(normalize).transpose()?;
        tracing::trace!(key, version, "Translation cache miss");

        self.shared.state.borrow_mut().entry =
            Some(CacheEntry { key: key.to_string(), params, interpolate_params, version });
        Ok(self.shared.update_value())
    }

    /// 直前に生成した値
    #[must_use]
    pub fn value(&self) -> Option<Value> {
        self.shared.state.borrow().value.clone()
    }
}

impl PipeShared {
    /// この入力に対するキャッシュ値（まだ有効な場合）
    fn cached(&self, key: &str, params: Option<&RawParams>, version: u64) -> Option<Value> {
        let state = self.state.borrow();
        let entry = state.entry.as_ref()?;
        if entry.key == key && entry.params.as_ref() == params && entry.version == version {
            state.value.clone()
        } else {
            None
        }
    }

    /// ストア変更後に現在のエントリの値を再計算
    fn refresh(self: &Rc<Self>) {
        let version = self.service.version();
        {
            let mut state = self.state.borrow_mut();
            let Some(entry) = state.entry.as_mut() else {
                return;
            };
            entry.version = version;
        }
        tracing::trace!(version, "Refreshing translation");
        self.update_value();
    }

    /// 現在のエントリを検索して結果を保存
    fn update_value(self: &Rc<Self>) -> Value {
        let (key, params, generation) = {
            let mut state = self.state.borrow_mut();
            state.generation += 1;
            state.pending = None;
            let generation = state.generation;
            match &state.entry {
                Some(entry) => (entry.key.clone(), entry.interpolate_params.clone(), generation),
                None => return Value::String(String::new()),
            }
        };

        match self.service.get_parsed_result(&key, params.as_ref()) {
            Parsed::Ready(value) => {
                self.set_value(value.clone());
                value
            }
            Parsed::Pending(text) => {
                let provisional = Value::String(String::new());
                self.set_value(provisional.clone());

                let pipe = Rc::downgrade(self);
                let delivery = async move {
                    let text = text.await;
                    let Some(pipe) = pipe.upgrade() else {
                        return;
                    };
                    let latest = pipe.state.borrow().generation == generation;
                    if latest {
                        pipe.set_value(Value::String(text));
                    } else {
                        tracing::trace!(key = %key, "Dropping superseded translation");
                    }
                };
                if let Some(delivery) = self.service.spawn(delivery.boxed_local()) {
                    self.state.borrow_mut().pending = Some(delivery);
                }
                provisional
            }
        }
    }

    /// パイプが保持している配送をポーリング
    fn poll_pending(&self) {
        let (mut pending, generation) = {
            let mut state = self.state.borrow_mut();
            let Some(pending) = state.pending.take() else {
                return;
            };
            (pending, state.generation)
        };

        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        if pending.poll_unpin(&mut cx).is_pending() {
            let mut state = self.state.borrow_mut();
            if state.generation == generation && state.pending.is_none() {
                state.pending = Some(pending);
            }
        }
    }

    /// `value` を保存し、異なる値を置き換えた場合は検知側に通知
    fn set_value(&self, value: Value) {
        let changed = {
            let mut state = self.state.borrow_mut();
            let changed = state.value.as_ref().is_some_and(|old| *old != value);
            state.value = Some(value);
            changed
        };
        if changed {
            self.detector.mark_for_check();
        }
    }
}
