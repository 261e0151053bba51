//! 翻訳サービス: 言語の状態、テーブルの読み込み、検索
//!
//! サービスは [`TranslateStore`] を所有し、唯一の書き込み元です。
//! 利用側は同じハンドルの安価なクローンを持ち、3 つのイベントストリームで変更を受け取ります。
//!
//! # 言語の切り替え
//!
//! `use_lang` と `set_default_lang` はテーブルが揃ってからイベントを発行します。
//! 読み込みは言語ごとに共有されるため、同じ言語への同時リクエストでもローダーの呼び出しは 1 回です。
//! 切り替えリクエストは世代番号を持ち、読み込み完了時に同種の新しいリクエストがあれば
//! 何もせず [`LangSwitch::Superseded`] を返します。

use std::cell::{
    Cell,
    RefCell,
};
use std::collections::HashMap;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{
    LocalBoxFuture,
    Shared,
};
use serde_json::Value;

use crate::config::TranslateSettings;
use crate::loader::{
    FakeLoader,
    LoaderError,
    TranslateLoader,
};
use crate::missing::{
    DefaultMissingHandler,
    MissingTranslation,
    MissingTranslationHandler,
    MissingTranslationParams,
};
use crate::parser::{
    DefaultParser,
    TranslateParser,
};
use crate::store::{
    EventEmitter,
    Subscription,
    TranslateStore,
};
use crate::types::{
    LangSwitch,
    Params,
    TranslationEvent,
};

/// 同じ言語への全リクエストで共有するテーブル読み込み
type SharedLoad = Shared<LocalBoxFuture<'static, Result<Rc<Value>, LoaderError>>>;

/// 呼び出し側のエグゼキューターでバックグラウンドタスクを実行
type Spawner = Box<dyn Fn(LocalBoxFuture<'static, ()>)>;

/// 同期検索の結果
pub enum Parsed {
    /// 値が確定している
    Ready(Value),
    /// 未翻訳ハンドラーが後で答える
    Pending(LocalBoxFuture<'static, String>),
}

impl std::fmt::Debug for Parsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Self::Pending(_) => f.write_str("Pending(<future>)"),
        }
    }
}

/// 翻訳コンテキストへのハンドル
///
/// クローンはストア・ローダー・購読者を共有します。
#[derive(Clone)]
pub struct TranslateService {
    /// 共有状態
    inner: Rc<ServiceInner>,
}

/// 全ハンドルで共有する状態
struct ServiceInner {
    /// 言語の状態とテーブル
    store: RefCell<TranslateStore>,
    /// 変更通知
    events: StoreEvents,
    /// テーブルの取得元
    loader: Box<dyn TranslateLoader>,
    /// 検索と補間
    parser: Box<dyn TranslateParser>,
    /// どのテーブルにもないキーの扱い
    missing_handler: Box<dyn MissingTranslationHandler>,
    /// 動作設定
    settings: TranslateSettings,
    /// パイプの非同期結果を実行するスポナー
    spawner: Option<Spawner>,
    /// 言語ごとの読み込み中の処理
    pending: RefCell<HashMap<String, PendingLoad>>,
    /// 次の読み込みに割り当てる ID
    next_load_id: Cell<u64>,
    /// 最新の `use_lang` 呼び出しの世代
    lang_request: Cell<u64>,
    /// 最新の `set_default_lang` 呼び出しの世代
    default_lang_request: Cell<u64>,
    /// 最新の `use_lang` 呼び出しの言語
    requested_lang: RefCell<Option<String>>,
}

/// 読み込み中の処理と、後続の読み込みと区別するための ID
struct PendingLoad {
    /// 読み込み ID
    id: u64,
    /// 読み込み本体
    load: SharedLoad,
}

/// 3 つの通知ストリーム
#[derive(Default)]
struct StoreEvents {
    /// 現在の言語の切り替え
    lang_change: EventEmitter<TranslationEvent>,
    /// デフォルト言語の切り替え
    default_lang_change: EventEmitter<TranslationEvent>,
    /// テーブルの設定・再読み込み
    translation_change: EventEmitter<TranslationEvent>,
}

impl std::fmt::Debug for TranslateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let store = self.inner.store.borrow();
        f.debug_struct("TranslateService")
            .field("current_lang", &store.current_lang())
            .field("default_lang", &store.default_lang())
            .field("langs", &store.langs())
            .field("version", &store.version())
            .field("loader", &"<dyn TranslateLoader>")
            .finish_non_exhaustive()
    }
}

impl TranslateService {
    #[must_use]
    pub fn builder() -> TranslateServiceBuilder {
        TranslateServiceBuilder::default()
    }

    /// 設定にデフォルト言語があれば適用
    pub async fn init(&self) -> Option<LangSwitch> {
        let lang = self.inner.settings.default_language.clone()?;
        Some(self.set_default_lang(&lang).await)
    }

    #[must_use]
    pub fn settings(&self) -> &TranslateSettings {
        &self.inner.settings
    }

    /// `task` を設定済みのスポナーに渡す
    ///
    /// スポナーがなければタスクをそのまま返します。
    #[must_use]
    pub(crate) fn spawn(&self, task: LocalBoxFuture<'static, ()>) -> Option<LocalBoxFuture<'static, ()>> {
        match &self.inner.spawner {
            Some(spawner) => {
                spawner(task);
                None
            }
            None => Some(task),
        }
    }

    #[must_use]
    pub fn current_lang(&self) -> Option<String> {
        self.inner.store.borrow().current_lang().map(str::to_string)
    }

    #[must_use]
    pub fn default_lang(&self) -> Option<String> {
        self.inner.store.borrow().default_lang().map(str::to_string)
    }

    #[must_use]
    pub fn langs(&self) -> Vec<String> {
        self.inner.store.borrow().langs().to_vec()
    }

    pub fn add_langs<S: AsRef<str>>(&self, langs: &[S]) {
        self.inner.store.borrow_mut().add_langs(langs);
    }

    /// 現在の言語・デフォルト言語・それらのテーブルが変わるたびに変化する
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.store.borrow().version()
    }

    /// `lang` のテーブルのスナップショット（読み込み済みの場合）
    #[must_use]
    pub fn get_translation(&self, lang: &str) -> Option<Rc<Value>> {
        self.inner.store.borrow().table(lang)
    }

    #[must_use]
    pub fn is_loading(&self, lang: &str) -> bool {
        self.inner.pending.borrow().contains_key(lang)
    }

    pub fn on_lang_change(&self, callback: impl Fn(&TranslationEvent) + 'static) -> Subscription {
        self.inner.events.lang_change.subscribe(callback)
    }

    pub fn on_default_lang_change(
        &self,
        callback: impl Fn(&TranslationEvent) + 'static,
    ) -> Subscription {
        self.inner.events.default_lang_change.subscribe(callback)
    }

    /// `set_translation` のたび、および現在の言語かデフォルト言語の
    /// 再読み込み完了時に発行
    pub fn on_translation_change(
        &self,
        callback: impl Fn(&TranslationEvent) + 'static,
    ) -> Subscription {
        self.inner.events.translation_change.subscribe(callback)
    }

    /// `lang` のテーブルを保存（既存テーブルは置換またはディープマージ）
    pub fn set_translation(&self, lang: &str, table: Value, should_merge: bool) {
        let event = {
            let mut store = self.inner.store.borrow_mut();
            store.insert_table(lang, table, should_merge);
            store.event(lang)
        };
        tracing::debug!(lang, should_merge, "Translations set");
        self.inner.events.translation_change.emit(&event);
    }

    /// 現在の言語を切り替える（必要なら先にテーブルを読み込む）
    ///
    /// デフォルト言語が未設定なら、最初に使った言語がデフォルト言語にもなります。
    pub async fn use_lang(&self, lang: &str) -> LangSwitch {
        let request = self.inner.lang_request.get() + 1;
        self.inner.lang_request.set(request);
        *self.inner.requested_lang.borrow_mut() = Some(lang.to_string());

        if self.current_lang().as_deref() == Some(lang) && !self.is_loading(lang) {
            tracing::debug!(lang, "Language already in use");
            return LangSwitch::Unchanged;
        }

        if let Some(outcome) = self.await_table(lang).await {
            return outcome;
        }
        if self.inner.lang_request.get() != request {
            tracing::debug!(lang, "Language switch superseded");
            return LangSwitch::Superseded;
        }
        if self.current_lang().as_deref() == Some(lang) {
            return LangSwitch::Unchanged;
        }

        self.change_lang(lang);
        LangSwitch::Switched
    }

    /// デフォルト言語を切り替える（必要なら先にテーブルを読み込む）
    pub async fn set_default_lang(&self, lang: &str) -> LangSwitch {
        let request = self.inner.default_lang_request.get() + 1;
        self.inner.default_lang_request.set(request);

        if self.default_lang().as_deref() == Some(lang) && !self.is_loading(lang) {
            return LangSwitch::Unchanged;
        }

        if let Some(outcome) = self.await_table(lang).await {
            return outcome;
        }
        if self.inner.default_lang_request.get() != request {
            tracing::debug!(lang, "Default language switch superseded");
            return LangSwitch::Superseded;
        }
        if self.default_lang().as_deref() == Some(lang) {
            return LangSwitch::Unchanged;
        }

        self.change_default_lang(lang);
        LangSwitch::Switched
    }

    /// ローダーから `lang` のテーブルを取得して保存
    ///
    /// # Errors
    /// ローダーのエラー。読み込み中に言語がリセットされた場合は [`LoaderError::Cancelled`]
    pub async fn load_translation(&self, lang: &str) -> Result<Rc<Value>, LoaderError> {
        self.load(lang).await
    }

    /// `lang` のテーブルを破棄し、読み込み中の処理も放棄
    pub fn reset_lang(&self, lang: &str) {
        self.inner.pending.borrow_mut().remove(lang);
        let active = self.inner.store.borrow_mut().remove_table(lang);
        tracing::debug!(lang, active, "Translations reset");
    }

    /// ローダーから `lang` のテーブルを再読み込み
    ///
    /// # Errors
    /// ローダーのエラー
    pub async fn reload_lang(&self, lang: &str) -> Result<Rc<Value>, LoaderError> {
        self.reset_lang(lang);
        self.load(lang).await
    }

    /// `key` を現在の言語で解決し、なければデフォルト言語、
    /// さらに未翻訳ハンドラーにフォールバック
    #[must_use]
    pub fn get_parsed_result(&self, key: &str, params: Option<&Params>) -> Parsed {
        let lang = self.current_lang();
        self.parse_in(lang.as_deref(), key, params)
    }

    /// 同期検索。ハンドラーが非同期に答える場合はキーを返す
    #[must_use]
    pub fn instant(&self, key: &str, params: Option<&Params>) -> Value {
        match self.get_parsed_result(key, params) {
            Parsed::Ready(value) => value,
            Parsed::Pending(_) => Value::String(key.to_string()),
        }
    }

    /// 複数キーをまとめて [`instant`](Self::instant)
    #[must_use]
    pub fn instant_many(&self, keys: &[&str], params: Option<&Params>) -> Params {
        keys.iter().map(|key| ((*key).to_string(), self.instant(key, params))).collect()
    }

    /// 最後に要求された言語のテーブルを待ってから `key` を解決
    /// （必要なら未翻訳ハンドラーの結果も待つ）
    pub async fn get(&self, key: &str, params: Option<&Params>) -> Value {
        let requested = self.inner.requested_lang.borrow().clone();

        if let Some(lang) = &requested {
            let load = self.inner.pending.borrow().get(lang).map(|pending| pending.load.clone());
            if let Some(load) = load
                && let Err(error) = load.await
            {
                tracing::debug!(lang = %lang, %error, "Resolving without the requested language");
            }
        }

        let lang = requested
            .filter(|lang| self.inner.store.borrow().has_table(lang))
            .or_else(|| self.current_lang());

        match self.parse_in(lang.as_deref(), key, params) {
            Parsed::Ready(value) => value,
            Parsed::Pending(text) => Value::String(text.await),
        }
    }

    /// `lang` を主言語として検索
    fn parse_in(&self, lang: Option<&str>, key: &str, params: Option<&Params>) -> Parsed {
        let (primary, fallback) = {
            let store = self.inner.store.borrow();
            let primary = lang.and_then(|lang| store.table(lang));
            let fallback = store
                .default_lang()
                .filter(|default| self.inner.settings.use_default_lang && lang != Some(*default))
                .and_then(|default| store.table(default));
            (primary, fallback)
        };

        let parser = &self.inner.parser;
        let found = [primary, fallback].into_iter().flatten().find_map(|table| {
            parser
                .get_value(&table, key)
                .filter(|value| !value.is_null())
                .map(|value| parser.interpolate(value, params))
        });
        if let Some(value) = found {
            return Parsed::Ready(value);
        }

        tracing::debug!(key, lang = ?lang, "Translation not found");
        let missing = MissingTranslationParams {
            key,
            translate_service: self,
            interpolate_params: params,
        };
        match self.inner.missing_handler.handle(missing) {
            MissingTranslation::Text(text) => Parsed::Ready(Value::String(text)),
            MissingTranslation::Pending(text) => Parsed::Pending(text),
            MissingTranslation::Unhandled => Parsed::Ready(Value::String(key.to_string())),
        }
    }

    /// `lang` のテーブルが揃っていることを保証
    ///
    /// 読み込めなかった場合は `Some(LangSwitch::Unavailable)` を返します。
    async fn await_table(&self, lang: &str) -> Option<LangSwitch> {
        let present = self.inner.store.borrow().has_table(lang);
        if present && !self.is_loading(lang) {
            return None;
        }

        match self.load(lang).await {
            Ok(_) => None,
            Err(error) => {
                tracing::debug!(lang, %error, "Language unavailable");
                Some(LangSwitch::Unavailable)
            }
        }
    }

    /// `lang` の読み込み中の処理を返す（なければ開始する）
    fn load(&self, lang: &str) -> SharedLoad {
        if let Some(pending) = self.inner.pending.borrow().get(lang) {
            return pending.load.clone();
        }

        let id = self.inner.next_load_id.get();
        self.inner.next_load_id.set(id + 1);
        tracing::debug!(lang, id, "Loading translations");

        let request = self.inner.loader.get_translation(lang);
        let service = Rc::downgrade(&self.inner);
        let lang_owned = lang.to_string();
        let load = async move {
            let result = request.await;
            match service.upgrade() {
                Some(inner) => TranslateService { inner }.complete_load(&lang_owned, id, result),
                None => result.map(Rc::new),
            }
        }
        .boxed_local()
        .shared();

        self.inner
            .pending
            .borrow_mut()
            .insert(lang.to_string(), PendingLoad { id, load: load.clone() });
        load
    }

    /// 完了した読み込みを保存（途中で放棄されていなければ）
    fn complete_load(
        &self,
        lang: &str,
        id: u64,
        result: Result<Value, LoaderError>,
    ) -> Result<Rc<Value>, LoaderError> {
        let current = self.inner.pending.borrow().get(lang).is_some_and(|pending| pending.id == id);
        if !current {
            tracing::debug!(lang, id, "Discarding abandoned load");
            return Err(LoaderError::Cancelled(lang.to_string()));
        }
        self.inner.pending.borrow_mut().remove(lang);

        let table = match result {
            Ok(table) => table,
            Err(error) => {
                tracing::warn!(lang, %error, "Failed to load translations");
                return Err(error);
            }
        };

        let (active, event) = {
            let mut store = self.inner.store.borrow_mut();
            let active = store.insert_table(lang, table, self.inner.settings.extend);
            (active, store.event(lang))
        };
        tracing::debug!(lang, id, active, "Translations loaded");

        let table = Rc::clone(&event.translations);
        if active {
            self.inner.events.translation_change.emit(&event);
        }
        Ok(table)
    }

    /// `lang` を現在の言語にして通知。デフォルト言語が未設定ならそれにも採用
    fn change_lang(&self, lang: &str) {
        let event = {
            let mut store = self.inner.store.borrow_mut();
            store.set_current_lang(lang);
            store.event(lang)
        };
        tracing::debug!(lang, "Current language changed");
        self.inner.events.lang_change.emit(&event);

        if self.default_lang().is_none() {
            self.change_default_lang(lang);
        }
    }

    /// `lang` をデフォルト言語にして通知
    fn change_default_lang(&self, lang: &str) {
        let event = {
            let mut store = self.inner.store.borrow_mut();
            store.set_default_lang(lang);
            store.event(lang)
        };
        tracing::debug!(lang, "Default language changed");
        self.inner.events.default_lang_change.emit(&event);
    }
}

/// [`TranslateService`] のビルダー
///
/// 未指定の部品は [`FakeLoader`]・[`DefaultParser`]・設定から作る
/// [`DefaultMissingHandler`] になります。
#[derive(Default)]
pub struct TranslateServiceBuilder {
    /// サービスに渡す設定
    settings: TranslateSettings,
    /// テーブルの取得元（未指定なら [`FakeLoader`]）
    loader: Option<Box<dyn TranslateLoader>>,
    /// 検索方法（未指定なら [`DefaultParser`]）
    parser: Option<Box<dyn TranslateParser>>,
    /// 未翻訳キーの扱い（未指定なら設定から作る）
    missing_handler: Option<Box<dyn MissingTranslationHandler>>,
    /// バックグラウンドタスクのスポナー（未指定ならなし）
    spawner: Option<Spawner>,
}

impl std::fmt::Debug for TranslateServiceBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslateServiceBuilder")
            .field("settings", &self.settings)
            .field("loader", &self.loader.is_some())
            .field("parser", &self.parser.is_some())
            .field("missing_handler", &self.missing_handler.is_some())
            .field("spawner", &self.spawner.is_some())
            .finish()
    }
}

impl TranslateServiceBuilder {
    #[must_use]
    pub fn settings(mut self, settings: TranslateSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn loader(mut self, loader: impl TranslateLoader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    #[must_use]
    pub fn parser(mut self, parser: impl TranslateParser + 'static) -> Self {
        self.parser = Some(Box::new(parser));
        self
    }

    #[must_use]
    pub fn missing_handler(mut self, handler: impl MissingTranslationHandler + 'static) -> Self {
        self.missing_handler = Some(Box::new(handler));
        self
    }

    /// 未翻訳ハンドラーが後から返す結果を実行するスポナー
    ///
    /// 指定しない場合、パイプが待機中の結果を自分で保持し、`resolve` のたびに確認します。
    ///
    /// ```no_run
    /// use translate_runtime::TranslateService;
    ///
    /// let service = TranslateService::builder()
    ///     .spawner(|task| drop(tokio::task::spawn_local(task)))
    ///     .build();
    /// ```
    #[must_use]
    pub fn spawner(mut self, spawner: impl Fn(LocalBoxFuture<'static, ()>) + 'static) -> Self {
        self.spawner = Some(Box::new(spawner));
        self
    }

    #[must_use]
    pub fn build(self) -> TranslateService {
        let missing_handler = self.missing_handler.unwrap_or_else(|| {
            Box::new(
                self.settings
                    .missing_translation
                    .clone()
                    .map_or_else(DefaultMissingHandler::new, DefaultMissingHandler::with_default_text),
            )
        });

        TranslateService {
            inner: Rc::new(ServiceInner {
                store: RefCell::new(TranslateStore::new()),
                events: StoreEvents::default(),
                loader: self.loader.unwrap_or_else(|| Box::new(FakeLoader)),
                parser: self.parser.unwrap_or_else(|| Box::new(DefaultParser)),
                missing_handler,
                settings: self.settings,
                spawner: self.spawner,
                pending: RefCell::new(HashMap::new()),
                next_load_id: Cell::new(0),
                lang_request: Cell::new(0),
                default_lang_request: Cell::new(0),
                requested_lang: RefCell::new(None),
            }),
        }
    }
}
