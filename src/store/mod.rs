//! 翻訳テーブルと言語の状態

/// オブザーバー登録
pub mod events;

use std::collections::HashMap;
use std::rc::Rc;

pub use events::{
    EventEmitter,
    Subscription,
};
use serde_json::Value;

use crate::types::TranslationEvent;

/// 言語ごとの翻訳テーブルと、現在の言語・デフォルト言語
///
/// `version` は解決結果が依存するもの（現在の言語、デフォルト言語、
/// またはそのどちらかのテーブル）が変わるたびに更新されます。
/// それ以外の言語のテーブルが変わっても `version` は変わりません。
#[derive(Debug, Default)]
pub struct TranslateStore {
    /// 検索に使う言語
    current_lang: Option<String>,
    /// フォールバック言語
    default_lang: Option<String>,
    /// 登録順の既知の言語
    langs: Vec<String>,
    /// 言語ごとの読み込み済みテーブル
    translations: HashMap<String, Rc<Value>>,
    /// 解決結果に関わる変更のカウンター
    version: u64,
}

impl TranslateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current_lang(&self) -> Option<&str> {
        self.current_lang.as_deref()
    }

    #[must_use]
    pub fn default_lang(&self) -> Option<&str> {
        self.default_lang.as_deref()
    }

    #[must_use]
    pub fn langs(&self) -> &[String] {
        &self.langs
    }

    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// `lang` が現在の言語またはデフォルト言語なら `true`
    #[must_use]
    pub fn is_active(&self, lang: &str) -> bool {
        self.current_lang() == Some(lang) || self.default_lang() == Some(lang)
    }

    #[must_use]
    pub fn table(&self, lang: &str) -> Option<Rc<Value>> {
        self.translations.get(lang).cloned()
    }

    #[must_use]
    pub fn has_table(&self, lang: &str) -> bool {
        self.translations.contains_key(lang)
    }

    /// `lang` のイベント用スナップショット（テーブル未読み込みなら空オブジェクト）
    #[must_use]
    pub fn event(&self, lang: &str) -> TranslationEvent {
        TranslationEvent {
            lang: lang.to_string(),
            translations: self.table(lang).unwrap_or_else(|| Rc::new(Value::Object(Default::default()))),
        }
    }

    pub fn add_langs<S: AsRef<str>>(&mut self, langs: &[S]) {
        for lang in langs {
            let lang = lang.as_ref();
            if !self.langs.iter().any(|known| known == lang) {
                self.langs.push(lang.to_string());
            }
        }
    }

    /// `lang` のテーブルとして `table` を保存
    ///
    /// `merge` が指定されていれば既存テーブルにディープマージします。
    /// 言語がアクティブ（解決結果が変わる）なら `true` を返します。
    pub fn insert_table(&mut self, lang: &str, table: Value, merge: bool) -> bool {
        let table = match self.translations.get(lang) {
            Some(existing) if merge => {
                let mut merged = Value::clone(existing);
                merge_deep(&mut merged, table);
                merged
            }
            _ => table,
        };

        self.translations.insert(lang.to_string(), Rc::new(table));
        self.add_langs(&[lang]);
        self.touch_if_active(lang)
    }

    /// `lang` のテーブルを破棄。言語がアクティブなら `true` を返します。
    pub fn remove_table(&mut self, lang: &str) -> bool {
        self.translations.remove(lang).is_some() && self.touch_if_active(lang)
    }

    pub fn set_current_lang(&mut self, lang: &str) {
        self.current_lang = Some(lang.to_string());
        self.version += 1;
    }

    pub fn set_default_lang(&mut self, lang: &str) {
        self.default_lang = Some(lang.to_string());
        self.version += 1;
    }

    /// `lang` がアクティブならバージョンを進める
    fn touch_if_active(&mut self, lang: &str) -> bool {
        let active = self.is_active(lang);
        if active {
            self.version += 1;
        }
        active
    }
}

/// `source` を `target` に再帰的にマージ
///
/// オブジェクト以外の値は `target` 側を上書きします。
pub fn merge_deep(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => merge_deep(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use googletest::prelude::*;
    use serde_json::json;

    use super::*;

    #[googletest::test]
    fn insert_registers_language() {
        let mut store = TranslateStore::new();

        store.insert_table("en", json!({ "A": "a" }), false);
        store.insert_table("fr", json!({ "A": "b" }), false);
        store.insert_table("en", json!({ "A": "c" }), false);

        expect_that!(store.langs(), elements_are![eq("en"), eq("fr")]);
        expect_that!(*store.table("en").unwrap(), eq(&json!({ "A": "c" })));
    }

    #[googletest::test]
    fn merge_keeps_existing_keys() {
        let mut store = TranslateStore::new();

        store.insert_table("en", json!({ "A": "a", "N": { "x": 1, "y": 2 } }), false);
        store.insert_table("en", json!({ "B": "b", "N": { "y": 3 } }), true);

        expect_that!(
            *store.table("en").unwrap(),
            eq(&json!({ "A": "a", "B": "b", "N": { "x": 1, "y": 3 } }))
        );
    }

    #[googletest::test]
    fn version_moves_only_for_active_languages() {
        let mut store = TranslateStore::new();
        store.set_current_lang("en");
        store.set_default_lang("de");
        let start = store.version();

        expect_that!(store.insert_table("fr", json!({}), false), eq(false));
        expect_that!(store.version(), eq(start));

        expect_that!(store.insert_table("en", json!({}), false), eq(true));
        expect_that!(store.insert_table("de", json!({}), false), eq(true));
        expect_that!(store.version(), eq(start + 2));

        expect_that!(store.remove_table("fr"), eq(false));
        expect_that!(store.remove_table("en"), eq(true));
        expect_that!(store.version(), eq(start + 3));
    }

    #[googletest::test]
    fn event_defaults_to_empty_table() {
        let store = TranslateStore::new();

        let event = store.event("xx");

        expect_that!(event.lang.as_str(), eq("xx"));
        expect_that!(*event.translations, eq(&json!({})));
    }

    #[googletest::test]
    fn merge_deep_replaces_non_objects() {
        let mut target = json!({ "a": { "b": 1 }, "c": "old" });

        merge_deep(&mut target, json!({ "a": "flat", "c": { "d": 2 } }));

        expect_that!(target, eq(&json!({ "a": "flat", "c": { "d": 2 } })));
    }
}
