//! Localized user-facing strings for the bridge.
//!
//! A static two-language catalog with `{param}` substitution. Keys form a
//! closed set so a missing translation is a compile error, not a runtime
//! fallback.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Languages the bridge can reply in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Zh,
}

impl Language {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Zh => "zh",
        }
    }

    /// Map a raw user-supplied code to a supported language.
    #[must_use]
    pub fn normalize(raw: &str) -> Option<Language> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "en" | "en-us" | "en-gb" | "english" => Some(Language::En),
            "zh" | "zh-cn" | "zh-tw" | "zh-hans" | "chinese" => Some(Language::Zh),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of user-facing message keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    PleaseBind,
    NoApiKey,
    BindUsage,
    AlreadyBound,
    InvalidApiKey,
    BindingSuccess,
    LangUsage,
    LangFixed,
    LangInvalid,
    LangUpdated,
    Help,
    ListUsage,
    ListEmpty,
    ListHeader,
    ListMore,
    ListFailed,
    AddedToInbox,
    TooManyFiles,
    FileTooLarge,
    UnsupportedFileType,
    FileContentMissing,
    ProcessingError,
    AiCompleted,
    AiFailed,
    RoutingCompleted,
    RoutingFailed,
}

/// Static message catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct Catalog;

impl Catalog {
    /// Render a message, substituting `{name}` placeholders from `params`.
    /// Placeholders without a matching param are left verbatim.
    #[must_use]
    pub fn message(&self, lang: Language, key: MessageKey, params: &[(&str, &str)]) -> String {
        let mut text = template(lang, key).to_string();
        for (name, value) in params {
            text = text.replace(&format!("{{{name}}}"), value);
        }
        text
    }
}

fn template(lang: Language, key: MessageKey) -> &'static str {
    use {Language::*, MessageKey::*};
    match (lang, key) {
        (En, PleaseBind) => "Please bind your account first: /bind <api-key>",
        (Zh, PleaseBind) => "请先绑定账号：/bind <api-key>",

        (En, NoApiKey) => "No API key is bound to this chat. Use /bind <api-key> to set one.",
        (Zh, NoApiKey) => "当前会话未绑定 API 密钥，请使用 /bind <api-key> 绑定。",

        (En, BindUsage) => "Usage: /bind <api-key>",
        (Zh, BindUsage) => "用法：/bind <api-key>",

        (En, AlreadyBound) => "This chat is already bound to your account.",
        (Zh, AlreadyBound) => "当前会话已绑定到你的账号。",

        (En, InvalidApiKey) => "That API key was not recognized. Check it and try again.",
        (Zh, InvalidApiKey) => "API 密钥无效，请检查后重试。",

        (En, BindingSuccess) => "Account bound successfully. Send me anything to file it.",
        (Zh, BindingSuccess) => "绑定成功！现在可以直接发送内容收藏了。",

        (En, LangUsage) => "Usage: /lang <en|zh>. Current language: {language}",
        (Zh, LangUsage) => "用法：/lang <en|zh>。当前语言：{language}",

        (En, LangFixed) => "Language on this platform is fixed and cannot be changed.",
        (Zh, LangFixed) => "该平台的语言为固定设置，无法修改。",

        (En, LangInvalid) => "Unsupported language: {language}. Supported: en, zh.",
        (Zh, LangInvalid) => "不支持的语言：{language}。支持：en、zh。",

        (En, LangUpdated) => "Language updated to {language}.",
        (Zh, LangUpdated) => "语言已切换为 {language}。",

        (En, Help) => {
            "Commands:\n\
             /start - show binding status\n\
             /bind <api-key> - bind this chat to your account\n\
             /lang <en|zh> - set reply language\n\
             /list [page] [limit] - list your items\n\
             /help - show this help\n\
             Anything else you send is filed to your inbox."
        },
        (Zh, Help) => {
            "命令：\n\
             /start - 查看绑定状态\n\
             /bind <api-key> - 绑定当前会话\n\
             /lang <en|zh> - 设置回复语言\n\
             /list [页码] [数量] - 查看收藏列表\n\
             /help - 显示本帮助\n\
             发送其它内容将直接存入收藏。"
        },

        (En, ListUsage) => "Usage: /list [page >= 1] [limit 1-50]",
        (Zh, ListUsage) => "用法：/list [页码 >= 1] [数量 1-50]",

        (En, ListEmpty) => "Your inbox is empty.",
        (Zh, ListEmpty) => "收藏列表为空。",

        (En, ListHeader) => "Inbox — page {page}/{pages}, {total} items:",
        (Zh, ListHeader) => "收藏 — 第 {page}/{pages} 页，共 {total} 条：",

        (En, ListMore) => "Send /list {page} for more items.",
        (Zh, ListMore) => "发送 /list {page} 查看更多。",

        (En, ListFailed) => "Could not fetch your items: {error}",
        (Zh, ListFailed) => "获取列表失败：{error}",

        (En, AddedToInbox) => "Added to inbox",
        (Zh, AddedToInbox) => "已加入收藏",

        (En, TooManyFiles) => "Too many files: at most {max} attachments per message.",
        (Zh, TooManyFiles) => "文件过多：每条消息最多 {max} 个附件。",

        (En, FileTooLarge) => "File too large: {name} exceeds {max_mb} MiB.",
        (Zh, FileTooLarge) => "文件过大：{name} 超过 {max_mb} MiB。",

        (En, UnsupportedFileType) => "Unsupported file type for {name}: {mime}",
        (Zh, UnsupportedFileType) => "不支持的文件类型 {name}：{mime}",

        (En, FileContentMissing) => "Cannot read the content of {name}.",
        (Zh, FileContentMissing) => "无法读取 {name} 的内容。",

        (En, ProcessingError) => "Something went wrong: {error}",
        (Zh, ProcessingError) => "处理出错：{error}",

        (En, AiCompleted) => "AI analysis done — {category} ({confidence}%)\n{summary}",
        (Zh, AiCompleted) => "AI 分析完成 — {category}（{confidence}%）\n{summary}",

        (En, AiFailed) => "AI analysis failed: {error}",
        (Zh, AiFailed) => "AI 分析失败：{error}",

        (En, RoutingCompleted) => "Filed to: {targets}",
        (Zh, RoutingCompleted) => "已归档到:{targets}",

        (En, RoutingFailed) => "Routing failed: {error}",
        (Zh, RoutingFailed) => "归档失败:{error}",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_accepts_common_aliases() {
        assert_eq!(Language::normalize("EN"), Some(Language::En));
        assert_eq!(Language::normalize("en-US"), Some(Language::En));
        assert_eq!(Language::normalize("zh-CN"), Some(Language::Zh));
        assert_eq!(Language::normalize(" zh "), Some(Language::Zh));
        assert_eq!(Language::normalize("fr"), None);
        assert_eq!(Language::normalize(""), None);
    }

    #[test]
    fn substitutes_params() {
        let text = Catalog.message(
            Language::En,
            MessageKey::LangUpdated,
            &[("language", "zh")],
        );
        assert_eq!(text, "Language updated to zh.");
    }

    #[test]
    fn unmatched_placeholder_is_left_verbatim() {
        let text = Catalog.message(Language::En, MessageKey::ListFailed, &[]);
        assert!(text.contains("{error}"));
    }

    #[test]
    fn chinese_catalog_is_complete_for_core_keys() {
        for key in [
            MessageKey::PleaseBind,
            MessageKey::BindingSuccess,
            MessageKey::AddedToInbox,
            MessageKey::TooManyFiles,
        ] {
            assert!(!Catalog.message(Language::Zh, key, &[]).is_empty());
        }
    }
}
