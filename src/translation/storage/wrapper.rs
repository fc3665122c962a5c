//! 双内容包装编解码
//!
//! 持久化格式（跨版本保持稳定）：
//!
//! ```text
//! <div class="ttcn-wrap" data-ttcn-sign="SIG">
//!   <!--TT_ORIG_B64:BASE64(原文)-->
//!   <div class="ttcn-original">原文</div>
//!   <div class="ttcn-translated">译文</div>
//! </div>
//! ```
//!
//! 两个可视面板的有无与先后顺序编码了显示模式。原文以 Base64 写在注释中，
//! 可以经受只保留注释、剔除未知属性的 HTML 清理器。

use std::sync::OnceLock;

use base64::{prelude::BASE64_STANDARD, Engine};
use regex::Regex;

use super::signature::Signature;
use crate::translation::config::DisplayMode;
use crate::translation::pipeline::markup::{self, Tag, TagScanner};

/// 外层容器类名
pub const WRAP_CLASS: &str = "ttcn-wrap";
/// 原文面板类名
pub const ORIGINAL_CLASS: &str = "ttcn-original";
/// 译文面板类名
pub const TRANSLATED_CLASS: &str = "ttcn-translated";
/// 签名属性名
pub const SIGN_ATTR: &str = "data-ttcn-sign";
/// 原文注释前缀
pub const ORIGINAL_MARKER: &str = "TT_ORIG_B64:";

fn original_comment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<!--TT_ORIG_B64:([A-Za-z0-9+/=]*)-->").expect("原文注释正则无效")
    })
}

fn class_attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\bclass\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("class 属性正则无效")
    })
}

fn sign_attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\bdata-ttcn-sign\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("签名属性正则无效")
    })
}

/// 解码后的包装内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wrapper {
    /// 恢复出的原文
    pub original: String,
    /// 译文面板内容
    pub translated: Option<String>,
    pub signature: Option<Signature>,
    pub display_mode: DisplayMode,
}

/// 元素在文档中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ElementSpan {
    start: usize,
    inner_start: usize,
    inner_end: usize,
    end: usize,
}

/// 包装编解码器
pub struct WrapperCodec;

impl WrapperCodec {
    /// 文档中是否存在包装容器；只看开始标签，不要求结束标签配对
    pub fn has_wrapper(html: &str) -> bool {
        find_open_div(html, WRAP_CLASS, 0).is_some()
    }

    /// 生成包装
    pub fn encode(
        original_html: &str,
        translated_html: &str,
        signature: &Signature,
        display_mode: DisplayMode,
    ) -> String {
        let encoded = BASE64_STANDARD.encode(original_html.as_bytes());
        let original_pane = format!(r#"<div class="{}">{}</div>"#, ORIGINAL_CLASS, original_html);
        let translated_pane =
            format!(r#"<div class="{}">{}</div>"#, TRANSLATED_CLASS, translated_html);

        let mut html = String::with_capacity(
            encoded.len() + original_pane.len() + translated_pane.len() + 160,
        );
        html.push_str(&format!(
            r#"<div class="{}" {}="{}">"#,
            WRAP_CLASS,
            SIGN_ATTR,
            markup::escape_html(signature.as_str())
        ));
        html.push_str(&format!("<!--{}{}-->", ORIGINAL_MARKER, encoded));
        match display_mode {
            DisplayMode::TranslatedOnly => html.push_str(&translated_pane),
            DisplayMode::TransThenOrig => {
                html.push_str(&translated_pane);
                html.push_str(&original_pane);
            }
            DisplayMode::OrigThenTrans => {
                html.push_str(&original_pane);
                html.push_str(&translated_pane);
            }
        }
        html.push_str("</div>");
        html
    }

    /// 恢复原文：优先解码注释中的 Base64，其次取原文面板
    pub fn decode_original(html: &str) -> Option<String> {
        let from = find_open_div(html, WRAP_CLASS, 0).map_or(0, |tag| tag.end);
        if let Some(original) = decode_comment(&html[from..]) {
            return Some(original);
        }
        tracing::debug!("原文注释缺失或损坏，尝试原文面板");
        pane_inner(html, ORIGINAL_CLASS).map(str::to_string)
    }

    /// 取译文面板内容
    pub fn decode_translated(html: &str) -> Option<String> {
        pane_inner(html, TRANSLATED_CLASS).map(str::to_string)
    }

    /// 读取容器上的签名
    pub fn decode_signature(html: &str) -> Option<Signature> {
        let wrap = find_open_div(html, WRAP_CLASS, 0)?;
        let caps = sign_attr_regex().captures(wrap.raw_attributes(html))?;
        let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
        Signature::parse(&markup::decode_entities(raw))
    }

    /// 根据面板开始标签的有无和顺序推断显示模式
    pub fn decode_display_mode(html: &str) -> Option<DisplayMode> {
        let from = find_open_div(html, WRAP_CLASS, 0).map_or(0, |tag| tag.end);
        let original = find_open_div(html, ORIGINAL_CLASS, from);
        let translated = find_open_div(html, TRANSLATED_CLASS, from);
        match (original, translated) {
            (Some(o), Some(t)) if t.start < o.start => Some(DisplayMode::TransThenOrig),
            (Some(_), Some(_)) => Some(DisplayMode::OrigThenTrans),
            (None, Some(_)) => Some(DisplayMode::TranslatedOnly),
            _ => None,
        }
    }

    /// 完整解码；没有包装或无法恢复原文时返回 `None`
    pub fn decode(html: &str) -> Option<Wrapper> {
        if !Self::has_wrapper(html) {
            return None;
        }
        Some(Wrapper {
            original: Self::decode_original(html)?,
            translated: Self::decode_translated(html),
            signature: Self::decode_signature(html),
            display_mode: Self::decode_display_mode(html).unwrap_or_default(),
        })
    }

    /// 去掉包装：优先原文面板，其次译文面板，最后直接拆掉外层容器
    pub fn strip(html: &str) -> String {
        let Some(wrap) = find_wrap(html) else {
            return html.to_string();
        };

        if let Some(inner) = pane_inner(html, ORIGINAL_CLASS) {
            return inner.to_string();
        }
        if let Some(inner) = pane_inner(html, TRANSLATED_CLASS) {
            return inner.to_string();
        }

        let inner = &html[wrap.inner_start..wrap.inner_end];
        let inner = original_comment_regex().replace_all(inner, "");
        let mut out = String::with_capacity(html.len());
        out.push_str(&html[..wrap.start]);
        out.push_str(&inner);
        out.push_str(&html[wrap.end..]);
        out
    }

    /// 预处理：有包装时恢复原文（失败则去包装），否则原样返回
    pub fn recover_original(html: &str) -> String {
        if !Self::has_wrapper(html) {
            return html.to_string();
        }
        Self::decode_original(html).unwrap_or_else(|| {
            tracing::warn!("包装内原文无法恢复，使用去包装后的内容");
            Self::strip(html)
        })
    }
}

fn decode_comment(html: &str) -> Option<String> {
    let caps = original_comment_regex().captures(html)?;
    let bytes = match BASE64_STANDARD.decode(caps.get(1)?.as_str()) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!("原文 Base64 解码失败: {}", e);
            return None;
        }
    };
    String::from_utf8(bytes).ok()
}

fn pane_inner<'a>(html: &'a str, class: &str) -> Option<&'a str> {
    let span = find_div_with_class(html, class)?;
    Some(&html[span.inner_start..span.inner_end])
}

/// 从 `from` 开始按类名查找第一个 div 开始标签
fn find_open_div(html: &str, class: &str, from: usize) -> Option<Tag> {
    TagScanner::starting_at(html, from).find(|tag| {
        !tag.closing && tag.name == "div" && has_class(tag.raw_attributes(html), class)
    })
}

/// 外层容器的范围；原文中 div 不配对时，容器延伸到最后一个 `</div>`（没有则到文末）
fn find_wrap(html: &str) -> Option<ElementSpan> {
    let open = find_open_div(html, WRAP_CLASS, 0)?;
    let (inner_end, end) = match markup::find_matching_close(html, "div", open.end) {
        Some(close) => close,
        None => match html[open.end..].rfind("</div>") {
            Some(idx) => (open.end + idx, open.end + idx + "</div>".len()),
            None => (html.len(), html.len()),
        },
    };
    Some(ElementSpan {
        start: open.start,
        inner_start: open.end,
        inner_end,
        end,
    })
}

/// 按类名查找第一个 div，并以同名深度配对找到其结束标签
fn find_div_with_class(html: &str, class: &str) -> Option<ElementSpan> {
    for tag in TagScanner::new(html) {
        if tag.closing || tag.self_closing || tag.name != "div" {
            continue;
        }
        if !has_class(tag.raw_attributes(html), class) {
            continue;
        }
        let (close_start, close_end) = markup::find_matching_close(html, "div", tag.end)?;
        return Some(ElementSpan {
            start: tag.start,
            inner_start: tag.end,
            inner_end: close_start,
            end: close_end,
        });
    }
    None
}

fn has_class(attributes: &str, class: &str) -> bool {
    class_attr_regex()
        .captures_iter(attributes)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .any(|value| value.as_str().split_whitespace().any(|token| token == class))
}
