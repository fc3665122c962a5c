//! 文本过滤器模块
//!
//! 基于文字脚本的简单启发式：判断一段文本是否已满足目标语言，从而跳过翻译。
//! 这不是完整的语言检测，漏判（未翻译的文本原样通过）是可以接受的。

use super::markup;

/// 单段文本的判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextVerdict {
    /// 折叠空白后为空
    Blank,
    /// 已经是目标语言
    AlreadyTarget,
    /// 需要翻译
    Translate,
}

impl TextVerdict {
    /// 是否跳过翻译
    pub fn is_skip(self) -> bool {
        !matches!(self, TextVerdict::Translate)
    }
}

/// 语言启发式
#[derive(Debug, Clone, Copy, Default)]
pub struct LanguageHeuristic;

impl LanguageHeuristic {
    pub fn new() -> Self {
        Self
    }

    /// 对文本进行判定
    pub fn classify(&self, text: &str, target_lang: &str) -> TextVerdict {
        if text.trim().is_empty() {
            return TextVerdict::Blank;
        }

        if is_chinese_target(target_lang) && contains_han(text) {
            return TextVerdict::AlreadyTarget;
        }

        TextVerdict::Translate
    }

    /// 是否应当跳过翻译
    pub fn should_skip(&self, text: &str, target_lang: &str) -> bool {
        self.classify(text, target_lang).is_skip()
    }

    /// 对 HTML 片段先去标签、解码实体再判定
    pub fn classify_html(&self, html: &str, target_lang: &str) -> TextVerdict {
        let text = markup::collapse_whitespace(&markup::decode_entities(&markup::strip_tags(html)));
        self.classify(&text, target_lang)
    }
}

/// 目标语言是否属于中文家族（zh、zh-cn、zh-hans、zh-tw ...）
pub fn is_chinese_target(target_lang: &str) -> bool {
    let lang = target_lang.trim().to_ascii_lowercase();
    lang == "zh" || lang.starts_with("zh-") || lang.starts_with("zh_")
}

/// 文本中是否含有汉字
pub fn contains_han(text: &str) -> bool {
    text.chars().any(is_han)
}

/// 汉字判定：CJK 统一表意文字及其扩展区、兼容区、部首与常用汉字符号
pub fn is_han(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{20000}'..='\u{2A6DF}'
        | '\u{2A700}'..='\u{2EBEF}'
        | '\u{30000}'..='\u{3134F}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{2F800}'..='\u{2FA1F}'
        | '\u{2E80}'..='\u{2FDF}'
        | '\u{3005}'
        | '\u{3007}'
        | '\u{3021}'..='\u{3029}'
        | '\u{3038}'..='\u{303B}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_text_is_skipped() {
        let heuristic = LanguageHeuristic::new();
        assert_eq!(heuristic.classify("", "zh-cn"), TextVerdict::Blank);
        assert_eq!(heuristic.classify("  \n\t ", "en"), TextVerdict::Blank);
        assert_eq!(heuristic.classify_html("<p> &nbsp; </p>", "en"), TextVerdict::Blank);
    }

    #[test]
    fn test_chinese_target_skips_han_text() {
        let heuristic = LanguageHeuristic::new();
        assert!(heuristic.should_skip("你好世界", "zh-cn"));
        assert!(heuristic.should_skip("Rust 1.80 发布", "zh-TW"));
        assert!(heuristic.should_skip("漢字", "zh_hant"));
        assert!(!heuristic.should_skip("Hello world", "zh-cn"));
    }

    #[test]
    fn test_non_chinese_target_does_not_skip_han() {
        let heuristic = LanguageHeuristic::new();
        assert_eq!(heuristic.classify("你好世界", "en"), TextVerdict::Translate);
        assert_eq!(heuristic.classify("你好世界", "ja"), TextVerdict::Translate);
    }

    #[test]
    fn test_chinese_target_detection() {
        assert!(is_chinese_target("zh"));
        assert!(is_chinese_target("ZH-CN"));
        assert!(is_chinese_target("zh-hans"));
        assert!(!is_chinese_target("zu"));
        assert!(!is_chinese_target("en"));
    }

    #[test]
    fn test_han_ranges() {
        assert!(is_han('中'));
        assert!(is_han('\u{3400}'));
        assert!(is_han('\u{20000}'));
        assert!(is_han('々'));
        assert!(!is_han('あ'));
        assert!(!is_han('한'));
        assert!(!is_han('a'));
    }
}
