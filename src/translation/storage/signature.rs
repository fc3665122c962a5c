//! 内容签名
//!
//! 签名是对（规范化原文、目标语言、服务、显示模式、条目键、流水线版本）的确定性摘要，
//! 用于判断条目是否需要重新翻译。

use std::fmt;

use sha2::{Digest, Sha256};

use crate::translation::config::DisplayMode;
use crate::translation::core::backend::ServiceKind;
use crate::translation::pipeline::markup;

/// 字段分隔符（单元分隔符），避免字段拼接产生歧义
const FIELD_SEPARATOR: u8 = 0x1f;

/// 签名输入
#[derive(Debug, Clone, Copy)]
pub struct SignatureInput<'a> {
    /// 已规范化的原文纯文本
    pub normalized_text: &'a str,
    pub target_lang: &'a str,
    pub service: ServiceKind,
    pub display_mode: DisplayMode,
    pub item_key: &'a str,
    pub pipeline_version: &'a str,
}

/// 十六进制 SHA-256 签名
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    /// 计算签名
    pub fn compute(input: &SignatureInput<'_>) -> Self {
        let mut hasher = Sha256::new();
        let fields = [
            input.normalized_text,
            input.target_lang,
            input.service.as_str(),
            input.display_mode.as_str(),
            input.item_key,
            input.pipeline_version,
        ];
        for (idx, field) in fields.iter().enumerate() {
            if idx > 0 {
                hasher.update([FIELD_SEPARATOR]);
            }
            hasher.update(field.as_bytes());
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// 从已持久化的字符串恢复签名；非 64 位十六进制的值视为无效
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(value.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 日志用的短前缀
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 为签名规范化 HTML：标签替换为空格、解码实体、折叠空白
pub fn normalize_text(html: &str) -> String {
    markup::collapse_whitespace(&markup::decode_entities(&markup::replace_tags(html, " ")))
}

/// SHA-256 十六进制摘要
pub fn sha256_hex(data: &str) -> String {
    format!("{:x}", Sha256::digest(data.as_bytes()))
}
