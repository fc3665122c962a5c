//! 内容分段
//!
//! 将 HTML 正文切分为有序的块级段落（p、li、blockquote、pre、h1-h6），
//! 并在翻译后只替换段落内部文本，其余标记逐字节保持不变。
//!
//! 同名嵌套按标签深度配对，外层元素优先成为段落边界，内层内容并入外层文本。
//! 找不到任何可识别的块级标签，或可识别标签未闭合时，退化为整篇纯文本单段模式。

use super::markup::{self, TagScanner};

/// 可翻译的块级标签白名单
pub const SEGMENT_TAGS: &[&str] = &[
    "p", "li", "blockquote", "pre", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// 段落种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Paragraph,
    ListItem,
    Quote,
    Preformatted,
    Heading(u8),
}

impl SegmentKind {
    /// 从小写标签名识别
    pub fn from_tag(name: &str) -> Option<Self> {
        match name {
            "p" => Some(SegmentKind::Paragraph),
            "li" => Some(SegmentKind::ListItem),
            "blockquote" => Some(SegmentKind::Quote),
            "pre" => Some(SegmentKind::Preformatted),
            "h1" => Some(SegmentKind::Heading(1)),
            "h2" => Some(SegmentKind::Heading(2)),
            "h3" => Some(SegmentKind::Heading(3)),
            "h4" => Some(SegmentKind::Heading(4)),
            "h5" => Some(SegmentKind::Heading(5)),
            "h6" => Some(SegmentKind::Heading(6)),
            _ => None,
        }
    }

    /// 对应的标签名
    pub fn tag_name(self) -> &'static str {
        match self {
            SegmentKind::Paragraph => "p",
            SegmentKind::ListItem => "li",
            SegmentKind::Quote => "blockquote",
            SegmentKind::Preformatted => "pre",
            SegmentKind::Heading(1) => "h1",
            SegmentKind::Heading(2) => "h2",
            SegmentKind::Heading(3) => "h3",
            SegmentKind::Heading(4) => "h4",
            SegmentKind::Heading(5) => "h5",
            SegmentKind::Heading(_) => "h6",
        }
    }

    /// 是否保留原始换行
    pub fn preserves_whitespace(self) -> bool {
        matches!(self, SegmentKind::Preformatted)
    }
}

/// 段落在源文档中的字节范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    /// 开始标签起点
    pub start: usize,
    /// 开始标签之后
    pub inner_start: usize,
    /// 结束标签起点
    pub inner_end: usize,
    /// 结束标签之后
    pub end: usize,
}

/// 一个可翻译段落
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    /// 开始标签上的原始属性文本，原样透传
    pub attributes: String,
    /// 提取出的纯文本
    pub text: String,
    pub span: SourceSpan,
}

/// 分段结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segmentation {
    /// 按块级标签切分
    Blocks(Vec<Segment>),
    /// 退化模式：整篇作为一段纯文本
    Whole { text: String },
}

impl Segmentation {
    /// 段落数量（退化模式计为 1）
    pub fn len(&self) -> usize {
        match self {
            Segmentation::Blocks(segments) => segments.len(),
            Segmentation::Whole { .. } => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按顺序列出每段文本
    pub fn texts(&self) -> Vec<&str> {
        match self {
            Segmentation::Blocks(segments) => segments.iter().map(|s| s.text.as_str()).collect(),
            Segmentation::Whole { text } => vec![text.as_str()],
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Segmentation::Whole { .. })
    }
}

/// 内容分段器
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentSegmenter;

impl ContentSegmenter {
    pub fn new() -> Self {
        Self
    }

    /// 切分 HTML 文档
    pub fn segment(&self, html: &str) -> Segmentation {
        let mut segments = Vec::new();
        let mut from = 0;

        'scan: loop {
            for tag in TagScanner::starting_at(html, from) {
                if tag.closing || tag.self_closing {
                    continue;
                }
                let Some(kind) = SegmentKind::from_tag(&tag.name) else {
                    continue;
                };

                let Some((close_start, close_end)) =
                    markup::find_matching_close(html, &tag.name, tag.end)
                else {
                    tracing::debug!("标签 <{}> 未闭合，退化为整篇单段模式", tag.name);
                    return self.whole(html);
                };

                let inner = &html[tag.end..close_start];
                segments.push(Segment {
                    kind,
                    attributes: tag.raw_attributes(html).to_string(),
                    text: extract_text(inner, kind),
                    span: SourceSpan {
                        start: tag.start,
                        inner_start: tag.end,
                        inner_end: close_start,
                        end: close_end,
                    },
                });

                from = close_end;
                continue 'scan;
            }
            break;
        }

        if segments.is_empty() {
            return self.whole(html);
        }

        Segmentation::Blocks(segments)
    }

    fn whole(&self, html: &str) -> Segmentation {
        Segmentation::Whole {
            text: markup::collapse_whitespace(&markup::decode_entities(&markup::replace_tags(
                html, " ",
            ))),
        }
    }

    /// 重组文档：只替换各段落的内部文本。
    ///
    /// `replacements[i]` 为 `None` 时保留第 i 段的原始内部标记；为 `Some` 时写入转义后的文本，
    /// 换行在 `pre` 以外转换为 `<br />`。退化模式下输出 `<p>译文</p>`。
    pub fn reassemble(
        &self,
        html: &str,
        segmentation: &Segmentation,
        replacements: &[Option<String>],
    ) -> String {
        match segmentation {
            Segmentation::Whole { .. } => match replacements.first() {
                Some(Some(text)) => format!("<p>{}</p>", render_text(text, false)),
                _ => html.to_string(),
            },
            Segmentation::Blocks(segments) => {
                let mut out = String::with_capacity(html.len() + html.len() / 2);
                let mut cursor = 0;
                for (segment, replacement) in segments.iter().zip(replacements.iter()) {
                    let Some(text) = replacement else {
                        continue;
                    };
                    out.push_str(&html[cursor..segment.span.inner_start]);
                    out.push_str(&render_text(text, segment.kind.preserves_whitespace()));
                    cursor = segment.span.inner_end;
                }
                out.push_str(&html[cursor..]);
                out
            }
        }
    }
}

/// 提取段落纯文本
fn extract_text(inner: &str, kind: SegmentKind) -> String {
    let text = markup::decode_entities(&markup::block_text(inner)).into_owned();
    if kind.preserves_whitespace() {
        text.trim().to_string()
    } else {
        markup::collapse_whitespace(&text)
    }
}

/// 将译文转义为 HTML
fn render_text(text: &str, preserve_newlines: bool) -> String {
    let escaped = markup::escape_html(text.trim());
    if preserve_newlines {
        escaped
    } else {
        escaped.replace("\r\n", "\n").replace('\n', "<br />")
    }
}
