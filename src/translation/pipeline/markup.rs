//! 轻量级 HTML 标签扫描
//!
//! 段落切分与包装编解码共用的底层工具。这里不构建 DOM，只在原始字节上定位标签，
//! 因此可以按字节精确地替换片段而保持其余标记原样不动。
//!
//! 扫描器能够识别：
//! - 注释 `<!-- ... -->`、声明 `<!DOCTYPE>`、处理指令 `<? ... ?>`（均跳过）
//! - `script` / `style` 的原始文本内容（内部的 `<` 不视为标签）
//! - 属性值中被引号包裹的 `>`

use std::borrow::Cow;

/// 原始文本元素：内容不按标签解析
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// 文本之间隐含换行的元素
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "ol", "p", "pre",
    "section", "table", "td", "th", "tr", "ul",
];

/// 一个已定位的标签
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// 小写标签名
    pub name: String,
    /// 是否为结束标签 `</name>`
    pub closing: bool,
    /// 是否为自闭合写法 `<name/>`
    pub self_closing: bool,
    /// `<` 的字节位置
    pub start: usize,
    /// `>` 之后的字节位置
    pub end: usize,
    /// 标签名之后到 `>`（或 `/>`）之前的原始属性文本范围
    pub attrs: (usize, usize),
}

impl Tag {
    /// 原始属性文本
    pub fn raw_attributes<'a>(&self, html: &'a str) -> &'a str {
        &html[self.attrs.0..self.attrs.1]
    }
}

/// 按文档顺序产出标签的扫描器
pub struct TagScanner<'a> {
    html: &'a str,
    pos: usize,
    raw_text: Option<&'static str>,
}

impl<'a> TagScanner<'a> {
    /// 从文档开头扫描
    pub fn new(html: &'a str) -> Self {
        Self::starting_at(html, 0)
    }

    /// 从指定字节位置开始扫描
    pub fn starting_at(html: &'a str, pos: usize) -> Self {
        Self {
            html,
            pos: pos.min(html.len()),
            raw_text: None,
        }
    }

    fn skip_raw_text(&mut self, name: &str) {
        let needle = format!("</{}", name);
        self.pos = find_ascii_ci(self.html.as_bytes(), needle.as_bytes(), self.pos)
            .unwrap_or(self.html.len());
    }
}

impl<'a> Iterator for TagScanner<'a> {
    type Item = Tag;

    fn next(&mut self) -> Option<Tag> {
        if let Some(name) = self.raw_text.take() {
            self.skip_raw_text(name);
        }

        let bytes = self.html.as_bytes();
        loop {
            let lt = bytes[self.pos..].iter().position(|&b| b == b'<')? + self.pos;
            let rest = &bytes[lt..];

            if rest.starts_with(b"<!--") {
                self.pos = match find_bytes(bytes, b"-->", lt + 4) {
                    Some(idx) => idx + 3,
                    None => bytes.len(),
                };
                continue;
            }

            if rest.starts_with(b"<!") || rest.starts_with(b"<?") {
                self.pos = match bytes[lt..].iter().position(|&b| b == b'>') {
                    Some(idx) => lt + idx + 1,
                    None => bytes.len(),
                };
                continue;
            }

            let closing = rest.get(1) == Some(&b'/');
            let name_start = if closing { lt + 2 } else { lt + 1 };
            if !bytes.get(name_start).is_some_and(|b| b.is_ascii_alphabetic()) {
                self.pos = lt + 1;
                continue;
            }

            let name_end = bytes[name_start..]
                .iter()
                .position(|b| !(b.is_ascii_alphanumeric() || *b == b'-' || *b == b':'))
                .map_or(bytes.len(), |idx| name_start + idx);

            let Some(gt) = find_tag_end(bytes, name_end) else {
                // 未闭合的 `<` 视为普通文本
                self.pos = lt + 1;
                continue;
            };

            let self_closing = gt > name_end && bytes[gt - 1] == b'/';
            let attrs_end = if self_closing { gt - 1 } else { gt };
            let name = self.html[name_start..name_end].to_ascii_lowercase();
            self.pos = gt + 1;

            if !closing && !self_closing {
                self.raw_text = RAW_TEXT_ELEMENTS.iter().copied().find(|raw| *raw == name);
            }

            return Some(Tag {
                name,
                closing,
                self_closing,
                start: lt,
                end: gt + 1,
                attrs: (name_end, attrs_end.max(name_end)),
            });
        }
    }
}

/// 在 `from` 之后寻找与已打开的 `name` 元素配对的结束标签。
///
/// 同名嵌套按深度计数；返回 `(结束标签起点, 结束标签终点)`。
pub fn find_matching_close(html: &str, name: &str, from: usize) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    for tag in TagScanner::starting_at(html, from) {
        if tag.name != name || tag.self_closing {
            continue;
        }
        if tag.closing {
            depth -= 1;
            if depth == 0 {
                return Some((tag.start, tag.end));
            }
        } else {
            depth += 1;
        }
    }
    None
}

/// 去除所有标签，只保留文本节点（不解码实体）
pub fn strip_tags(html: &str) -> String {
    replace_tags(html, "")
}

/// 去除标签，块级边界处补一个空格，行内标签直接去掉（不解码实体）
pub fn block_text(html: &str) -> String {
    replace_tags_by(html, "", |tag| {
        if BLOCK_ELEMENTS.contains(&tag.name.as_str()) {
            " "
        } else {
            ""
        }
    })
}

/// 用 `replacement` 替换每个标签、注释与原始文本块
pub fn replace_tags(html: &str, replacement: &str) -> String {
    replace_tags_by(html, replacement, |_| replacement)
}

fn replace_tags_by<'r>(
    html: &str,
    comment_replacement: &str,
    replacement: impl Fn(&Tag) -> &'r str,
) -> String {
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    for tag in TagScanner::new(html) {
        push_text(&mut out, html, cursor, tag.start, comment_replacement);
        out.push_str(replacement(&tag));
        cursor = tag.end;

        if !tag.closing && RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) {
            let needle = format!("</{}", tag.name);
            match find_ascii_ci(html.as_bytes(), needle.as_bytes(), tag.end) {
                Some(close_start) => cursor = close_start,
                None => {
                    cursor = html.len();
                    break;
                }
            }
        }
    }
    push_text(&mut out, html, cursor, html.len(), comment_replacement);
    out
}

/// 追加 `[from, to)` 的文本，但跳过其中的注释
fn push_text(out: &mut String, html: &str, from: usize, to: usize, replacement: &str) {
    let mut cursor = from;
    let bytes = html.as_bytes();
    while cursor < to {
        match find_bytes(&bytes[..to], b"<!--", cursor) {
            Some(open) => {
                out.push_str(&html[cursor..open]);
                out.push_str(replacement);
                cursor = find_bytes(&bytes[..to], b"-->", open + 4).map_or(to, |idx| idx + 3);
            }
            None => {
                out.push_str(&html[cursor..to]);
                break;
            }
        }
    }
}

/// 将连续空白折叠为单个空格并去除首尾空白
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 解码常见 HTML 实体与数字字符引用
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        match candidate.find(';').filter(|&semi| semi <= 12) {
            Some(semi) => match decode_entity(&candidate[1..semi]) {
                Some(ch) => {
                    out.push(ch);
                    rest = &candidate[semi + 1..];
                }
                None => {
                    out.push('&');
                    rest = &candidate[1..];
                }
            },
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" | "#39" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let numeric = entity.strip_prefix('#')?;
            let hex = numeric
                .strip_prefix('x')
                .or_else(|| numeric.strip_prefix('X'));
            let code = match hex {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => numeric.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// 转义文本以便安全地写入 HTML
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

/// 标签内部寻找 `>`，跳过引号中的内容
fn find_tag_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (idx, &b) in bytes.iter().enumerate().skip(from) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' => return Some(idx),
                b'<' => return None,
                _ => {}
            },
        }
    }
    None
}

fn find_bytes(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|idx| idx + from)
}

fn find_ascii_ci(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
        .map(|idx| idx + from)
}
