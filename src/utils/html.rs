/// 转义 HTML 特殊字符（页面内容写入报告前必须经过这里）
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// 分数对应的等级文字
pub fn grade_label(score: u8) -> &'static str {
    match score {
        4.. => "优秀",
        3 => "标准",
        _ => "需改进",
    }
}
